use crate::command::{Direction, MotorCommand};

/// Snapshot of what the driver last put on its outputs.
///
/// Direction is not read back from the pin; it is the level the driver last
/// wrote, which is the only level the pin can hold while the driver owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorState {
    /// Level of the direction pin.
    pub direction: Direction,
    /// Applied duty cycle in percent.
    pub duty_percent: f32,
    /// Raw compare value written to the PWM channel.
    pub duty_cycle: u16,
    /// Full-on compare value of the PWM channel.
    pub max_duty_cycle: u16,
    /// Saturated voltage of the last command.
    pub volts: f32,
}

/// Core trait for motors driven from a signed voltage command
pub trait VoltageControl {
    type Error;

    /// Drive the motor with `volts`, saturating out-of-range values.
    ///
    /// Returns the signals that were applied.
    fn set_voltage(&mut self, volts: f32) -> Result<MotorCommand, Self::Error>;

    /// Set the duty cycle to zero. The direction pin keeps its level.
    fn stop(&mut self) -> Result<(), Self::Error>;

    /// Get the current state of the motor outputs
    fn get_state(&mut self) -> Result<MotorState, Self::Error>;
}
