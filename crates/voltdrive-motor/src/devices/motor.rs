use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use tracing::{debug, trace};

use crate::command::{Direction, MotorCommand, MotorLimits};
use crate::error::MotorError;
use crate::traits::motor::{MotorState, VoltageControl};

/// A DC motor behind a direction pin and a PWM channel.
///
/// The driver owns both peripherals, so each output has exactly one writer.
/// The PWM channel must already run at `limits.pwm_frequency_hz()`; the board
/// sets the carrier frequency when it builds the channel.
pub struct VoltageMotor<D, P>
where
    D: OutputPin,
    P: SetDutyCycle,
{
    direction_pin: D,
    pwm: P,
    limits: MotorLimits,
    last: MotorCommand,
    current_duty: u16,
}

impl<D, P> VoltageMotor<D, P>
where
    D: OutputPin,
    P: SetDutyCycle,
{
    /// Take ownership of the outputs and put them in the stopped, forward state.
    pub fn new(mut direction_pin: D, mut pwm: P, limits: MotorLimits) -> Result<Self, MotorError> {
        direction_pin.set_high().map_err(MotorError::pin)?;
        pwm.set_duty_cycle(0).map_err(MotorError::pwm)?;
        debug!(
            max_voltage = limits.max_voltage(),
            max_duty = limits.max_duty_percent(),
            pwm_hz = limits.pwm_frequency_hz(),
            "motor output initialized"
        );

        Ok(Self {
            direction_pin,
            pwm,
            limits,
            last: MotorCommand::default(),
            current_duty: 0,
        })
    }

    pub fn limits(&self) -> &MotorLimits {
        &self.limits
    }

    /// The last command applied, after saturation.
    pub fn last_command(&self) -> MotorCommand {
        self.last
    }

    /// Give the peripherals back.
    pub fn release(self) -> (D, P) {
        (self.direction_pin, self.pwm)
    }

    fn write_direction(&mut self, direction: Direction) -> Result<(), MotorError> {
        match direction {
            Direction::Forward => self.direction_pin.set_high(),
            Direction::Reverse => self.direction_pin.set_low(),
        }
        .map_err(MotorError::pin)
    }
}

impl<D, P> VoltageControl for VoltageMotor<D, P>
where
    D: OutputPin,
    P: SetDutyCycle,
{
    type Error = MotorError;

    fn set_voltage(&mut self, volts: f32) -> Result<MotorCommand, Self::Error> {
        let command = MotorCommand::from_voltage(volts, &self.limits);

        self.write_direction(command.direction)?;
        let duty = command.raw_duty(self.pwm.max_duty_cycle());
        self.pwm.set_duty_cycle(duty).map_err(MotorError::pwm)?;

        trace!(
            requested = volts,
            volts = command.volts,
            direction = command.direction.is_high(),
            duty = command.duty_percent,
            "voltage applied"
        );
        self.last = command;
        self.current_duty = duty;
        Ok(command)
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.pwm.set_duty_cycle(0).map_err(MotorError::pwm)?;
        self.last = MotorCommand {
            volts: 0.0,
            direction: self.last.direction,
            duty_percent: 0.0,
        };
        self.current_duty = 0;
        Ok(())
    }

    fn get_state(&mut self) -> Result<MotorState, Self::Error> {
        Ok(MotorState {
            direction: self.last.direction,
            duty_percent: self.last.duty_percent,
            duty_cycle: self.current_duty,
            max_duty_cycle: self.pwm.max_duty_cycle(),
            volts: self.last.volts,
        })
    }
}
