//! Voltage to PWM conversion.
//!
//! Everything here is pure arithmetic; [`crate::VoltageMotor`] applies the
//! result to hardware.

use core::fmt;

use libm::{fabsf, roundf};

use crate::error::MotorError;

/// Supply voltage the motor is driven from, in volts.
pub const DEFAULT_MAX_VOLTAGE: f32 = 6.0;
/// Highest duty cycle ever applied, in percent. Some PWM peripherals glitch at a literal 100 %.
pub const DEFAULT_MAX_DUTY_PERCENT: f32 = 99.2;
/// PWM carrier frequency, in Hz.
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 24_000;

/// Electrical limits of the motor output stage.
///
/// Only [`MotorLimits::new`] and [`Default`] build one, so the saturation
/// range is never empty:
///
/// ```compile_fail
/// use voltdrive_motor::MotorLimits;
///
/// let limits = MotorLimits { max_voltage: -1.0, ..MotorLimits::default() };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorLimits {
    max_voltage: f32,
    max_duty_percent: f32,
    pwm_frequency_hz: u32,
}

impl MotorLimits {
    /// Construct limits, rejecting values that would make the duty computation meaningless.
    ///
    /// # Arguments
    ///
    /// * `max_voltage`: Saturation voltage, must be finite and positive.
    /// * `max_duty_percent`: Duty clamp, must be in `(0, 100]`.
    /// * `pwm_frequency_hz`: PWM carrier frequency, must be non-zero.
    pub fn new(
        max_voltage: f32,
        max_duty_percent: f32,
        pwm_frequency_hz: u32,
    ) -> Result<Self, MotorError> {
        if !max_voltage.is_finite() || max_voltage <= 0.0 {
            return Err(MotorError::InvalidLimits("max voltage must be positive"));
        }
        if !max_duty_percent.is_finite() || max_duty_percent <= 0.0 || max_duty_percent > 100.0 {
            return Err(MotorError::InvalidLimits("max duty must be in (0, 100]"));
        }
        if pwm_frequency_hz == 0 {
            return Err(MotorError::InvalidLimits("pwm frequency must be non-zero"));
        }
        Ok(Self {
            max_voltage,
            max_duty_percent,
            pwm_frequency_hz,
        })
    }

    /// Commands are saturated to `±max_voltage`.
    pub fn max_voltage(&self) -> f32 {
        self.max_voltage
    }

    /// Upper clamp of the computed duty cycle, in percent.
    pub fn max_duty_percent(&self) -> f32 {
        self.max_duty_percent
    }

    /// Carrier frequency the board configures the PWM channel with.
    pub fn pwm_frequency_hz(&self) -> u32 {
        self.pwm_frequency_hz
    }
}

impl Default for MotorLimits {
    fn default() -> Self {
        Self {
            max_voltage: DEFAULT_MAX_VOLTAGE,
            max_duty_percent: DEFAULT_MAX_DUTY_PERCENT,
            pwm_frequency_hz: DEFAULT_PWM_FREQUENCY_HZ,
        }
    }
}

/// Rotation direction, encoded on the direction pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Direction pin HIGH.
    #[default]
    Forward,
    /// Direction pin LOW.
    Reverse,
}

impl Direction {
    /// `true` when the direction pin is driven high.
    pub const fn is_high(self) -> bool {
        matches!(self, Direction::Forward)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// The output signals derived from one voltage command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorCommand {
    /// The command after saturation, in volts.
    pub volts: f32,
    /// Level of the direction pin.
    pub direction: Direction,
    /// Duty cycle in percent, within `[0, max_duty_percent]`.
    pub duty_percent: f32,
}

impl MotorCommand {
    /// Saturate `volts` and derive direction and duty cycle.
    ///
    /// Zero volts is forward. NaN is treated as zero volts.
    pub fn from_voltage(volts: f32, limits: &MotorLimits) -> Self {
        let volts = if volts.is_nan() {
            0.0
        } else {
            volts.clamp(-limits.max_voltage, limits.max_voltage)
        };

        let direction = if volts >= 0.0 {
            Direction::Forward
        } else {
            Direction::Reverse
        };

        let duty_percent =
            (fabsf(volts) / limits.max_voltage * 100.0).clamp(0.0, limits.max_duty_percent);

        Self {
            volts,
            direction,
            duty_percent,
        }
    }

    /// Duty cycle scaled to a PWM channel whose full-on value is `max_duty`.
    pub fn raw_duty(&self, max_duty: u16) -> u16 {
        let raw = roundf(self.duty_percent / 100.0 * max_duty as f32);
        (raw as u16).min(max_duty)
    }

    /// Duty cycle with the sign of the direction, handy for traces.
    pub fn signed_duty_percent(&self) -> f32 {
        match self.direction {
            Direction::Forward => self.duty_percent,
            Direction::Reverse => -self.duty_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f32 = 1e-4;

    fn cmd(volts: f32) -> MotorCommand {
        MotorCommand::from_voltage(volts, &MotorLimits::default())
    }

    #[test]
    fn test_half_voltage_is_half_duty() {
        let c = cmd(3.0);
        assert_eq!(c.direction, Direction::Forward);
        assert!((c.duty_percent - 50.0).abs() < EPSILON);
    }

    #[test]
    fn test_full_reverse_is_clamped_below_100() {
        let c = cmd(-6.0);
        assert_eq!(c.direction, Direction::Reverse);
        assert!((c.duty_percent - 99.2).abs() < EPSILON);
        assert_eq!(c.volts, -6.0);
    }

    #[test]
    fn test_over_voltage_saturates() {
        assert_eq!(cmd(7.5), cmd(6.0));
        assert_eq!(cmd(-1e9), cmd(-6.0));
        assert_eq!(cmd(f32::INFINITY), cmd(6.0));
        assert_eq!(cmd(f32::NEG_INFINITY), cmd(-6.0));
    }

    #[test]
    fn test_zero_is_forward() {
        let c = cmd(0.0);
        assert_eq!(c.direction, Direction::Forward);
        assert_eq!(c.duty_percent, 0.0);
        // -0.0 compares equal to 0.0
        assert_eq!(cmd(-0.0).direction, Direction::Forward);
    }

    #[test]
    fn test_nan_is_stopped_forward() {
        let c = cmd(f32::NAN);
        assert_eq!(c.direction, Direction::Forward);
        assert_eq!(c.duty_percent, 0.0);
    }

    #[test]
    fn test_duty_bounded_and_monotonic() {
        let mut previous = 0.0;
        for i in 0..=1200 {
            let volts = i as f32 * 0.01 - 6.0;
            let duty = cmd(volts).duty_percent;
            assert!((0.0..=99.2).contains(&duty), "duty {} out of range at {} V", duty, volts);

            let magnitude = i as f32 * 0.005;
            let d = cmd(magnitude).duty_percent;
            assert!(d >= previous, "duty decreased at {} V", magnitude);
            previous = d;
        }
    }

    #[test]
    fn test_raw_duty_scaling() {
        assert_eq!(cmd(3.0).raw_duty(1000), 500);
        assert_eq!(cmd(-6.0).raw_duty(1000), 992);
        assert_eq!(cmd(0.0).raw_duty(1000), 0);
        assert_eq!(cmd(6.0).raw_duty(0), 0);
        assert_eq!(cmd(6.0).raw_duty(u16::MAX), 65011);
    }

    #[test]
    fn test_signed_duty() {
        assert!((cmd(-3.0).signed_duty_percent() + 50.0).abs() < EPSILON);
        assert!((cmd(1.5).signed_duty_percent() - 25.0).abs() < EPSILON);
    }

    #[test]
    fn test_custom_limits() {
        let limits = MotorLimits::new(12.0, 95.0, 20_000).unwrap();
        assert_eq!(limits.max_voltage(), 12.0);
        assert_eq!(limits.max_duty_percent(), 95.0);
        assert_eq!(limits.pwm_frequency_hz(), 20_000);
        let c = MotorCommand::from_voltage(6.0, &limits);
        assert!((c.duty_percent - 50.0).abs() < EPSILON);
        let c = MotorCommand::from_voltage(-20.0, &limits);
        assert_eq!(c.volts, -12.0);
        assert!((c.duty_percent - 95.0).abs() < EPSILON);
    }

    #[test]
    fn test_invalid_limits() {
        assert!(matches!(
            MotorLimits::new(0.0, 99.2, 24_000),
            Err(MotorError::InvalidLimits("max voltage must be positive"))
        ));
        assert!(matches!(
            MotorLimits::new(-1.0, 99.2, 24_000),
            Err(MotorError::InvalidLimits("max voltage must be positive"))
        ));
        assert!(matches!(
            MotorLimits::new(f32::NAN, 99.2, 24_000),
            Err(MotorError::InvalidLimits(_))
        ));
        assert!(matches!(
            MotorLimits::new(6.0, 100.5, 24_000),
            Err(MotorError::InvalidLimits("max duty must be in (0, 100]"))
        ));
        assert!(matches!(
            MotorLimits::new(6.0, 99.2, 0),
            Err(MotorError::InvalidLimits("pwm frequency must be non-zero"))
        ));
    }
}
