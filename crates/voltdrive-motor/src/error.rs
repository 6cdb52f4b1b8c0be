//! Error types for the motor driver.

use core::fmt;

use embedded_hal::{digital, pwm};

/// Errors that can occur while driving the motor outputs.
///
/// Out-of-range voltage commands are not errors: they are saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorError {
    /// The direction pin driver reported a failure.
    Pin(digital::ErrorKind),
    /// The PWM channel driver reported a failure.
    Pwm(pwm::ErrorKind),
    /// Motor limits were rejected on construction.
    InvalidLimits(&'static str),
}

impl MotorError {
    pub(crate) fn pin<E: digital::Error>(err: E) -> Self {
        MotorError::Pin(err.kind())
    }

    pub(crate) fn pwm<E: pwm::Error>(err: E) -> Self {
        MotorError::Pwm(err.kind())
    }
}

impl fmt::Display for MotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorError::Pin(kind) => write!(f, "Direction pin error: {}", kind),
            MotorError::Pwm(kind) => write!(f, "PWM channel error: {}", kind),
            MotorError::InvalidLimits(msg) => write!(f, "Invalid motor limits: {}", msg),
        }
    }
}

impl core::error::Error for MotorError {}
