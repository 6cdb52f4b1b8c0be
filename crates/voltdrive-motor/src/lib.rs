#![cfg_attr(not(test), no_std)]
#![doc = "A `no_std` driver for a DC motor behind a direction pin and a PWM channel."]
#![doc = ""]
#![doc = "A signed voltage command is saturated to the supply voltage, its sign selects"]
#![doc = "the direction pin level and its magnitude sets the PWM duty cycle."]

pub mod command;
pub mod devices;
pub mod error;
pub mod traits;

pub use command::{Direction, MotorCommand, MotorLimits};
pub use devices::motor::VoltageMotor;
pub use error::MotorError;
pub use traits::motor::{MotorState, VoltageControl};
