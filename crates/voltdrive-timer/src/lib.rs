#![cfg_attr(not(test), no_std)]
#![doc = "A `no_std` dispatcher for a periodic control interrupt."]
#![doc = ""]
#![doc = "[`IntervalDispatcher`] claims a general-purpose timer from a [`TimerBank`],"]
#![doc = "preferring channels not reserved for PWM, and starts it at the requested"]
#![doc = "interval. The board's interrupt handler calls [`CallbackSlot::fire`], which"]
#![doc = "runs the control code registered by the application."]

pub mod callback;
pub mod dispatcher;
pub mod error;
pub mod interval;
pub mod traits;

pub use callback::{CallbackSlot, IntervalCallback};
pub use dispatcher::{DispatcherState, IntervalDispatcher, RunningInterval};
pub use error::{SetupStep, TimerError};
pub use interval::{effective_interval_ms, interval_to_frequency};
pub use traits::{PeriodicTimer, TimerBank, TimerSlot};
