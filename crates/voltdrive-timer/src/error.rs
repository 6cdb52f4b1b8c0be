//! Error types for the interval dispatcher.

use core::fmt;

/// A step of the periodic timer bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupStep {
    /// Configure the timer in periodic mode at the requested frequency.
    Begin,
    /// Enable the overflow interrupt and hook the adapter to it.
    OverflowIrq,
    /// Open the timer driver.
    Open,
    /// Start counting.
    Start,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStep::Begin => write!(f, "begin"),
            SetupStep::OverflowIrq => write!(f, "overflow irq setup"),
            SetupStep::Open => write!(f, "open"),
            SetupStep::Start => write!(f, "start"),
        }
    }
}

/// Errors returned by [`crate::IntervalDispatcher::configure_interval`].
///
/// None of these leave a timer running. Callers that only care about the
/// interrupt firing can ignore the result.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerError<E> {
    /// Every timer channel is in use, shared PWM channels included.
    /// No peripheral was touched.
    NoTimerAvailable,
    /// The bank offered a slot but refused to hand it over.
    SlotUnavailable(u8),
    /// The dispatcher already runs a timer; it cannot be reconfigured.
    AlreadyRunning,
    /// A bring-up step failed and the remaining steps were skipped.
    Peripheral {
        /// The step that failed.
        step: SetupStep,
        /// The timer driver's error.
        source: E,
    },
}

impl<E: fmt::Debug> fmt::Display for TimerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::NoTimerAvailable => write!(f, "No hardware timer available"),
            TimerError::SlotUnavailable(index) => write!(f, "Timer {} could not be claimed", index),
            TimerError::AlreadyRunning => write!(f, "Interval timer is already running"),
            TimerError::Peripheral { step, source } => {
                write!(f, "Timer {} failed: {:?}", step, source)
            }
        }
    }
}

impl<E: fmt::Debug> core::error::Error for TimerError<E> {}
