use tracing::{debug, info, warn};

use crate::error::{SetupStep, TimerError};
use crate::interval::{effective_interval_ms, interval_to_frequency};
use crate::traits::{PeriodicTimer, TimerBank, TimerSlot};

/// Lifecycle of the interval timer. `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatcherState {
    Unconfigured,
    Running,
}

/// What the dispatcher set up once it is running.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunningInterval {
    /// The claimed channel.
    pub slot: TimerSlot,
    /// The channel is a PWM-reserved one, shared because nothing else was free.
    pub shared: bool,
    /// Interval after coercion, in milliseconds.
    pub interval_ms: u16,
    /// Overflow frequency requested from the timer, in Hz.
    pub frequency_hz: f32,
}

/// Owns the timer that drives the periodic control interrupt.
///
/// The interrupt itself is routed by the board to a
/// [`CallbackSlot`](crate::CallbackSlot).
pub struct IntervalDispatcher<T: PeriodicTimer> {
    timer: Option<T>,
    running: Option<RunningInterval>,
}

impl<T: PeriodicTimer> IntervalDispatcher<T> {
    pub const fn new() -> Self {
        Self {
            timer: None,
            running: None,
        }
    }

    pub fn state(&self) -> DispatcherState {
        if self.running.is_some() {
            DispatcherState::Running
        } else {
            DispatcherState::Unconfigured
        }
    }

    /// Details of the running timer, `None` while unconfigured.
    pub fn running(&self) -> Option<&RunningInterval> {
        self.running.as_ref()
    }

    /// Claim a timer from `bank` and start it overflowing every `interval_ms`.
    ///
    /// An interval of zero is treated as one millisecond. Free channels are
    /// preferred; a PWM-reserved channel is shared only when nothing else is
    /// left. If no channel can be had, nothing is touched. A failing bring-up
    /// step skips the remaining ones, the channel goes back to `bank` and the
    /// dispatcher stays unconfigured, so a later call may retry.
    pub fn configure_interval<B>(
        &mut self,
        bank: &mut B,
        interval_ms: u16,
    ) -> Result<RunningInterval, TimerError<T::Error>>
    where
        B: TimerBank<Timer = T>,
        T::Error: core::fmt::Debug,
    {
        if self.running.is_some() {
            warn!("interval timer already running, ignoring reconfiguration");
            return Err(TimerError::AlreadyRunning);
        }

        let interval_ms = effective_interval_ms(interval_ms);
        let frequency_hz = interval_to_frequency(interval_ms);

        let (slot, shared) = match bank.available_timer(false) {
            Some(slot) => (slot, false),
            None => match bank.available_timer(true) {
                Some(slot) => {
                    debug!(index = slot.index, "no free timer, sharing a PWM-reserved one");
                    (slot, true)
                }
                None => {
                    warn!(interval_ms, "no hardware timer available");
                    return Err(TimerError::NoTimerAvailable);
                }
            },
        };

        if shared {
            bank.force_use_of_pwm_reserved();
        }
        let Some(mut timer) = bank.take(slot) else {
            warn!(index = slot.index, "timer bank refused the offered slot");
            return Err(TimerError::SlotUnavailable(slot.index));
        };

        if let Err((step, source)) = bring_up(&mut timer, frequency_hz) {
            warn!(index = slot.index, %step, ?source, "timer setup failed");
            bank.give_back(slot, timer);
            return Err(TimerError::Peripheral { step, source });
        }

        let running = RunningInterval {
            slot,
            shared,
            interval_ms,
            frequency_hz,
        };
        info!(
            index = slot.index,
            shared,
            interval_ms,
            frequency_hz,
            "interval timer running"
        );
        self.timer = Some(timer);
        self.running = Some(running);
        Ok(running)
    }
}

impl<T: PeriodicTimer> Default for IntervalDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn bring_up<T: PeriodicTimer>(timer: &mut T, frequency_hz: f32) -> Result<(), (SetupStep, T::Error)> {
    timer.begin(frequency_hz).map_err(|e| (SetupStep::Begin, e))?;
    timer
        .setup_overflow_irq()
        .map_err(|e| (SetupStep::OverflowIrq, e))?;
    timer.open().map_err(|e| (SetupStep::Open, e))?;
    timer.start().map_err(|e| (SetupStep::Start, e))
}
