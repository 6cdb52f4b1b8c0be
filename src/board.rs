//! A simulated board: one direction pin, one PWM channel and a bank of
//! general-purpose timers whose overflow interrupts run on host threads.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};
use parking_lot::Mutex;
use spin_sleep::SpinSleeper;
use thiserror::Error;
use tracing::{debug, info, warn};
use voltdrive_timer::{PeriodicTimer, SetupStep, TimerBank, TimerSlot};

use crate::config::Settings;

/// Output levels as an oscilloscope on the board would see them.
#[derive(Debug)]
struct Signals {
    direction_high: AtomicBool,
    duty: AtomicU16,
    max_duty: u16,
}

/// Read-only view of the board outputs.
#[derive(Debug, Clone)]
pub struct Probe {
    signals: Arc<Signals>,
}

impl Probe {
    pub fn direction_high(&self) -> bool {
        self.signals.direction_high.load(Ordering::Acquire)
    }

    pub fn duty_cycle(&self) -> u16 {
        self.signals.duty.load(Ordering::Acquire)
    }

    pub fn duty_percent(&self) -> f32 {
        if self.signals.max_duty == 0 {
            return 0.0;
        }
        self.duty_cycle() as f32 / self.signals.max_duty as f32 * 100.0
    }

    /// Duty with the sign of the direction pin.
    pub fn signed_duty_percent(&self) -> f32 {
        if self.direction_high() {
            self.duty_percent()
        } else {
            -self.duty_percent()
        }
    }
}

pub struct SimPin {
    signals: Arc<Signals>,
}

impl PinErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.signals.direction_high.store(false, Ordering::Release);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.signals.direction_high.store(true, Ordering::Release);
        Ok(())
    }
}

pub struct SimPwm {
    signals: Arc<Signals>,
    frequency_hz: u32,
}

impl SimPwm {
    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }
}

impl PwmErrorType for SimPwm {
    type Error = Infallible;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.signals.max_duty
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.signals
            .duty
            .store(duty.min(self.signals.max_duty), Ordering::Release);
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SimTimerError {
    #[error("invalid overflow frequency {0} Hz")]
    InvalidFrequency(f32),
    #[error("{0} called before {1}")]
    OutOfOrder(SetupStep, SetupStep),
    #[error("injected failure at {0}")]
    Injected(SetupStep),
    #[error("failed to spawn timer thread: {0}")]
    Spawn(String),
}

/// Stops every running simulated timer.
#[derive(Clone, Default)]
pub struct Halt {
    stop: Arc<AtomicBool>,
    threads: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Halt {
    /// Stop all timer threads and wait for them to exit.
    pub fn halt(&self) {
        self.stop.store(true, Ordering::Release);
        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in threads {
            if handle.join().is_err() {
                warn!("timer thread panicked");
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BankEntry {
    slot: TimerSlot,
    claimed: bool,
}

/// Simulated general-purpose timers. PWM-reserved channels can only be
/// claimed after [`TimerBank::force_use_of_pwm_reserved`].
pub struct SimTimerBank {
    entries: Vec<BankEntry>,
    forced: bool,
    isr: fn(),
    halt: Halt,
    fail_at: Option<SetupStep>,
}

impl SimTimerBank {
    pub fn new(free: u8, pwm_reserved: u8, isr: fn(), halt: Halt) -> Self {
        // Reserved channels come first, like on boards where the low GPT
        // channels back the PWM pins.
        let entries = (0..pwm_reserved)
            .map(|index| TimerSlot {
                index,
                pwm_reserved: true,
            })
            // Free channels past index 255 cannot be addressed and are left out.
            .chain((pwm_reserved..=u8::MAX).take(usize::from(free)).map(|index| TimerSlot {
                index,
                pwm_reserved: false,
            }))
            .map(|slot| BankEntry {
                slot,
                claimed: false,
            })
            .collect();

        Self {
            entries,
            forced: false,
            isr,
            halt,
            fail_at: None,
        }
    }

    /// Make every timer handed out afterwards fail at `step`.
    #[cfg(test)]
    pub fn fail_at(&mut self, step: SetupStep) {
        self.fail_at = Some(step);
    }
}

impl TimerBank for SimTimerBank {
    type Timer = SimTimer;

    fn available_timer(&mut self, allow_pwm_reserved: bool) -> Option<TimerSlot> {
        self.entries
            .iter()
            .filter(|entry| !entry.claimed)
            .map(|entry| entry.slot)
            .find(|slot| !slot.pwm_reserved || allow_pwm_reserved)
    }

    fn force_use_of_pwm_reserved(&mut self) {
        warn!("PWM-reserved timers unlocked for general use");
        self.forced = true;
    }

    fn take(&mut self, slot: TimerSlot) -> Option<SimTimer> {
        let forced = self.forced;
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.slot == slot && !entry.claimed)?;
        if entry.slot.pwm_reserved && !forced {
            return None;
        }
        entry.claimed = true;
        debug!(index = slot.index, "timer claimed");

        Some(SimTimer {
            index: slot.index,
            period: None,
            irq: false,
            opened: false,
            isr: self.isr,
            halt: self.halt.clone(),
            fail_at: self.fail_at,
        })
    }

    fn give_back(&mut self, slot: TimerSlot, timer: SimTimer) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.slot == slot) {
            entry.claimed = false;
            debug!(index = timer.index, "timer released");
        }
    }
}

pub struct SimTimer {
    index: u8,
    period: Option<Duration>,
    irq: bool,
    opened: bool,
    isr: fn(),
    halt: Halt,
    fail_at: Option<SetupStep>,
}

impl SimTimer {
    fn check(&self, step: SetupStep) -> Result<(), SimTimerError> {
        if self.fail_at == Some(step) {
            return Err(SimTimerError::Injected(step));
        }
        Ok(())
    }
}

impl PeriodicTimer for SimTimer {
    type Error = SimTimerError;

    fn begin(&mut self, frequency_hz: f32) -> Result<(), Self::Error> {
        self.check(SetupStep::Begin)?;
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(SimTimerError::InvalidFrequency(frequency_hz));
        }
        self.period = Some(Duration::from_secs_f64(1.0 / frequency_hz as f64));
        Ok(())
    }

    fn setup_overflow_irq(&mut self) -> Result<(), Self::Error> {
        self.check(SetupStep::OverflowIrq)?;
        if self.period.is_none() {
            return Err(SimTimerError::OutOfOrder(SetupStep::OverflowIrq, SetupStep::Begin));
        }
        self.irq = true;
        Ok(())
    }

    fn open(&mut self) -> Result<(), Self::Error> {
        self.check(SetupStep::Open)?;
        if !self.irq {
            return Err(SimTimerError::OutOfOrder(SetupStep::Open, SetupStep::OverflowIrq));
        }
        self.opened = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        self.check(SetupStep::Start)?;
        let Some(period) = self.period.filter(|_| self.opened) else {
            return Err(SimTimerError::OutOfOrder(SetupStep::Start, SetupStep::Open));
        };

        let isr = self.isr;
        let stop = Arc::clone(&self.halt.stop);
        let handle = std::thread::Builder::new()
            .name(format!("gpt{}", self.index))
            .spawn(move || {
                let sleeper = SpinSleeper::default();
                let mut next = Instant::now() + period;
                while !stop.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if next > now {
                        sleeper.sleep(next - now);
                    }
                    isr();
                    next += period;
                }
            })
            .map_err(|e| SimTimerError::Spawn(e.to_string()))?;

        self.halt.threads.lock().push(handle);
        info!(index = self.index, ?period, "simulated timer started");
        Ok(())
    }
}

/// Everything the application gets from the simulated board.
pub struct SimBoard {
    pub direction_pin: SimPin,
    pub pwm: SimPwm,
    pub timers: SimTimerBank,
    pub probe: Probe,
    pub halt: Halt,
}

impl SimBoard {
    /// Build the board. `isr` is wired to the overflow interrupt of every timer.
    pub fn new(settings: &Settings, isr: fn()) -> Self {
        let signals = Arc::new(Signals {
            direction_high: AtomicBool::new(false),
            duty: AtomicU16::new(0),
            max_duty: settings.motor.pwm_resolution,
        });
        let halt = Halt::default();

        info!(
            pwm_hz = settings.motor.pwm_frequency_hz,
            resolution = settings.motor.pwm_resolution,
            free_timers = settings.timer.free_timers,
            pwm_reserved_timers = settings.timer.pwm_reserved_timers,
            "simulated board ready"
        );

        Self {
            direction_pin: SimPin {
                signals: Arc::clone(&signals),
            },
            pwm: SimPwm {
                signals: Arc::clone(&signals),
                frequency_hz: settings.motor.pwm_frequency_hz,
            },
            timers: SimTimerBank::new(
                settings.timer.free_timers,
                settings.timer.pwm_reserved_timers,
                isr,
                halt.clone(),
            ),
            probe: Probe { signals },
            halt,
        }
    }
}
