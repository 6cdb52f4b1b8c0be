//! General-purpose timers of the STM32F411 available to the control interval.
//!
//! TIM1 drives the motor PWM and TIM3 is the embassy time driver, which
//! leaves TIM2 (32-bit) for the control interrupt.

use embassy_stm32::interrupt;
use embassy_stm32::interrupt::InterruptExt;
use embassy_stm32::pac;
use embassy_stm32::peripherals::TIM2;
use embassy_stm32::timer::low_level;
use voltdrive_timer::{PeriodicTimer, TimerBank, TimerSlot};

/// Counter tick rate; gives 0.1 ms resolution and intervals up to u16::MAX ms.
const TICK_HZ: u32 = 10_000;
const TIM2_SLOT: TimerSlot = TimerSlot {
    index: 2,
    pwm_reserved: false,
};

#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub enum ControlTimerError {
    InvalidFrequency,
    /// The timer kernel clock cannot be divided down to `TICK_HZ`.
    ClockTooSlow,
    NotConfigured,
}

pub struct Stm32TimerBank {
    tim2: Option<ControlTimer>,
}

impl Stm32TimerBank {
    pub fn new(tim2: TIM2) -> Self {
        Self {
            tim2: Some(ControlTimer {
                timer: low_level::Timer::new(tim2),
                configured: false,
            }),
        }
    }
}

impl TimerBank for Stm32TimerBank {
    type Timer = ControlTimer;

    fn available_timer(&mut self, _allow_pwm_reserved: bool) -> Option<TimerSlot> {
        // TIM1 is owned by the PWM driver and cannot be lent out.
        self.tim2.as_ref().map(|_| TIM2_SLOT)
    }

    fn force_use_of_pwm_reserved(&mut self) {
        defmt::warn!("no PWM-reserved timer can be shared on this board");
    }

    fn take(&mut self, slot: TimerSlot) -> Option<ControlTimer> {
        if slot != TIM2_SLOT {
            return None;
        }
        self.tim2.take()
    }

    fn give_back(&mut self, slot: TimerSlot, mut timer: ControlTimer) {
        if slot != TIM2_SLOT {
            return;
        }
        timer.timer.stop();
        timer.timer.enable_update_interrupt(false);
        interrupt::TIM2.disable();
        timer.configured = false;
        self.tim2 = Some(timer);
    }
}

pub struct ControlTimer {
    timer: low_level::Timer<'static, TIM2>,
    configured: bool,
}

impl PeriodicTimer for ControlTimer {
    type Error = ControlTimerError;

    fn begin(&mut self, frequency_hz: f32) -> Result<(), Self::Error> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(ControlTimerError::InvalidFrequency);
        }
        let clock = self.timer.get_clock_frequency().0;
        if clock < TICK_HZ {
            return Err(ControlTimerError::ClockTooSlow);
        }
        let prescaler = clock / TICK_HZ - 1;
        let reload = (libm::roundf(TICK_HZ as f32 / frequency_hz) as u32).max(1) - 1;

        self.timer.stop();
        let regs = self.timer.regs_gp32();
        regs.psc().write_value(prescaler as u16);
        regs.arr().write_value(reload);
        // Latch prescaler and reload now, then drop the update flag it raised
        regs.egr().write(|w| w.set_ug(true));
        regs.sr().modify(|w| w.set_uif(false));
        self.configured = true;
        Ok(())
    }

    fn setup_overflow_irq(&mut self) -> Result<(), Self::Error> {
        if !self.configured {
            return Err(ControlTimerError::NotConfigured);
        }
        self.timer.enable_update_interrupt(true);
        Ok(())
    }

    fn open(&mut self) -> Result<(), Self::Error> {
        interrupt::TIM2.unpend();
        unsafe { interrupt::TIM2.enable() };
        Ok(())
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        self.timer.start();
        Ok(())
    }
}

#[interrupt]
fn TIM2() {
    pac::TIM2.sr().modify(|w| w.set_uif(false));
    crate::CONTROL.fire();
}
