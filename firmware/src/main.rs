#![no_std]
#![no_main]

mod timers;

use core::sync::atomic::{AtomicU32, Ordering};

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, OutputType, Speed};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_time::Timer;
use voltdrive_motor::{MotorLimits, VoltageControl, VoltageMotor};
use voltdrive_timer::{CallbackSlot, IntervalDispatcher};
use {defmt_rtt as _, panic_probe as _};

use crate::timers::Stm32TimerBank;

const CONTROL_INTERVAL_MS: u16 = 10;
const STEP_TIME_MS: u64 = 1000;
const PROFILE: [f32; 7] = [3.0, 6.0, 7.5, 0.0, -3.0, -6.0, 0.0];

/// Routed from the TIM2 update interrupt.
static CONTROL: CallbackSlot = CallbackSlot::new();
static TICKS: AtomicU32 = AtomicU32::new(0);

fn control_step() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Starting voltage motor control...");
    let p = embassy_stm32::init(Default::default());

    let limits = MotorLimits::default();

    // PA8 = TIM1_CH1 drives the bridge PWM input, PA9 its direction input
    let ch1_pin = PwmPin::new_ch1(p.PA8, OutputType::PushPull);
    let pwm = SimplePwm::new(
        p.TIM1,
        Some(ch1_pin),
        None,
        None,
        None,
        Hertz::hz(limits.pwm_frequency_hz()),
        Default::default(),
    );
    let mut channels = pwm.split();
    channels.ch1.enable();
    let dir_pin = Output::new(p.PA9, Level::High, Speed::Low);

    let mut motor = unwrap!(VoltageMotor::new(dir_pin, channels.ch1, limits));
    info!("Motor output initialized at {} Hz", limits.pwm_frequency_hz());

    CONTROL.register(control_step);
    let mut bank = Stm32TimerBank::new(p.TIM2);
    let mut dispatcher = IntervalDispatcher::new();
    match dispatcher.configure_interval(&mut bank, CONTROL_INTERVAL_MS) {
        Ok(running) => info!("Control interval running: {}", running),
        Err(e) => warn!("Control interval not started: {}", e),
    }

    loop {
        for volts in PROFILE {
            let applied = unwrap!(motor.set_voltage(volts));
            info!(
                "{} V -> {} V {}, duty {}%, ticks {}",
                volts,
                applied.volts,
                applied.direction,
                applied.duty_percent,
                TICKS.load(Ordering::Relaxed)
            );
            Timer::after_millis(STEP_TIME_MS).await;
        }
    }
}
