use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{info, warn};
use voltdrive_motor::{VoltageControl, VoltageMotor};
use voltdrive_timer::{CallbackSlot, IntervalDispatcher};

use crate::board::SimBoard;
use crate::config::Settings;
use crate::telemetry::{self, Sample, Topic};

/// Control code registered by the application, run from the timer interrupt.
static CONTROL: CallbackSlot = CallbackSlot::new();
static CONTROL_TICKS: AtomicU32 = AtomicU32::new(0);

/// Overflow interrupt handler of the simulated timers.
fn timer_isr() {
    CONTROL.fire();
}

fn control_tick() {
    CONTROL_TICKS.fetch_add(1, Ordering::Relaxed);
}

fn control_ticks() -> u32 {
    CONTROL_TICKS.load(Ordering::Relaxed)
}

/// What a run observed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub steps_applied: usize,
    pub ticks: u32,
    pub elapsed: Duration,
    /// `None` when no timer could be configured.
    pub configured_interval_ms: Option<u16>,
    pub last_sample: Option<Sample>,
}

impl RunReport {
    pub fn tick_rate_hz(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.ticks as f64 / secs } else { 0.0 }
    }
}

/// Bring up the simulated board, start the control interval and play the voltage profile.
pub async fn run(settings: Settings) -> anyhow::Result<RunReport> {
    let limits = settings
        .motor
        .limits()
        .context("invalid [motor] settings")?;
    settings
        .timer
        .validate()
        .context("invalid [timer] settings")?;
    let board = SimBoard::new(&settings, timer_isr);
    let probe = board.probe.clone();
    let halt = board.halt.clone();
    let mut timers = board.timers;
    let pwm_hz = board.pwm.frequency_hz();

    let mut motor = VoltageMotor::new(board.direction_pin, board.pwm, limits)
        .context("motor output initialization failed")?;
    if pwm_hz != motor.limits().pwm_frequency_hz() {
        warn!(
            board_hz = pwm_hz,
            expected_hz = motor.limits().pwm_frequency_hz(),
            "PWM carrier differs from motor limits"
        );
    }
    info!(pwm_hz, "motor output ready");

    CONTROL.register(control_tick);
    let ticks_at_start = control_ticks();

    let mut dispatcher = IntervalDispatcher::new();
    let configured_interval_ms = match dispatcher.configure_interval(&mut timers, settings.timer.interval_ms) {
        Ok(running) => Some(running.interval_ms),
        Err(e) => {
            // The control interrupt is optional for the profile
            warn!("control interval not started: {}", e);
            None
        }
    };

    let topic: Topic<Sample> = Topic::new(64);
    let logger = tokio::spawn(telemetry::log_samples(topic.subscribe()));
    let trace = settings.telemetry.trace_csv.as_ref().map(|path| {
        tokio::spawn(telemetry::write_trace(PathBuf::from(path), topic.subscribe()))
    });
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let sampler = tokio::spawn(telemetry::sample_board(
        probe,
        control_ticks,
        Duration::from_millis(settings.telemetry.period_ms.max(1)),
        topic.clone(),
        stop_rx,
    ));
    drop(topic);

    let started = Instant::now();
    let mut steps_applied = 0;
    for step in &settings.profile.steps {
        let applied = motor.set_voltage(step.volts)?;
        info!(
            requested = step.volts,
            volts = applied.volts,
            direction = %applied.direction,
            duty = applied.duty_percent,
            hold_ms = step.hold_ms,
            "profile step"
        );
        steps_applied += 1;
        tokio::time::sleep(Duration::from_millis(step.hold_ms)).await;
    }
    motor.stop()?;
    let elapsed = started.elapsed();

    halt.halt();
    CONTROL.clear();
    let ticks = control_ticks().wrapping_sub(ticks_at_start);

    let _ = stop_tx.send(true);
    sampler.await.context("telemetry sampler panicked")?;
    let last_sample = logger.await.context("telemetry logger panicked")?;
    if let Some(trace) = trace {
        trace.await.context("trace writer panicked")??;
    }

    let report = RunReport {
        steps_applied,
        ticks,
        elapsed,
        configured_interval_ms,
        last_sample,
    };
    info!(
        steps = report.steps_applied,
        ticks = report.ticks,
        rate_hz = report.tick_rate_hz(),
        elapsed = ?report.elapsed,
        "profile finished"
    );
    Ok(report)
}
