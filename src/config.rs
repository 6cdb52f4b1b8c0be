use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};
use voltdrive_motor::MotorLimits;
use voltdrive_motor::command::{
    DEFAULT_MAX_DUTY_PERCENT, DEFAULT_MAX_VOLTAGE, DEFAULT_PWM_FREQUENCY_HZ,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "VOLTDRIVE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub motor: MotorSettings,
    pub timer: TimerSettings,
    pub profile: ProfileSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotorSettings {
    pub max_voltage: f32,
    pub max_duty_percent: f32,
    pub pwm_frequency_hz: u32,
    /// Full-on compare value of the simulated PWM channel.
    pub pwm_resolution: u16,
}

impl Default for MotorSettings {
    fn default() -> Self {
        Self {
            max_voltage: DEFAULT_MAX_VOLTAGE,
            max_duty_percent: DEFAULT_MAX_DUTY_PERCENT,
            pwm_frequency_hz: DEFAULT_PWM_FREQUENCY_HZ,
            pwm_resolution: 1000,
        }
    }
}

impl MotorSettings {
    pub fn limits(&self) -> Result<MotorLimits, voltdrive_motor::MotorError> {
        MotorLimits::new(self.max_voltage, self.max_duty_percent, self.pwm_frequency_hz)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub interval_ms: u16,
    /// Number of simulated general-purpose timers nobody else uses.
    pub free_timers: u8,
    /// Number of simulated timers set aside for PWM generation.
    pub pwm_reserved_timers: u8,
}

impl TimerSettings {
    /// Every simulated timer needs a distinct `u8` channel index.
    pub fn validate(&self) -> anyhow::Result<()> {
        let total = u16::from(self.free_timers) + u16::from(self.pwm_reserved_timers);
        anyhow::ensure!(
            total <= u16::from(u8::MAX) + 1,
            "{} timers requested, at most 256 channels can be indexed",
            total
        );
        Ok(())
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            free_timers: 1,
            pwm_reserved_timers: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VoltageStep {
    pub volts: f32,
    pub hold_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub steps: Vec<VoltageStep>,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        let steps = [3.0, 6.0, 7.5, 0.0, -3.0, -6.0, 0.0]
            .into_iter()
            .map(|volts| VoltageStep { volts, hold_ms: 200 })
            .collect();
        Self { steps }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub period_ms: u64,
    /// Headerless `timestamp_ms,signed_duty_percent` lines are written here when set.
    pub trace_csv: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            period_ms: 50,
            trace_csv: None,
        }
    }
}

/// Load settings from the TOML file at `path`, then apply `VOLTDRIVE__*` overrides.
pub fn load_config(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    info!("Attempting to load configuration from {}", path.display());

    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|config| config.try_deserialize::<Settings>());

    match settings {
        Ok(settings) => {
            info!("Successfully loaded configuration: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}
