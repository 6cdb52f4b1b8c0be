mod board; // simulated pins, PWM channel and timer bank
mod config;
mod sim;
mod telemetry;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let settings = config::load_config(&path).with_context(|| format!("loading {}", path))?;

    info!("Voltdrive simulator started");
    let report = sim::run(settings).await?;
    info!(
        "Applied {} profile steps, {} control ticks ({:.1} Hz)",
        report.steps_applied,
        report.ticks,
        report.tick_rate_hz()
    );
    Ok(())
}
