use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::board::Probe;

/// Broadcast topic with bounded capacity.
/// Slow subscribers lose the oldest samples rather than stalling the sampler.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, msg: T) {
        // No subscriber is not an error
        let _ = self.tx.send(Arc::new(msg));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

/// One observation of the board outputs and the control interrupt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_ms: u64,
    pub ticks: u32,
    pub direction_high: bool,
    pub signed_duty_percent: f32,
}

impl Sample {
    /// `timestamp_ms,signed_duty_percent`, the two-column layout plotting scripts read.
    pub fn csv_line(&self) -> String {
        format!("{},{:.3}\n", self.timestamp_ms, self.signed_duty_percent)
    }
}

/// Sample the board every `period` and publish until `stop` changes or its sender is dropped.
pub async fn sample_board(
    probe: Probe,
    ticks: fn() -> u32,
    period: Duration,
    topic: Topic<Sample>,
    stop: tokio::sync::watch::Receiver<bool>,
) {
    let started = Instant::now();
    let mut interval = tokio::time::interval(period);
    let mut stop = stop;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop.changed() => break,
        }
        topic.publish(Sample {
            timestamp_ms: started.elapsed().as_millis() as u64,
            ticks: ticks(),
            direction_high: probe.direction_high(),
            signed_duty_percent: probe.signed_duty_percent(),
        });
    }
    debug!("telemetry sampler stopped");
}

/// Log the samples at debug level and keep the last one.
pub async fn log_samples(mut rx: broadcast::Receiver<Arc<Sample>>) -> Option<Sample> {
    let mut last = None;
    loop {
        match rx.recv().await {
            Ok(sample) => {
                debug!(
                    t_ms = sample.timestamp_ms,
                    ticks = sample.ticks,
                    dir_high = sample.direction_high,
                    duty = sample.signed_duty_percent,
                    "telemetry"
                );
                last = Some(*sample);
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "telemetry logger lagging"),
            Err(RecvError::Closed) => break,
        }
    }
    last
}

/// Append every sample to a CSV file.
pub async fn write_trace(
    path: PathBuf,
    mut rx: broadcast::Receiver<Arc<Sample>>,
) -> anyhow::Result<usize> {
    let file = tokio::fs::File::create(&path).await?;
    let mut out = tokio::io::BufWriter::new(file);
    let mut lines = 0;
    loop {
        match rx.recv().await {
            Ok(sample) => {
                out.write_all(sample.csv_line().as_bytes()).await?;
                lines += 1;
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "trace writer dropped samples"),
            Err(RecvError::Closed) => break,
        }
    }
    out.flush().await?;
    info!(lines, path = %path.display(), "trace written");
    Ok(lines)
}
