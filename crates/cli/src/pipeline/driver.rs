//! Fusion driver - feeds the controller from a sample channel on a fixed tick.

use std::future::Future;
use std::time::{Duration, Instant};

use contracts::{RecordedSample, SampleStream};
use localization::FusionController;
use observability::{
    record_buffer_depth, record_sample_received, record_tick_duration_ms, record_tick_metrics,
    record_uncertainty,
};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::RunStats;
use crate::error::Result;

/// Driver loop configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Interval between controller ticks
    pub tick_interval: Duration,

    /// Stop after this many ticks (None = until the source is exhausted)
    pub max_ticks: Option<u64>,

    /// Upper bound on samples moved from the channel per tick
    pub max_samples_per_tick: usize,
}

impl DriverConfig {
    pub fn from_tick_hz(tick_hz: f64, max_ticks: Option<u64>, max_samples_per_tick: usize) -> Self {
        Self {
            tick_interval: Duration::from_secs_f64(1.0 / tick_hz),
            max_ticks,
            max_samples_per_tick: max_samples_per_tick.max(1),
        }
    }
}

/// Owns the controller for the lifetime of a run
pub struct FusionDriver {
    config: DriverConfig,
    controller: FusionController,
}

impl FusionDriver {
    pub fn new(controller: FusionController, config: DriverConfig) -> Self {
        Self { config, controller }
    }

    /// Run until the source is exhausted, `max_ticks` is reached or `shutdown` resolves
    ///
    /// Every tick moves pending samples into the controller and calls
    /// [`FusionController::run`]. Once the channel is disconnected one last tick
    /// drains whatever the buffers still allow, then publishers are flushed and
    /// the source task is joined.
    pub async fn run<F>(
        mut self,
        mut rx: mpsc::Receiver<RecordedSample>,
        source: JoinHandle<ingestion::Result<u64>>,
        shutdown: F,
    ) -> Result<RunStats>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut stats = RunStats::default();
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            tick_ms = self.config.tick_interval.as_secs_f64() * 1000.0,
            max_ticks = ?self.config.max_ticks,
            "Driver running"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!(ticks = stats.ticks, "Shutdown requested, stopping driver");
                    stats.interrupted = true;
                    break;
                }
                _ = interval.tick() => {}
            }

            let source_done = self.drain(&mut rx, &mut stats);
            self.tick(&mut stats)?;

            if source_done {
                info!(ticks = stats.ticks, "Source exhausted");
                break;
            }
            if self.config.max_ticks.is_some_and(|max| stats.ticks >= max) {
                info!(ticks = stats.ticks, "Reached max ticks limit");
                break;
            }
        }

        self.controller.flush()?;

        // Closing the channel stops a source that is still producing
        drop(rx);
        stats.samples_sent = source.await??;

        stats.duration = started.elapsed();
        stats.final_state = self.controller.state();
        stats.init_source = self.controller.init_source().map(|s| format!("{s:?}"));
        Ok(stats)
    }

    /// Move pending samples into the controller; true once the sender is gone
    fn drain(&mut self, rx: &mut mpsc::Receiver<RecordedSample>, stats: &mut RunStats) -> bool {
        for _ in 0..self.config.max_samples_per_tick {
            match rx.try_recv() {
                Ok(sample) => {
                    record_sample_received(sample.stream());
                    stats.samples_received += 1;
                    self.controller.push_sample(sample);
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
        false
    }

    fn tick(&mut self, stats: &mut RunStats) -> Result<()> {
        let started = Instant::now();
        let report = self.controller.run()?;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        record_tick_metrics(&report);
        record_tick_duration_ms(duration_ms);
        stats.metrics.update(&report);
        stats.metrics.record_tick_duration(duration_ms);
        stats.ticks += 1;

        let buffers = self.controller.buffer_stats();
        for stream in SampleStream::ALL {
            record_buffer_depth(stream, buffers.stream(stream).depth);
        }

        if report.corrections_accepted > 0 {
            if let Some(state) = self.controller.state() {
                record_uncertainty(&state.standard_deviation());
            }
        }

        if report.did_work() {
            debug!(
                status = %report.status,
                predictions = report.predictions,
                accepted = report.corrections_accepted,
                rejected = report.corrections_rejected,
                filter_time = ?report.filter_time,
                "Tick"
            );
        }
        Ok(())
    }
}
