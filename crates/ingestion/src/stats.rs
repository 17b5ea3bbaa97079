//! Ingestion counters

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::SampleStream;

/// Counters shared between an ingestion task and its owner
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Samples handed to the channel
    pub samples_sent: AtomicU64,

    /// Lines skipped because they could not be parsed
    pub parse_errors: AtomicU64,

    /// Samples generated per stream, indexed like `SampleStream::ALL`
    per_stream: [AtomicU64; 4],
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, stream: SampleStream) {
        self.samples_sent.fetch_add(1, Ordering::Relaxed);
        self.per_stream[stream_index(stream)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("fusion_replay_parse_errors_total").increment(1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_sent: self.samples_sent.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            per_stream: SampleStream::ALL
                .map(|s| (s, self.per_stream[stream_index(s)].load(Ordering::Relaxed))),
        }
    }
}

fn stream_index(stream: SampleStream) -> usize {
    match stream {
        SampleStream::ImuRaw => 0,
        SampleStream::Lidar => 1,
        SampleStream::Gnss => 2,
        SampleStream::ImuSynced => 3,
    }
}

/// Point-in-time copy of [`IngestionMetrics`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub samples_sent: u64,
    pub parse_errors: u64,
    pub per_stream: [(SampleStream, u64); 4],
}

impl MetricsSnapshot {
    pub fn stream(&self, stream: SampleStream) -> u64 {
        self.per_stream
            .iter()
            .find(|(s, _)| *s == stream)
            .map_or(0, |(_, n)| *n)
    }
}
