//! JSON-lines replay of recorded samples
//!
//! One `RecordedSample` per line, tagged by `stream`. Blank lines and lines
//! starting with `#` are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{RecordedSample, Timestamped};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};
use crate::stats::IngestionMetrics;

/// Line-by-line reader over a replay stream
pub struct ReplayReader<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> ReplayReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Last line number read (1-based)
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Next sample, `None` at end of input
    ///
    /// A parse error consumes its line; reading can continue afterwards.
    pub fn next_sample(&mut self) -> Result<Option<RecordedSample>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let line = self.buf.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| IngestionError::Parse {
                    line: self.line,
                    message: e.to_string(),
                });
        }
    }
}

impl<R: BufRead> Iterator for ReplayReader<R> {
    type Item = Result<RecordedSample>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_sample().transpose()
    }
}

/// Read a whole replay file, failing on the first bad line
pub fn read_samples(path: impl AsRef<Path>) -> Result<Vec<RecordedSample>> {
    let file = File::open(path)?;
    ReplayReader::new(BufReader::new(file)).collect()
}

/// Write samples as a replay file, returning the number written
pub fn write_samples<'a>(
    path: impl AsRef<Path>,
    samples: impl IntoIterator<Item = &'a RecordedSample>,
) -> Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut written = 0;
    for sample in samples {
        serde_json::to_writer(&mut writer, sample).map_err(std::io::Error::from)?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Replay behavior
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Pace samples by their timestamps, scaled by this factor
    /// (1.0 = recorded rate); as fast as the channel allows when unset
    pub speed: Option<f64>,

    /// Log and skip lines that fail to parse instead of stopping
    pub skip_invalid: bool,
}

/// Replays a JSON-lines file into a bounded channel
pub struct ReplaySource {
    path: PathBuf,
    options: ReplayOptions,
    metrics: Arc<IngestionMetrics>,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>, options: ReplayOptions) -> Self {
        Self {
            path: path.into(),
            options,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Start replaying on the blocking pool
    ///
    /// The task ends at end of file, on a fatal error, or once the receiver is
    /// dropped; it yields the number of samples sent.
    pub fn start(&self, channel_capacity: usize) -> (mpsc::Receiver<RecordedSample>, JoinHandle<Result<u64>>) {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let path = self.path.clone();
        let options = self.options.clone();
        let metrics = self.metrics.clone();

        let handle =
            tokio::task::spawn_blocking(move || replay_file(&path, &options, &metrics, &tx));
        (rx, handle)
    }
}

fn replay_file(
    path: &Path,
    options: &ReplayOptions,
    metrics: &IngestionMetrics,
    tx: &mpsc::Sender<RecordedSample>,
) -> Result<u64> {
    let file = File::open(path)?;
    let mut reader = ReplayReader::new(BufReader::new(file));
    let speed = options.speed.filter(|s| s.is_finite() && *s > 0.0);
    let mut clock: Option<(f64, Instant)> = None;
    let mut sent = 0;

    info!(path = %path.display(), ?speed, "replay started");

    for item in reader.by_ref() {
        let sample = match item {
            Ok(sample) => sample,
            Err(IngestionError::Parse { line, message }) if options.skip_invalid => {
                warn!(line, %message, "skipping unparsable replay line");
                metrics.record_parse_error();
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Some(speed) = speed {
            let t = sample.timestamp();
            let (t0, started) = *clock.get_or_insert_with(|| (t, Instant::now()));
            let due = Duration::from_secs_f64(((t - t0) / speed).max(0.0));
            if let Some(wait) = due.checked_sub(started.elapsed()) {
                std::thread::sleep(wait);
            }
        }

        let stream = sample.stream();
        if tx.blocking_send(sample).is_err() {
            debug!(sent, "replay channel closed");
            return Ok(sent);
        }
        metrics.record_sent(stream);
        sent += 1;
    }

    info!(sent, lines = reader.line(), "replay finished");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{InertialSample, LidarPoseSample, Pose, SampleStream};

    fn sample_lines() -> String {
        let samples = [
            RecordedSample::ImuRaw(InertialSample::at_rest(1.0, 9.8)),
            RecordedSample::Lidar(LidarPoseSample::new(1.0, Pose::identity())),
            RecordedSample::ImuSynced(InertialSample::at_rest(1.0, 9.8).into()),
        ];
        let mut content = String::from("# recorded run\n");
        for (i, sample) in samples.iter().enumerate() {
            content.push_str(&serde_json::to_string(sample).unwrap());
            content.push('\n');
            if i == 0 {
                content.push('\n');
            }
        }
        content
    }

    #[test]
    fn test_reader_skips_blank_and_comment_lines() {
        let content = sample_lines();
        let samples: Vec<_> = ReplayReader::new(content.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1].stream(), SampleStream::Lidar);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let content = format!("{}{{\"stream\":\"radar\"}}\n", sample_lines());
        let mut reader = ReplayReader::new(content.as_bytes());
        for _ in 0..3 {
            assert!(reader.next_sample().unwrap().is_some());
        }
        match reader.next_sample() {
            Err(IngestionError::Parse { line, .. }) => assert_eq!(line, 6),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(reader.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let samples: Vec<RecordedSample> = ReplayReader::new(sample_lines().as_bytes())
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(write_samples(&path, &samples).unwrap(), 3);
        assert_eq!(read_samples(&path).unwrap(), samples);
    }

    #[tokio::test]
    async fn test_replay_source_streams_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        std::fs::write(&path, sample_lines()).unwrap();

        let source = ReplaySource::new(&path, ReplayOptions::default());
        let (mut rx, handle) = source.start(2);

        let mut received = Vec::new();
        while let Some(sample) = rx.recv().await {
            received.push(sample);
        }
        assert_eq!(received.len(), 3);
        assert_eq!(handle.await.unwrap().unwrap(), 3);
        assert_eq!(source.metrics().snapshot().stream(SampleStream::ImuRaw), 1);
    }

    #[tokio::test]
    async fn test_replay_stops_on_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, format!("not json\n{}", sample_lines())).unwrap();

        let source = ReplaySource::new(&path, ReplayOptions::default());
        let (mut rx, handle) = source.start(8);
        assert!(rx.recv().await.is_none());
        assert!(matches!(
            handle.await.unwrap(),
            Err(IngestionError::Parse { line: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_replay_can_skip_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, format!("not json\n{}", sample_lines())).unwrap();

        let options = ReplayOptions {
            skip_invalid: true,
            ..Default::default()
        };
        let source = ReplaySource::new(&path, options);
        let (mut rx, handle) = source.start(8);

        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(handle.await.unwrap().unwrap(), 3);
        assert_eq!(source.metrics().snapshot().parse_errors, 1);
    }
}
