//! Per-stream sample buffers.
//!
//! FIFO by arrival order on top of a bounded `HeapRb`: front removal is O(1)
//! and, once full, the oldest sample is evicted to make room.

use std::fmt;

use contracts::{
    BufferStats, GnssSample, InertialSample, LidarPoseSample, SampleStream, StreamStats,
    SyncedInertialSample, Timestamped,
};
use ringbuf::{traits::*, HeapRb};

/// Bounded FIFO of timestamped samples
pub struct SampleBuffer<T> {
    ring: HeapRb<T>,
    capacity: usize,
    evicted_count: u64,
    out_of_order_count: u64,
    last_timestamp: Option<f64>,
}

impl<T> fmt::Debug for SampleBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .field("evicted", &self.evicted_count)
            .finish()
    }
}

impl<T: Timestamped> SampleBuffer<T> {
    /// Create a new buffer holding at most `capacity` samples
    #[inline]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
            evicted_count: 0,
            out_of_order_count: 0,
            last_timestamp: None,
        }
    }

    /// Append a sample
    ///
    /// If the buffer is full, the oldest sample is evicted and returned.
    #[inline]
    pub fn push(&mut self, sample: T) -> Option<T> {
        let timestamp = sample.timestamp();

        if let Some(last) = self.last_timestamp {
            if timestamp < last {
                self.out_of_order_count += 1;
            }
        }
        self.last_timestamp = Some(timestamp);

        let evicted = if self.ring.is_full() {
            self.evicted_count += 1;
            self.ring.try_pop()
        } else {
            None
        };

        // cannot fail: a slot was freed above when full
        let _ = self.ring.try_push(sample);
        evicted
    }

    /// Oldest sample without removing it
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.ring.iter().next()
    }

    /// Newest sample
    #[inline]
    pub fn back(&self) -> Option<&T> {
        self.ring.iter().last()
    }

    /// Timestamp of the oldest sample
    #[inline]
    pub fn front_timestamp(&self) -> Option<f64> {
        self.front().map(Timestamped::timestamp)
    }

    /// Remove and return the oldest sample
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.ring.try_pop()
    }

    /// Remove and return the oldest sample if it satisfies `pred`
    #[inline]
    pub fn pop_if(&mut self, pred: impl FnOnce(&T) -> bool) -> Option<T> {
        if self.front().is_some_and(pred) {
            self.ring.try_pop()
        } else {
            None
        }
    }

    /// Drop leading samples with a timestamp strictly earlier than `t`
    pub fn discard_before(&mut self, t: f64) -> usize {
        let mut discarded = 0;
        while self.pop_if(|s| s.timestamp() < t).is_some() {
            discarded += 1;
        }
        discarded
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples evicted because the buffer was full
    #[inline]
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    /// Arrivals with a timestamp earlier than the previous arrival
    #[inline]
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }

    /// Depth / eviction / ordering diagnostics
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            depth: self.len(),
            evicted: self.evicted_count,
            sync_dropped: 0,
            out_of_order: self.out_of_order_count,
            oldest_timestamp: self.front_timestamp(),
            newest_timestamp: self.back().map(Timestamped::timestamp),
        }
    }
}

/// The four ingestion buffers
#[derive(Debug)]
pub struct SampleBuffers {
    pub raw_inertial: SampleBuffer<InertialSample>,
    pub lidar: SampleBuffer<LidarPoseSample>,
    pub gnss: SampleBuffer<GnssSample>,
    pub synced_inertial: SampleBuffer<SyncedInertialSample>,
}

impl SampleBuffers {
    /// Create four buffers of the same capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            raw_inertial: SampleBuffer::new(capacity),
            lidar: SampleBuffer::new(capacity),
            gnss: SampleBuffer::new(capacity),
            synced_inertial: SampleBuffer::new(capacity),
        }
    }

    #[inline]
    pub fn push_raw_inertial(&mut self, sample: InertialSample) {
        if self.raw_inertial.push(sample).is_some() {
            record_eviction(SampleStream::ImuRaw);
        }
    }

    #[inline]
    pub fn push_lidar(&mut self, sample: LidarPoseSample) {
        if self.lidar.push(sample).is_some() {
            record_eviction(SampleStream::Lidar);
        }
    }

    #[inline]
    pub fn push_gnss(&mut self, sample: GnssSample) {
        if self.gnss.push(sample).is_some() {
            record_eviction(SampleStream::Gnss);
        }
    }

    #[inline]
    pub fn push_synced_inertial(&mut self, sample: SyncedInertialSample) {
        if self.synced_inertial.push(sample).is_some() {
            record_eviction(SampleStream::ImuSynced);
        }
    }

    /// Whether the lidar, GNSS and synced-inertial buffers all hold a sample
    #[inline]
    pub fn has_synchronized_triplet(&self) -> bool {
        !self.lidar.is_empty() && !self.gnss.is_empty() && !self.synced_inertial.is_empty()
    }

    /// Pop the front of one stream, returning its timestamp
    pub fn pop_front(&mut self, stream: SampleStream) -> Option<f64> {
        match stream {
            SampleStream::ImuRaw => self.raw_inertial.pop().map(|s| s.timestamp),
            SampleStream::Lidar => self.lidar.pop().map(|s| s.timestamp),
            SampleStream::Gnss => self.gnss.pop().map(|s| s.timestamp),
            SampleStream::ImuSynced => self.synced_inertial.pop().map(|s| s.timestamp),
        }
    }

    /// Buffer diagnostics for all streams (synchronizer drops not included)
    pub fn stats(&self) -> BufferStats {
        let mut stats = BufferStats::default();
        stats.streams.insert(SampleStream::ImuRaw, self.raw_inertial.stats());
        stats.streams.insert(SampleStream::Lidar, self.lidar.stats());
        stats.streams.insert(SampleStream::Gnss, self.gnss.stats());
        stats
            .streams
            .insert(SampleStream::ImuSynced, self.synced_inertial.stats());
        stats.total_samples = stats.streams.values().map(|s| s.depth).sum();
        stats
    }
}

#[inline]
fn record_eviction(stream: SampleStream) {
    tracing::debug!(stream = %stream, "buffer full, oldest sample evicted");
    metrics::counter!("fusion_buffer_evicted_total", "stream" => stream.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imu(t: f64) -> InertialSample {
        InertialSample::at_rest(t, 9.80943)
    }

    #[test]
    fn test_buffer_is_fifo_by_arrival() {
        let mut buffer = SampleBuffer::new(10);

        buffer.push(imu(3.0));
        buffer.push(imu(1.0));
        buffer.push(imu(2.0));

        // arrival order, not timestamp order
        assert_eq!(buffer.pop().unwrap().timestamp, 3.0);
        assert_eq!(buffer.pop().unwrap().timestamp, 1.0);
        assert_eq!(buffer.pop().unwrap().timestamp, 2.0);
        assert!(buffer.pop().is_none());
    }

    #[test]
    fn test_buffer_capacity_evicts_oldest() {
        let mut buffer = SampleBuffer::new(3);

        assert!(buffer.push(imu(1.0)).is_none());
        buffer.push(imu(2.0));
        buffer.push(imu(3.0));
        let evicted = buffer.push(imu(4.0));

        assert_eq!(evicted.unwrap().timestamp, 1.0);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.evicted_count(), 1);
        assert_eq!(buffer.front_timestamp(), Some(2.0));
        assert_eq!(buffer.back().unwrap().timestamp, 4.0);
    }

    #[test]
    fn test_out_of_order_detection() {
        let mut buffer = SampleBuffer::new(10);

        buffer.push(imu(1.0));
        buffer.push(imu(3.0));
        buffer.push(imu(2.0));

        assert_eq!(buffer.out_of_order_count(), 1);
    }

    #[test]
    fn test_pop_if_keeps_rejected_front() {
        let mut buffer = SampleBuffer::new(10);
        buffer.push(imu(5.0));

        assert!(buffer.pop_if(|s| s.timestamp < 5.0).is_none());
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.pop_if(|s| s.timestamp <= 5.0).unwrap().timestamp, 5.0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_discard_before_is_strict() {
        let mut buffer = SampleBuffer::new(10);
        for t in [4.8, 4.9, 5.0, 5.1] {
            buffer.push(imu(t));
        }

        assert_eq!(buffer.discard_before(5.0), 2);
        assert_eq!(buffer.front_timestamp(), Some(5.0));
    }

    #[test]
    fn test_buffers_stats() {
        let mut buffers = SampleBuffers::new(2);
        buffers.push_raw_inertial(imu(1.0));
        buffers.push_raw_inertial(imu(1.1));
        buffers.push_raw_inertial(imu(1.2));
        buffers.push_synced_inertial(imu(1.0).into());

        let stats = buffers.stats();
        let raw = stats.stream(SampleStream::ImuRaw);
        assert_eq!(raw.depth, 2);
        assert_eq!(raw.evicted, 1);
        assert_eq!(raw.oldest_timestamp, Some(1.1));
        assert_eq!(stats.total_samples, 3);
        assert!(!buffers.has_synchronized_triplet());
        assert_eq!(buffers.pop_front(SampleStream::ImuSynced), Some(1.0));
        assert_eq!(buffers.pop_front(SampleStream::Lidar), None);
    }
}
