//! 融合定位指标收集模块
//!
//! 基于 TickReport 收集和统计融合控制器的运行指标。

use std::collections::HashMap;

use contracts::{SampleStream, StateStdDev, TickReport, TickStatus};
use metrics::{counter, gauge, histogram};

/// 从 TickReport 记录指标
///
/// 每次控制器 tick 结束后调用此函数来记录指标。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_tick_metrics;
///
/// let report = controller.run()?;
/// record_tick_metrics(&report);
/// ```
pub fn record_tick_metrics(report: &TickReport) {
    // tick 计数器
    counter!("fusion_ticks_total", "status" => report.status.to_string()).increment(1);

    // 预测步数
    if report.predictions > 0 {
        counter!("fusion_predictions_total").increment(report.predictions);
    }

    // 校正结果
    if report.corrections_accepted > 0 {
        counter!("fusion_corrections_total", "outcome" => "accepted")
            .increment(report.corrections_accepted);
    }
    if report.corrections_rejected > 0 {
        counter!("fusion_corrections_total", "outcome" => "rejected")
            .increment(report.corrections_rejected);
    }

    // 过期的原始 IMU 样本
    if report.stale_inertial_drops > 0 {
        counter!("fusion_stale_inertial_dropped_total").increment(report.stale_inertial_drops);
    }
    if report.stale_corrections > 0 {
        counter!("fusion_corrections_total", "outcome" => "stale")
            .increment(report.stale_corrections);
    }

    // 初始化状态
    gauge!("fusion_initialized").set(if report.status == TickStatus::Tracking {
        1.0
    } else {
        0.0
    });

    if let Some(t) = report.filter_time {
        gauge!("fusion_filter_time_seconds").set(t);
    }

    // 马氏距离
    for d2 in &report.mahalanobis_sq {
        histogram!("fusion_mahalanobis_sq").record(*d2);
    }

    if let Some(sigma) = report.position_std {
        gauge!("fusion_position_std_m").set(sigma);
    }
}

/// 记录样本接收
pub fn record_sample_received(stream: SampleStream) {
    counter!("fusion_samples_received_total", "stream" => stream.as_str()).increment(1);
}

/// 记录缓冲区深度
pub fn record_buffer_depth(stream: SampleStream, depth: usize) {
    gauge!("fusion_buffer_depth", "stream" => stream.as_str()).set(depth as f64);
}

/// 记录各误差状态块的标准差
pub fn record_uncertainty(std_dev: &StateStdDev) {
    gauge!("fusion_std_position_m").set(std_dev.position.norm());
    gauge!("fusion_std_velocity_mps").set(std_dev.velocity.norm());
    gauge!("fusion_std_orientation_rad").set(std_dev.orientation.norm());
    histogram!("fusion_std_position_m_hist").record(std_dev.position.norm());
}

/// 记录 tick 耗时
pub fn record_tick_duration_ms(duration_ms: f64) {
    histogram!("fusion_tick_duration_ms").record(duration_ms);
}

/// 融合指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct FusionMetricsAggregator {
    /// 总 tick 数
    pub total_ticks: u64,

    /// 等待标定的 tick 数
    pub calibration_pending_ticks: u64,

    /// 预测步数
    pub total_predictions: u64,

    /// 接受的校正数
    pub corrections_accepted: u64,

    /// 被门限拒绝的校正数
    pub corrections_rejected: u64,

    /// 同步丢弃总数
    pub total_sync_drops: u64,

    /// 过期 IMU 样本总数
    pub total_stale_inertial: u64,

    /// 落后于滤波器时间而跳过的校正数
    pub total_stale_corrections: u64,

    /// 初始化时刻（滤波器时间）
    pub initialized_at: Option<f64>,

    /// 马氏距离统计
    pub mahalanobis_stats: RunningStats,

    /// 位置标准差统计
    pub position_std_stats: RunningStats,

    /// tick 耗时统计
    pub tick_duration_stats: RunningStats,

    /// 各状态 tick 数
    pub status_counts: HashMap<TickStatus, u64>,
}

impl FusionMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, report: &TickReport) {
        self.total_ticks += 1;
        *self.status_counts.entry(report.status).or_insert(0) += 1;
        if report.status == TickStatus::CalibrationPending {
            self.calibration_pending_ticks += 1;
        }

        self.total_predictions += report.predictions;
        self.corrections_accepted += report.corrections_accepted;
        self.corrections_rejected += report.corrections_rejected;
        self.total_sync_drops += report.sync_drops;
        self.total_stale_inertial += report.stale_inertial_drops;
        self.total_stale_corrections += report.stale_corrections;

        if report.initialized && self.initialized_at.is_none() {
            self.initialized_at = report.filter_time;
        }

        for d2 in &report.mahalanobis_sq {
            self.mahalanobis_stats.push(*d2);
        }
        if let Some(sigma) = report.position_std {
            self.position_std_stats.push(sigma);
        }
    }

    /// 记录 tick 耗时（毫秒）
    pub fn record_tick_duration(&mut self, duration_ms: f64) {
        self.tick_duration_stats.push(duration_ms);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let corrections = self.corrections_accepted + self.corrections_rejected;
        MetricsSummary {
            total_ticks: self.total_ticks,
            calibration_pending_ticks: self.calibration_pending_ticks,
            total_predictions: self.total_predictions,
            corrections_accepted: self.corrections_accepted,
            corrections_rejected: self.corrections_rejected,
            acceptance_rate: if corrections > 0 {
                self.corrections_accepted as f64 / corrections as f64 * 100.0
            } else {
                0.0
            },
            total_sync_drops: self.total_sync_drops,
            total_stale_inertial: self.total_stale_inertial,
            total_stale_corrections: self.total_stale_corrections,
            initialized_at: self.initialized_at,
            mahalanobis_sq: StatsSummary::from(&self.mahalanobis_stats),
            position_std_m: StatsSummary::from(&self.position_std_stats),
            tick_duration_ms: StatsSummary::from(&self.tick_duration_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_ticks: u64,
    pub calibration_pending_ticks: u64,
    pub total_predictions: u64,
    pub corrections_accepted: u64,
    pub corrections_rejected: u64,
    pub acceptance_rate: f64,
    pub total_sync_drops: u64,
    pub total_stale_inertial: u64,
    pub total_stale_corrections: u64,
    pub initialized_at: Option<f64>,
    pub mahalanobis_sq: StatsSummary,
    pub position_std_m: StatsSummary,
    pub tick_duration_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Fusion Metrics Summary ===")?;
        writeln!(
            f,
            "Ticks: {} (calibration pending: {})",
            self.total_ticks, self.calibration_pending_ticks
        )?;
        match self.initialized_at {
            Some(t) => writeln!(f, "Initialized at: {:.3}s", t)?,
            None => writeln!(f, "Initialized at: never")?,
        }
        writeln!(f, "Predictions: {}", self.total_predictions)?;
        writeln!(
            f,
            "Corrections: {} accepted, {} rejected ({:.2}% accepted)",
            self.corrections_accepted, self.corrections_rejected, self.acceptance_rate
        )?;
        writeln!(f, "Sync drops: {}", self.total_sync_drops)?;
        writeln!(f, "Stale inertial samples: {}", self.total_stale_inertial)?;
        writeln!(f, "Stale corrections: {}", self.total_stale_corrections)?;
        writeln!(f, "Mahalanobis d²: {}", self.mahalanobis_sq)?;
        writeln!(f, "Position std (m): {}", self.position_std_m)?;
        writeln!(f, "Tick duration (ms): {}", self.tick_duration_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.4}, max={:.4}, mean={:.4}, std={:.4} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = FusionMetricsAggregator::new();

        aggregator.update(&TickReport::with_status(TickStatus::CalibrationPending));
        aggregator.update(&TickReport {
            status: TickStatus::Tracking,
            predictions: 10,
            corrections_accepted: 1,
            corrections_rejected: 1,
            sync_drops: 2,
            initialized: true,
            filter_time: Some(5.0),
            mahalanobis_sq: vec![1.0, 100.0],
            position_std: Some(0.01),
            ..Default::default()
        });

        assert_eq!(aggregator.total_ticks, 2);
        assert_eq!(aggregator.calibration_pending_ticks, 1);
        assert_eq!(aggregator.total_predictions, 10);
        assert_eq!(aggregator.initialized_at, Some(5.0));
        assert_eq!(aggregator.mahalanobis_stats.count(), 2);
        assert_eq!(aggregator.status_counts.get(&TickStatus::Tracking), Some(&1));

        let summary = aggregator.summary();
        assert!((summary.acceptance_rate - 50.0).abs() < 1e-10);
        assert_eq!(summary.total_sync_drops, 2);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsSummary {
            total_ticks: 100,
            corrections_accepted: 9,
            corrections_rejected: 1,
            acceptance_rate: 90.0,
            initialized_at: Some(1.5),
            ..Default::default()
        };

        let output = format!("{}", summary);
        assert!(output.contains("Ticks: 100"));
        assert!(output.contains("90.00% accepted"));
        assert!(output.contains("Initialized at: 1.500s"));
        assert!(output.contains("Mahalanobis d²: N/A"));
    }

    #[test]
    fn test_record_functions_without_recorder() {
        // no recorder installed: calls are no-ops
        record_tick_metrics(&TickReport::with_status(TickStatus::Tracking));
        record_sample_received(SampleStream::Lidar);
        record_buffer_depth(SampleStream::ImuRaw, 3);
        record_tick_duration_ms(0.2);
    }
}
