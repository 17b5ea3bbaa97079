//! Run statistics.

use std::time::Duration;

use contracts::FusionState;
use observability::FusionMetricsAggregator;

/// Statistics from a driver run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Controller ticks executed
    pub ticks: u64,

    /// Samples moved from the channel into the controller
    pub samples_received: u64,

    /// Samples the source reported as sent
    pub samples_sent: u64,

    /// Wall-clock duration of the run
    pub duration: Duration,

    /// Stopped by a shutdown signal
    pub interrupted: bool,

    /// Filter state after the last tick
    pub final_state: Option<FusionState>,

    /// How the filter was initialized
    pub init_source: Option<String>,

    /// Aggregated tick reports
    pub metrics: FusionMetricsAggregator,
}

impl RunStats {
    /// Samples processed per wall-clock second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.samples_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ticks: {}", self.ticks);
        println!(
            "   ├─ Samples: {} received / {} sent",
            self.samples_received, self.samples_sent
        );
        println!("   ├─ Throughput: {:.1} samples/s", self.throughput());
        println!(
            "   └─ Init source: {}",
            self.init_source.as_deref().unwrap_or("not initialized")
        );

        if let Some(ref state) = self.final_state {
            let t = state.pose.translation.vector;
            let (roll, pitch, yaw) = state.pose.rotation.euler_angles();
            let sigma = state.standard_deviation();
            println!("\nFinal state @ {:.3}s", state.timestamp);
            println!("   ├─ Position: [{:.3}, {:.3}, {:.3}] m", t.x, t.y, t.z);
            println!("   ├─ RPY: [{:.4}, {:.4}, {:.4}] rad", roll, pitch, yaw);
            println!(
                "   ├─ Velocity: [{:.3}, {:.3}, {:.3}] m/s",
                state.velocity.x, state.velocity.y, state.velocity.z
            );
            println!("   └─ Position σ: {:.4} m", sigma.position.norm());
        }

        println!("\n{}", self.metrics.summary());
    }
}
