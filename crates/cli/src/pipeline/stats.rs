//! Send statistics.

use std::time::Duration;

use observability::PublishStatsAggregator;
use outbound::{PublishSnapshot, SinkSnapshot};

/// Statistics from a `send` run
#[derive(Debug, Clone, Default)]
pub struct SendStats {
    /// Messages parsed from the input
    pub messages_read: u64,

    /// Input lines skipped as malformed
    pub malformed_lines: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Handler counters at the end of the run
    pub handler: PublishSnapshot,

    /// Per-sink counters, sorted by name
    pub sinks: Vec<(String, SinkSnapshot)>,

    /// Outcomes and acknowledgement latency
    pub outcomes: PublishStatsAggregator,
}

impl SendStats {
    /// Messages per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages_read as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Publish Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Messages read: {}", self.messages_read);
        println!("   ├─ Malformed lines: {}", self.malformed_lines);
        println!("   └─ Throughput: {:.2} msg/s", self.throughput());

        let h = &self.handler;
        println!("\n📈 Handler");
        println!("   ├─ Attempts: {}", h.attempts);
        println!("   ├─ Succeeded: {}", h.succeeded);
        println!("   ├─ Failed: {}", h.failed);
        println!("   ├─ Timed out (sync): {}", h.timed_out);
        println!("   ├─ Rejected before dispatch: {}", h.rejected);
        println!("   ├─ Forwarded to output: {}", h.forwarded);
        println!("   ├─ Failures forwarded: {}", h.failures_forwarded);
        println!("   └─ Failures dropped: {}", h.failures_dropped);

        if !self.sinks.is_empty() {
            println!("\n📤 Sinks");
            for (i, (name, snapshot)) in self.sinks.iter().enumerate() {
                let prefix = if i == self.sinks.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: delivered={}, failures={}",
                    prefix, name, snapshot.delivered_count, snapshot.failure_count
                );
            }
        }

        println!("\n{}", self.outcomes.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput() {
        let stats = SendStats {
            messages_read: 50,
            duration: Duration::from_secs(2),
            ..SendStats::default()
        };
        assert!((stats.throughput() - 25.0).abs() < 1e-9);
        assert_eq!(SendStats::default().throughput(), 0.0);
    }
}
