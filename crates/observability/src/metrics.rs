//! 出站发布指标收集模块
//!
//! Prometheus 指标 (通过 `metrics` facade) 以及进程内聚合统计。

use std::collections::BTreeMap;

use contracts::{PublishFailure, PublishOutcome};
use metrics::{counter, gauge, histogram};

/// 记录一次发布尝试 (Dispatcher 调用)
pub fn record_publish_attempt(adapter: &str, topic: &str) {
    counter!(
        "kafka_outbound_publish_attempts_total",
        "adapter" => adapter.to_string(),
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// 记录发布结果
pub fn record_publish_outcome(adapter: &str, topic: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "kafka_outbound_publish_outcomes_total",
        "adapter" => adapter.to_string(),
        "topic" => topic.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录 Broker 确认延迟 (从分发到结果确定)
pub fn record_ack_latency_ms(adapter: &str, latency_ms: f64) {
    histogram!(
        "kafka_outbound_ack_latency_ms",
        "adapter" => adapter.to_string()
    )
    .record(latency_ms);
}

/// 记录同步等待超时
pub fn record_sync_timeout(adapter: &str) {
    counter!(
        "kafka_outbound_sync_timeouts_total",
        "adapter" => adapter.to_string()
    )
    .increment(1);
}

/// 记录向 sink 入队超时 (队列持续满)
pub fn record_sink_send_timeout(sink_name: &str) {
    counter!(
        "kafka_outbound_sink_send_timeouts_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 记录分发前被拒绝的调用
pub fn record_invocation_rejected(adapter: &str, reason: &'static str) {
    counter!(
        "kafka_outbound_rejected_total",
        "adapter" => adapter.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// 记录 sink 投递
pub fn record_sink_delivery(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "kafka_outbound_sink_deliveries_total",
        "sink" => sink_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录在途发布数量
pub fn record_in_flight(adapter: &str, in_flight: u64) {
    gauge!(
        "kafka_outbound_in_flight",
        "adapter" => adapter.to_string()
    )
    .set(in_flight as f64);
}

/// 失败原因标签
pub fn failure_label(failure: &PublishFailure) -> &'static str {
    match failure {
        PublishFailure::BrokerUnavailable(_) => "broker_unavailable",
        PublishFailure::Rejected(_) => "rejected",
        PublishFailure::TimedOut(_) => "timed_out",
        PublishFailure::Abandoned => "abandoned",
        PublishFailure::Other(_) => "other",
    }
}

/// 发布统计聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct PublishStatsAggregator {
    /// 处理的消息总数
    pub total_messages: u64,

    /// Broker 确认成功
    pub succeeded: u64,

    /// Broker 报告失败
    pub failed: u64,

    /// 同步等待超时
    pub timed_out: u64,

    /// 分发前被拒绝
    pub rejected: u64,

    /// 确认延迟统计 (毫秒)
    pub ack_latency: RunningStats,

    /// 各 topic 成功次数
    pub topic_counts: BTreeMap<String, u64>,

    /// 各失败原因次数
    pub failure_counts: BTreeMap<&'static str, u64>,
}

impl PublishStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个已确定的发布结果
    pub fn update(&mut self, outcome: &PublishOutcome, latency_ms: f64) {
        self.total_messages += 1;
        match outcome {
            Ok(metadata) => {
                self.succeeded += 1;
                self.ack_latency.push(latency_ms);
                *self.topic_counts.entry(metadata.topic.clone()).or_insert(0) += 1;
            }
            Err(failure) => {
                self.failed += 1;
                *self.failure_counts.entry(failure_label(failure)).or_insert(0) += 1;
            }
        }
    }

    /// 记录同步等待超时 (结果未知)
    pub fn record_timeout(&mut self) {
        self.total_messages += 1;
        self.timed_out += 1;
    }

    /// 记录分发前拒绝
    pub fn record_rejected(&mut self) {
        self.total_messages += 1;
        self.rejected += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> PublishSummary {
        let rate = |n: u64| {
            if self.total_messages > 0 {
                n as f64 / self.total_messages as f64 * 100.0
            } else {
                0.0
            }
        };
        PublishSummary {
            total_messages: self.total_messages,
            succeeded: self.succeeded,
            failed: self.failed,
            timed_out: self.timed_out,
            rejected: self.rejected,
            success_rate: rate(self.succeeded),
            failure_rate: rate(self.failed + self.timed_out + self.rejected),
            ack_latency_ms: StatsSummary::from(&self.ack_latency),
            topic_counts: self.topic_counts.clone(),
            failure_counts: self.failure_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct PublishSummary {
    pub total_messages: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected: u64,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub ack_latency_ms: StatsSummary,
    pub topic_counts: BTreeMap<String, u64>,
    pub failure_counts: BTreeMap<&'static str, u64>,
}

impl std::fmt::Display for PublishSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Publish Summary ===")?;
        writeln!(f, "Total messages: {}", self.total_messages)?;
        writeln!(
            f,
            "Succeeded: {} ({:.2}%)",
            self.succeeded, self.success_rate
        )?;
        writeln!(f, "Failed: {}", self.failed)?;
        writeln!(f, "Timed out: {}", self.timed_out)?;
        writeln!(f, "Rejected: {}", self.rejected)?;
        writeln!(f, "Ack latency (ms): {}", self.ack_latency_ms)?;

        if !self.topic_counts.is_empty() {
            writeln!(f, "Per topic:")?;
            for (topic, count) in &self.topic_counts {
                writeln!(f, "  {}: {}", topic, count)?;
            }
        }
        if !self.failure_counts.is_empty() {
            writeln!(f, "Failure causes:")?;
            for (cause, count) in &self.failure_counts {
                writeln!(f, "  {}: {}", cause, count)?;
            }
        }

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
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
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
