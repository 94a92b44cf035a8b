//! 驱动运行指标
//!
//! 原子计数器，控制循环写入，任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 驱动实时指标
///
/// # 使用示例
///
/// ```rust
/// use urhal_driver::HalMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = HalMetrics::default();
/// metrics.packets_decoded.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().packets_decoded, 1);
/// ```
#[derive(Debug, Default)]
pub struct HalMetrics {
    /// 成功解码并被接受的包
    pub packets_decoded: AtomicU64,
    /// 结构错误被丢弃的包
    pub packets_malformed: AtomicU64,
    /// 重复或过期（时间未前进）被丢弃的包
    pub packets_duplicate: AtomicU64,
    /// 成功送出的命令
    pub commands_sent: AtomicU64,
    /// 命令通道不可用次数
    pub transport_failures: AtomicU64,
    /// 跟随器拒绝次数
    pub follower_rejections: AtomicU64,
    /// 状态过期的周期数
    pub stale_cycles: AtomicU64,
    /// 超时的周期数
    pub deadline_misses: AtomicU64,
    /// 因遥测队列满而丢弃的快照
    pub snapshots_dropped: AtomicU64,
    /// 遥测管线失败次数（每次 `consume()` 返回 false 计一次）
    pub publish_failures: AtomicU64,
}

impl HalMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 各计数器分别原子读取，之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            packets_malformed: self.packets_malformed.load(Ordering::Relaxed),
            packets_duplicate: self.packets_duplicate.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            follower_rejections: self.follower_rejections.load(Ordering::Relaxed),
            stale_cycles: self.stale_cycles.load(Ordering::Relaxed),
            deadline_misses: self.deadline_misses.load(Ordering::Relaxed),
            snapshots_dropped: self.snapshots_dropped.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.packets_decoded,
            &self.packets_malformed,
            &self.packets_duplicate,
            &self.commands_sent,
            &self.transport_failures,
            &self.follower_rejections,
            &self.stale_cycles,
            &self.deadline_misses,
            &self.snapshots_dropped,
            &self.publish_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub packets_decoded: u64,
    pub packets_malformed: u64,
    pub packets_duplicate: u64,
    pub commands_sent: u64,
    pub transport_failures: u64,
    pub follower_rejections: u64,
    pub stale_cycles: u64,
    pub deadline_misses: u64,
    pub snapshots_dropped: u64,
    pub publish_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = HalMetrics::new();
        HalMetrics::incr(&metrics.packets_decoded);
        HalMetrics::incr(&metrics.packets_decoded);
        HalMetrics::incr(&metrics.deadline_misses);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.packets_decoded, 2);
        assert_eq!(snapshot.deadline_misses, 1);
        assert_eq!(snapshot.commands_sent, 0);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
