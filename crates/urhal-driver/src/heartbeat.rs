//! 状态新鲜度监控
//!
//! 以控制周期计数：每收到一个被接受的包清零，每个周期加一。
//! 连续 `limit` 个周期没有新包即视为过期。启动后尚未收到任何包时也视为过期。

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// 新鲜度判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// 状态新鲜
    Fresh,
    /// 本周期刚进入过期状态
    BecameStale { missed_cycles: u32 },
    /// 持续过期
    Stale { missed_cycles: u32 },
    /// 本周期从过期中恢复
    Recovered,
}

impl Freshness {
    pub fn is_stale(self) -> bool {
        matches!(self, Self::BecameStale { .. } | Self::Stale { .. })
    }
}

/// 状态新鲜度监控器
///
/// 写入方（`on_packet`/`on_cycle`）是控制循环，其它线程可以随时读取 `is_stale()`。
#[derive(Debug)]
pub struct StalenessMonitor {
    limit: u32,
    /// 距上一个被接受的包经过的周期数（不含包到达的那个周期）
    missed: AtomicU32,
    stale: AtomicBool,
}

impl StalenessMonitor {
    /// 创建监控器（`limit` >= 1，由配置校验保证）
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            // 尚未收到任何包：第一个周期即过期
            missed: AtomicU32::new(limit),
            stale: AtomicBool::new(true),
        }
    }

    /// 收到一个被接受的包
    pub fn on_packet(&self) {
        self.missed.store(0, Ordering::Release);
    }

    /// 推进一个周期并给出判定
    ///
    /// 包到达后的第一个周期计为新鲜；之后每个没有新包的周期累计一次。
    pub fn on_cycle(&self) -> Freshness {
        let since = self.missed.load(Ordering::Acquire);
        let missed_cycles = since;
        self.missed.store(since.saturating_add(1), Ordering::Release);

        let now_stale = missed_cycles >= self.limit;
        let was_stale = self.stale.swap(now_stale, Ordering::AcqRel);

        match (was_stale, now_stale) {
            (false, false) => Freshness::Fresh,
            (false, true) => Freshness::BecameStale { missed_cycles },
            (true, true) => Freshness::Stale { missed_cycles },
            (true, false) => Freshness::Recovered,
        }
    }

    /// 当前是否过期
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// 距上一个包经过的周期数
    pub fn missed_cycles(&self) -> u32 {
        self.missed.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
