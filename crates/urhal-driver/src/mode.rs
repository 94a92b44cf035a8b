//! 控制模式定义
//!
//! 驱动同一时刻只有一个活动分发器。模式保存在原子变量中，
//! 控制循环之外的线程（监控、诊断）可以随时读取。

use std::sync::atomic::{AtomicU8, Ordering};

/// 控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ControlMode {
    /// 速度控制（默认）
    #[default]
    Velocity = 0,

    /// 位置控制（轨迹跟随）
    Position = 1,
}

impl ControlMode {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Velocity 模式。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Position,
            _ => Self::Velocity,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// 控制模式（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicControlMode {
    inner: AtomicU8,
}

impl AtomicControlMode {
    pub fn new(mode: ControlMode) -> Self {
        Self {
            inner: AtomicU8::new(mode.as_u8()),
        }
    }

    /// 获取当前模式
    pub fn get(&self, ordering: Ordering) -> ControlMode {
        ControlMode::from_u8(self.inner.load(ordering))
    }

    /// 设置模式
    pub fn set(&self, mode: ControlMode, ordering: Ordering) {
        self.inner.store(mode.as_u8(), ordering);
    }
}

impl Default for AtomicControlMode {
    fn default() -> Self {
        Self::new(ControlMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8() {
        assert_eq!(ControlMode::from_u8(0), ControlMode::Velocity);
        assert_eq!(ControlMode::from_u8(1), ControlMode::Position);
        assert_eq!(ControlMode::from_u8(255), ControlMode::Velocity); // 无效值
    }

    #[test]
    fn test_atomic_control_mode() {
        let mode = AtomicControlMode::default();
        assert_eq!(mode.get(Ordering::Relaxed), ControlMode::Velocity);

        mode.set(ControlMode::Position, Ordering::Release);
        assert_eq!(mode.get(Ordering::Acquire), ControlMode::Position);
    }
}
