//! 状态槽（State Sinks）
//!
//! 解码路径每周期写入一次，控制器从任意线程读取。
//!
//! # 无锁快照
//!
//! 每个状态槽内部是 `ArcSwap<T>`：
//! - `update()` 构造完整的新值后一次性替换，读者不会看到半更新的数据
//! - `read()` 只做一次原子加载，不会阻塞写入方
//! - 没有新包时保留最后一次的状态

use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::Arc;
use urhal_protocol::{EffortUnit, JointArray, RtStatePacket};

/// 关节状态快照
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointState {
    /// 来源包的控制器时间（秒）
    pub stamp: f64,
    /// 关节位置（rad）
    pub positions: JointArray,
    /// 关节速度（rad/s）
    pub velocities: JointArray,
    /// 关节力矩通道
    pub efforts: JointArray,
    /// `efforts` 的单位
    pub effort_unit: EffortUnit,
}

impl JointState {
    pub fn from_packet(packet: &RtStatePacket) -> Self {
        Self {
            stamp: packet.time,
            positions: packet.joint_positions,
            velocities: packet.joint_velocities,
            efforts: packet.joint_efforts,
            effort_unit: packet.effort_unit,
        }
    }

    /// 单个关节位置，索引越界返回 `None`
    pub fn position(&self, joint: usize) -> Option<f64> {
        self.positions.get(joint).copied()
    }

    pub fn velocity(&self, joint: usize) -> Option<f64> {
        self.velocities.get(joint).copied()
    }

    pub fn effort(&self, joint: usize) -> Option<f64> {
        self.efforts.get(joint).copied()
    }
}

/// TCP 力/力矩快照
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WrenchState {
    pub stamp: f64,
    /// 力 `[fx, fy, fz]`（N）
    pub force: [f64; 3],
    /// 力矩 `[tx, ty, tz]`（N·m）
    pub torque: [f64; 3],
}

impl WrenchState {
    pub fn from_packet(packet: &RtStatePacket) -> Self {
        Self {
            stamp: packet.time,
            force: packet.tool_force(),
            torque: packet.tool_torque(),
        }
    }
}

/// 关节状态槽
///
/// 克隆得到同一份状态的另一个句柄。
#[derive(Debug, Clone, Default)]
pub struct JointStateSink {
    inner: Arc<ArcSwap<JointState>>,
}

impl JointStateSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用新包替换全部关节值
    pub fn update(&self, packet: &RtStatePacket) {
        self.inner.store(Arc::new(JointState::from_packet(packet)));
    }

    /// 读取最新快照（无锁）
    pub fn read(&self) -> JointState {
        **self.inner.load()
    }
}

/// TCP 力/力矩状态槽
#[derive(Debug, Clone, Default)]
pub struct WrenchStateSink {
    inner: Arc<ArcSwap<WrenchState>>,
}

impl WrenchStateSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, packet: &RtStatePacket) {
        self.inner.store(Arc::new(WrenchState::from_packet(packet)));
    }

    pub fn read(&self) -> WrenchState {
        **self.inner.load()
    }
}

/// 共享状态上下文
///
/// 持有两个状态槽和最近一个被接受的完整包。所有字段都可以被多个线程同时读取。
#[derive(Debug, Default)]
pub struct HalContext {
    pub joints: JointStateSink,
    pub wrench: WrenchStateSink,
    /// 最近一个被接受的规范包（尚未收到时为 `None`）
    pub latest: ArcSwapOption<RtStatePacket>,
}

impl HalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 应用一个新包：更新两个状态槽并保存完整快照
    pub fn apply(&self, packet: Arc<RtStatePacket>) {
        self.joints.update(&packet);
        self.wrench.update(&packet);
        self.latest.store(Some(packet));
    }

    /// 最近一个被接受的包
    pub fn latest_packet(&self) -> Option<Arc<RtStatePacket>> {
        self.latest.load_full()
    }
}
