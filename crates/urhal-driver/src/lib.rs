//! 驱动层模块
//!
//! 本模块提供机械臂实时硬件抽象层，包括：
//! - 状态同步（ArcSwap 无锁读取的关节/力矩状态槽）
//! - 命令分发（速度限幅、轨迹会话）
//! - 遥测扇出（多路独立管线，可运行在独立线程）
//! - 新鲜度监控、失败计数与停止升级
//! - 固定频率循环执行器
//!
//! # 使用场景
//!
//! 传输层负责接收并分帧原始包、识别控制器版本；本模块消费带版本标签的包，
//! 向控制器暴露读写接口，并把设定值转换为受安全约束的命令。

mod builder;
pub mod command;
pub mod config;
pub mod consumer;
pub mod dispatcher;
mod driver;
mod error;
pub mod heartbeat;
pub mod metrics;
pub mod mode;
pub mod publisher;
pub mod runner;
pub mod state;

pub use builder::HalBuilder;
pub use command::{ArmCommand, ChannelCommander, CommandChannel};
pub use config::{HalConfig, JOINT_SUFFIXES, JointNames, LINK_SUFFIXES};
pub use consumer::{AsyncConsumer, ConsumerSet, StateConsumer};
pub use dispatcher::{
    Capabilities, HardwareInterface, PositionDispatcher, SessionState, VelocityDispatcher,
    VelocityState,
};
pub use driver::{CycleReport, HalDriver, Ingest};
pub use error::{ConfigError, DispatchError, DriverError, HaltReason, HalFault};
pub use heartbeat::{Freshness, StalenessMonitor};
pub use metrics::{HalMetrics, MetricsSnapshot};
pub use mode::{AtomicControlMode, ControlMode};
pub use publisher::{
    JointStateMsg, PublisherSinks, PublisherState, RtPublisher, TemperatureMsg, TopicSink,
    TransformMsg, TwistMsg, WrenchMsg,
};
pub use runner::{Controller, ControllerIo, CycleRunner, LoopConfig, RunSummary};
pub use state::*;
