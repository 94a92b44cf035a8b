//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use urhal_sdk::prelude::*;
//! ```

// 驱动构造与控制循环
pub use crate::driver::{
    ChannelCommander, CommandChannel, Controller, ControllerIo, CycleRunner, HalBuilder,
    HalConfig, HalDriver, LoopConfig,
};

// 控制模式与状态
pub use crate::driver::{ControlMode, JointState, WrenchState};

// 遥测
pub use crate::driver::{PublisherSinks, StateConsumer};

// 协议类型
pub use crate::protocol::{RawPacket, RtStatePacket, RtVersion};

// 错误与故障
pub use crate::driver::{DispatchError, DriverError, HalFault};
pub use crate::protocol::ProtocolError;
