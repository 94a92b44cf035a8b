//! UR HAL SDK - UR 系列机械臂实时硬件抽象层
//!
//! 把实时接口的原始状态包转换为控制器可读的关节状态，并把控制器设定值
//! 转换为受安全约束的速度或位置命令。
//!
//! # 架构设计
//!
//! - **协议层** (`protocol`): 各控制器版本的实时包解码，统一为规范状态包
//! - **驱动层** (`driver`): 状态槽、命令分发、遥测扇出、新鲜度监控、循环执行器
//!
//! 传输（socket 读取、分帧、版本识别、命令下发）由外部完成，通过
//! [`RawPacket`] 与 [`CommandChannel`] 两个边界类型接入。
//!
//! # 快速开始
//!
//! ```rust
//! use urhal_sdk::prelude::*;
//! use std::sync::Arc;
//!
//! let (commander, _commands) = ChannelCommander::new(16);
//! let mut hal = HalBuilder::new()
//!     .command_channel(Arc::new(commander))
//!     .build()
//!     .unwrap();
//!
//! hal.set_command(0, 0.5);
//! ```

pub mod logging;
pub mod prelude;

// 协议层与驱动层通过模块路径完整访问
pub use urhal_driver as driver;
pub use urhal_protocol as protocol;

// --- 常用类型 ---

pub use protocol::{ProtocolError, RawPacket, RtStatePacket, RtVersion};

pub use driver::{
    ChannelCommander, CommandChannel, ControlMode, Controller, ControllerIo, CycleReport,
    CycleRunner, DriverError, HalBuilder, HalConfig, HalDriver, HalFault, LoopConfig,
    PublisherSinks,
};

pub use logging::init_logger;
