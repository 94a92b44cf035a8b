//! # UR HAL Protocol
//!
//! 机械臂实时接口（Real-Time Interface）状态包协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量（包长度、关节数量）
//! - `version`: 协议版本定义与控制器版本识别
//! - `packet`: 版本无关的规范状态包（Canonical State Packet）
//! - `decode`: 各版本解码器与版本查找表
//! - `encode`: 按版本布局写出状态包（仿真器、测试、基准使用）
//!
//! ## 字节序
//!
//! 协议使用大端字节序（网络字节序）。包头为 `i32` 消息长度（包含包头自身），
//! 其余字段全部是 `f64`。

pub mod constants;
pub mod decode;
pub mod encode;
pub mod packet;
pub mod version;

// 重新导出常用类型
pub use constants::*;
pub use decode::{DecodeFn, decode, decode_bytes};
pub use encode::encode;
pub use packet::*;
pub use version::RtVersion;

use bytes::Bytes;
use thiserror::Error;

/// 带版本标签的原始实时包
///
/// # 设计目的
///
/// `RawPacket` 是传输层与协议层之间的边界类型：
/// - **传输层**负责从 socket 读取并按包头长度分帧，同时在建立连接时确定 [`RtVersion`]
/// - **协议层**只看到已经打好版本标签的字节，因此未知版本永远不会进入解码器
///
/// ```text
/// Transport (external)
///     ↓ RtVersion::from_controller_version() 识别版本
/// RawPacket (此类型)
///     ↓ decode() 按版本查表
/// RtStatePacket
/// ```
///
/// 使用 [`Bytes`] 保存数据，克隆开销为一次引用计数递增。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// 协议版本
    pub version: RtVersion,

    /// 原始字节（包含 4 字节长度包头）
    pub bytes: Bytes,
}

impl RawPacket {
    /// 创建带版本标签的原始包
    pub fn new(version: RtVersion, bytes: impl Into<Bytes>) -> Self {
        Self {
            version,
            bytes: bytes.into(),
        }
    }

    /// 数据长度（字节）
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// 是否为空包
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 结构校验失败（长度错误、尾部多余字节、包头长度不一致）
    ///
    /// 调用方应丢弃该包并保留上一个有效状态。
    #[error("Malformed {version} packet: {reason}")]
    Malformed {
        version: RtVersion,
        reason: MalformedReason,
    },

    /// 控制器版本不在支持列表中
    ///
    /// 只会在传输边界（版本识别阶段）产生，属于致命配置错误。
    #[error("Unsupported controller version: {0}")]
    UnsupportedVersion(String),
}

impl ProtocolError {
    /// 是否为可在本地恢复的错误（丢包即可）
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// 包结构错误的具体原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// 缓冲区长度与该版本的固定长度不符（截断或尾部垃圾）
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// 包头声明的消息长度与缓冲区长度不一致
    #[error("header declares {declared} bytes, buffer holds {actual}")]
    SizeMismatch { declared: i32, actual: usize },
}
