//! 驱动层错误类型定义

use std::time::Duration;
use thiserror::Error;
use urhal_protocol::ProtocolError;

/// 命令分发错误
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum DispatchError {
    /// 命令通道无法接收命令（传输层断开或队列已满）
    ///
    /// 本周期致命；连续出现达到阈值后驱动停止命令输出。
    #[error("Command transport unavailable")]
    TransportUnavailable,

    /// 轨迹跟随器拒绝了该点
    ///
    /// 非致命：保持上一个被接受的命令，下个周期重试。
    #[error("Trajectory follower rejected the setpoint")]
    FollowerRejected,

    /// 轨迹会话尚未打开（未调用 `start()` 或已 `stop()`）
    #[error("Trajectory session not started")]
    SessionNotStarted,

    /// 打开轨迹会话失败
    #[error("Failed to open trajectory session")]
    SessionOpenFailed,

    /// 设定值包含非有限数值
    #[error("Invalid setpoint for joint {joint}: {value}")]
    InvalidSetpoint { joint: usize, value: f64 },
}

/// 命令输出被停止的原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// 连续传输失败次数达到阈值
    #[error("{0} consecutive transport failures")]
    TransportFailures(u32),

    /// 连续被跟随器拒绝次数达到阈值
    #[error("{0} consecutive follower rejections")]
    FollowerRejections(u32),
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 字段取值无效
    #[error("Invalid config value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// TOML 解析失败
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// 读取配置文件失败
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 命令分发错误
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 命令输出已停止，需要 `recover()`
    #[error("Command output halted: {0}")]
    Halted(HaltReason),

    /// 构造驱动时缺少必需组件
    #[error("Missing component: {0}")]
    MissingComponent(&'static str),

    /// 控制器回调返回错误
    #[error("Controller error: {0}")]
    Controller(String),

    /// 线程创建失败
    #[error("Thread spawn error: {0}")]
    ThreadSpawn(String),
}

/// 面向操作员的故障报告
///
/// 所有故障都会通过故障通道送达，同时写入 `tracing` 日志，不会被静默丢弃。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HalFault {
    /// 收到结构错误的包（已丢弃，保留上一状态）
    #[error("Malformed packet dropped: {0}")]
    Malformed(ProtocolError),

    /// 连续多个周期没有新的状态包，命令被冻结
    #[error("No fresh state for {missed_cycles} cycles, commands held")]
    Stale { missed_cycles: u32 },

    /// 命令通道不可用
    #[error("Transport unavailable ({consecutive} consecutive)")]
    TransportUnavailable { consecutive: u32 },

    /// 轨迹跟随器拒绝命令
    #[error("Follower rejected setpoint ({consecutive} consecutive)")]
    FollowerRejected { consecutive: u32 },

    /// 命令输出已停止
    #[error("Command output halted: {0}")]
    Halted(HaltReason),

    /// 控制周期超时
    #[error("Cycle deadline missed by {overrun:?}")]
    DeadlineMissed { overrun: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;
    use urhal_protocol::{MalformedReason, RtVersion};

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::Dispatch(DispatchError::TransportUnavailable);
        assert_eq!(format!("{}", err), "Dispatch error: Command transport unavailable");

        let err = DriverError::Halted(HaltReason::TransportFailures(3));
        assert_eq!(
            format!("{}", err),
            "Command output halted: 3 consecutive transport failures"
        );

        let err = DriverError::MissingComponent("command channel");
        assert!(format!("{}", err).contains("command channel"));
    }

    #[test]
    fn test_from_protocol_error() {
        let protocol_error = ProtocolError::UnsupportedVersion("5.4".to_string());
        let driver_error: DriverError = protocol_error.into();
        match driver_error {
            DriverError::Protocol(ProtocolError::UnsupportedVersion(v)) => assert_eq!(v, "5.4"),
            other => panic!("Expected Protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_fault_display() {
        let fault = HalFault::Malformed(ProtocolError::Malformed {
            version: RtVersion::V1_8,
            reason: MalformedReason::InvalidLength {
                expected: 1044,
                actual: 12,
            },
        });
        let msg = format!("{}", fault);
        assert!(msg.contains("V1_8") && msg.contains("12"), "message: {}", msg);

        let fault = HalFault::Stale { missed_cycles: 7 };
        assert_eq!(format!("{}", fault), "No fresh state for 7 cycles, commands held");
    }

    #[test]
    fn test_config_error_from_toml() {
        let err = toml::from_str::<toml::Table>("not = [valid").unwrap_err();
        let config_error: ConfigError = err.into();
        assert!(format!("{}", config_error).starts_with("Failed to parse config"));
    }
}
