//! 出站命令通道
//!
//! 分发器只通过 [`CommandChannel`] 与传输层交互。除关闭会话外所有方法都是非阻塞的，
//! 返回 `false` 表示命令没有被接受。

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::time::Duration;
use tracing::{trace, warn};
use urhal_protocol::JointArray;

/// 关闭会话时等待队列的最长时间
const CLOSE_TIMEOUT: Duration = Duration::from_millis(20);

/// 出站命令通道
///
/// 实现必须是非阻塞的：控制周期内调用，不能等待 I/O。
pub trait CommandChannel: Send + Sync {
    /// 发送关节速度命令（rad/s）
    fn send_velocity(&self, velocities: &JointArray) -> bool;

    /// 向轨迹跟随器发送一个关节位置点（rad）
    ///
    /// 返回 `false` 表示跟随器拒绝了该点。
    fn send_trajectory_point(&self, positions: &JointArray) -> bool;

    /// 打开轨迹会话
    fn open_trajectory_session(&self) -> bool;

    /// 关闭轨迹会话
    fn close_trajectory_session(&self);
}

/// 发往传输线程的命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmCommand {
    Velocity(JointArray),
    TrajectoryPoint(JointArray),
    OpenTrajectorySession,
    CloseTrajectorySession,
}

/// 基于有界 crossbeam 通道的命令通道
///
/// 控制循环侧只做 `try_send`，通道满或传输线程退出时返回 `false`。
///
/// # 示例
///
/// ```rust
/// use urhal_driver::command::{ArmCommand, ChannelCommander, CommandChannel};
///
/// let (commander, rx) = ChannelCommander::new(8);
/// assert!(commander.send_velocity(&[0.1, 0.0, 0.0, 0.0, 0.0, 0.0]));
/// assert!(matches!(rx.try_recv(), Ok(ArmCommand::Velocity(_))));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelCommander {
    tx: Sender<ArmCommand>,
}

impl ChannelCommander {
    /// 创建命令通道，返回发送端包装和传输线程使用的接收端
    pub fn new(capacity: usize) -> (Self, Receiver<ArmCommand>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }

    fn offer(&self, command: ArmCommand) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Command channel full, command not accepted");
                false
            },
            Err(TrySendError::Disconnected(_)) => {
                trace!("Command channel disconnected");
                false
            },
        }
    }
}

impl CommandChannel for ChannelCommander {
    fn send_velocity(&self, velocities: &JointArray) -> bool {
        self.offer(ArmCommand::Velocity(*velocities))
    }

    fn send_trajectory_point(&self, positions: &JointArray) -> bool {
        self.offer(ArmCommand::TrajectoryPoint(*positions))
    }

    fn open_trajectory_session(&self) -> bool {
        self.offer(ArmCommand::OpenTrajectorySession)
    }

    fn close_trajectory_session(&self) {
        // 会话关闭允许短暂等待队列腾出空间
        if let Err(e) = self.tx.send_timeout(ArmCommand::CloseTrajectorySession, CLOSE_TIMEOUT) {
            warn!("Trajectory session close not delivered: {}", e);
        }
    }
}
