//! 命令分发器
//!
//! 把控制器每周期写入的关节设定值转换为发往机械臂的命令。
//!
//! - [`VelocityDispatcher`]：速度命令，每周期的变化量受安全上限约束
//! - [`PositionDispatcher`]：位置命令，通过轨迹会话委托给轨迹跟随器
//!
//! 两者都只持有能力句柄（命令通道、关节状态读取端），通过 [`HardwareInterface`]
//! 统一驱动。是否支持 start/stop/reset 由 [`Capabilities`] 显式声明。

use crate::command::CommandChannel;
use crate::error::DispatchError;
use crate::state::JointStateSink;
use std::sync::Arc;
use tracing::{debug, trace};
use urhal_protocol::{JOINT_COUNT, JointArray};

/// 分发器能力声明
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `start()` 有实际作用
    pub start: bool,
    /// `stop()` 有实际作用
    pub stop: bool,
    /// `reset()` 有实际作用
    pub reset: bool,
}

/// 硬件接口（分发器统一接口）
pub trait HardwareInterface: Send {
    /// 接口名（用于日志）
    fn name(&self) -> &'static str;

    /// 能力声明
    fn capabilities(&self) -> Capabilities;

    /// 发送本周期的设定值
    fn write(&mut self, setpoint: &JointArray) -> Result<(), DispatchError>;

    /// 重发上一个实际命令，不做任何斜坡（状态过期时使用）
    fn hold(&mut self) -> Result<(), DispatchError>;

    fn start(&mut self) -> Result<(), DispatchError>;

    fn stop(&mut self);

    fn reset(&mut self);

    /// 上一个实际发出（或被接受）的命令
    fn last_command(&self) -> JointArray;
}

/// 拒绝包含 NaN/Inf 的设定值
fn check_finite(setpoint: &JointArray) -> Result<(), DispatchError> {
    match setpoint.iter().position(|v| !v.is_finite()) {
        Some(joint) => Err(DispatchError::InvalidSetpoint {
            joint,
            value: setpoint[joint],
        }),
        None => Ok(()),
    }
}

/// 斜坡末端吸附到设定值的容差（ULP 数）
const SNAP_ULPS: f64 = 4.0;

/// 速度分发器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityState {
    /// 正常运行
    Running,
    /// 已复位（上一命令归零），下一次 `write()` 回到 Running
    Reset,
}

/// 速度命令分发器
///
/// 每个关节：
///
/// ```text
/// delta     = clamp(cmd[j] - previous[j], -max, +max)
/// actual[j] = previous[j] + delta
/// previous  = actual
/// ```
///
/// 因此任意两个相邻周期发出的命令差值不超过 `max_change`，
/// 复位后的第一个命令幅值也不超过 `max_change`。
pub struct VelocityDispatcher {
    channel: Arc<dyn CommandChannel>,
    max_change: f64,
    previous: JointArray,
    state: VelocityState,
}

impl VelocityDispatcher {
    /// 创建速度分发器
    ///
    /// `max_change` 必须为正的有限值（由 `HalConfig::validate()` 保证）。
    pub fn new(channel: Arc<dyn CommandChannel>, max_change: f64) -> Self {
        Self {
            channel,
            max_change,
            previous: [0.0; JOINT_COUNT],
            state: VelocityState::Reset,
        }
    }

    pub fn state(&self) -> VelocityState {
        self.state
    }

    pub fn max_change(&self) -> f64 {
        self.max_change
    }

    /// 计算限幅后的实际命令（不修改内部状态）
    ///
    /// 累加误差使结果与设定值只差几个 ULP 时直接取设定值，
    /// 否则斜坡会在设定值前停一步，下一周期再跳一个 ULP。
    pub fn bounded(&self, setpoint: &JointArray) -> JointArray {
        std::array::from_fn(|j| {
            let delta = (setpoint[j] - self.previous[j]).clamp(-self.max_change, self.max_change);
            let actual = self.previous[j] + delta;
            let tolerance = SNAP_ULPS * f64::EPSILON * setpoint[j].abs().max(1.0);
            if (setpoint[j] - actual).abs() <= tolerance {
                setpoint[j]
            } else {
                actual
            }
        })
    }
}

impl HardwareInterface for VelocityDispatcher {
    fn name(&self) -> &'static str {
        "velocity"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            start: false,
            stop: false,
            reset: true,
        }
    }

    fn write(&mut self, setpoint: &JointArray) -> Result<(), DispatchError> {
        check_finite(setpoint)?;

        let actual = self.bounded(setpoint);
        // 无论发送是否成功都推进，下一周期从已计算的命令继续限幅
        self.previous = actual;
        self.state = VelocityState::Running;

        if self.channel.send_velocity(&actual) {
            trace!("Velocity command sent: {:?}", actual);
            Ok(())
        } else {
            Err(DispatchError::TransportUnavailable)
        }
    }

    fn hold(&mut self) -> Result<(), DispatchError> {
        if self.channel.send_velocity(&self.previous) {
            Ok(())
        } else {
            Err(DispatchError::TransportUnavailable)
        }
    }

    fn start(&mut self) -> Result<(), DispatchError> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn reset(&mut self) {
        self.previous = [0.0; JOINT_COUNT];
        self.state = VelocityState::Reset;
        debug!("Velocity dispatcher reset");
    }

    fn last_command(&self) -> JointArray {
        self.previous
    }
}

/// 轨迹会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 尚未打开
    Idle,
    /// 已打开，可以写入
    Open,
    /// 已关闭，写入被拒绝直到再次 `start()`
    Closed,
}

/// 位置命令分发器
///
/// - `start()` 打开轨迹会话，并以当前关节位置作为保持命令
/// - `write()` 每周期发送一个位置点；跟随器拒绝时保持上一个被接受的点
/// - `stop()` 关闭会话，之后任何命令都不会到达传输层
pub struct PositionDispatcher {
    channel: Arc<dyn CommandChannel>,
    joints: JointStateSink,
    session: SessionState,
    last_accepted: Option<JointArray>,
}

impl PositionDispatcher {
    pub fn new(channel: Arc<dyn CommandChannel>, joints: JointStateSink) -> Self {
        Self {
            channel,
            joints,
            session: SessionState::Idle,
            last_accepted: None,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }
}

impl HardwareInterface for PositionDispatcher {
    fn name(&self) -> &'static str {
        "position"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            start: true,
            stop: true,
            reset: true,
        }
    }

    fn write(&mut self, setpoint: &JointArray) -> Result<(), DispatchError> {
        if self.session != SessionState::Open {
            return Err(DispatchError::SessionNotStarted);
        }
        check_finite(setpoint)?;

        if self.channel.send_trajectory_point(setpoint) {
            self.last_accepted = Some(*setpoint);
            Ok(())
        } else {
            Err(DispatchError::FollowerRejected)
        }
    }

    fn hold(&mut self) -> Result<(), DispatchError> {
        if self.session != SessionState::Open {
            return Err(DispatchError::SessionNotStarted);
        }
        let Some(held) = self.last_accepted else {
            return Ok(());
        };
        if self.channel.send_trajectory_point(&held) {
            Ok(())
        } else {
            Err(DispatchError::FollowerRejected)
        }
    }

    fn start(&mut self) -> Result<(), DispatchError> {
        if self.session == SessionState::Open {
            return Ok(());
        }
        if !self.channel.open_trajectory_session() {
            return Err(DispatchError::SessionOpenFailed);
        }
        self.session = SessionState::Open;
        self.last_accepted = Some(self.joints.read().positions);
        debug!("Trajectory session opened");
        Ok(())
    }

    fn stop(&mut self) {
        if self.session == SessionState::Open {
            self.channel.close_trajectory_session();
            debug!("Trajectory session closed");
        }
        self.session = SessionState::Closed;
    }

    /// 丢弃上一个被接受的点；会话打开时改为保持当前关节位置
    fn reset(&mut self) {
        self.last_accepted = (self.session == SessionState::Open).then(|| self.joints.read().positions);
    }

    fn last_command(&self) -> JointArray {
        self.last_accepted.unwrap_or([0.0; JOINT_COUNT])
    }
}
