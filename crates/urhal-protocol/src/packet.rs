//! 规范状态包（Canonical State Packet）
//!
//! 每个实时周期一个，与线格式版本无关。所有下游消费者（状态槽、发布器、
//! 命令分发器）只依赖本模块的类型，不感知具体版本。
//!
//! # 不变量
//!
//! - 每个按关节排列的数组恰好 6 个元素，顺序固定：
//!   shoulder_pan, shoulder_lift, elbow, wrist_1, wrist_2, wrist_3
//! - 某版本不携带的字段为 `None`，不会被填 0，也不会沿用上一个周期的值

use crate::constants::JOINT_COUNT;
use crate::version::RtVersion;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 按关节排列的数组
pub type JointArray = [f64; JOINT_COUNT];

/// 笛卡尔空间 6 维量
///
/// - 位姿：`[x, y, z, rx, ry, rz]`，位置单位米，姿态为旋转向量（弧度）
/// - 速度：`[vx, vy, vz, wx, wy, wz]`，单位 m/s 与 rad/s
/// - 力/力矩：`[fx, fy, fz, tx, ty, tz]`，单位 N 与 N·m
pub type Cartesian6 = [f64; 6];

/// 关节力矩字段的单位
///
/// 实时包中的 `i_actual` 是电机电流，不同版本都没有提供实测力矩，
/// 因此 `joint_efforts` 统一以安培为单位，由包自带标签说明。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffortUnit {
    /// 实测电流（A）
    #[default]
    Amperes,
    /// 力矩（N·m）
    NewtonMeters,
}

/// 安全模式
///
/// V1.8 起的版本携带安全模式字段。解码时只保存原始值，
/// 通过 [`RtStatePacket::safety_mode`] 转换为枚举，未知值返回 `None`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SafetyMode {
    Normal = 1,
    Reduced = 2,
    ProtectiveStop = 3,
    Recovery = 4,
    SafeguardStop = 5,
    SystemEmergencyStop = 6,
    RobotEmergencyStop = 7,
    Violation = 8,
    Fault = 9,
}

impl SafetyMode {
    /// 是否处于停止类安全状态（机械臂不会执行运动命令）
    pub fn is_stopped(self) -> bool {
        matches!(
            self,
            SafetyMode::ProtectiveStop
                | SafetyMode::SafeguardStop
                | SafetyMode::SystemEmergencyStop
                | SafetyMode::RobotEmergencyStop
                | SafetyMode::Violation
                | SafetyMode::Fault
        )
    }
}

/// 关节目标值（控制器内部的期望值）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointTargets {
    /// 目标位置（rad）
    pub positions: JointArray,
    /// 目标速度（rad/s）
    pub velocities: JointArray,
    /// 目标加速度（rad/s²）
    pub accelerations: JointArray,
    /// 目标电流（A）
    pub currents: JointArray,
    /// 目标力矩（N·m）
    pub moments: JointArray,
}

/// 规范状态包
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RtStatePacket {
    /// 来源包格式版本
    pub version: RtVersion,

    /// 控制器启动后的时间（秒）
    ///
    /// 单调递增，用于识别重复包和过期包。
    pub time: f64,

    // === 关节实测值 ===
    /// 关节位置（rad）
    pub joint_positions: JointArray,
    /// 关节速度（rad/s）
    pub joint_velocities: JointArray,
    /// 关节力矩通道，单位见 `effort_unit`
    pub joint_efforts: JointArray,
    /// `joint_efforts` 的单位
    pub effort_unit: EffortUnit,
    /// 电机温度（°C）
    pub joint_temperatures: JointArray,
    /// 关节模式原始值
    pub joint_modes: JointArray,

    /// 关节目标值
    pub targets: JointTargets,

    // === 工具端 ===
    /// TCP 力/力矩 `[fx, fy, fz, tx, ty, tz]`
    pub tool_wrench: Cartesian6,
    /// TCP 实际位姿，版本不携带时为 `None`
    pub tool_pose: Option<Cartesian6>,
    /// TCP 实际速度，版本不携带时为 `None`
    pub tool_velocity: Option<Cartesian6>,
    /// TCP 目标位姿（仅 V3）
    pub tool_pose_target: Option<Cartesian6>,
    /// TCP 目标速度（仅 V3）
    pub tool_velocity_target: Option<Cartesian6>,
    /// 工具加速度计 `[x, y, z]`（m/s²）
    pub tool_accelerometer: [f64; 3],

    // === 控制器状态 ===
    /// 数字输入位
    pub digital_inputs: u64,
    /// 数字输出位（仅 V3）
    pub digital_outputs: Option<u64>,
    /// 实时线程执行时间（秒）
    pub controller_time: f64,
    /// 机器人模式原始值（编码随版本不同）
    pub robot_mode: f64,
    /// 安全模式原始值（V1.8 起）
    pub safety_mode_raw: Option<f64>,
    /// 程序状态原始值（仅 V3）
    pub program_state: Option<f64>,
    /// 速度缩放比例（V1.8 起）
    pub speed_scaling: Option<f64>,
    /// TCP 线动量范数（V1.8 起）
    pub linear_momentum_norm: Option<f64>,
    /// 关节控制电流（A，仅 V3）
    pub joint_control_currents: Option<JointArray>,

    // === 电源 ===
    /// 控制箱主电压（V，V1.8 起）
    pub main_voltage: Option<f64>,
    /// 机器人电压（V，V1.8 起）
    pub robot_voltage: Option<f64>,
    /// 机器人电流（A，V1.8 起）
    pub robot_current: Option<f64>,
    /// 关节电压（V，V1.8 起）
    pub joint_voltages: Option<JointArray>,

    // === 肘部（仅 V3.2 起） ===
    /// 肘部位置 `[x, y, z]`（m）
    pub elbow_position: Option<[f64; 3]>,
    /// 肘部速度 `[x, y, z]`（m/s）
    pub elbow_velocity: Option<[f64; 3]>,
}

impl RtStatePacket {
    /// 创建指定版本的空包
    ///
    /// 所有按关节排列的数组为 0，该版本携带的可选字段为 `Some(0.0)`，
    /// 不携带的字段为 `None`。主要用于仿真器和测试构造数据。
    pub fn empty(version: RtVersion) -> Self {
        let v18_or_later = !matches!(version, RtVersion::V1_6__7);
        let v3 = matches!(version, RtVersion::V3_0__1 | RtVersion::V3_2__3);
        let v32 = matches!(version, RtVersion::V3_2__3);

        Self {
            version,
            time: 0.0,
            joint_positions: [0.0; JOINT_COUNT],
            joint_velocities: [0.0; JOINT_COUNT],
            joint_efforts: [0.0; JOINT_COUNT],
            effort_unit: EffortUnit::Amperes,
            joint_temperatures: [0.0; JOINT_COUNT],
            joint_modes: [0.0; JOINT_COUNT],
            targets: JointTargets::default(),
            tool_wrench: [0.0; 6],
            tool_pose: Some([0.0; 6]),
            tool_velocity: Some([0.0; 6]),
            tool_pose_target: v3.then_some([0.0; 6]),
            tool_velocity_target: v3.then_some([0.0; 6]),
            tool_accelerometer: [0.0; 3],
            digital_inputs: 0,
            digital_outputs: v3.then_some(0),
            controller_time: 0.0,
            robot_mode: 0.0,
            safety_mode_raw: v18_or_later.then_some(0.0),
            program_state: v3.then_some(0.0),
            speed_scaling: v18_or_later.then_some(0.0),
            linear_momentum_norm: v18_or_later.then_some(0.0),
            joint_control_currents: v3.then_some([0.0; JOINT_COUNT]),
            main_voltage: v18_or_later.then_some(0.0),
            robot_voltage: v18_or_later.then_some(0.0),
            robot_current: v18_or_later.then_some(0.0),
            joint_voltages: v18_or_later.then_some([0.0; JOINT_COUNT]),
            elbow_position: v32.then_some([0.0; 3]),
            elbow_velocity: v32.then_some([0.0; 3]),
        }
    }

    /// 安全模式（字段缺失或取值未知时返回 `None`）
    pub fn safety_mode(&self) -> Option<SafetyMode> {
        let raw = self.safety_mode_raw?;
        if !raw.is_finite() || raw < 0.0 || raw > u8::MAX as f64 {
            return None;
        }
        SafetyMode::try_from(raw as u8).ok()
    }

    /// TCP 力 `[fx, fy, fz]`（N）
    pub fn tool_force(&self) -> [f64; 3] {
        [self.tool_wrench[0], self.tool_wrench[1], self.tool_wrench[2]]
    }

    /// TCP 力矩 `[tx, ty, tz]`（N·m）
    pub fn tool_torque(&self) -> [f64; 3] {
        [self.tool_wrench[3], self.tool_wrench[4], self.tool_wrench[5]]
    }
}
