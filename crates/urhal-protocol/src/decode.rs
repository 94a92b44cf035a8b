//! 实时包解码器
//!
//! 每个版本一个纯函数解码器，通过以版本为键的查找表分发（无虚调用）。
//!
//! # 解码约定
//!
//! - **全函数**：长度正确的包一定解码成功，字段内容（包括 NaN）原样保留
//! - **纯函数**：除返回值外没有任何副作用
//! - **缺失字段**：版本不携带的字段保持 `None`
//! - **结构错误**：长度不符或包头长度不一致返回 `ProtocolError::Malformed`，
//!   不会返回部分解码的结果
//!
//! # 关节力矩单位
//!
//! 所有版本的 `joint_efforts` 均取自 `i_actual`（实测电流，A），
//! 目标力矩 `m_target`（N·m）保存在 `targets.moments`。

use crate::constants::*;
use crate::packet::*;
use crate::version::RtVersion;
use crate::{MalformedReason, ProtocolError, RawPacket};
use bytes::Buf;

/// 解码函数签名
pub type DecodeFn = fn(&[u8]) -> Result<RtStatePacket, ProtocolError>;

/// 版本查找表（索引 = `RtVersion as u8`）
static DECODERS: [DecodeFn; 4] = [decode_v1_6_7, decode_v1_8, decode_v3_0_1, decode_v3_2_3];

/// 获取指定版本的解码函数
#[inline]
pub fn decoder_for(version: RtVersion) -> DecodeFn {
    DECODERS[version.index()]
}

/// 解码带版本标签的原始包
///
/// # 示例
///
/// ```rust
/// use urhal_protocol::{RawPacket, RtStatePacket, RtVersion, decode, encode};
///
/// let mut state = RtStatePacket::empty(RtVersion::V3_2__3);
/// state.joint_positions = [0.1, -1.2, 1.3, -1.6, -1.5, 0.0];
///
/// let raw = RawPacket::new(RtVersion::V3_2__3, encode(&state));
/// let decoded = decode(&raw).unwrap();
/// assert_eq!(decoded.joint_positions, state.joint_positions);
/// ```
pub fn decode(raw: &RawPacket) -> Result<RtStatePacket, ProtocolError> {
    decode_bytes(raw.version, &raw.bytes)
}

/// 按版本解码字节切片
#[inline]
pub fn decode_bytes(version: RtVersion, bytes: &[u8]) -> Result<RtStatePacket, ProtocolError> {
    decoder_for(version)(bytes)
}

/// V1.6 / V1.7 解码器
pub fn decode_v1_6_7(bytes: &[u8]) -> Result<RtStatePacket, ProtocolError> {
    let mut buf = check_frame(RtVersion::V1_6__7, bytes)?;
    let mut packet = blank(RtVersion::V1_6__7);

    read_v1_body(&mut buf, &mut packet);

    debug_assert!(buf.is_empty());
    Ok(packet)
}

/// V1.8 解码器（V1.6 布局 + 安全/电源扩展段）
pub fn decode_v1_8(bytes: &[u8]) -> Result<RtStatePacket, ProtocolError> {
    let mut buf = check_frame(RtVersion::V1_8, bytes)?;
    let mut packet = blank(RtVersion::V1_8);

    read_v1_body(&mut buf, &mut packet);
    read_safety_power_block(&mut buf, &mut packet);

    debug_assert!(buf.is_empty());
    Ok(packet)
}

/// V3.0 / V3.1 解码器
pub fn decode_v3_0_1(bytes: &[u8]) -> Result<RtStatePacket, ProtocolError> {
    let mut buf = check_frame(RtVersion::V3_0__1, bytes)?;
    let mut packet = blank(RtVersion::V3_0__1);

    read_v3_body(&mut buf, &mut packet);

    debug_assert!(buf.is_empty());
    Ok(packet)
}

/// V3.2 / V3.3 解码器（V3.0 布局 + 肘部位置/速度）
pub fn decode_v3_2_3(bytes: &[u8]) -> Result<RtStatePacket, ProtocolError> {
    let mut buf = check_frame(RtVersion::V3_2__3, bytes)?;
    let mut packet = blank(RtVersion::V3_2__3);

    read_v3_body(&mut buf, &mut packet);
    packet.elbow_position = Some(array(&mut buf));
    packet.elbow_velocity = Some(array(&mut buf));

    debug_assert!(buf.is_empty());
    Ok(packet)
}

/// 校验长度与包头，返回包头之后的数据
///
/// 校验通过后剩余数据长度恰好等于该版本的字段总长度，
/// 后续的 `Buf::get_f64()` 不会越界。
fn check_frame(version: RtVersion, bytes: &[u8]) -> Result<&[u8], ProtocolError> {
    let expected = version.packet_size();
    if bytes.len() != expected {
        return Err(ProtocolError::Malformed {
            version,
            reason: MalformedReason::InvalidLength {
                expected,
                actual: bytes.len(),
            },
        });
    }

    let mut buf = bytes;
    let declared = buf.get_i32();
    if usize::try_from(declared).ok() != Some(bytes.len()) {
        return Err(ProtocolError::Malformed {
            version,
            reason: MalformedReason::SizeMismatch {
                declared,
                actual: bytes.len(),
            },
        });
    }

    Ok(buf)
}

/// 解码起点：所有可选字段为 `None`
fn blank(version: RtVersion) -> RtStatePacket {
    RtStatePacket {
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
        tool_pose: None,
        tool_velocity: None,
        tool_pose_target: None,
        tool_velocity_target: None,
        tool_accelerometer: [0.0; 3],
        digital_inputs: 0,
        digital_outputs: None,
        controller_time: 0.0,
        robot_mode: 0.0,
        safety_mode_raw: None,
        program_state: None,
        speed_scaling: None,
        linear_momentum_norm: None,
        joint_control_currents: None,
        main_voltage: None,
        robot_voltage: None,
        robot_current: None,
        joint_voltages: None,
        elbow_position: None,
        elbow_velocity: None,
    }
}

#[inline]
fn array<const N: usize>(buf: &mut &[u8]) -> [f64; N] {
    std::array::from_fn(|_| buf.get_f64())
}

#[inline]
fn skip(buf: &mut &[u8], fields: usize) {
    buf.advance(fields * FIELD_SIZE);
}

/// 所有版本共用的包头段：时间 + 关节目标值 + 关节实测值
fn read_joint_block(buf: &mut &[u8], packet: &mut RtStatePacket) {
    packet.time = buf.get_f64();

    packet.targets.positions = array(buf);
    packet.targets.velocities = array(buf);
    packet.targets.accelerations = array(buf);
    packet.targets.currents = array(buf);
    packet.targets.moments = array(buf);

    packet.joint_positions = array(buf);
    packet.joint_velocities = array(buf);
    packet.joint_efforts = array(buf);
    packet.effort_unit = EffortUnit::Amperes;
}

/// 控制器状态段：数字输入、电机温度、控制器时间、测试值（丢弃）、机器人模式
fn read_controller_block(buf: &mut &[u8], packet: &mut RtStatePacket) {
    // 数字输入在线上以 double 表示位掩码数值
    packet.digital_inputs = buf.get_f64() as u64;
    packet.joint_temperatures = array(buf);
    packet.controller_time = buf.get_f64();
    skip(buf, 1);
    packet.robot_mode = buf.get_f64();
}

/// V1.8 / V3 共用的安全与电源段
fn read_safety_power_block(buf: &mut &[u8], packet: &mut RtStatePacket) {
    packet.safety_mode_raw = Some(buf.get_f64());
    skip(buf, 6);
    // 此处的加速度计读数覆盖 V1.6 段中的旧位置
    packet.tool_accelerometer = array(buf);
    skip(buf, 6);
    packet.speed_scaling = Some(buf.get_f64());
    packet.linear_momentum_norm = Some(buf.get_f64());
    skip(buf, 2);
    packet.main_voltage = Some(buf.get_f64());
    packet.robot_voltage = Some(buf.get_f64());
    packet.robot_current = Some(buf.get_f64());
    packet.joint_voltages = Some(array(buf));
}

/// V1.6 / V1.7 主体（V1.8 的前缀）
fn read_v1_body(buf: &mut &[u8], packet: &mut RtStatePacket) {
    read_joint_block(buf, packet);

    packet.tool_accelerometer = array(buf);
    skip(buf, 15);
    packet.tool_wrench = array(buf);
    packet.tool_pose = Some(array(buf));
    packet.tool_velocity = Some(array(buf));

    read_controller_block(buf, packet);
    packet.joint_modes = array(buf);
}

/// V3.0 / V3.1 主体（V3.2 的前缀）
fn read_v3_body(buf: &mut &[u8], packet: &mut RtStatePacket) {
    read_joint_block(buf, packet);

    packet.joint_control_currents = Some(array(buf));
    packet.tool_pose = Some(array(buf));
    packet.tool_velocity = Some(array(buf));
    packet.tool_wrench = array(buf);
    packet.tool_pose_target = Some(array(buf));
    packet.tool_velocity_target = Some(array(buf));

    read_controller_block(buf, packet);
    packet.joint_modes = array(buf);
    read_safety_power_block(buf, packet);

    packet.digital_outputs = Some(buf.get_f64() as u64);
    packet.program_state = Some(buf.get_f64());
}
