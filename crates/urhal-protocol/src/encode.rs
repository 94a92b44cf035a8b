//! 状态包编码
//!
//! 按 `packet.version` 的布局写出完整实时包（含包头）。
//! 驱动本身只解码；编码用于仿真器、测试和基准。
//!
//! 版本携带但 `packet` 中为 `None` 的字段写 0，保留/测试字段同样写 0。

use crate::constants::*;
use crate::packet::RtStatePacket;
use crate::version::RtVersion;
use bytes::{BufMut, Bytes, BytesMut};

/// 把状态包编码为 `packet.version` 的线格式
pub fn encode(packet: &RtStatePacket) -> Bytes {
    let size = packet.version.packet_size();
    let mut buf = BytesMut::with_capacity(size);
    buf.put_i32(size as i32);

    match packet.version {
        RtVersion::V1_6__7 => {
            write_v1_body(&mut buf, packet);
        },
        RtVersion::V1_8 => {
            write_v1_body(&mut buf, packet);
            write_safety_power_block(&mut buf, packet);
        },
        RtVersion::V3_0__1 => {
            write_v3_body(&mut buf, packet);
        },
        RtVersion::V3_2__3 => {
            write_v3_body(&mut buf, packet);
            put_array(&mut buf, &packet.elbow_position.unwrap_or_default());
            put_array(&mut buf, &packet.elbow_velocity.unwrap_or_default());
        },
    }

    debug_assert_eq!(buf.len(), size);
    buf.freeze()
}

#[inline]
fn put_array(buf: &mut BytesMut, values: &[f64]) {
    for &v in values {
        buf.put_f64(v);
    }
}

#[inline]
fn put_zeros(buf: &mut BytesMut, fields: usize) {
    buf.put_bytes(0, fields * FIELD_SIZE);
}

fn write_joint_block(buf: &mut BytesMut, p: &RtStatePacket) {
    buf.put_f64(p.time);

    put_array(buf, &p.targets.positions);
    put_array(buf, &p.targets.velocities);
    put_array(buf, &p.targets.accelerations);
    put_array(buf, &p.targets.currents);
    put_array(buf, &p.targets.moments);

    put_array(buf, &p.joint_positions);
    put_array(buf, &p.joint_velocities);
    put_array(buf, &p.joint_efforts);
}

fn write_controller_block(buf: &mut BytesMut, p: &RtStatePacket) {
    buf.put_f64(p.digital_inputs as f64);
    put_array(buf, &p.joint_temperatures);
    buf.put_f64(p.controller_time);
    put_zeros(buf, 1);
    buf.put_f64(p.robot_mode);
}

fn write_safety_power_block(buf: &mut BytesMut, p: &RtStatePacket) {
    buf.put_f64(p.safety_mode_raw.unwrap_or_default());
    put_zeros(buf, 6);
    put_array(buf, &p.tool_accelerometer);
    put_zeros(buf, 6);
    buf.put_f64(p.speed_scaling.unwrap_or_default());
    buf.put_f64(p.linear_momentum_norm.unwrap_or_default());
    put_zeros(buf, 2);
    buf.put_f64(p.main_voltage.unwrap_or_default());
    buf.put_f64(p.robot_voltage.unwrap_or_default());
    buf.put_f64(p.robot_current.unwrap_or_default());
    put_array(buf, &p.joint_voltages.unwrap_or_default());
}

fn write_v1_body(buf: &mut BytesMut, p: &RtStatePacket) {
    write_joint_block(buf, p);

    put_array(buf, &p.tool_accelerometer);
    put_zeros(buf, 15);
    put_array(buf, &p.tool_wrench);
    put_array(buf, &p.tool_pose.unwrap_or_default());
    put_array(buf, &p.tool_velocity.unwrap_or_default());

    write_controller_block(buf, p);
    put_array(buf, &p.joint_modes);
}

fn write_v3_body(buf: &mut BytesMut, p: &RtStatePacket) {
    write_joint_block(buf, p);

    put_array(buf, &p.joint_control_currents.unwrap_or_default());
    put_array(buf, &p.tool_pose.unwrap_or_default());
    put_array(buf, &p.tool_velocity.unwrap_or_default());
    put_array(buf, &p.tool_wrench);
    put_array(buf, &p.tool_pose_target.unwrap_or_default());
    put_array(buf, &p.tool_velocity_target.unwrap_or_default());

    write_controller_block(buf, p);
    put_array(buf, &p.joint_modes);
    write_safety_power_block(buf, p);

    buf.put_f64(p.digital_outputs.unwrap_or_default() as f64);
    buf.put_f64(p.program_state.unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_length_and_header() {
        for version in RtVersion::ALL {
            let bytes = encode(&RtStatePacket::empty(version));
            assert_eq!(bytes.len(), version.packet_size());
            let header = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            assert_eq!(header as usize, version.packet_size());
        }
    }

    #[test]
    fn test_time_is_first_field_big_endian() {
        let mut p = RtStatePacket::empty(RtVersion::V1_8);
        p.time = 1.5;
        let bytes = encode(&p);
        assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + FIELD_SIZE], &1.5f64.to_be_bytes());
    }

    /// V3.2 的前缀与 V3.0 布局逐字节一致（包头除外）
    #[test]
    fn test_v3_2_extends_v3_0_layout() {
        let mut p30 = RtStatePacket::empty(RtVersion::V3_0__1);
        p30.joint_positions = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        p30.program_state = Some(1.0);
        let mut p32 = p30.clone();
        p32.version = RtVersion::V3_2__3;
        p32.elbow_position = Some([0.0; 3]);
        p32.elbow_velocity = Some([0.0; 3]);

        let a = encode(&p30);
        let b = encode(&p32);
        assert_eq!(&a[HEADER_SIZE..], &b[HEADER_SIZE..PACKET_SIZE_V3_0__1]);
    }
}
