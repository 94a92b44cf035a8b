//! 协议常量定义

/// 关节数量（6 轴机械臂）
pub const JOINT_COUNT: usize = 6;

/// 包头长度（`i32` 消息长度）
pub const HEADER_SIZE: usize = 4;

/// 单个字段长度（`f64`）
pub const FIELD_SIZE: usize = 8;

/// V1.6 / V1.7 实时包长度（字节，含包头）
pub const PACKET_SIZE_V1_6__7: usize = 812;

/// V1.8 实时包长度（字节，含包头）
pub const PACKET_SIZE_V1_8: usize = 1044;

/// V3.0 / V3.1 实时包长度（字节，含包头）
pub const PACKET_SIZE_V3_0__1: usize = 1060;

/// V3.2 / V3.3 实时包长度（字节，含包头）
pub const PACKET_SIZE_V3_2__3: usize = 1108;

#[cfg(test)]
mod tests {
    use super::*;

    /// 包长度必须是 包头 + 整数个 f64 字段
    #[test]
    fn test_packet_sizes_are_field_aligned() {
        for size in [
            PACKET_SIZE_V1_6__7,
            PACKET_SIZE_V1_8,
            PACKET_SIZE_V3_0__1,
            PACKET_SIZE_V3_2__3,
        ] {
            assert_eq!((size - HEADER_SIZE) % FIELD_SIZE, 0, "size {}", size);
        }
    }
}
