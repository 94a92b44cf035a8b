//! 解码器属性测试
//!
//! - 长度正确、包头一致的任意字节都能解码（全函数）
//! - 任何其他长度都返回 `Malformed`
//! - 解码结果只依赖输入字节（纯函数）

use proptest::prelude::*;
use urhal_protocol::{
    HEADER_SIZE, JOINT_COUNT, ProtocolError, RtStatePacket, RtVersion, decode_bytes, encode,
};

fn any_version() -> impl Strategy<Value = RtVersion> {
    prop::sample::select(RtVersion::ALL.to_vec())
}

/// 生成长度正确、包头正确、内容随机的包
fn well_formed(version: RtVersion) -> impl Strategy<Value = Vec<u8>> {
    let size = version.packet_size();
    prop::collection::vec(any::<u8>(), size - HEADER_SIZE).prop_map(move |body| {
        let mut bytes = (size as i32).to_be_bytes().to_vec();
        bytes.extend(body);
        bytes
    })
}

proptest! {
    #[test]
    fn test_decode_is_total_on_well_formed_packets(
        (version, bytes) in any_version().prop_flat_map(|v| (Just(v), well_formed(v)))
    ) {
        let packet = decode_bytes(version, &bytes).expect("well-formed packet must decode");
        prop_assert_eq!(packet.version, version);
        prop_assert_eq!(packet.joint_positions.len(), JOINT_COUNT);
        prop_assert_eq!(packet.joint_temperatures.len(), JOINT_COUNT);
    }

    #[test]
    fn test_decode_is_pure(
        (version, bytes) in any_version().prop_flat_map(|v| (Just(v), well_formed(v)))
    ) {
        let a = decode_bytes(version, &bytes).unwrap();
        let b = decode_bytes(version, &bytes).unwrap();
        // NaN != NaN，按位比较编码结果
        prop_assert_eq!(encode(&a), encode(&b));
    }

    #[test]
    fn test_wrong_length_is_malformed(version in any_version(), len in 0usize..1200) {
        prop_assume!(len != version.packet_size());
        let bytes = vec![0u8; len];
        let is_malformed = matches!(
            decode_bytes(version, &bytes),
            Err(ProtocolError::Malformed { .. })
        );
        prop_assert!(is_malformed);
    }

    #[test]
    fn test_finite_joint_values_survive_encoding(
        version in any_version(),
        positions in prop::array::uniform6(-6.3f64..6.3),
        velocities in prop::array::uniform6(-3.2f64..3.2),
    ) {
        let mut packet = RtStatePacket::empty(version);
        packet.joint_positions = positions;
        packet.joint_velocities = velocities;

        let decoded = decode_bytes(version, &encode(&packet)).unwrap();
        prop_assert_eq!(decoded, packet);
    }
}
