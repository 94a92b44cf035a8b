//! 协议版本定义
//!
//! 实时接口的包格式随控制器软件版本演进，相邻的小版本共用同一布局。
//! 本模块负责把控制器版本号映射为包格式版本，未知版本在这里被拒绝，
//! 不会到达解码器。

use crate::ProtocolError;
use crate::constants::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use semver::Version;
use std::fmt;

/// 实时包格式版本
///
/// | 版本 | 控制器版本 | 包长度 |
/// |------|-----------|--------|
/// | `V1_6__7` | 1.6, 1.7 | 812 |
/// | `V1_8`    | 1.8      | 1044 |
/// | `V3_0__1` | 3.0, 3.1 | 1060 |
/// | `V3_2__3` | 3.2, 3.3 | 1108 |
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RtVersion {
    V1_6__7 = 0,
    V1_8 = 1,
    V3_0__1 = 2,
    V3_2__3 = 3,
}

impl RtVersion {
    /// 所有支持的版本（按查找表顺序）
    pub const ALL: [RtVersion; 4] = [
        RtVersion::V1_6__7,
        RtVersion::V1_8,
        RtVersion::V3_0__1,
        RtVersion::V3_2__3,
    ];

    /// 该版本的固定包长度（字节，含包头）
    pub const fn packet_size(self) -> usize {
        match self {
            RtVersion::V1_6__7 => PACKET_SIZE_V1_6__7,
            RtVersion::V1_8 => PACKET_SIZE_V1_8,
            RtVersion::V3_0__1 => PACKET_SIZE_V3_0__1,
            RtVersion::V3_2__3 => PACKET_SIZE_V3_2__3,
        }
    }

    /// 查找表索引
    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// 根据控制器版本选择包格式
    ///
    /// # 错误
    ///
    /// 不在支持表内的版本（如 1.5、3.4、5.x）返回 `ProtocolError::UnsupportedVersion`。
    pub fn from_controller_version(version: &Version) -> Result<Self, ProtocolError> {
        match (version.major, version.minor) {
            (1, 6) | (1, 7) => Ok(RtVersion::V1_6__7),
            (1, 8) => Ok(RtVersion::V1_8),
            (3, 0) | (3, 1) => Ok(RtVersion::V3_0__1),
            (3, 2) | (3, 3) => Ok(RtVersion::V3_2__3),
            _ => Err(ProtocolError::UnsupportedVersion(version.to_string())),
        }
    }

    /// 从控制器上报的版本字符串选择包格式
    ///
    /// 接受 `"3.2"`、`"3.2.19171"`、`"3.3.4.310"` 等形式，
    /// 超过三段的部分（build 号）被忽略。
    pub fn from_version_str(version: &str) -> Result<Self, ProtocolError> {
        let parsed = parse_controller_version(version)?;
        Self::from_controller_version(&parsed)
    }
}

impl fmt::Display for RtVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RtVersion::V1_6__7 => "V1_6__7",
            RtVersion::V1_8 => "V1_8",
            RtVersion::V3_0__1 => "V3_0__1",
            RtVersion::V3_2__3 => "V3_2__3",
        };
        f.write_str(name)
    }
}

/// 把控制器版本字符串规整为语义化版本
fn parse_controller_version(version: &str) -> Result<Version, ProtocolError> {
    let unsupported = || ProtocolError::UnsupportedVersion(version.to_string());

    let parts: Vec<&str> = version.trim().split('.').collect();
    let normalized = match parts.as_slice() {
        [major] => format!("{}.0.0", major),
        [major, minor] => format!("{}.{}.0", major, minor),
        [major, minor, patch, ..] => format!("{}.{}.{}", major, minor, patch),
        [] => return Err(unsupported()),
    };

    Version::parse(&normalized).map_err(|_| unsupported())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_version_str_supported() {
        assert_eq!(RtVersion::from_version_str("1.6").unwrap(), RtVersion::V1_6__7);
        assert_eq!(RtVersion::from_version_str("1.7.12345").unwrap(), RtVersion::V1_6__7);
        assert_eq!(RtVersion::from_version_str("1.8.16941").unwrap(), RtVersion::V1_8);
        assert_eq!(RtVersion::from_version_str("3.0").unwrap(), RtVersion::V3_0__1);
        assert_eq!(RtVersion::from_version_str("3.1.18024").unwrap(), RtVersion::V3_0__1);
        assert_eq!(RtVersion::from_version_str("3.2").unwrap(), RtVersion::V3_2__3);
        assert_eq!(RtVersion::from_version_str("3.3.4.310").unwrap(), RtVersion::V3_2__3);
    }

    #[test]
    fn test_from_version_str_unsupported() {
        for v in ["1.5", "3.4", "5.11.0", "2.0"] {
            match RtVersion::from_version_str(v) {
                Err(ProtocolError::UnsupportedVersion(_)) => {},
                other => panic!("{} should be unsupported, got {:?}", v, other),
            }
        }
    }

    #[test]
    fn test_from_version_str_garbage() {
        assert!(matches!(
            RtVersion::from_version_str("not-a-version"),
            Err(ProtocolError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            RtVersion::from_version_str(""),
            Err(ProtocolError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_repr_roundtrip_via_num_enum() {
        for version in RtVersion::ALL {
            let raw: u8 = version.into();
            assert_eq!(RtVersion::try_from(raw).unwrap(), version);
            assert_eq!(version.index(), raw as usize);
        }
        assert!(RtVersion::try_from(4u8).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(RtVersion::V1_6__7.to_string(), "V1_6__7");
        assert_eq!(RtVersion::V3_2__3.to_string(), "V3_2__3");
    }
}
