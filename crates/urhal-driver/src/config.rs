//! 驱动配置
//!
//! 配置在驱动构建时加载一次，之后不可变。关节名与连杆名由固定后缀表和
//! 可配置前缀拼接而成（例如前缀 `"left_"` 得到 `left_shoulder_pan_joint`）。

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use urhal_protocol::JOINT_COUNT;

/// 关节名后缀（固定顺序）
pub const JOINT_SUFFIXES: [&str; JOINT_COUNT] = [
    "shoulder_pan_joint",
    "shoulder_lift_joint",
    "elbow_joint",
    "wrist_1_joint",
    "wrist_2_joint",
    "wrist_3_joint",
];

/// 连杆名后缀（与关节一一对应）
pub const LINK_SUFFIXES: [&str; JOINT_COUNT] = [
    "shoulder_link",
    "upper_arm_link",
    "forearm_link",
    "wrist_1_link",
    "wrist_2_link",
    "wrist_3_link",
];

/// 驱动配置
///
/// # 示例
///
/// ```rust
/// use urhal_driver::HalConfig;
///
/// let config = HalConfig::from_toml_str(r#"
///     joint_prefix = "left_"
///     max_velocity_change_per_cycle = 0.05
/// "#).unwrap();
///
/// assert_eq!(config.joint_prefix, "left_");
/// assert_eq!(config.base_frame, "base");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HalConfig {
    /// 关节名/连杆名前缀
    pub joint_prefix: String,

    /// 基座坐标系名
    pub base_frame: String,

    /// 工具坐标系名
    pub tool_frame: String,

    /// 只发布温度（其余遥测管线全部关闭）
    pub temperature_only: bool,

    /// 每周期速度命令的最大变化量（rad/s）
    pub max_velocity_change_per_cycle: f64,

    /// 连续多少个周期没有新包视为过期
    pub stale_cycle_limit: u32,

    /// 连续多少次传输失败后停止命令输出
    pub transport_failure_limit: u32,

    /// 连续多少次被轨迹跟随器拒绝后停止命令输出
    pub follower_rejection_limit: u32,

    /// 异步遥测队列容量（快照数）
    pub publish_queue_capacity: usize,

    /// 控制频率（Hz）
    pub control_frequency_hz: f64,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            joint_prefix: String::new(),
            base_frame: "base".to_string(),
            tool_frame: "tool0_controller".to_string(),
            temperature_only: false,
            // 10 rad/s² @ 125Hz
            max_velocity_change_per_cycle: 0.08,
            stale_cycle_limit: 5,
            transport_failure_limit: 3,
            follower_rejection_limit: 10,
            publish_queue_capacity: 64,
            control_frequency_hz: 125.0,
        }
    }
}

impl HalConfig {
    /// 从 TOML 字符串加载并校验
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载并校验
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// 校验配置
    ///
    /// 拒绝非正/非有限的速度上限与控制频率，以及为 0 的计数阈值。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: String| ConfigError::InvalidValue { field, reason };

        if !self.max_velocity_change_per_cycle.is_finite()
            || self.max_velocity_change_per_cycle <= 0.0
        {
            return Err(invalid(
                "max_velocity_change_per_cycle",
                format!("{} (must be finite and > 0)", self.max_velocity_change_per_cycle),
            ));
        }
        if !self.control_frequency_hz.is_finite() || self.control_frequency_hz <= 0.0 {
            return Err(invalid(
                "control_frequency_hz",
                format!("{} (must be finite and > 0)", self.control_frequency_hz),
            ));
        }

        for (field, value) in [
            ("stale_cycle_limit", self.stale_cycle_limit),
            ("transport_failure_limit", self.transport_failure_limit),
            ("follower_rejection_limit", self.follower_rejection_limit),
        ] {
            if value == 0 {
                return Err(invalid(field, "0 (must be >= 1)".to_string()));
            }
        }
        if self.publish_queue_capacity == 0 {
            return Err(invalid("publish_queue_capacity", "0 (must be >= 1)".to_string()));
        }

        if self.base_frame.is_empty() {
            return Err(invalid("base_frame", "empty frame name".to_string()));
        }
        if self.tool_frame.is_empty() {
            return Err(invalid("tool_frame", "empty frame name".to_string()));
        }

        Ok(())
    }

    /// 由前缀生成关节名与连杆名
    pub fn joint_names(&self) -> JointNames {
        JointNames::with_prefix(&self.joint_prefix)
    }
}

/// 关节名与连杆名（构建一次，之后只读共享）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointNames {
    joints: Arc<[String; JOINT_COUNT]>,
    links: Arc<[String; JOINT_COUNT]>,
}

impl JointNames {
    /// 用前缀拼接固定后缀表
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            joints: Arc::new(JOINT_SUFFIXES.map(|s| format!("{prefix}{s}"))),
            links: Arc::new(LINK_SUFFIXES.map(|s| format!("{prefix}{s}"))),
        }
    }

    /// 关节名（共享引用，克隆开销为一次引用计数递增）
    pub fn joints(&self) -> &Arc<[String; JOINT_COUNT]> {
        &self.joints
    }

    /// 连杆名
    pub fn links(&self) -> &Arc<[String; JOINT_COUNT]> {
        &self.links
    }

    /// 按关节名查找索引
    pub fn index_of(&self, joint: &str) -> Option<usize> {
        self.joints.iter().position(|name| name == joint)
    }
}

impl Default for JointNames {
    fn default() -> Self {
        Self::with_prefix("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tool_frame, "tool0_controller");
        assert!(!config.temperature_only);
    }

    #[test]
    fn test_joint_names_with_prefix() {
        let names = JointNames::with_prefix("left_");
        assert_eq!(names.joints()[0], "left_shoulder_pan_joint");
        assert_eq!(names.joints()[5], "left_wrist_3_joint");
        assert_eq!(names.links()[1], "left_upper_arm_link");
        assert_eq!(names.index_of("left_elbow_joint"), Some(2));
        assert_eq!(names.index_of("elbow_joint"), None);

        let plain = JointNames::default();
        assert_eq!(plain.joints()[3], "wrist_1_joint");
    }

    #[test]
    fn test_load_from_toml() {
        let config = HalConfig::from_toml_str(
            r#"
            joint_prefix = "ur5_"
            base_frame = "world"
            temperature_only = true
            stale_cycle_limit = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.joint_prefix, "ur5_");
        assert_eq!(config.base_frame, "world");
        assert!(config.temperature_only);
        assert_eq!(config.stale_cycle_limit, 3);
        // 未给出的字段使用默认值
        assert_eq!(config.tool_frame, "tool0_controller");
        assert_eq!(config.control_frequency_hz, 125.0);
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let mut config = HalConfig {
            max_velocity_change_per_cycle: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "max_velocity_change_per_cycle",
                ..
            })
        ));

        config.max_velocity_change_per_cycle = f64::INFINITY;
        assert!(config.validate().is_err());

        config.max_velocity_change_per_cycle = 0.1;
        config.transport_failure_limit = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "transport_failure_limit",
                ..
            })
        ));

        config.transport_failure_limit = 3;
        config.control_frequency_hz = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let result = HalConfig::from_toml_str("max_velocity_change_per_cycle = \"fast\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        let result = HalConfig::from_toml_str("max_velocity_change_per_cycle = -0.5");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_config_serializes_back_to_toml() {
        let config = HalConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed = HalConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
