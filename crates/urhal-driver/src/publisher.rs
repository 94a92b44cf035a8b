//! 多路遥测发布器（Multi-Sink Publisher）
//!
//! 每个周期从同一个规范包派生五路相互独立的消息：
//!
//! | 管线 | 消息 | 坐标系 |
//! |------|------|--------|
//! | joint states | [`JointStateMsg`] | - |
//! | wrench | [`WrenchMsg`] | 工具坐标系 |
//! | tool velocity | [`TwistMsg`] | 基座坐标系 |
//! | transform | [`TransformMsg`] | 基座 → 工具 |
//! | temperature | [`TemperatureMsg`] | 各关节连杆 |
//!
//! 某一路失败不会影响其它路；`consume()` 总是调用所有启用的管线，
//! 全部成功才返回 `true`。消息的 `stamp` 是来源包的控制器时间。

use crate::config::{HalConfig, JointNames};
use crate::consumer::StateConsumer;
use crossbeam_channel::Sender;
use nalgebra::{UnitQuaternion, Vector3};
use std::sync::Arc;
use tracing::{debug, trace};
use urhal_protocol::{JOINT_COUNT, JointArray, RtStatePacket};

/// 关节状态消息
#[derive(Debug, Clone, PartialEq)]
pub struct JointStateMsg {
    pub stamp: f64,
    pub names: Arc<[String; JOINT_COUNT]>,
    pub positions: JointArray,
    pub velocities: JointArray,
    pub efforts: JointArray,
}

/// TCP 力/力矩消息
#[derive(Debug, Clone, PartialEq)]
pub struct WrenchMsg {
    pub stamp: f64,
    pub frame_id: Arc<str>,
    pub force: [f64; 3],
    pub torque: [f64; 3],
}

/// TCP 速度消息
#[derive(Debug, Clone, PartialEq)]
pub struct TwistMsg {
    pub stamp: f64,
    pub frame_id: Arc<str>,
    pub linear: [f64; 3],
    pub angular: [f64; 3],
}

/// 基座到工具的空间变换
#[derive(Debug, Clone, PartialEq)]
pub struct TransformMsg {
    pub stamp: f64,
    pub parent_frame: Arc<str>,
    pub child_frame: Arc<str>,
    /// 平移（m）
    pub translation: [f64; 3],
    /// 由旋转向量换算的单位四元数
    pub rotation: UnitQuaternion<f64>,
}

/// 单个关节的温度消息
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureMsg {
    pub stamp: f64,
    /// 关节对应的连杆名
    pub frame_id: Arc<str>,
    /// 温度（°C）
    pub temperature: f64,
    /// 方差（未知，填 0）
    pub variance: f64,
}

/// 消息出口
///
/// 实现必须是非阻塞的，返回 `false` 表示消息没有送出。
pub trait TopicSink<M>: Send {
    fn publish(&self, msg: M) -> bool;
}

impl<M: Send> TopicSink<M> for Sender<M> {
    fn publish(&self, msg: M) -> bool {
        self.try_send(msg).is_ok()
    }
}

/// 各路管线的出口（未配置的管线不启用）
#[derive(Default)]
pub struct PublisherSinks {
    pub joint_states: Option<Box<dyn TopicSink<JointStateMsg>>>,
    pub wrench: Option<Box<dyn TopicSink<WrenchMsg>>>,
    pub tool_velocity: Option<Box<dyn TopicSink<TwistMsg>>>,
    pub transform: Option<Box<dyn TopicSink<TransformMsg>>>,
    pub temperature: Option<Box<dyn TopicSink<TemperatureMsg>>>,
}

impl PublisherSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn joint_states(mut self, sink: impl TopicSink<JointStateMsg> + 'static) -> Self {
        self.joint_states = Some(Box::new(sink));
        self
    }

    pub fn wrench(mut self, sink: impl TopicSink<WrenchMsg> + 'static) -> Self {
        self.wrench = Some(Box::new(sink));
        self
    }

    pub fn tool_velocity(mut self, sink: impl TopicSink<TwistMsg> + 'static) -> Self {
        self.tool_velocity = Some(Box::new(sink));
        self
    }

    pub fn transform(mut self, sink: impl TopicSink<TransformMsg> + 'static) -> Self {
        self.transform = Some(Box::new(sink));
        self
    }

    pub fn temperature(mut self, sink: impl TopicSink<TemperatureMsg> + 'static) -> Self {
        self.temperature = Some(Box::new(sink));
        self
    }
}

/// 发布器参与状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    /// 未参与（初始状态 / teardown 之后）
    Idle,
    /// 参与中
    Active,
    /// 已停止
    Stopped,
}

/// 实时遥测发布器
pub struct RtPublisher {
    names: JointNames,
    links: [Arc<str>; JOINT_COUNT],
    base_frame: Arc<str>,
    tool_frame: Arc<str>,
    temperature_only: bool,
    sinks: PublisherSinks,
    state: PublisherState,
}

impl RtPublisher {
    pub fn new(config: &HalConfig, sinks: PublisherSinks) -> Self {
        let names = config.joint_names();
        let links = std::array::from_fn(|j| Arc::from(names.links()[j].as_str()));
        Self {
            names,
            links,
            base_frame: Arc::from(config.base_frame.as_str()),
            tool_frame: Arc::from(config.tool_frame.as_str()),
            temperature_only: config.temperature_only,
            sinks,
            state: PublisherState::Idle,
        }
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    pub fn is_temperature_only(&self) -> bool {
        self.temperature_only
    }

    /// 发布关节状态（未配置出口时返回 `true`）
    pub fn publish_joints(&self, packet: &RtStatePacket, stamp: f64) -> bool {
        let Some(sink) = &self.sinks.joint_states else {
            return true;
        };
        sink.publish(JointStateMsg {
            stamp,
            names: self.names.joints().clone(),
            positions: packet.joint_positions,
            velocities: packet.joint_velocities,
            efforts: packet.joint_efforts,
        })
    }

    /// 发布 TCP 力/力矩（工具坐标系）
    pub fn publish_wrench(&self, packet: &RtStatePacket, stamp: f64) -> bool {
        let Some(sink) = &self.sinks.wrench else {
            return true;
        };
        sink.publish(WrenchMsg {
            stamp,
            frame_id: self.tool_frame.clone(),
            force: packet.tool_force(),
            torque: packet.tool_torque(),
        })
    }

    /// 发布 TCP 速度（基座坐标系）；包中没有 TCP 速度时不发布并返回 `true`
    pub fn publish_tool(&self, packet: &RtStatePacket, stamp: f64) -> bool {
        let Some(sink) = &self.sinks.tool_velocity else {
            return true;
        };
        let Some(v) = packet.tool_velocity else {
            return true;
        };
        sink.publish(TwistMsg {
            stamp,
            frame_id: self.base_frame.clone(),
            linear: [v[0], v[1], v[2]],
            angular: [v[3], v[4], v[5]],
        })
    }

    /// 发布基座到工具的变换；包中没有 TCP 位姿时不发布并返回 `true`
    pub fn publish_transform(&self, packet: &RtStatePacket, stamp: f64) -> bool {
        let Some(sink) = &self.sinks.transform else {
            return true;
        };
        let Some(pose) = packet.tool_pose else {
            return true;
        };
        sink.publish(TransformMsg {
            stamp,
            parent_frame: self.base_frame.clone(),
            child_frame: self.tool_frame.clone(),
            translation: [pose[0], pose[1], pose[2]],
            rotation: rotation_from_vector(pose[3], pose[4], pose[5]),
        })
    }

    /// 发布每个关节的温度（六条消息全部送出才返回 `true`）
    pub fn publish_temperature(&self, packet: &RtStatePacket, stamp: f64) -> bool {
        let Some(sink) = &self.sinks.temperature else {
            return true;
        };
        let mut ok = true;
        for (link, &temperature) in self.links.iter().zip(packet.joint_temperatures.iter()) {
            ok &= sink.publish(TemperatureMsg {
                stamp,
                frame_id: link.clone(),
                temperature,
                variance: 0.0,
            });
        }
        ok
    }
}

/// 旋转向量（轴 × 角度）转单位四元数
fn rotation_from_vector(rx: f64, ry: f64, rz: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(Vector3::new(rx, ry, rz))
}

impl StateConsumer for RtPublisher {
    fn name(&self) -> &str {
        "rt-publisher"
    }

    fn setup_consumer(&mut self) {
        if self.state != PublisherState::Active {
            debug!("RT publisher active (temperature_only = {})", self.temperature_only);
            self.state = PublisherState::Active;
        }
    }

    fn teardown_consumer(&mut self) {
        if self.state != PublisherState::Idle {
            debug!("RT publisher torn down");
            self.state = PublisherState::Idle;
        }
    }

    fn stop_consumer(&mut self) {
        if self.state == PublisherState::Active {
            debug!("RT publisher stopped");
            self.state = PublisherState::Stopped;
        }
    }

    fn consume(&mut self, packet: &Arc<RtStatePacket>) -> bool {
        if self.state != PublisherState::Active {
            trace!("RT publisher not active, snapshot skipped");
            return true;
        }
        let stamp = packet.time;

        if self.temperature_only {
            return self.publish_temperature(packet, stamp);
        }

        // 逐路求值，不能用 && 短路
        let mut ok = true;
        ok &= self.publish_joints(packet, stamp);
        ok &= self.publish_wrench(packet, stamp);
        ok &= self.publish_tool(packet, stamp);
        ok &= self.publish_transform(packet, stamp);
        ok &= self.publish_temperature(packet, stamp);
        ok
    }
}
