//! Builder 模式实现
//!
//! 提供链式构造 `HalDriver` 实例的便捷方式。

use crate::command::CommandChannel;
use crate::config::HalConfig;
use crate::consumer::{AsyncConsumer, ConsumerSet, StateConsumer};
use crate::dispatcher::{PositionDispatcher, VelocityDispatcher};
use crate::driver::HalDriver;
use crate::error::DriverError;
use crate::metrics::HalMetrics;
use crate::mode::ControlMode;
use crate::publisher::{PublisherSinks, RtPublisher};
use crate::state::HalContext;
use std::sync::Arc;
use tracing::info;

/// 故障通道默认容量
const DEFAULT_FAULT_CAPACITY: usize = 256;

/// HalDriver Builder（链式构造）
///
/// # Example
///
/// ```rust
/// use urhal_driver::{ChannelCommander, HalBuilder, HalConfig, PublisherSinks};
/// use std::sync::Arc;
///
/// let (commander, _commands) = ChannelCommander::new(16);
/// let (joint_tx, _joint_rx) = crossbeam_channel::bounded(16);
///
/// let driver = HalBuilder::new()
///     .config(HalConfig::default())
///     .command_channel(Arc::new(commander))
///     .publisher(PublisherSinks::new().joint_states(joint_tx))
///     .build()
///     .unwrap();
///
/// assert!(!driver.is_halted());
/// ```
pub struct HalBuilder {
    config: HalConfig,
    channel: Option<Arc<dyn CommandChannel>>,
    publisher: Option<PublisherSinks>,
    async_publisher: bool,
    consumers: Vec<Box<dyn StateConsumer>>,
    initial_mode: ControlMode,
    fault_capacity: usize,
}

impl Default for HalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HalBuilder {
    pub fn new() -> Self {
        Self {
            config: HalConfig::default(),
            channel: None,
            publisher: None,
            async_publisher: true,
            consumers: Vec::new(),
            initial_mode: ControlMode::Velocity,
            fault_capacity: DEFAULT_FAULT_CAPACITY,
        }
    }

    /// 设置配置（`build()` 时校验）
    pub fn config(mut self, config: HalConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置出站命令通道（必需）
    pub fn command_channel(mut self, channel: Arc<dyn CommandChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// 启用遥测发布器
    pub fn publisher(mut self, sinks: PublisherSinks) -> Self {
        self.publisher = Some(sinks);
        self
    }

    /// 发布器是否运行在独立线程（默认 `true`）
    ///
    /// 关闭后发布器在控制循环内同步执行，主要用于测试。
    pub fn async_publisher(mut self, enabled: bool) -> Self {
        self.async_publisher = enabled;
        self
    }

    /// 添加自定义状态消费者（在控制循环内同步执行）
    pub fn consumer(mut self, consumer: Box<dyn StateConsumer>) -> Self {
        self.consumers.push(consumer);
        self
    }

    /// 初始控制模式（默认速度模式）
    pub fn initial_mode(mut self, mode: ControlMode) -> Self {
        self.initial_mode = mode;
        self
    }

    /// 故障通道容量
    pub fn fault_capacity(mut self, capacity: usize) -> Self {
        self.fault_capacity = capacity.max(1);
        self
    }

    /// 构建驱动
    ///
    /// # 错误
    ///
    /// - `DriverError::Config`：配置校验失败
    /// - `DriverError::MissingComponent`：没有设置命令通道
    /// - `DriverError::ThreadSpawn`：异步发布线程创建失败
    /// - `DriverError::Dispatch`：初始模式为位置模式且轨迹会话打开失败
    pub fn build(self) -> Result<HalDriver, DriverError> {
        self.config.validate()?;
        let channel = self.channel.ok_or(DriverError::MissingComponent("command channel"))?;

        let context = Arc::new(HalContext::new());
        let metrics = Arc::new(HalMetrics::new());

        let velocity =
            VelocityDispatcher::new(channel.clone(), self.config.max_velocity_change_per_cycle);
        let position = PositionDispatcher::new(channel, context.joints.clone());

        let mut consumers = ConsumerSet::new();
        if let Some(sinks) = self.publisher {
            let publisher = Box::new(RtPublisher::new(&self.config, sinks));
            if self.async_publisher {
                let consumer = AsyncConsumer::spawn_with_metrics(
                    publisher,
                    self.config.publish_queue_capacity,
                    Some(metrics.clone()),
                )
                .map_err(|e| DriverError::ThreadSpawn(e.to_string()))?;
                consumers.add(Box::new(consumer));
            } else {
                consumers.add(publisher);
            }
        }
        for consumer in self.consumers {
            consumers.add(consumer);
        }
        consumers.setup_all();

        info!(
            "HAL driver built: prefix='{}', max_velocity_change={}, {} consumer(s)",
            self.config.joint_prefix,
            self.config.max_velocity_change_per_cycle,
            consumers.len()
        );

        let mut driver = HalDriver::new(
            self.config,
            context,
            velocity,
            position,
            consumers,
            metrics,
            self.fault_capacity,
        );
        if self.initial_mode != ControlMode::Velocity {
            driver.switch_mode(self.initial_mode)?;
        }
        Ok(driver)
    }
}
