//! 固定频率循环执行器
//!
//! 每个周期：
//!
//! 1. 取出所有已到达的原始包并 `ingest()`
//! 2. 调用控制器回调（读取状态、写入设定值）
//! 3. `cycle()` 分发命令
//! 4. 检测超时；按锚点用 `spin_sleep` 睡到下一周期
//!
//! 开启 `realtime` feature 时，执行器所在线程会尝试提升为最高优先级。

use crate::config::HalConfig;
use crate::driver::HalDriver;
use crate::error::{DispatchError, DriverError};
use crate::mode::ControlMode;
use crate::state::{JointState, WrenchState};
use crossbeam_channel::{Receiver, TryRecvError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use urhal_protocol::{JointArray, RawPacket};

/// 循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// 控制频率（Hz）
    pub frequency_hz: f64,

    /// 最大迭代次数（None 表示直到 `stop()`）
    pub max_iterations: Option<usize>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 125.0,
            max_iterations: None,
        }
    }
}

impl LoopConfig {
    /// 使用驱动配置中的控制频率，不限迭代次数
    pub fn from_config(config: &HalConfig) -> Self {
        Self {
            frequency_hz: config.control_frequency_hz,
            max_iterations: None,
        }
    }
}

/// 控制器回调
pub trait Controller {
    type Error: std::fmt::Display;

    /// 每周期调用一次，`dt` 为距上一次调用的实际时间
    fn update(&mut self, io: &mut ControllerIo<'_>, dt: Duration) -> Result<(), Self::Error>;
}

/// 控制器可见的接口：读状态、写设定值
pub struct ControllerIo<'a> {
    driver: &'a mut HalDriver,
}

impl<'a> ControllerIo<'a> {
    pub fn new(driver: &'a mut HalDriver) -> Self {
        Self { driver }
    }

    pub fn joint_state(&self) -> JointState {
        self.driver.joint_state()
    }

    pub fn wrench(&self) -> WrenchState {
        self.driver.wrench_state()
    }

    pub fn position(&self, joint: usize) -> Option<f64> {
        self.driver.joint_state().position(joint)
    }

    pub fn velocity(&self, joint: usize) -> Option<f64> {
        self.driver.joint_state().velocity(joint)
    }

    pub fn effort(&self, joint: usize) -> Option<f64> {
        self.driver.joint_state().effort(joint)
    }

    /// 按关节名读取索引
    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.driver.joint_names().index_of(name)
    }

    pub fn mode(&self) -> ControlMode {
        self.driver.mode()
    }

    /// 设置单个关节的设定值（速度模式为 rad/s，位置模式为 rad）
    pub fn set_command(&mut self, joint: usize, value: f64) -> bool {
        self.driver.set_command(joint, value)
    }

    pub fn set_commands(&mut self, setpoint: JointArray) {
        self.driver.set_commands(setpoint);
    }
}

/// 循环统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub iterations: usize,
    pub packets: usize,
    pub deadline_misses: usize,
}

/// 固定频率循环执行器
pub struct CycleRunner {
    config: LoopConfig,
    is_running: Arc<AtomicBool>,
}

impl CycleRunner {
    /// 创建执行器
    ///
    /// # 错误
    ///
    /// `frequency_hz` 非正或非有限时返回 `DriverError::Config`。
    pub fn new(config: LoopConfig) -> Result<Self, DriverError> {
        if !config.frequency_hz.is_finite() || config.frequency_hz <= 0.0 {
            return Err(crate::error::ConfigError::InvalidValue {
                field: "frequency_hz",
                reason: format!("{} (must be finite and > 0)", config.frequency_hz),
            }
            .into());
        }
        if config.frequency_hz > 10_000.0 {
            warn!(
                "Very high control frequency: {} Hz. This may cause performance issues.",
                config.frequency_hz
            );
        }
        Ok(Self {
            config,
            // 创建即处于可运行状态：run() 之前调用 stop() 也会生效
            is_running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// 运行标志（置为 false 让循环在当前周期结束后退出，之后 `run()` 立即返回）
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.is_running.clone()
    }

    pub fn stop(&self) {
        self.is_running.store(false, Ordering::Release);
    }

    /// 运行循环直到 `stop()`、达到 `max_iterations`、包来源断开或命令输出被停止
    ///
    /// 单周期的传输失败、会话错误只记录日志，循环继续；
    /// 控制器错误与 `DriverError::Halted` 结束循环。
    pub fn run<C: Controller>(
        &self,
        driver: &mut HalDriver,
        packets: &Receiver<RawPacket>,
        controller: &mut C,
    ) -> Result<RunSummary, DriverError> {
        #[cfg(feature = "realtime")]
        {
            use thread_priority::*;
            use tracing::info;

            match set_current_thread_priority(ThreadPriority::Max) {
                Ok(_) => info!("Control thread priority set to MAX (realtime)"),
                Err(e) => warn!(
                    "Failed to set control thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                ),
            }
        }

        let period = Duration::from_secs_f64(1.0 / self.config.frequency_hz);
        let mut summary = RunSummary::default();
        let mut next_tick = Instant::now() + period;
        let mut last_update = Instant::now();

        debug!("Cycle runner started at {} Hz", self.config.frequency_hz);

        while self.is_running.load(Ordering::Acquire) {
            if let Some(max) = self.config.max_iterations
                && summary.iterations >= max
            {
                break;
            }
            let cycle_start = Instant::now();

            // 1. 入站
            loop {
                match packets.try_recv() {
                    Ok(raw) => {
                        summary.packets += 1;
                        if let Err(e) = driver.ingest(&raw)
                            && !e.is_recoverable()
                        {
                            return Err(e.into());
                        }
                    },
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("Packet source disconnected, stopping cycle runner");
                        self.is_running.store(false, Ordering::Release);
                        break;
                    },
                }
            }

            // 2. 控制器
            let dt = cycle_start - last_update;
            last_update = cycle_start;
            controller
                .update(&mut ControllerIo::new(driver), dt)
                .map_err(|e| DriverError::Controller(e.to_string()))?;

            // 3. 分发
            match driver.cycle() {
                Ok(report) => trace!("Cycle {} done, held = {}", summary.iterations, report.held),
                Err(e @ DriverError::Halted(_)) => return Err(e),
                Err(DriverError::Dispatch(DispatchError::TransportUnavailable)) => {},
                Err(e) => warn!("Cycle {} failed: {}", summary.iterations, e),
            }
            summary.iterations += 1;

            // 4. 超时检测与定时
            let now = Instant::now();
            if now > next_tick {
                let overrun = now - next_tick;
                driver.report_deadline_miss(overrun);
                summary.deadline_misses += 1;
                // 重置锚点，避免累积延迟
                next_tick = now + period;
            } else {
                spin_sleep::sleep(next_tick - now);
                next_tick += period;
            }
        }

        debug!("Cycle runner stopped after {} iterations", summary.iterations);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::HalBuilder;
    use crate::command::ChannelCommander;
    use urhal_protocol::{RtStatePacket, RtVersion, encode};

    struct Hold;
    impl Controller for Hold {
        type Error = String;
        fn update(&mut self, _: &mut ControllerIo<'_>, _: Duration) -> Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn test_loop_config_from_hal_config() {
        let config = HalConfig {
            control_frequency_hz: 500.0,
            ..Default::default()
        };
        let loop_config = LoopConfig::from_config(&config);
        assert_eq!(loop_config.frequency_hz, 500.0);
        assert_eq!(loop_config.max_iterations, None);
    }

    #[test]
    fn test_invalid_frequency_rejected() {
        let config = LoopConfig {
            frequency_hz: 0.0,
            ..Default::default()
        };
        assert!(matches!(CycleRunner::new(config), Err(DriverError::Config(_))));
    }

    #[test]
    fn test_stop_before_run_is_honored() {
        let (commander, commands) = ChannelCommander::new(8);
        let mut driver = HalBuilder::new().command_channel(Arc::new(commander)).build().unwrap();
        let (_tx, rx) = crossbeam_channel::unbounded::<RawPacket>();

        let runner = CycleRunner::new(LoopConfig::default()).unwrap();
        let handle = runner.stop_handle();
        handle.store(false, Ordering::Release);

        let summary = runner.run(&mut driver, &rx, &mut Hold).unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(commands.try_recv().is_err());
    }

    #[test]
    fn test_runner_can_run_again_after_max_iterations() {
        let (commander, commands) = ChannelCommander::new(64);
        let mut driver = HalBuilder::new().command_channel(Arc::new(commander)).build().unwrap();
        let (_tx, rx) = crossbeam_channel::unbounded::<RawPacket>();

        let runner = CycleRunner::new(LoopConfig {
            frequency_hz: 1000.0,
            max_iterations: Some(2),
        })
        .unwrap();
        assert_eq!(runner.run(&mut driver, &rx, &mut Hold).unwrap().iterations, 2);
        assert_eq!(runner.run(&mut driver, &rx, &mut Hold).unwrap().iterations, 2);
        assert_eq!(commands.try_iter().count(), 4);

        runner.stop();
        assert_eq!(runner.run(&mut driver, &rx, &mut Hold).unwrap().iterations, 0);
    }

    #[test]
    fn test_runs_max_iterations_and_ingests_packets() {
        let (commander, commands) = ChannelCommander::new(64);
        let mut driver = HalBuilder::new()
            .command_channel(Arc::new(commander))
            .async_publisher(false)
            .build()
            .unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 1..=3 {
            let mut packet = RtStatePacket::empty(RtVersion::V3_2__3);
            packet.time = i as f64 * 0.008;
            tx.send(RawPacket::new(RtVersion::V3_2__3, encode(&packet))).unwrap();
        }

        let runner = CycleRunner::new(LoopConfig {
            frequency_hz: 500.0,
            max_iterations: Some(5),
        })
        .unwrap();
        let summary = runner.run(&mut driver, &rx, &mut Hold).unwrap();

        assert_eq!(summary.iterations, 5);
        assert_eq!(summary.packets, 3);
        assert_eq!(driver.metrics().snapshot().packets_decoded, 3);
        assert_eq!(commands.try_iter().count(), 5);
    }

    #[test]
    fn test_controller_error_stops_loop() {
        struct Failing;
        impl Controller for Failing {
            type Error = &'static str;
            fn update(&mut self, _: &mut ControllerIo<'_>, _: Duration) -> Result<(), Self::Error> {
                Err("diverged")
            }
        }

        let (commander, _commands) = ChannelCommander::new(8);
        let mut driver = HalBuilder::new().command_channel(Arc::new(commander)).build().unwrap();
        let (_tx, rx) = crossbeam_channel::unbounded::<RawPacket>();

        let runner = CycleRunner::new(LoopConfig::default()).unwrap();
        match runner.run(&mut driver, &rx, &mut Failing) {
            Err(DriverError::Controller(msg)) => assert_eq!(msg, "diverged"),
            other => panic!("expected controller error, got {:?}", other),
        }
    }

    #[test]
    fn test_controller_writes_reach_dispatcher() {
        struct Ramp;
        impl Controller for Ramp {
            type Error = String;
            fn update(&mut self, io: &mut ControllerIo<'_>, _: Duration) -> Result<(), String> {
                let joint = io.joint_index("elbow_joint").ok_or("missing joint")?;
                io.set_command(joint, 1.0);
                Ok(())
            }
        }

        let (commander, commands) = ChannelCommander::new(64);
        let mut driver = HalBuilder::new().command_channel(Arc::new(commander)).build().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut packet = RtStatePacket::empty(RtVersion::V1_8);
        packet.time = 1.0;
        tx.send(RawPacket::new(RtVersion::V1_8, encode(&packet))).unwrap();

        let runner = CycleRunner::new(LoopConfig {
            frequency_hz: 1000.0,
            max_iterations: Some(1),
        })
        .unwrap();
        runner.run(&mut driver, &rx, &mut Ramp).unwrap();

        let sent: Vec<_> = commands.try_iter().collect();
        assert_eq!(
            sent,
            vec![crate::command::ArmCommand::Velocity([0.0, 0.0, 0.08, 0.0, 0.0, 0.0])]
        );
    }
}
