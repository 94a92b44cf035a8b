//! 驱动主体
//!
//! [`HalDriver`] 持有一个控制周期内需要的全部组件：
//!
//! ```text
//! RawPacket ──ingest()──> decode ──> HalContext (状态槽 + 最新包)
//!                                  └─> ConsumerSet (遥测扇出)
//!
//! 控制器设定值 ──cycle()──> 新鲜度判定 ──> 活动分发器 ──> CommandChannel
//!                                        └─> 失败计数 / 升级为停止
//! ```
//!
//! `ingest()` 与 `cycle()` 都只由控制循环调用（`&mut self`），不会重叠执行。
//! 其它线程通过 `context()`、`metrics()`、`mode_handle()`、`faults()` 只读访问。

use crate::config::{HalConfig, JointNames};
use crate::consumer::ConsumerSet;
use crate::dispatcher::{
    Capabilities, HardwareInterface, PositionDispatcher, SessionState, VelocityDispatcher,
};
use crate::error::{DispatchError, DriverError, HaltReason, HalFault};
use crate::heartbeat::{Freshness, StalenessMonitor};
use crate::metrics::HalMetrics;
use crate::mode::{AtomicControlMode, ControlMode};
use crate::state::{HalContext, JointState, WrenchState};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use urhal_protocol::{JOINT_COUNT, JointArray, ProtocolError, RawPacket, RtStatePacket, decode};

/// 单个包的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// 已应用到状态槽并交给消费者
    Accepted,
    /// 控制器时间没有前进（重复或过期），已丢弃
    Duplicate,
}

/// 单个周期的执行报告
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// 本周期使用的控制模式
    pub mode: ControlMode,
    /// 新鲜度判定
    pub freshness: Freshness,
    /// 命令是否被冻结（状态过期时重发上一命令）
    pub held: bool,
    /// 本周期实际发出（或保持）的命令
    pub command: JointArray,
    /// 本周期产生的故障
    pub faults: SmallVec<[HalFault; 2]>,
}

/// 实时硬件抽象层驱动
pub struct HalDriver {
    config: HalConfig,
    names: JointNames,
    context: Arc<HalContext>,
    velocity: VelocityDispatcher,
    position: PositionDispatcher,
    mode: Arc<AtomicControlMode>,
    setpoint: JointArray,
    consumers: ConsumerSet,
    staleness: Arc<StalenessMonitor>,
    metrics: Arc<HalMetrics>,
    fault_tx: Sender<HalFault>,
    fault_rx: Receiver<HalFault>,
    last_time: Option<f64>,
    transport_failures: u32,
    follower_rejections: u32,
    halted: Option<HaltReason>,
    shut_down: bool,
}

impl HalDriver {
    /// 由 [`HalBuilder`](crate::HalBuilder) 调用；配置已经校验
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: HalConfig,
        context: Arc<HalContext>,
        velocity: VelocityDispatcher,
        position: PositionDispatcher,
        consumers: ConsumerSet,
        metrics: Arc<HalMetrics>,
        fault_capacity: usize,
    ) -> Self {
        let (fault_tx, fault_rx) = crossbeam_channel::bounded(fault_capacity);
        let staleness = Arc::new(StalenessMonitor::new(config.stale_cycle_limit));
        let names = config.joint_names();

        Self {
            config,
            names,
            context,
            velocity,
            position,
            mode: Arc::new(AtomicControlMode::new(ControlMode::Velocity)),
            setpoint: [0.0; JOINT_COUNT],
            consumers,
            staleness,
            metrics,
            fault_tx,
            fault_rx,
            last_time: None,
            transport_failures: 0,
            follower_rejections: 0,
            halted: None,
            shut_down: false,
        }
    }

    // ==================== 入站 ====================

    /// 解码并应用一个带版本标签的原始包
    ///
    /// # 错误
    ///
    /// 结构错误的包返回 `ProtocolError::Malformed`：包被丢弃，状态槽保持不变，
    /// 同时上报 `HalFault::Malformed`。
    pub fn ingest(&mut self, raw: &RawPacket) -> Result<Ingest, ProtocolError> {
        match decode(raw) {
            Ok(packet) => Ok(self.ingest_packet(packet)),
            Err(e) => {
                HalMetrics::incr(&self.metrics.packets_malformed);
                self.report(HalFault::Malformed(e.clone()));
                Err(e)
            },
        }
    }

    /// 应用一个已解码的规范包
    ///
    /// 控制器时间没有前进的包被丢弃。状态过期期间允许时间回退
    /// （控制器重启后时间从 0 开始）。
    pub fn ingest_packet(&mut self, packet: RtStatePacket) -> Ingest {
        if !packet.time.is_finite() {
            HalMetrics::incr(&self.metrics.packets_duplicate);
            trace!("Dropping packet with non-finite controller time");
            return Ingest::Duplicate;
        }
        if let Some(last) = self.last_time {
            let regressed_after_outage = packet.time < last && self.staleness.is_stale();
            if packet.time <= last && !regressed_after_outage {
                HalMetrics::incr(&self.metrics.packets_duplicate);
                trace!("Dropping stale packet: time {} <= {}", packet.time, last);
                return Ingest::Duplicate;
            }
            if regressed_after_outage {
                info!("Controller time restarted ({} -> {})", last, packet.time);
            }
        }

        self.last_time = Some(packet.time);
        let packet = Arc::new(packet);
        self.context.apply(packet.clone());
        self.staleness.on_packet();
        HalMetrics::incr(&self.metrics.packets_decoded);

        let failures = self.consumers.consume_all(&packet);
        if failures > 0 {
            self.metrics.publish_failures.fetch_add(failures as u64, Ordering::Relaxed);
        }

        Ingest::Accepted
    }

    // ==================== 控制周期 ====================

    /// 执行一个控制周期：判定新鲜度，然后写入或保持活动分发器
    ///
    /// # 错误
    ///
    /// - `DriverError::Halted`：命令输出已停止，需要 `recover()`
    /// - `DriverError::Dispatch(TransportUnavailable)`：本周期命令未送出
    /// - `DriverError::Dispatch(..)`：会话未打开、设定值无效等
    ///
    /// 跟随器拒绝不作为错误返回（保持上一命令，下周期重试），记录在报告的 `faults` 中。
    pub fn cycle(&mut self) -> Result<CycleReport, DriverError> {
        if let Some(reason) = self.halted {
            return Err(DriverError::Halted(reason));
        }

        let mode = self.mode();
        let mut faults = SmallVec::new();

        let freshness = self.staleness.on_cycle();
        match freshness {
            Freshness::BecameStale { missed_cycles } => {
                let fault = HalFault::Stale { missed_cycles };
                self.report(fault.clone());
                faults.push(fault);
            },
            Freshness::Recovered => info!("Fresh robot state received, command output resumed"),
            _ => {},
        }

        let held = freshness.is_stale();
        let setpoint = self.setpoint;
        let result = if held {
            HalMetrics::incr(&self.metrics.stale_cycles);
            self.active_mut().hold()
        } else {
            self.active_mut().write(&setpoint)
        };

        match result {
            Ok(()) => {
                HalMetrics::incr(&self.metrics.commands_sent);
                self.transport_failures = 0;
                self.follower_rejections = 0;
            },
            Err(DispatchError::TransportUnavailable) => {
                HalMetrics::incr(&self.metrics.transport_failures);
                self.transport_failures += 1;
                let consecutive = self.transport_failures;
                self.report(HalFault::TransportUnavailable { consecutive });

                if consecutive >= self.config.transport_failure_limit {
                    return Err(self.halt(HaltReason::TransportFailures(consecutive)));
                }
                return Err(DispatchError::TransportUnavailable.into());
            },
            Err(DispatchError::FollowerRejected) => {
                HalMetrics::incr(&self.metrics.follower_rejections);
                self.follower_rejections += 1;
                let consecutive = self.follower_rejections;
                let fault = HalFault::FollowerRejected { consecutive };
                self.report(fault.clone());
                faults.push(fault);

                if consecutive >= self.config.follower_rejection_limit {
                    return Err(self.halt(HaltReason::FollowerRejections(consecutive)));
                }
            },
            Err(e) => {
                warn!("{} dispatcher refused setpoint: {}", self.active().name(), e);
                return Err(e.into());
            },
        }

        let command = self.active().last_command();
        trace!("Cycle done: mode={:?} held={} command={:?}", mode, held, command);

        Ok(CycleReport {
            mode,
            freshness,
            held,
            command,
            faults,
        })
    }

    /// 停止命令输出：活动分发器 `stop()`（位置模式下关闭轨迹会话）
    fn halt(&mut self, reason: HaltReason) -> DriverError {
        self.active_mut().stop();
        self.halted = Some(reason);
        self.report(HalFault::Halted(reason));
        DriverError::Halted(reason)
    }

    /// 从停止状态恢复
    ///
    /// 清空失败计数，重启活动分发器并把设定值复位为保持值。
    pub fn recover(&mut self) -> Result<(), DriverError> {
        let Some(reason) = self.halted else {
            return Ok(());
        };
        info!("Recovering from halt ({})", reason);

        self.transport_failures = 0;
        self.follower_rejections = 0;

        let active = self.active_mut();
        active.stop();
        active.reset();
        active.start()?;

        self.setpoint = self.hold_setpoint();
        self.halted = None;
        Ok(())
    }

    /// 复位活动分发器与设定值
    ///
    /// 速度模式下上一命令、实际命令和设定值全部归零；
    /// 位置模式下设定值改为当前关节位置。
    pub fn reset(&mut self) {
        self.active_mut().reset();
        self.setpoint = self.hold_setpoint();
        debug!("Driver reset in {:?} mode", self.mode());
    }

    fn hold_setpoint(&self) -> JointArray {
        match self.mode() {
            ControlMode::Velocity => [0.0; JOINT_COUNT],
            ControlMode::Position => self.context.joints.read().positions,
        }
    }

    // ==================== 控制模式 ====================

    /// 切换控制模式
    ///
    /// 停止旧分发器，复位并启动新分发器。新分发器启动失败时恢复旧模式。
    pub fn switch_mode(&mut self, mode: ControlMode) -> Result<(), DriverError> {
        let old = self.mode();
        if old == mode {
            return Ok(());
        }

        self.active_mut().stop();

        let next = self.dispatcher_mut(mode);
        next.reset();
        if let Err(e) = next.start() {
            warn!("Failed to start {:?} dispatcher: {}, staying in {:?}", mode, e, old);
            if let Err(e) = self.dispatcher_mut(old).start() {
                error!("Failed to restart {:?} dispatcher: {}", old, e);
            }
            return Err(e.into());
        }

        self.mode.set(mode, Ordering::Release);
        self.setpoint = self.hold_setpoint();
        info!("Control mode switched: {:?} -> {:?}", old, mode);
        Ok(())
    }

    fn dispatcher_mut(&mut self, mode: ControlMode) -> &mut dyn HardwareInterface {
        match mode {
            ControlMode::Velocity => &mut self.velocity,
            ControlMode::Position => &mut self.position,
        }
    }

    fn active_mut(&mut self) -> &mut dyn HardwareInterface {
        self.dispatcher_mut(self.mode())
    }

    fn active(&self) -> &dyn HardwareInterface {
        match self.mode() {
            ControlMode::Velocity => &self.velocity,
            ControlMode::Position => &self.position,
        }
    }

    /// 当前控制模式
    pub fn mode(&self) -> ControlMode {
        self.mode.get(Ordering::Acquire)
    }

    /// 控制模式句柄（供其它线程读取）
    pub fn mode_handle(&self) -> Arc<AtomicControlMode> {
        self.mode.clone()
    }

    /// 活动分发器的能力声明
    pub fn capabilities(&self) -> Capabilities {
        self.active().capabilities()
    }

    /// 轨迹会话状态（位置分发器）
    pub fn trajectory_session(&self) -> SessionState {
        self.position.session()
    }

    // ==================== 控制器接口 ====================

    /// 设置单个关节的设定值，索引越界返回 `false`
    pub fn set_command(&mut self, joint: usize, value: f64) -> bool {
        match self.setpoint.get_mut(joint) {
            Some(slot) => {
                *slot = value;
                true
            },
            None => false,
        }
    }

    /// 设置全部关节的设定值
    pub fn set_commands(&mut self, setpoint: JointArray) {
        self.setpoint = setpoint;
    }

    /// 当前设定值
    pub fn setpoint(&self) -> JointArray {
        self.setpoint
    }

    /// 活动分发器上一个实际命令
    pub fn last_command(&self) -> JointArray {
        self.active().last_command()
    }

    pub fn joint_state(&self) -> JointState {
        self.context.joints.read()
    }

    pub fn wrench_state(&self) -> WrenchState {
        self.context.wrench.read()
    }

    pub fn joint_names(&self) -> &JointNames {
        &self.names
    }

    pub fn context(&self) -> &Arc<HalContext> {
        &self.context
    }

    pub fn config(&self) -> &HalConfig {
        &self.config
    }

    // ==================== 诊断 ====================

    pub fn metrics(&self) -> &Arc<HalMetrics> {
        &self.metrics
    }

    pub fn staleness(&self) -> &Arc<StalenessMonitor> {
        &self.staleness
    }

    /// 故障通道接收端（可克隆给多个监控线程）
    pub fn faults(&self) -> Receiver<HalFault> {
        self.fault_rx.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halted
    }

    /// 上报周期超时（由循环执行器调用）
    pub fn report_deadline_miss(&self, overrun: Duration) {
        HalMetrics::incr(&self.metrics.deadline_misses);
        self.report(HalFault::DeadlineMissed { overrun });
    }

    /// 上报故障：写日志并送入故障通道（通道满时挤掉最旧的一条）
    fn report(&self, fault: HalFault) {
        match &fault {
            HalFault::Halted(_) => error!("{}", fault),
            _ => warn!("{}", fault),
        }

        if let Err(TrySendError::Full(fault)) = self.fault_tx.try_send(fault) {
            let _ = self.fault_rx.try_recv();
            let _ = self.fault_tx.try_send(fault);
        }
    }

    // ==================== 生命周期 ====================

    /// 停止活动分发器并结束所有消费者的参与（幂等）
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.active_mut().stop();
        self.consumers.stop_all();
        self.consumers.teardown_all();
        info!("HAL driver shut down");
    }
}

impl Drop for HalDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::HalBuilder;
    use crate::command::{ArmCommand, ChannelCommander, CommandChannel};
    use std::sync::atomic::AtomicBool;
    use urhal_protocol::{RtVersion, encode};

    /// 可切换成功/失败的命令通道
    #[derive(Default)]
    struct Switchable {
        down: AtomicBool,
        reject: AtomicBool,
    }

    impl CommandChannel for Switchable {
        fn send_velocity(&self, _: &JointArray) -> bool {
            !self.down.load(Ordering::SeqCst)
        }
        fn send_trajectory_point(&self, _: &JointArray) -> bool {
            !self.reject.load(Ordering::SeqCst)
        }
        fn open_trajectory_session(&self) -> bool {
            true
        }
        fn close_trajectory_session(&self) {}
    }

    fn packet(time: f64) -> RtStatePacket {
        let mut p = RtStatePacket::empty(RtVersion::V3_0__1);
        p.time = time;
        p.joint_positions = [time; 6];
        p
    }

    fn driver_with(channel: Arc<dyn CommandChannel>, config: HalConfig) -> HalDriver {
        HalBuilder::new().config(config).command_channel(channel).build().unwrap()
    }

    #[test]
    fn test_malformed_packet_keeps_last_state() {
        let (commander, _rx) = ChannelCommander::new(8);
        let mut driver = driver_with(Arc::new(commander), HalConfig::default());
        let faults = driver.faults();

        let raw = RawPacket::new(RtVersion::V3_0__1, encode(&packet(1.0)));
        assert_eq!(driver.ingest(&raw).unwrap(), Ingest::Accepted);

        let truncated = RawPacket::new(RtVersion::V3_0__1, raw.bytes.slice(..100));
        assert!(driver.ingest(&truncated).is_err());

        assert_eq!(driver.joint_state().positions, [1.0; 6]);
        assert_eq!(driver.metrics().snapshot().packets_malformed, 1);
        assert!(matches!(faults.try_recv(), Ok(HalFault::Malformed(_))));
    }

    #[test]
    fn test_duplicate_and_old_packets_dropped() {
        let (commander, _rx) = ChannelCommander::new(8);
        let mut driver = driver_with(Arc::new(commander), HalConfig::default());

        assert_eq!(driver.ingest_packet(packet(2.0)), Ingest::Accepted);
        assert_eq!(driver.ingest_packet(packet(2.0)), Ingest::Duplicate);
        assert_eq!(driver.ingest_packet(packet(1.0)), Ingest::Duplicate);
        assert_eq!(driver.ingest_packet(packet(f64::NAN)), Ingest::Duplicate);
        assert_eq!(driver.joint_state().stamp, 2.0);
        assert_eq!(driver.metrics().snapshot().packets_duplicate, 3);
    }

    #[test]
    fn test_staleness_holds_command_and_reports() {
        let (commander, rx) = ChannelCommander::new(64);
        let config = HalConfig {
            stale_cycle_limit: 2,
            max_velocity_change_per_cycle: 0.1,
            ..Default::default()
        };
        let mut driver = driver_with(Arc::new(commander), config);
        let faults = driver.faults();
        driver.set_commands([1.0; 6]);

        driver.ingest_packet(packet(1.0));
        assert!(!driver.cycle().unwrap().held); // 0.1
        assert!(!driver.cycle().unwrap().held); // 0.2

        let report = driver.cycle().unwrap();
        assert!(report.held);
        assert_eq!(report.faults.as_slice(), [HalFault::Stale { missed_cycles: 2 }]);
        // 保持上一命令，不继续斜坡
        assert!((report.command[0] - 0.2).abs() < 1e-12);
        let report = driver.cycle().unwrap();
        assert!(report.held && report.faults.is_empty());
        assert!((report.command[0] - 0.2).abs() < 1e-12);

        assert_eq!(faults.try_recv().unwrap(), HalFault::Stale { missed_cycles: 2 });
        assert_eq!(rx.try_iter().count(), 4);
        assert_eq!(driver.metrics().snapshot().stale_cycles, 2);

        // 新包到达后恢复斜坡
        driver.ingest_packet(packet(2.0));
        let report = driver.cycle().unwrap();
        assert!(!report.held);
        assert!((report.command[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_controller_restart_accepted_while_stale() {
        let (commander, _rx) = ChannelCommander::new(64);
        let config = HalConfig {
            stale_cycle_limit: 1,
            ..Default::default()
        };
        let mut driver = driver_with(Arc::new(commander), config);

        driver.ingest_packet(packet(100.0));
        driver.cycle().unwrap();
        assert_eq!(driver.ingest_packet(packet(0.5)), Ingest::Duplicate);

        driver.cycle().unwrap(); // 过期
        assert!(driver.staleness().is_stale());
        assert_eq!(driver.ingest_packet(packet(0.5)), Ingest::Accepted);
    }

    #[test]
    fn test_transport_failures_escalate_to_halt() {
        let channel = Arc::new(Switchable::default());
        let config = HalConfig {
            transport_failure_limit: 3,
            ..Default::default()
        };
        let mut driver = driver_with(channel.clone(), config);
        driver.ingest_packet(packet(1.0));
        channel.down.store(true, Ordering::SeqCst);

        for _ in 0..2 {
            assert!(matches!(
                driver.cycle(),
                Err(DriverError::Dispatch(DispatchError::TransportUnavailable))
            ));
            driver.ingest_packet(packet(driver.joint_state().stamp + 1.0));
        }
        assert!(matches!(
            driver.cycle(),
            Err(DriverError::Halted(HaltReason::TransportFailures(3)))
        ));
        assert!(driver.is_halted());

        // 停止后传输恢复也拒绝写入，直到 recover()
        channel.down.store(false, Ordering::SeqCst);
        assert!(matches!(driver.cycle(), Err(DriverError::Halted(_))));

        driver.recover().unwrap();
        assert!(!driver.is_halted());
        assert_eq!(driver.setpoint(), [0.0; 6]);
        driver.ingest_packet(packet(10.0));
        assert!(driver.cycle().is_ok());
    }

    #[test]
    fn test_transport_success_resets_failure_count() {
        let channel = Arc::new(Switchable::default());
        let config = HalConfig {
            transport_failure_limit: 2,
            ..Default::default()
        };
        let mut driver = driver_with(channel.clone(), config);

        for i in 0..6 {
            driver.ingest_packet(packet(i as f64 + 1.0));
            channel.down.store(i % 2 == 0, Ordering::SeqCst);
            let _ = driver.cycle();
        }
        assert!(!driver.is_halted());
    }

    #[test]
    fn test_follower_rejections_are_non_fatal_until_limit() {
        let channel = Arc::new(Switchable::default());
        let config = HalConfig {
            follower_rejection_limit: 3,
            ..Default::default()
        };
        let mut driver = driver_with(channel.clone(), config);
        driver.ingest_packet(packet(0.5));
        driver.switch_mode(ControlMode::Position).unwrap();
        assert_eq!(driver.setpoint(), [0.5; 6]);

        channel.reject.store(true, Ordering::SeqCst);
        for n in 1..=2u32 {
            driver.ingest_packet(packet(n as f64));
            let report = driver.cycle().unwrap();
            assert_eq!(report.faults.as_slice(), [HalFault::FollowerRejected { consecutive: n }]);
            assert_eq!(report.command, [0.5; 6]);
        }
        driver.ingest_packet(packet(3.0));
        assert!(matches!(
            driver.cycle(),
            Err(DriverError::Halted(HaltReason::FollowerRejections(3)))
        ));
    }

    /// 转发到 `ChannelCommander`，可按开关拒绝轨迹点
    struct RejectingFollower {
        inner: ChannelCommander,
        reject: AtomicBool,
    }

    impl CommandChannel for RejectingFollower {
        fn send_velocity(&self, velocities: &JointArray) -> bool {
            self.inner.send_velocity(velocities)
        }
        fn send_trajectory_point(&self, positions: &JointArray) -> bool {
            !self.reject.load(Ordering::SeqCst) && self.inner.send_trajectory_point(positions)
        }
        fn open_trajectory_session(&self) -> bool {
            self.inner.open_trajectory_session()
        }
        fn close_trajectory_session(&self) {
            self.inner.close_trajectory_session();
        }
    }

    #[test]
    fn test_halt_closes_trajectory_session() {
        let (inner, rx) = ChannelCommander::new(64);
        let channel = Arc::new(RejectingFollower {
            inner,
            reject: AtomicBool::new(true),
        });
        let config = HalConfig {
            follower_rejection_limit: 2,
            ..Default::default()
        };
        let mut driver = driver_with(channel.clone(), config);
        driver.switch_mode(ControlMode::Position).unwrap();
        assert_eq!(driver.trajectory_session(), SessionState::Open);

        driver.ingest_packet(packet(1.0));
        assert!(driver.cycle().is_ok());
        assert_eq!(driver.trajectory_session(), SessionState::Open);

        driver.ingest_packet(packet(2.0));
        assert!(matches!(
            driver.cycle(),
            Err(DriverError::Halted(HaltReason::FollowerRejections(2)))
        ));
        assert_eq!(driver.trajectory_session(), SessionState::Closed);

        let sent: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            sent,
            vec![ArmCommand::OpenTrajectorySession, ArmCommand::CloseTrajectorySession]
        );

        // recover() 重新打开会话
        channel.reject.store(false, Ordering::SeqCst);
        driver.recover().unwrap();
        assert_eq!(driver.trajectory_session(), SessionState::Open);
        driver.ingest_packet(packet(3.0));
        driver.cycle().unwrap();

        let sent: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            sent,
            vec![ArmCommand::OpenTrajectorySession, ArmCommand::TrajectoryPoint([2.0; 6])]
        );
    }

    #[test]
    fn test_switch_mode_stops_old_and_starts_new() {
        let (commander, rx) = ChannelCommander::new(64);
        let mut driver = driver_with(Arc::new(commander), HalConfig::default());
        let mode = driver.mode_handle();
        driver.ingest_packet(packet(0.25));

        driver.switch_mode(ControlMode::Position).unwrap();
        assert_eq!(mode.get(Ordering::Acquire), ControlMode::Position);
        assert!(driver.capabilities().start);

        driver.cycle().unwrap();
        driver.switch_mode(ControlMode::Velocity).unwrap();
        assert_eq!(driver.setpoint(), [0.0; 6]);
        assert!(!driver.capabilities().start);

        let sent: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            sent,
            vec![
                ArmCommand::OpenTrajectorySession,
                ArmCommand::TrajectoryPoint([0.25; 6]),
                ArmCommand::CloseTrajectorySession,
            ]
        );
    }

    #[test]
    fn test_reset_zeroes_velocity_state() {
        let (commander, _rx) = ChannelCommander::new(64);
        let mut driver = driver_with(Arc::new(commander), HalConfig::default());
        driver.ingest_packet(packet(1.0));
        driver.set_commands([1.0; 6]);
        driver.cycle().unwrap();
        assert_ne!(driver.last_command(), [0.0; 6]);

        driver.reset();
        assert_eq!(driver.last_command(), [0.0; 6]);
        assert_eq!(driver.setpoint(), [0.0; 6]);
    }

    #[test]
    fn test_set_command_bounds() {
        let (commander, _rx) = ChannelCommander::new(8);
        let mut driver = driver_with(Arc::new(commander), HalConfig::default());
        assert!(driver.set_command(5, 0.3));
        assert!(!driver.set_command(6, 0.3));
        assert_eq!(driver.setpoint()[5], 0.3);
    }

    #[test]
    fn test_fault_channel_keeps_newest_when_full() {
        let (commander, _rx) = ChannelCommander::new(8);
        let mut driver = HalBuilder::new()
            .command_channel(Arc::new(commander))
            .fault_capacity(1)
            .build()
            .unwrap();
        let faults = driver.faults();

        driver.report_deadline_miss(Duration::from_millis(1));
        driver.report_deadline_miss(Duration::from_millis(2));
        assert_eq!(
            faults.try_recv().unwrap(),
            HalFault::DeadlineMissed {
                overrun: Duration::from_millis(2)
            }
        );
        assert_eq!(driver.metrics().snapshot().deadline_misses, 2);
        driver.shutdown();
    }
}
