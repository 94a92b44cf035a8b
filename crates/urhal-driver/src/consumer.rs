//! 状态消费者（State Consumer）
//!
//! 每个周期被接受的规范包以不可变快照（`Arc<RtStatePacket>`）交给所有消费者。
//!
//! # 非阻塞
//!
//! 控制循环内同步调用 `consume()`，实现必须快速返回。
//! 耗时的消费者应该用 [`AsyncConsumer`] 包装，放到独立的低优先级线程运行。

use crate::metrics::HalMetrics;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, trace, warn};
use urhal_protocol::RtStatePacket;

/// 状态消费者
///
/// 生命周期：`setup_consumer()` → 每周期 `consume()` → `stop_consumer()` /
/// `teardown_consumer()`。三个生命周期方法都必须是幂等的。
pub trait StateConsumer: Send {
    /// 名称（用于日志）
    fn name(&self) -> &str {
        "consumer"
    }

    /// 开始参与
    fn setup_consumer(&mut self) {}

    /// 结束参与并释放资源
    fn teardown_consumer(&mut self) {}

    /// 停止参与（之后的 `consume()` 不再产生输出）
    fn stop_consumer(&mut self) {}

    /// 消费一个快照，全部成功返回 `true`
    fn consume(&mut self, packet: &Arc<RtStatePacket>) -> bool;
}

/// 消费者集合
///
/// `consume_all()` 依次调用每个消费者，不会因为某一个失败而跳过后续消费者。
#[derive(Default)]
pub struct ConsumerSet {
    consumers: Vec<Box<dyn StateConsumer>>,
}

impl ConsumerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, consumer: Box<dyn StateConsumer>) {
        self.consumers.push(consumer);
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    pub fn setup_all(&mut self) {
        for consumer in &mut self.consumers {
            consumer.setup_consumer();
        }
    }

    /// 调用所有消费者，返回失败的数量
    pub fn consume_all(&mut self, packet: &Arc<RtStatePacket>) -> usize {
        let mut failures = 0;
        for consumer in &mut self.consumers {
            if !consumer.consume(packet) {
                trace!("Consumer '{}' reported failure", consumer.name());
                failures += 1;
            }
        }
        failures
    }

    pub fn stop_all(&mut self) {
        for consumer in &mut self.consumers {
            consumer.stop_consumer();
        }
    }

    pub fn teardown_all(&mut self) {
        for consumer in &mut self.consumers {
            consumer.teardown_consumer();
        }
    }
}

/// 发往工作线程的消息
enum Job {
    Setup,
    Consume(Arc<RtStatePacket>),
    Stop,
    Teardown,
}

/// 异步消费者（Actor 模式 + Bounded Queue）
///
/// 把任意消费者移动到独立线程，控制循环只做一次 `try_send`：
/// - 队列满时丢弃本周期快照并计数，不阻塞控制循环
/// - 内部消费者返回 `false` 时计入 `failures`（以及驱动指标 `publish_failures`）
/// - 生命周期消息使用阻塞发送，保证送达
///
/// # 示例
///
/// ```rust
/// use urhal_driver::consumer::{AsyncConsumer, StateConsumer};
/// use urhal_protocol::{RtStatePacket, RtVersion};
/// use std::sync::Arc;
///
/// struct Counter(u32);
/// impl StateConsumer for Counter {
///     fn consume(&mut self, _: &Arc<RtStatePacket>) -> bool {
///         self.0 += 1;
///         true
///     }
/// }
///
/// let mut consumer = AsyncConsumer::spawn(Box::new(Counter(0)), 16).unwrap();
/// consumer.consume(&Arc::new(RtStatePacket::empty(RtVersion::V3_2__3)));
/// ```
pub struct AsyncConsumer {
    name: String,
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    dropped: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
    metrics: Option<Arc<HalMetrics>>,
}

impl AsyncConsumer {
    /// 在新线程上运行 `inner`，队列容量为 `capacity` 个快照
    pub fn spawn(inner: Box<dyn StateConsumer>, capacity: usize) -> std::io::Result<Self> {
        Self::spawn_with_metrics(inner, capacity, None)
    }

    /// 同 [`spawn`](Self::spawn)，丢弃的快照计入 `snapshots_dropped`，
    /// 工作线程内的消费失败计入 `publish_failures`
    pub fn spawn_with_metrics(
        inner: Box<dyn StateConsumer>,
        capacity: usize,
        metrics: Option<Arc<HalMetrics>>,
    ) -> std::io::Result<Self> {
        let name = inner.name().to_string();
        let (tx, rx) = bounded(capacity);
        let failures = Arc::new(AtomicU64::new(0));

        let worker_failures = failures.clone();
        let worker_metrics = metrics.clone();
        let worker = std::thread::Builder::new()
            .name(format!("urhal-{}", name))
            .spawn(move || worker_loop(inner, rx, worker_failures, worker_metrics))?;

        Ok(Self {
            name,
            tx: Some(tx),
            worker: Some(worker),
            dropped: Arc::new(AtomicU64::new(0)),
            failures,
            metrics,
        })
    }

    /// 丢弃的快照计数器
    pub fn dropped_snapshots(&self) -> &Arc<AtomicU64> {
        &self.dropped
    }

    /// 内部消费者失败计数器
    pub fn failures(&self) -> &Arc<AtomicU64> {
        &self.failures
    }

    fn send_lifecycle(&self, job: Job) {
        if let Some(tx) = &self.tx
            && tx.send(job).is_err()
        {
            warn!("Async consumer '{}' worker has exited", self.name);
        }
    }
}

fn worker_loop(
    mut inner: Box<dyn StateConsumer>,
    rx: Receiver<Job>,
    failures: Arc<AtomicU64>,
    metrics: Option<Arc<HalMetrics>>,
) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Setup => inner.setup_consumer(),
            Job::Consume(packet) => {
                if !inner.consume(&packet) {
                    let total = failures.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(metrics) = &metrics {
                        HalMetrics::incr(&metrics.publish_failures);
                    }
                    if total == 1 {
                        warn!("Async consumer '{}' failed to consume a snapshot", inner.name());
                    } else {
                        trace!("Async consumer '{}' failure #{}", inner.name(), total);
                    }
                }
            },
            Job::Stop => inner.stop_consumer(),
            Job::Teardown => inner.teardown_consumer(),
        }
    }
    trace!("Async consumer '{}' worker exited", inner.name());
}

impl StateConsumer for AsyncConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup_consumer(&mut self) {
        self.send_lifecycle(Job::Setup);
    }

    fn teardown_consumer(&mut self) {
        self.send_lifecycle(Job::Teardown);
    }

    fn stop_consumer(&mut self) {
        self.send_lifecycle(Job::Stop);
    }

    /// 入队快照；队列满时丢弃并返回 `true`（丢弃计入 `dropped_snapshots`），
    /// 工作线程已退出时返回 `false`
    fn consume(&mut self, packet: &Arc<RtStatePacket>) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(Job::Consume(packet.clone())) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &self.metrics {
                    HalMetrics::incr(&metrics.snapshots_dropped);
                }
                trace!("Async consumer '{}' queue full, snapshot dropped", self.name);
                true
            },
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl Drop for AsyncConsumer {
    fn drop(&mut self) {
        // 关闭通道，工作线程处理完剩余消息后退出
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Async consumer '{}' worker panicked", self.name);
            } else {
                debug!("Async consumer '{}' worker joined", self.name);
            }
        }
    }
}
