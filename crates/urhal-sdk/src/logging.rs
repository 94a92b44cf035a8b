//! 日志初始化
//!
//! 基于 `tracing-subscriber`，过滤规则来自 `RUST_LOG`，未设置时默认 `urhal=info`。
//! `log` 桥接只由 `tracing-log` 的 `LogTracer` 安装一次（subscriber 自带的桥接已关闭），
//! 依赖 `log` crate 的库输出也会进入同一个订阅者。

use tracing_subscriber::EnvFilter;

/// 默认过滤规则
pub const DEFAULT_FILTER: &str = "urhal=info";

/// 初始化全局日志（重复调用是安全的，只有第一次生效）
///
/// # 示例
///
/// ```rust
/// urhal_sdk::init_logger();
/// tracing::info!("HAL starting");
/// ```
pub fn init_logger() {
    // 已有全局 logger 时保留原 logger
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge not installed: {}", e);
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        tracing::debug!("tracing subscriber already installed: {}", e);
    }
}
