use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use tracing::{debug, info};

use checker_core::CheckStatus;

/// 检查自动化的指标收集器
#[derive(Clone)]
pub struct MetricsCollector {
    checks_started_total: Counter,
    checks_completed_total: Counter,
    check_live_total: Counter,
    check_missing_total: Counter,
    check_error_total: Counter,
    check_duration: Histogram,
    persist_retries_total: Counter,
    persist_failures_total: Counter,

    pending_tasks: Gauge,
    in_flight_tasks: Gauge,
    concurrency_limit: Gauge,

    active_locks: Gauge,
    lock_conflicts_total: Counter,
    lock_expired_total: Counter,
    stream_clients: Gauge,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            checks_started_total: counter!("checker_checks_started_total"),
            checks_completed_total: counter!("checker_checks_completed_total"),
            check_live_total: counter!("checker_check_results_total", "status" => "LIVE"),
            check_missing_total: counter!("checker_check_results_total", "status" => "MISSING"),
            check_error_total: counter!("checker_check_results_total", "status" => "ERROR"),
            check_duration: histogram!("checker_check_duration_seconds"),
            persist_retries_total: counter!("checker_persist_retries_total"),
            persist_failures_total: counter!("checker_persist_failures_total"),
            pending_tasks: gauge!("checker_pending_tasks"),
            in_flight_tasks: gauge!("checker_in_flight_tasks"),
            concurrency_limit: gauge!("checker_concurrency_limit"),
            active_locks: gauge!("checker_active_locks"),
            lock_conflicts_total: counter!("checker_lock_conflicts_total"),
            lock_expired_total: counter!("checker_lock_expired_total"),
            stream_clients: gauge!("checker_stream_clients"),
        }
    }

    /// 记录一批任务入队
    pub fn record_checks_enqueued(&self, count: usize) {
        self.checks_started_total.increment(count as u64);
    }

    /// 记录一次检查完成
    pub fn record_check_completed(&self, status: CheckStatus, duration_seconds: f64) {
        self.checks_completed_total.increment(1);
        self.check_duration.record(duration_seconds);
        match status {
            CheckStatus::Live => self.check_live_total.increment(1),
            CheckStatus::Missing => self.check_missing_total.increment(1),
            CheckStatus::Error => self.check_error_total.increment(1),
        }

        debug!(
            status = %status,
            duration_seconds = duration_seconds,
            "Check completed"
        );
    }

    pub fn record_persist_retry(&self, record_id: &str, attempt: u32) {
        self.persist_retries_total.increment(1);
        debug!(record_id = record_id, attempt = attempt, "Persist retry");
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures_total.increment(1);
    }

    /// 更新队列相关仪表
    pub fn update_queue(&self, pending: usize, in_flight: usize, limit: u32) {
        self.pending_tasks.set(pending as f64);
        self.in_flight_tasks.set(in_flight as f64);
        self.concurrency_limit.set(limit as f64);
    }

    pub fn update_active_locks(&self, count: usize) {
        self.active_locks.set(count as f64);
    }

    pub fn record_lock_conflict(&self) {
        self.lock_conflicts_total.increment(1);
    }

    pub fn record_locks_expired(&self, count: usize) {
        self.lock_expired_total.increment(count as u64);
    }

    pub fn stream_client_connected(&self) {
        self.stream_clients.increment(1.0);
    }

    pub fn stream_client_disconnected(&self) {
        self.stream_clients.decrement(1.0);
    }
}

/// 安装 Prometheus 导出器，并在指定地址提供 `/metrics`
///
/// 必须在 tokio 运行时内调用。
pub fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {bind_address}"))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    info!("Metrics initialized with Prometheus exporter on {}", addr);
    Ok(())
}
