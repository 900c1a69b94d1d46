//! 检查队列与工作池
//!
//! 进程内只有一个运行状态，所有用户共享。待检查任务按入队顺序（FIFO）派发，
//! 同时执行的分类数不超过并发上限；每个任务完成后释放槽位并派发下一个任务。
//!
//! 状态变更与事件发布在同一把互斥锁内完成，因此任何统计快照都包含已发布的全部结果。
//! 互斥锁从不跨 `.await` 持有。

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use checker_core::{
    AutomationConfig, BusEvent, CheckResult, CheckStatus, CheckTask, CheckerError, CheckerResult,
    Classification, GenerationId, QueueStatus, RecordStore, ResultEvent, RunCompleted, RunStats,
    StartOutcome, StatsEvent,
};
use checker_infrastructure::{EventBus, MetricsCollector};
use checker_worker::StatusClassifier;

/// 运行状态，只能在持有 `Inner::state` 时访问
#[derive(Debug)]
struct RunState {
    concurrency_limit: u32,
    running: bool,
    accepting: bool,
    initiator_user_id: Option<String>,
    generation_id: GenerationId,
    total_enqueued: u64,
    total_completed: u64,
    total_succeeded: u64,
    total_failed: u64,
    pending: VecDeque<CheckTask>,
    /// 跨代次统计，重置不会释放仍被旧任务占用的浏览器会话
    in_flight: usize,
    recent: VecDeque<CheckResult>,
    complete_published: bool,
}

impl RunState {
    fn new(concurrency_limit: u32) -> Self {
        Self {
            concurrency_limit,
            running: false,
            accepting: true,
            initiator_user_id: None,
            generation_id: 0,
            total_enqueued: 0,
            total_completed: 0,
            total_succeeded: 0,
            total_failed: 0,
            pending: VecDeque::new(),
            in_flight: 0,
            recent: VecDeque::new(),
            complete_published: false,
        }
    }

    fn has_unfinished_work(&self) -> bool {
        self.total_completed < self.total_enqueued
    }

    fn clear_counters(&mut self) {
        self.total_enqueued = 0;
        self.total_completed = 0;
        self.total_succeeded = 0;
        self.total_failed = 0;
        self.pending.clear();
        self.recent.clear();
        self.complete_published = false;
    }

    fn snapshot(&self) -> RunStats {
        RunStats {
            concurrency_limit: self.concurrency_limit,
            running: self.running,
            initiator_user_id: self.initiator_user_id.clone(),
            generation_id: self.generation_id,
            total_enqueued: self.total_enqueued,
            total_completed: self.total_completed,
            total_succeeded: self.total_succeeded,
            total_failed: self.total_failed,
            pending: self.pending.len(),
            in_flight: self.in_flight,
        }
    }
}

struct Inner {
    classifier: Arc<StatusClassifier>,
    store: Arc<dyn RecordStore>,
    bus: EventBus,
    metrics: MetricsCollector,
    allowed_concurrency: Vec<u32>,
    classification_timeout: Duration,
    recent_limit: usize,
    persist_retries: u32,
    persist_retry_delay: Duration,
    persist_timeout: Duration,
    state: Mutex<RunState>,
    drained: Notify,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate_concurrency(&self, value: u32) -> CheckerResult<()> {
        if self.allowed_concurrency.contains(&value) {
            Ok(())
        } else {
            Err(CheckerError::InvalidConcurrency {
                value,
                allowed: self.allowed_concurrency.clone(),
            })
        }
    }

    fn publish_stats(&self, state: &RunState) {
        self.bus.publish(BusEvent::Stats(StatsEvent {
            initiator_user_id: state.initiator_user_id.clone(),
            stats: state.snapshot(),
        }));
    }

    /// 在空闲槽位上派发待检查任务
    fn dispatch(self: &Arc<Self>, state: &mut RunState) {
        // 运行时关闭期间释放槽位时不再派发
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        while state.running && state.in_flight < state.concurrency_limit as usize {
            let Some(task) = state.pending.pop_front() else {
                break;
            };
            state.in_flight += 1;

            debug!(
                record_id = %task.record_id,
                generation_id = task.generation_id,
                in_flight = state.in_flight,
                "Dispatching check task"
            );

            let slot = TaskSlot::new(Arc::clone(self), task);
            runtime.spawn(slot.run());
        }

        self.metrics.update_queue(
            state.pending.len(),
            state.in_flight,
            state.concurrency_limit,
        );
    }

    /// 有限次重试，每次尝试有超时，失败只记录日志，不阻塞后续任务
    async fn persist(&self, result: &CheckResult) {
        for attempt in 0..=self.persist_retries {
            let failure = match tokio::time::timeout(
                self.persist_timeout,
                self.store.save_check_result(result),
            )
            .await
            {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("save timed out after {:?}", self.persist_timeout),
            };

            if attempt < self.persist_retries {
                warn!(
                    record_id = %result.record_id,
                    attempt = attempt + 1,
                    "Failed to persist check result, retrying: {}",
                    failure
                );
                self.metrics.record_persist_retry(&result.record_id, attempt + 1);
                tokio::time::sleep(self.persist_retry_delay).await;
            } else {
                error!(
                    record_id = %result.record_id,
                    "Giving up persisting check result after {} attempts: {}",
                    attempt + 1,
                    failure
                );
                self.metrics.record_persist_failure();
            }
        }
    }

    fn complete(self: &Arc<Self>, result: CheckResult, elapsed: Duration) {
        let mut state = self.lock_state();
        state.in_flight = state.in_flight.saturating_sub(1);

        if result.generation_id == state.generation_id {
            state.total_completed += 1;
            match result.status {
                CheckStatus::Live | CheckStatus::Missing => state.total_succeeded += 1,
                CheckStatus::Error => state.total_failed += 1,
            }

            state.recent.push_front(result.clone());
            state.recent.truncate(self.recent_limit);

            self.metrics
                .record_check_completed(result.status, elapsed.as_secs_f64());

            self.bus.publish(BusEvent::Result(ResultEvent {
                initiator_user_id: state.initiator_user_id.clone(),
                result,
            }));
            self.publish_stats(&state);

            if !state.complete_published
                && state.pending.is_empty()
                && state.total_completed == state.total_enqueued
            {
                state.complete_published = true;
                state.running = false;

                info!(
                    generation_id = state.generation_id,
                    total_completed = state.total_completed,
                    total_failed = state.total_failed,
                    "Check run completed"
                );

                self.bus.publish(BusEvent::Complete(RunCompleted {
                    generation_id: state.generation_id,
                    initiator_user_id: state.initiator_user_id.clone(),
                    total_completed: state.total_completed,
                    total_succeeded: state.total_succeeded,
                    total_failed: state.total_failed,
                    completed_at: Utc::now(),
                }));
            }
        } else {
            debug!(
                record_id = %result.record_id,
                result_generation = result.generation_id,
                current_generation = state.generation_id,
                "Discarding result from a previous generation"
            );
        }

        self.dispatch(&mut state);

        if state.in_flight == 0 {
            self.drained.notify_waiters();
        }
    }
}

/// 已派发任务占用的工作槽位
///
/// 任务无论以何种方式结束（正常完成、panic、被取消）都会在这里释放槽位；
/// 未正常完成的任务记为 ERROR 结果。
struct TaskSlot {
    inner: Arc<Inner>,
    task: Option<CheckTask>,
    started: Instant,
}

impl TaskSlot {
    fn new(inner: Arc<Inner>, task: CheckTask) -> Self {
        Self {
            inner,
            task: Some(task),
            started: Instant::now(),
        }
    }

    async fn run(mut self) {
        let Some(task) = self.task.as_ref() else {
            return;
        };

        let classification = self
            .inner
            .classifier
            .classify(&task.url, self.inner.classification_timeout)
            .await;
        let result = CheckResult::from_classification(task, classification);

        self.inner.persist(&result).await;

        self.task = None;
        self.inner.complete(result, self.started.elapsed());
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            error!(
                record_id = %task.record_id,
                generation_id = task.generation_id,
                "Check task aborted before completion, releasing its slot"
            );
            let result =
                CheckResult::from_classification(&task, Classification::error("检查任务异常终止"));
            self.inner.complete(result, self.started.elapsed());
        }
    }
}

/// 检查自动化服务
#[derive(Clone)]
pub struct AutomationService {
    inner: Arc<Inner>,
}

impl AutomationService {
    pub fn new(
        config: &AutomationConfig,
        classifier: Arc<StatusClassifier>,
        store: Arc<dyn RecordStore>,
        bus: EventBus,
        metrics: MetricsCollector,
    ) -> Self {
        let inner = Inner {
            classifier,
            store,
            bus,
            metrics,
            allowed_concurrency: config.allowed_concurrency.clone(),
            classification_timeout: config.classification_timeout(),
            recent_limit: config.recent_results_limit,
            persist_retries: config.persist_retries,
            persist_retry_delay: config.persist_retry_delay(),
            persist_timeout: config.persist_timeout(),
            state: Mutex::new(RunState::new(config.default_concurrency)),
            drained: Notify::new(),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// 开启检查
    ///
    /// 记录URL在修改运行状态之前解析；未知记录被跳过。若当前代次因停止而留有
    /// 未完成的任务，则继续该代次：剩余任务保持原有顺序，新记录追加到队尾。
    pub async fn start_checks(
        &self,
        record_ids: Vec<String>,
        initiator_user_id: &str,
        concurrency: Option<u32>,
    ) -> CheckerResult<StartOutcome> {
        if record_ids.is_empty() {
            return Err(CheckerError::Validation("recordIds 不能为空".to_string()));
        }
        if let Some(value) = concurrency {
            self.inner.validate_concurrency(value)?;
        }
        self.ensure_startable()?;

        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for record_id in record_ids {
            if record_id.trim().is_empty() || !seen.insert(record_id.clone()) {
                continue;
            }
            match self.inner.store.listing_url(&record_id).await? {
                Some(url) => resolved.push((record_id, url)),
                None => warn!(record_id = %record_id, "Skipping unknown record"),
            }
        }

        if resolved.is_empty() {
            return Err(CheckerError::Validation(
                "没有找到可检查的记录".to_string(),
            ));
        }

        let inner = &self.inner;
        let mut state = inner.lock_state();
        if !state.accepting {
            return Err(CheckerError::Internal("服务正在关闭".to_string()));
        }
        if state.running {
            return Err(CheckerError::AlreadyRunning);
        }

        let resumed = state.has_unfinished_work();
        if !resumed {
            state.generation_id += 1;
            state.clear_counters();
        }

        let generation_id = state.generation_id;
        let already_pending: HashSet<String> = state
            .pending
            .iter()
            .map(|task| task.record_id.clone())
            .collect();

        let mut enqueued = 0;
        for (record_id, url) in resolved {
            if already_pending.contains(&record_id) {
                continue;
            }
            state
                .pending
                .push_back(CheckTask::new(record_id, url, generation_id));
            enqueued += 1;
        }

        state.total_enqueued += enqueued as u64;
        state.running = true;
        state.complete_published = false;
        state.initiator_user_id = Some(initiator_user_id.to_string());
        if let Some(value) = concurrency {
            state.concurrency_limit = value;
        }

        inner.metrics.record_checks_enqueued(enqueued);
        info!(
            generation_id = generation_id,
            enqueued = enqueued,
            pending = state.pending.len(),
            concurrency = state.concurrency_limit,
            resumed = resumed,
            initiator = initiator_user_id,
            "Starting checks"
        );

        inner.publish_stats(&state);
        inner.dispatch(&mut state);

        let message = if resumed {
            format!("继续第 {generation_id} 轮检查，新增 {enqueued} 条记录")
        } else {
            format!("已开始检查 {enqueued} 条记录")
        };

        Ok(StartOutcome {
            success: true,
            message,
            generation_id,
            enqueued,
            resumed,
        })
    }

    fn ensure_startable(&self) -> CheckerResult<()> {
        let state = self.inner.lock_state();
        if !state.accepting {
            return Err(CheckerError::Internal("服务正在关闭".to_string()));
        }
        if state.running {
            return Err(CheckerError::AlreadyRunning);
        }
        Ok(())
    }

    /// 修改并发上限，只影响之后的派发，不取消进行中的任务
    pub fn update_concurrency(&self, value: u32) -> CheckerResult<u32> {
        self.inner.validate_concurrency(value)?;

        let mut state = self.inner.lock_state();
        let previous = state.concurrency_limit;
        state.concurrency_limit = value;

        info!(from = previous, to = value, "Concurrency updated");

        self.inner.publish_stats(&state);
        self.inner.dispatch(&mut state);
        Ok(value)
    }

    /// 协作式停止：进行中的任务跑完，待检查任务保留
    pub fn stop_checks(&self) -> RunStats {
        let mut state = self.inner.lock_state();
        if state.running {
            info!(
                generation_id = state.generation_id,
                pending = state.pending.len(),
                in_flight = state.in_flight,
                "Stopping checks"
            );
        }
        state.running = false;

        self.inner.publish_stats(&state);
        state.snapshot()
    }

    /// 清空待检查任务和计数并开启新代次，旧代次迟到的结果不再计入
    pub fn reset_queue(&self, initiator_user_id: &str) -> RunStats {
        let mut state = self.inner.lock_state();
        let dropped = state.pending.len();

        state.running = false;
        state.clear_counters();
        state.generation_id += 1;
        state.initiator_user_id = Some(initiator_user_id.to_string());

        info!(
            generation_id = state.generation_id,
            dropped_pending = dropped,
            in_flight = state.in_flight,
            initiator = initiator_user_id,
            "Queue reset"
        );

        self.inner.metrics.update_queue(0, state.in_flight, state.concurrency_limit);
        self.inner.publish_stats(&state);
        state.snapshot()
    }

    pub fn get_queue_stats(&self) -> RunStats {
        self.inner.lock_state().snapshot()
    }

    /// 最近结果，最新在前
    pub fn get_recent_results(&self) -> Vec<CheckResult> {
        self.inner.lock_state().recent.iter().cloned().collect()
    }

    pub fn get_status(&self) -> QueueStatus {
        let state = self.inner.lock_state();
        QueueStatus {
            stats: state.snapshot(),
            recent_results: state.recent.iter().cloned().collect(),
        }
    }

    pub fn allowed_concurrency(&self) -> &[u32] {
        &self.inner.allowed_concurrency
    }

    /// 停止派发并等待进行中的任务结束，超时返回 false
    pub async fn shutdown(&self, grace: Duration) -> bool {
        {
            let mut state = self.inner.lock_state();
            state.running = false;
            state.accepting = false;
            info!(
                in_flight = state.in_flight,
                pending = state.pending.len(),
                "Automation service shutting down"
            );
        }

        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let in_flight = self.inner.lock_state().in_flight;
            if in_flight == 0 {
                return true;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                warn!(
                    in_flight = in_flight,
                    "Shutdown grace period elapsed with checks still in flight"
                );
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checker_testing_utils::{MockAutomationDriver, MockRecordStore};
    use checker_worker::ClassifierSettings;

    fn service_with(
        config: AutomationConfig,
        driver: Arc<MockAutomationDriver>,
        store: MockRecordStore,
    ) -> AutomationService {
        let settings = ClassifierSettings {
            capture_artifacts: false,
            ..ClassifierSettings::default()
        };
        let classifier = Arc::new(StatusClassifier::new(driver, settings));
        AutomationService::new(
            &config,
            classifier,
            Arc::new(store),
            EventBus::new(),
            MetricsCollector::new(),
        )
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let service = service_with(
            AutomationConfig::default(),
            Arc::new(MockAutomationDriver::new()),
            MockRecordStore::new(),
        );

        let err = service.start_checks(vec![], "u1", None).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(service.get_queue_stats().total_enqueued, 0);
    }

    #[tokio::test]
    async fn test_invalid_concurrency_is_rejected() {
        let service = service_with(
            AutomationConfig::default(),
            Arc::new(MockAutomationDriver::new()),
            MockRecordStore::with_ids(["r1"]),
        );

        assert!(matches!(
            service.update_concurrency(4),
            Err(CheckerError::InvalidConcurrency { value: 4, .. })
        ));
        let err = service
            .start_checks(vec!["r1".into()], "u1", Some(7))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(service.get_queue_stats().concurrency_limit, 3);
        assert_eq!(service.update_concurrency(10).unwrap(), 10);
    }

    #[tokio::test]
    async fn test_unknown_records_only_is_validation_error() {
        let service = service_with(
            AutomationConfig::default(),
            Arc::new(MockAutomationDriver::new()),
            MockRecordStore::with_ids(["r1"]),
        );

        let err = service
            .start_checks(vec!["nope".into(), "".into()], "u1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicates_are_collapsed() {
        let driver = Arc::new(MockAutomationDriver::gated());
        let service = service_with(
            AutomationConfig::default(),
            driver.clone(),
            MockRecordStore::with_ids(["r1", "r2"]),
        );

        let outcome = service
            .start_checks(
                vec!["r1".into(), "r2".into(), "r1".into(), "ghost".into()],
                "u1",
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.enqueued, 2);
        assert_eq!(service.get_queue_stats().total_enqueued, 2);
        driver.release(2);
    }

    #[tokio::test]
    async fn test_recent_results_are_bounded_and_newest_first() {
        let ids: Vec<String> = (0..6).map(|i| format!("r{i}")).collect();
        let config = AutomationConfig {
            allowed_concurrency: vec![1, 3],
            default_concurrency: 1,
            recent_results_limit: 4,
            ..AutomationConfig::default()
        };
        let service = service_with(
            config,
            Arc::new(MockAutomationDriver::new()),
            MockRecordStore::with_ids(&ids),
        );

        service.start_checks(ids.clone(), "u1", None).await.unwrap();
        for _ in 0..200 {
            if !service.get_queue_stats().running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let recent = service.get_recent_results();
        let recent_ids: Vec<&str> = recent.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(recent_ids, vec!["r5", "r4", "r3", "r2"]);
    }

    #[test]
    fn test_snapshot_counts_pending() {
        let mut state = RunState::new(5);
        state
            .pending
            .push_back(CheckTask::new("r1", "https://listings.example/r1", 1));
        state.total_enqueued = 1;

        let stats = state.snapshot();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.concurrency_limit, 5);
        assert!(state.has_unfinished_work());
    }
}
