//! 端口的内存测试替身

use async_trait::async_trait;
use checker_core::{
    AutomationDriver, CheckResult, CheckerError, CheckerResult, PageSnapshot, RecordStore,
    ReviewRecord,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// 模拟页面的渲染结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// 带在线标记的页面
    Live,
    /// 带下架标记的页面
    Missing,
    /// 没有任何标记的页面
    Unrecognized,
    /// 驱动报错
    Fail,
    /// 永不返回，用于超时测试
    Hang,
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of AutomationDriver for testing
///
/// 默认所有URL都渲染为在线页面。`gated()` 创建的驱动在每次渲染前等待
/// [`MockAutomationDriver::release`] 放行，便于精确控制任务完成时机。
pub struct MockAutomationDriver {
    delay: Duration,
    default_outcome: MockOutcome,
    outcomes: Mutex<HashMap<String, MockOutcome>>,
    gate: Option<Semaphore>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    rendered: Mutex<Vec<String>>,
    captures: AtomicUsize,
}

impl Default for MockAutomationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAutomationDriver {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            default_outcome: MockOutcome::Live,
            outcomes: Mutex::new(HashMap::new()),
            gate: None,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            rendered: Mutex::new(Vec::new()),
            captures: AtomicUsize::new(0),
        }
    }

    /// 每次渲染前需要 `release` 放行
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_default_outcome(mut self, outcome: MockOutcome) -> Self {
        self.default_outcome = outcome;
        self
    }

    pub fn with_outcome(self, url: impl Into<String>, outcome: MockOutcome) -> Self {
        self.outcomes.lock().unwrap().insert(url.into(), outcome);
        self
    }

    /// 放行 `n` 个等待中的（或之后到来的）渲染
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 观察到的最大同时渲染数
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn rendered_urls(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn render_count(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    fn outcome_for(&self, url: &str) -> MockOutcome {
        self.outcomes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default_outcome.clone())
    }
}

#[async_trait]
impl AutomationDriver for MockAutomationDriver {
    async fn render(&self, url: &str, _timeout: Duration) -> CheckerResult<PageSnapshot> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(&self.active);
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.rendered.lock().unwrap().push(url.to_string());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| CheckerError::Automation(e.to_string()))?
                .forget();
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let body = match self.outcome_for(url) {
            MockOutcome::Live => "Great condition. Add to cart",
            MockOutcome::Missing => "Sorry, this listing has ended",
            MockOutcome::Unrecognized => "Welcome to our shop",
            MockOutcome::Fail => {
                return Err(CheckerError::Automation("navigation failed".to_string()))
            }
            MockOutcome::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        Ok(PageSnapshot {
            final_url: url.to_string(),
            http_status: Some(200),
            title: Some(format!("Listing {url}")),
            body_text: body.to_string(),
        })
    }

    async fn capture_artifact(&self, _url: &str, _timeout: Duration) -> CheckerResult<Vec<u8>> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock implementation of RecordStore for testing
///
/// 记录 `r1` 的URL为 `https://listings.example/r1`。保存的检查结果全部保留
/// （包括同一记录的多次结果），便于断言持久化次数。
#[derive(Debug, Clone, Default)]
pub struct MockRecordStore {
    urls: Arc<Mutex<HashMap<String, String>>>,
    results: Arc<Mutex<Vec<CheckResult>>>,
    reviews: Arc<Mutex<Vec<ReviewRecord>>>,
    failures_remaining: Arc<AtomicU32>,
    save_attempts: Arc<AtomicU32>,
    hang_saves: Arc<AtomicBool>,
    panic_saves: Arc<AtomicBool>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new();
        {
            let mut urls = store.urls.lock().unwrap();
            for id in ids {
                let id = id.as_ref();
                urls.insert(id.to_string(), Self::url_for(id));
            }
        }
        store
    }

    pub fn url_for(id: &str) -> String {
        format!("https://listings.example/{id}")
    }

    /// 之后的 `n` 次保存返回持久化错误
    pub fn fail_next_saves(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// 之后的保存永不返回
    pub fn hang_saves(&self) {
        self.hang_saves.store(true, Ordering::SeqCst);
    }

    /// 之后的保存直接 panic
    pub fn panic_on_save(&self) {
        self.panic_saves.store(true, Ordering::SeqCst);
    }

    pub fn saved_results(&self) -> Vec<CheckResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn saved_reviews(&self) -> Vec<ReviewRecord> {
        self.reviews.lock().unwrap().clone()
    }

    pub fn save_attempts(&self) -> u32 {
        self.save_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn listing_url(&self, record_id: &str) -> CheckerResult<Option<String>> {
        Ok(self.urls.lock().unwrap().get(record_id).cloned())
    }

    async fn save_check_result(&self, result: &CheckResult) -> CheckerResult<()> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        if self.panic_saves.load(Ordering::SeqCst) {
            panic!("record store crashed while saving {}", result.record_id);
        }
        if self.hang_saves.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(CheckerError::Persistence("database unavailable".to_string()));
        }

        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }

    async fn save_review(&self, review: &ReviewRecord) -> CheckerResult<()> {
        self.reviews.lock().unwrap().push(review.clone());
        Ok(())
    }
}
