//! Test helper utilities

use checker_core::{BusEvent, CheckResult, RunCompleted, RunStats, Topic};
use checker_infrastructure::{EventBus, Subscription};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    pub async fn wait_for<F>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }

        condition()
    }
}

/// 订阅全部主题并按到达顺序记录事件
pub struct EventRecorder {
    events: Arc<Mutex<Vec<BusEvent>>>,
    _subscriptions: Vec<Subscription>,
}

impl EventRecorder {
    pub fn attach(bus: &EventBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriptions = Topic::ALL
            .iter()
            .map(|topic| {
                let sink = Arc::clone(&events);
                bus.subscribe(*topic, move |event| {
                    sink.lock().unwrap().push(event.clone());
                })
            })
            .collect();

        Self {
            events,
            _subscriptions: subscriptions,
        }
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, topic: Topic) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.topic() == topic)
            .count()
    }

    pub fn results(&self) -> Vec<CheckResult> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BusEvent::Result(event) => Some(event.result.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn stats(&self) -> Vec<RunStats> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BusEvent::Stats(event) => Some(event.stats.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<RunCompleted> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BusEvent::Complete(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}
