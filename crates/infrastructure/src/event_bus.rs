//! 进程内事件总线
//!
//! 按主题发布/订阅，把自动化服务和锁管理器与任意数量的长连接客户端解耦。
//!
//! ## 语义
//!
//! - 发布是同步、非阻塞、即发即忘的，没有订阅者时事件直接丢弃
//! - 每次 `subscribe` 返回一个 [`Subscription`] 守卫，守卫被丢弃时自动退订
//! - 对同一订阅者，同一主题内的投递顺序与发布顺序一致；不保证跨主题顺序
//! - 订阅者处理函数必须快速返回（通常只是把事件放进自己的通道）；处理函数 panic
//!   会被记录并吞掉，不影响发布方和其他订阅者

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use checker_core::{BusEvent, Topic};
use tracing::{debug, warn};

pub type SubscriptionId = u64;

/// 订阅者处理函数
pub type EventHandler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    handlers: RwLock<HashMap<Topic, Vec<(SubscriptionId, EventHandler)>>>,
    next_id: AtomicU64,
    published_total: AtomicU64,
}

impl BusInner {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut removed = false;
        for subscribers in handlers.values_mut() {
            let before = subscribers.len();
            subscribers.retain(|(sub_id, _)| *sub_id != id);
            removed |= subscribers.len() != before;
        }
        removed
    }
}

/// 事件总线，克隆后共享同一个订阅表
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("published_total", &self.published_total())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅主题
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handler: EventHandler = Arc::new(handler);

        {
            let mut handlers = match self.inner.handlers.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            handlers.entry(topic).or_default().push((id, handler));
        }

        debug!(topic = %topic, subscription_id = id, "Subscribed to event bus");

        Subscription {
            id,
            topic,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// 按ID退订；未注册的ID是空操作，返回 false
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    /// 发布事件
    pub fn publish(&self, event: BusEvent) {
        let topic = event.topic();
        let subscribers: Vec<EventHandler> = {
            let handlers = match self.inner.handlers.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            handlers
                .get(&topic)
                .map(|subs| subs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        self.inner.published_total.fetch_add(1, Ordering::Relaxed);

        for handler in subscribers {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                warn!(topic = %topic, "Event subscriber panicked, event dropped for it");
            }
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        let handlers = match self.inner.handlers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.get(&topic).map(Vec::len).unwrap_or(0)
    }

    pub fn published_total(&self) -> u64 {
        self.inner.published_total.load(Ordering::Relaxed)
    }
}

/// 订阅守卫，丢弃时退订
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// 显式退订
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            if inner.remove(self.id) {
                debug!(topic = %self.topic, subscription_id = self.id, "Unsubscribed from event bus");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checker_core::{LockUpdate, ReviewRecord};
    use std::sync::Mutex;

    fn lock_event(record_id: &str) -> BusEvent {
        BusEvent::LockUpdate(LockUpdate {
            record_id: record_id.to_string(),
            lock: None,
        })
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(lock_event("r1"));
        assert_eq!(bus.published_total(), 1);
    }

    #[test]
    fn test_delivery_order_and_topic_isolation() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = bus.subscribe(Topic::LockUpdate, move |event| {
            if let BusEvent::LockUpdate(update) = event {
                sink.lock().unwrap().push(update.record_id.clone());
            }
        });

        for id in ["a", "b", "c"] {
            bus.publish(lock_event(id));
        }
        bus.publish(BusEvent::ReviewUpdated(ReviewRecord {
            record_id: "other".into(),
            reviewed: true,
            note: None,
            reviewed_by: "u1".into(),
            reviewed_at: chrono::Utc::now(),
        }));

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_drop_guard_unsubscribes() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&count);
        let sub = bus.subscribe(Topic::LockUpdate, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.subscriber_count(Topic::LockUpdate), 1);

        bus.publish(lock_event("r1"));
        drop(sub);
        bus.publish(lock_event("r2"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(Topic::LockUpdate), 0);
    }

    #[test]
    fn test_unsubscribe_unknown_id_is_noop() {
        let bus = EventBus::new();
        assert!(!bus.unsubscribe(42));

        let sub = bus.subscribe(Topic::Stats, |_| {});
        let id = sub.id();
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        // guard drop after manual unsubscribe must not panic
        sub.unsubscribe();
    }

    #[test]
    fn test_panicking_subscriber_does_not_affect_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));

        let _bad = bus.subscribe(Topic::LockUpdate, |_| panic!("boom"));
        let counter = Arc::clone(&count);
        let _good = bus.subscribe(Topic::LockUpdate, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(lock_event("r1"));
        bus.publish(lock_event("r2"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
