use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use checker_core::{
    AcquireOutcome, BusEvent, CheckerError, CheckerResult, Lock, LockConfig, LockUpdate,
};
use checker_infrastructure::{EventBus, MetricsCollector};

/// 记录锁管理器
///
/// 每条记录最多一个有效锁，过期在访问时惰性判定（`now > expires_at`），
/// 后台清扫只是额外的清理。所有获取/释放在同一把互斥锁内串行执行，
/// 并发获取同一记录只有一个赢家。
pub struct LockManager {
    locks: Mutex<HashMap<String, Lock>>,
    ttl: TimeDelta,
    bus: EventBus,
    metrics: MetricsCollector,
}

impl LockManager {
    pub fn new(config: &LockConfig, bus: EventBus, metrics: MetricsCollector) -> Self {
        Self::with_ttl(config.ttl(), bus, metrics)
    }

    pub fn with_ttl(ttl: Duration, bus: EventBus, metrics: MetricsCollector) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            bus,
            metrics,
        }
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<String, Lock>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn publish(&self, record_id: &str, lock: Option<Lock>) {
        self.bus.publish(BusEvent::LockUpdate(LockUpdate {
            record_id: record_id.to_string(),
            lock,
        }));
    }

    /// 获取或续期锁
    ///
    /// 无有效锁、锁已过期或调用者本人持有时成功；否则返回当前持有者。
    pub fn acquire(
        &self,
        record_id: &str,
        user_id: &str,
        user_name: &str,
    ) -> CheckerResult<AcquireOutcome> {
        if record_id.trim().is_empty() || user_id.trim().is_empty() {
            return Err(CheckerError::Validation(
                "记录ID和用户ID不能为空".to_string(),
            ));
        }

        let now = Utc::now();
        let mut locks = self.lock_table();

        let acquired_at = match locks.get(record_id) {
            Some(existing) if !existing.is_expired_at(now) => {
                if existing.owner_user_id != user_id {
                    self.metrics.record_lock_conflict();
                    debug!(
                        record_id = record_id,
                        requested_by = user_id,
                        owner = %existing.owner_user_id,
                        "Lock conflict"
                    );
                    return Ok(AcquireOutcome::denied(existing.owner()));
                }
                existing.acquired_at
            }
            _ => now,
        };

        let lock = Lock {
            record_id: record_id.to_string(),
            owner_user_id: user_id.to_string(),
            owner_name: if user_name.trim().is_empty() {
                user_id.to_string()
            } else {
                user_name.to_string()
            },
            acquired_at,
            expires_at: self.expiry_from(now),
        };

        locks.insert(record_id.to_string(), lock.clone());
        self.metrics.update_active_locks(locks.len());

        debug!(
            record_id = record_id,
            owner = user_id,
            expires_at = %lock.expires_at,
            "Lock granted"
        );

        self.publish(record_id, Some(lock.clone()));
        Ok(AcquireOutcome::granted(lock))
    }

    /// 释放锁，只有有效锁的持有者才能释放
    pub fn release(&self, record_id: &str, user_id: &str) -> bool {
        let now = Utc::now();
        let mut locks = self.lock_table();

        let existing = locks
            .get(record_id)
            .map(|lock| (lock.is_expired_at(now), lock.owner_user_id == user_id));

        match existing {
            Some((true, _)) => {
                locks.remove(record_id);
                self.metrics.update_active_locks(locks.len());
                self.metrics.record_locks_expired(1);
                self.publish(record_id, None);
                false
            }
            Some((false, true)) => {
                locks.remove(record_id);
                self.metrics.update_active_locks(locks.len());
                debug!(record_id = record_id, owner = user_id, "Lock released");
                self.publish(record_id, None);
                true
            }
            _ => false,
        }
    }

    /// 所有未过期的锁，按获取时间排序
    pub fn get_all_locks(&self) -> Vec<Lock> {
        let now = Utc::now();
        let mut locks: Vec<Lock> = self
            .lock_table()
            .values()
            .filter(|lock| !lock.is_expired_at(now))
            .cloned()
            .collect();
        locks.sort_by(|a, b| a.acquired_at.cmp(&b.acquired_at));
        locks
    }

    pub fn get_lock(&self, record_id: &str) -> Option<Lock> {
        let now = Utc::now();
        self.lock_table()
            .get(record_id)
            .filter(|lock| !lock.is_expired_at(now))
            .cloned()
    }

    /// 受锁保护的修改前调用：调用者必须持有记录的有效锁
    pub fn ensure_owner(&self, record_id: &str, user_id: &str) -> CheckerResult<Lock> {
        match self.get_lock(record_id) {
            Some(lock) if lock.owner_user_id == user_id => Ok(lock),
            Some(lock) => Err(CheckerError::LockConflict {
                record_id: record_id.to_string(),
                owner: lock.owner(),
            }),
            None => Err(CheckerError::LockRequired {
                record_id: record_id.to_string(),
            }),
        }
    }

    /// 移除过期锁并为每个发布清除事件
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut locks = self.lock_table();

        let expired: Vec<String> = locks
            .iter()
            .filter(|(_, lock)| lock.is_expired_at(now))
            .map(|(record_id, _)| record_id.clone())
            .collect();

        for record_id in &expired {
            locks.remove(record_id);
            self.publish(record_id, None);
        }

        if !expired.is_empty() {
            self.metrics.record_locks_expired(expired.len());
            self.metrics.update_active_locks(locks.len());
            debug!("Swept {} expired locks", expired.len());
        }
        expired.len()
    }

    /// 启动后台清扫，收到关闭信号后退出
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!("Lock sweeper started, interval {:?}", interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_expired();
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Lock sweeper stopped");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(ttl: Duration) -> LockManager {
        LockManager::with_ttl(ttl, EventBus::new(), MetricsCollector::new())
    }

    #[test]
    fn test_empty_ids_rejected() {
        let locks = manager(Duration::from_secs(60));
        assert!(locks.acquire("", "u1", "Alice").is_err());
        assert!(locks.acquire("r1", " ", "Alice").is_err());
    }

    #[test]
    fn test_owner_name_defaults_to_id() {
        let locks = manager(Duration::from_secs(60));
        let outcome = locks.acquire("r1", "u1", "").unwrap();
        assert_eq!(outcome.lock.unwrap().owner_name, "u1");
    }

    #[test]
    fn test_ensure_owner() {
        let locks = manager(Duration::from_secs(60));
        assert!(matches!(
            locks.ensure_owner("r1", "u1"),
            Err(CheckerError::LockRequired { .. })
        ));

        locks.acquire("r1", "u1", "Alice").unwrap();
        assert!(locks.ensure_owner("r1", "u1").is_ok());
        match locks.ensure_owner("r1", "u2") {
            Err(CheckerError::LockConflict { owner, .. }) => assert_eq!(owner.name, "Alice"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let locks = manager(Duration::from_secs(u64::MAX));
        let outcome = locks.acquire("r1", "u1", "Alice").unwrap();
        assert!(outcome.success);
        assert!(locks.get_lock("r1").is_some());
    }
}
