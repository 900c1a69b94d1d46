//! 事件推送网关
//!
//! 每个SSE连接在事件总线的所有主题上各持有一个订阅：`result` / `stats` 只转发给
//! 运行发起者本人，`lock-update` / `review-updated` / `complete` 对所有连接广播。
//! 连接关闭时流被丢弃，订阅随之注销。
//!
//! 每个连接的发送缓冲有上限；消费过慢的客户端在缓冲满时会丢失事件（记录警告），
//! 发布者不会因此阻塞。客户端可通过 `GET /api/checks/status` 重新获取完整状态。

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::{DateTime, Utc};
use checker_core::{BusEvent, Topic};
use checker_infrastructure::{MetricsCollector, Subscription};
use futures::{stream, Stream};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{auth::ActingUser, routes::AppState};

/// 单个连接的待发送事件上限，慢客户端超出后丢弃新事件而不阻塞发布者
const CLIENT_BUFFER: usize = 256;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Connected {
    connection_id: Uuid,
    user_id: String,
    connected_at: DateTime<Utc>,
}

/// SSE事件名；`complete` 对外名为 `system-complete`
pub fn event_name(topic: Topic) -> &'static str {
    match topic {
        Topic::Complete => "system-complete",
        other => other.as_str(),
    }
}

/// 把总线事件转换为SSE事件，序列化失败时跳过该事件
pub fn to_sse_event(event: &BusEvent) -> Option<Event> {
    let topic = event.topic();
    let payload = match event.payload() {
        Ok(payload) => payload,
        Err(e) => {
            warn!(topic = %topic, "Skipping event that failed to serialize: {}", e);
            return None;
        }
    };

    match Event::default().event(event_name(topic)).json_data(payload) {
        Ok(sse) => Some(sse),
        Err(e) => {
            warn!(topic = %topic, "Skipping event that failed to encode: {}", e);
            None
        }
    }
}

/// 是否应推送给该用户
pub fn visible_to(event: &BusEvent, user_id: &str) -> bool {
    event.audience().map_or(true, |audience| audience == user_id)
}

/// 把事件放入连接的发送缓冲，返回是否已送入
///
/// 缓冲满时丢弃该事件，不阻塞发布者。
fn forward(tx: &mpsc::Sender<Event>, event: &BusEvent, user_id: &str) -> bool {
    if !visible_to(event, user_id) {
        return false;
    }
    let Some(sse) = to_sse_event(event) else {
        return false;
    };

    match tx.try_send(sse) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(
                user_id = %user_id,
                topic = %event.topic(),
                "Event stream buffer full, dropping event for slow client"
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// 连接存活期间持有的资源，丢弃时注销订阅
struct ClientGuard {
    connection_id: Uuid,
    user_id: String,
    _subscriptions: Vec<Subscription>,
    metrics: MetricsCollector,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.metrics.stream_client_disconnected();
        info!(
            connection_id = %self.connection_id,
            user_id = %self.user_id,
            "Event stream client disconnected"
        );
    }
}

pub async fn event_stream(
    State(state): State<AppState>,
    user: ActingUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Event>(CLIENT_BUFFER);
    let connection_id = Uuid::new_v4();

    let connected = Connected {
        connection_id,
        user_id: user.user_id.clone(),
        connected_at: Utc::now(),
    };
    if let Ok(event) = Event::default().event("connected").json_data(&connected) {
        let _ = tx.try_send(event);
    }

    let subscriptions = Topic::ALL
        .iter()
        .map(|topic| {
            let tx = tx.clone();
            let user_id = user.user_id.clone();
            state.bus.subscribe(*topic, move |event| {
                forward(&tx, event, &user_id);
            })
        })
        .collect();

    state.metrics.stream_client_connected();
    info!(
        connection_id = %connection_id,
        user_id = %user.user_id,
        "Event stream client connected"
    );

    let guard = ClientGuard {
        connection_id,
        user_id: user.user_id,
        _subscriptions: subscriptions,
        metrics: state.metrics.clone(),
    };

    let events = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        rx.recv().await.map(|event| (Ok(event), (rx, guard)))
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(state.keep_alive)
            .text("keepalive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use checker_core::{LockUpdate, RunStats, StatsEvent};

    fn stats_for(user: &str) -> BusEvent {
        BusEvent::Stats(StatsEvent {
            initiator_user_id: Some(user.to_string()),
            stats: RunStats {
                concurrency_limit: 3,
                running: true,
                initiator_user_id: Some(user.to_string()),
                generation_id: 1,
                total_enqueued: 2,
                total_completed: 1,
                total_succeeded: 1,
                total_failed: 0,
                pending: 0,
                in_flight: 1,
            },
        })
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_name(Topic::Complete), "system-complete");
        assert_eq!(event_name(Topic::LockUpdate), "lock-update");
        assert_eq!(event_name(Topic::Result), "result");
    }

    #[test]
    fn test_user_scoped_events_filtered() {
        let event = stats_for("u1");
        assert!(visible_to(&event, "u1"));
        assert!(!visible_to(&event, "u2"));

        let broadcast = BusEvent::LockUpdate(LockUpdate {
            record_id: "r1".into(),
            lock: None,
        });
        assert!(visible_to(&broadcast, "u2"));
    }

    #[test]
    fn test_full_client_buffer_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel::<Event>(1);

        assert!(forward(&tx, &stats_for("u1"), "u1"));
        assert!(!forward(&tx, &stats_for("u1"), "u1"));
        assert!(!forward(&tx, &stats_for("u2"), "u1"));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert!(forward(&tx, &stats_for("u1"), "u1"));
    }

    #[test]
    fn test_to_sse_event() {
        assert!(to_sse_event(&stats_for("u1")).is_some());
    }
}
