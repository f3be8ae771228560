// Lobbybee
// Copyright (C) 2025 Lobbybee Contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Window-compliant outbound delivery.
//!
//! Business-initiated messages may only be sent within
//! `session.window_hours` of the guest's last inbound message. Outside that
//! window they wait in `message_queue` until the guest writes again.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db::{self, entities::message_queue::{self, QueueStatus}};
use crate::error::Result;
use crate::server::api::ApiState;

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Id of the queued row.
    Queued(i32),
}

fn message_type(payload: &Value) -> &str {
    payload.get("type").and_then(Value::as_str).unwrap_or("text")
}

pub async fn within_window(state: &ApiState, user_id: &str) -> Result<bool> {
    let last = db::context::last_guest_message_at(user_id, &state.db).await?;
    let window = chrono::Duration::hours(state.settings.session.window_hours);
    Ok(last.is_some_and(|last| Utc::now() - last <= window))
}

/// Send now when the window is open, otherwise queue. A provider failure
/// also queues, so the message is retried on the next drain.
pub async fn deliver(
    state: &ApiState,
    user_id: &str,
    hotel_id: Option<&str>,
    payload: &Value,
) -> Result<Delivery> {
    if within_window(state, user_id).await? {
        match state.transport.send_message(user_id, payload).await {
            Ok(()) => {
                debug!(user_id, "sent message");
                return Ok(Delivery::Sent);
            }
            Err(err) => warn!(user_id, error = %err, "send failed, queueing"),
        }
    }
    let entry = db::queue::create(
        user_id,
        hotel_id,
        message_type(payload),
        payload,
        Utc::now(),
        &state.db,
    )
    .await?;
    info!(user_id, queue_id = entry.id, "queued message outside the messaging window");
    Ok(Delivery::Queued(entry.id))
}

/// Queue a message that becomes due at `at`. It goes out on the first drain
/// after that time during which the window is open.
pub async fn schedule(
    state: &ApiState,
    user_id: &str,
    hotel_id: Option<&str>,
    message_type: &str,
    payload: &Value,
    at: DateTime<Utc>,
) -> Result<i32> {
    let entry = db::queue::create(user_id, hotel_id, message_type, payload, at, &state.db).await?;
    debug!(user_id, queue_id = entry.id, message_type, %at, "scheduled message");
    Ok(entry.id)
}

/// Drain every user holding due messages. Run from the maintenance loop.
pub async fn drain_due(state: &ApiState) -> Result<usize> {
    let mut sent = 0;
    for user_id in db::queue::list_due_users(Utc::now(), &state.db).await? {
        sent += drain_pending(state, &user_id).await?;
    }
    Ok(sent)
}

/// Drain the user's queue in the background under a hard time limit.
pub fn spawn_drain(state: ApiState, user_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let limit = Duration::from_secs(state.settings.delivery.task_timeout_secs);
        match tokio::time::timeout(limit, drain_pending(&state, &user_id)).await {
            Ok(Ok(0)) => {}
            Ok(Ok(sent)) => info!(user_id, sent, "drained queued messages"),
            Ok(Err(err)) => error!(user_id, error = %err, "failed to drain queue"),
            Err(_) => warn!(user_id, "queue drain timed out"),
        }
    })
}

/// Send every pending message of a user if the window is open. Drains of the
/// same user never overlap.
pub async fn drain_pending(state: &ApiState, user_id: &str) -> Result<usize> {
    let _guard = state.drains.lock(user_id).await;
    if !within_window(state, user_id).await? {
        debug!(user_id, "outside the messaging window, leaving queue");
        return Ok(0);
    }

    let mut sent = 0;
    for entry in db::queue::list_pending(user_id, Utc::now(), &state.db).await? {
        if send_queued(state, &entry).await? {
            sent += 1;
        }
    }
    Ok(sent)
}

async fn send_queued(state: &ApiState, entry: &message_queue::Model) -> Result<bool> {
    let max_retries = state.settings.delivery.max_retries;
    let mut backoff = RETRY_BACKOFF;
    loop {
        match state
            .transport
            .send_message(&entry.user_id, &entry.message_content)
            .await
        {
            Ok(()) => return db::queue::mark_sent(entry.id, &state.db).await,
            Err(err) => {
                warn!(
                    queue_id = entry.id,
                    user_id = %entry.user_id,
                    error = %err,
                    "queued send failed"
                );
                match db::queue::record_failure(entry.id, max_retries, &state.db).await? {
                    Some(QueueStatus::Pending) => {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                    _ => return Ok(false),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ContextData;
    use crate::utils::get_test_state;
    use serde_json::json;

    async fn open_window(state: &ApiState, user_id: &str, hours_ago: i64) {
        let mut conversation = db::context::get_or_create(
            user_id,
            None,
            ContextData::new(),
            Utc::now(),
            &state.db,
        )
        .await
        .unwrap();
        conversation.last_guest_message_at = Some(Utc::now() - chrono::Duration::hours(hours_ago));
        db::context::save(&conversation, &state.db).await.unwrap();
    }

    #[tokio::test]
    async fn it_should_queue_outside_the_window() {
        let (state, transport) = get_test_state().await;
        open_window(&state, "15550001111", 30).await;

        let delivery = deliver(&state, "15550001111", None, &json!({ "text": "Hi" }))
            .await
            .unwrap();
        assert!(matches!(delivery, Delivery::Queued(_)));
        assert!(transport.sent().is_empty());

        assert_eq!(drain_pending(&state, "15550001111").await.unwrap(), 0);
        let queued = db::queue::list_pending("15550001111", Utc::now(), &state.db)
            .await
            .unwrap();
        assert_eq!(queued.len(), 1);
    }

    #[tokio::test]
    async fn it_should_send_inside_the_window() {
        let (state, transport) = get_test_state().await;
        open_window(&state, "15550001111", 1).await;

        let delivery = deliver(&state, "15550001111", None, &json!({ "text": "Hi" }))
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Sent);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn it_should_drain_once_the_window_reopens() {
        let (state, transport) = get_test_state().await;
        deliver(&state, "15550001111", None, &json!({ "text": "one" }))
            .await
            .unwrap();
        deliver(&state, "15550001111", None, &json!({ "text": "two" }))
            .await
            .unwrap();

        open_window(&state, "15550001111", 0).await;
        let first = spawn_drain(state.clone(), "15550001111".to_owned());
        let second = spawn_drain(state.clone(), "15550001111".to_owned());
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(transport.sent().len(), 2);
        let rows = db::queue::list_by_user("15550001111", &state.db).await.unwrap();
        assert!(rows.iter().all(|r| r.status == QueueStatus::Sent && r.sent_time.is_some()));
    }

    #[tokio::test]
    async fn it_should_hold_scheduled_messages_until_due() {
        let (state, transport) = get_test_state().await;
        open_window(&state, "15550001111", 0).await;
        let later = Utc::now() + chrono::Duration::hours(3);
        schedule(
            &state,
            "15550001111",
            None,
            "extend_checkin",
            &json!({ "text": "Extend?" }),
            later,
        )
        .await
        .unwrap();

        assert_eq!(drain_pending(&state, "15550001111").await.unwrap(), 0);
        assert_eq!(drain_due(&state).await.unwrap(), 0);
        assert!(transport.sent().is_empty());
        assert!(db::queue::list_due_users(Utc::now(), &state.db).await.unwrap().is_empty());
        assert_eq!(db::queue::list_due_users(later, &state.db).await.unwrap(), ["15550001111"]);
    }

    #[tokio::test]
    async fn it_should_send_due_messages_inside_the_window() {
        let (state, transport) = get_test_state().await;
        let due = Utc::now() - chrono::Duration::minutes(5);
        for user_id in ["15550001111", "15550002222"] {
            schedule(&state, user_id, None, "extend_checkin", &json!({ "text": "Extend?" }), due)
                .await
                .unwrap();
        }
        open_window(&state, "15550001111", 1).await;
        open_window(&state, "15550002222", 30).await;

        assert_eq!(drain_due(&state).await.unwrap(), 1);
        assert_eq!(
            transport.sent(),
            vec![("15550001111".to_owned(), json!({ "text": "Extend?" }))]
        );
        let waiting = db::queue::list_pending("15550002222", Utc::now(), &state.db)
            .await
            .unwrap();
        assert_eq!(waiting.len(), 1);

        assert_eq!(drain_due(&state).await.unwrap(), 0);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn it_should_give_up_after_max_retries() {
        let (state, transport) = get_test_state().await;
        deliver(&state, "15550001111", None, &json!({ "text": "one" }))
            .await
            .unwrap();
        open_window(&state, "15550001111", 0).await;
        transport.fail_sends(true);

        assert_eq!(drain_pending(&state, "15550001111").await.unwrap(), 0);
        let rows = db::queue::list_by_user("15550001111", &state.db).await.unwrap();
        assert_eq!(rows[0].status, QueueStatus::Failed);
        assert_eq!(rows[0].retry_count, state.settings.delivery.max_retries);
    }
}
