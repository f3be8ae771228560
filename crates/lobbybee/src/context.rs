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

//! Context store: the locked read-modify-write surface over conversations.
//!
//! Callers hold the user's turn lock from [`crate::locks::KeyedLocks`] for
//! the whole turn; these functions only persist.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::data::{ContextData, Conversation};
use crate::db;
use crate::error::Result;
use crate::{maintenance, outbound};
use crate::server::api::ApiState;
use crate::settings::Settings;
use lobbybee_common::webhook::{InboundMessage, text_only};

/// When a session started or advanced now expires.
pub fn session_deadline(settings: &Settings) -> DateTime<Utc> {
    Utc::now() + Duration::hours(settings.session.expiry_hours)
}

pub async fn get_or_create(
    state: &ApiState,
    user_id: &str,
    hotel_id: Option<&str>,
    data: ContextData,
) -> Result<Conversation> {
    let deadline = session_deadline(&state.settings);
    db::context::get_or_create(user_id, hotel_id, data, deadline, &state.db).await
}

pub async fn get_active(state: &ApiState, user_id: &str) -> Result<Option<Conversation>> {
    db::context::get_active(user_id, &state.db).await
}

/// Record an inbound message and kick off a drain of the user's queue.
pub async fn update_activity(
    state: &ApiState,
    conversation: &mut Conversation,
    inbound: &InboundMessage,
    media_id: Option<i32>,
) -> Result<JoinHandle<()>> {
    let now = Utc::now();
    conversation.last_activity = now;
    conversation.last_guest_message_at = Some(now);
    db::context::save(conversation, &state.db).await?;
    db::message::create(
        conversation.id,
        &inbound.text,
        true,
        inbound.kind.as_str(),
        media_id,
        &state.db,
    )
    .await?;
    Ok(outbound::spawn_drain(state.clone(), conversation.user_id.clone()))
}

/// Back to a clean slate while keeping the hotel and guest linkage.
pub async fn reset(state: &ApiState, conversation: &mut Conversation) -> Result<()> {
    conversation.navigation_stack.clear();
    conversation.current_step_id = None;
    conversation.data.clear_accumulated();
    conversation.error_count = 0;
    conversation.is_active = true;
    db::context::save(conversation, &state.db).await
}

/// Delete everything stored about a user. Returns the number of contexts.
pub async fn wipe(state: &ApiState, user_id: &str) -> Result<u64> {
    let removed = maintenance::wipe_user(user_id, &state.db).await?;
    Ok(removed.contexts)
}

fn payload_type(payload: &Value) -> &str {
    payload.get("type").and_then(Value::as_str).unwrap_or("text")
}

/// Append outbound payloads to the transcript.
pub async fn log_outbound(state: &ApiState, context_id: i32, payloads: &[Value]) -> Result<()> {
    for payload in payloads {
        let content = match text_only(payload) {
            Some(text) => text.to_owned(),
            None => payload.to_string(),
        };
        db::message::create(
            context_id,
            &content,
            false,
            payload_type(payload),
            None,
            &state.db,
        )
        .await?;
    }
    debug!(context_id, count = payloads.len(), "logged outbound messages");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::get_test_state;
    use lobbybee_common::webhook::InboundKind;
    use serde_json::json;

    fn inbound(text: &str) -> InboundMessage {
        InboundMessage {
            phone_number: "15550001111".to_owned(),
            text: text.to_owned(),
            kind: InboundKind::Text,
            media_id: None,
            media_url: None,
        }
    }

    #[tokio::test]
    async fn it_should_keep_one_active_context_per_user() {
        let (state, _) = get_test_state().await;
        let first = get_or_create(&state, "15550001111", Some("H1"), ContextData::new())
            .await
            .unwrap();
        let again = get_or_create(&state, "15550001111", Some("H1"), ContextData::new())
            .await
            .unwrap();
        assert_eq!(first.id, again.id);

        let other = get_or_create(&state, "15550001111", None, ContextData::new())
            .await
            .unwrap();
        assert_ne!(other.id, first.id);

        let rows = db::context::list_by_user("15550001111", &state.db).await.unwrap();
        assert_eq!(rows.iter().filter(|r| r.is_active).count(), 1);
        let active = get_active(&state, "15550001111").await.unwrap().unwrap();
        assert_eq!(active.id, other.id);
    }

    #[tokio::test]
    async fn it_should_reactivate_instead_of_duplicating() {
        let (state, _) = get_test_state().await;
        let mut conversation = get_or_create(&state, "15550001111", Some("H1"), ContextData::new())
            .await
            .unwrap();
        conversation.navigation_stack = vec![1, 2];
        conversation.error_count = 3;
        conversation.is_active = false;
        db::context::save(&conversation, &state.db).await.unwrap();

        let revived = get_or_create(&state, "15550001111", Some("H1"), ContextData::new())
            .await
            .unwrap();
        assert_eq!(revived.id, conversation.id);
        assert!(revived.is_active);
        assert!(revived.navigation_stack.is_empty());
        assert_eq!(revived.error_count, 0);
        assert_eq!(
            db::context::list_by_user("15550001111", &state.db).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn it_should_log_activity_and_outbound_messages() {
        let (state, _) = get_test_state().await;
        let mut conversation = get_or_create(&state, "15550001111", None, ContextData::new())
            .await
            .unwrap();
        let drain = update_activity(&state, &mut conversation, &inbound("hi"), None)
            .await
            .unwrap();
        drain.await.unwrap();
        assert!(conversation.last_guest_message_at.is_some());

        log_outbound(
            &state,
            conversation.id,
            &[json!({ "text": "Hello" }), json!({ "type": "image", "image": { "id": "M" } })],
        )
        .await
        .unwrap();

        let transcript = db::message::list_by_context(conversation.id, None, None, &state.db)
            .await
            .unwrap();
        assert_eq!(transcript.len(), 3);
        assert!(transcript[0].is_from_guest);
        assert_eq!(transcript[1].message_content, "Hello");
        assert_eq!(transcript[2].message_type, "image");
    }

    #[tokio::test]
    async fn it_should_reset_and_wipe() {
        let (state, _) = get_test_state().await;
        let mut conversation = get_or_create(&state, "15550001111", None, ContextData::new())
            .await
            .unwrap();
        conversation.data.accumulate("full_name", "John");
        conversation.navigation_stack = vec![4];
        conversation.error_count = 2;
        reset(&state, &mut conversation).await.unwrap();

        let stored = db::context::get_by_id(conversation.id, &state.db)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.navigation_stack.is_empty());
        assert!(stored.data.accumulated().is_empty());
        assert_eq!(stored.error_count, 0);

        assert_eq!(wipe(&state, "15550001111").await.unwrap(), 1);
        assert!(get_active(&state, "15550001111").await.unwrap().is_none());
    }
}
