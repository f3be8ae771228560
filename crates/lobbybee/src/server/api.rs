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

use axum::{
    body::Bytes,
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ingress;
use crate::db::{self, entities::conversation_context, flow_step::StepOverrides};
use crate::error::{LobbybeeErrorKind, Result};
use crate::locks::KeyedLocks;
use crate::maintenance;
use crate::outbound::{self, Delivery};
use crate::reminder;
use crate::settings::Settings;
use crate::transport::Transport;
use lobbybee_common::webhook::{WebhookResponse, normalize_phone};

#[derive(Deserialize)]
pub struct QueryPagination {
    limit: Option<u64>,
    offset: Option<u64>,
}

#[derive(Deserialize)]
pub struct OutboundRequest {
    user_id: String,
    hotel_id: Option<String>,
    /// Plain text or a provider-ready payload.
    message: Value,
}

#[derive(Deserialize)]
pub struct StayRequest {
    whatsapp_number: String,
    full_name: Option<String>,
    hotel_id: String,
    room_number: Option<String>,
    check_in_date: DateTime<Utc>,
    check_out_date: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ApiState {
    pub db: DatabaseConnection,
    pub auth: String,
    pub settings: Arc<Settings>,
    pub transport: Arc<dyn Transport>,
    /// Serializes conversation turns per user.
    pub turns: KeyedLocks,
    /// Serializes queue drains per user.
    pub drains: KeyedLocks,
}

/*
Webhook
*/

pub async fn post_webhook(State(state): State<ApiState>, body: Bytes) -> Result<Response> {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "webhook body is not JSON");
            let raw = Value::String(String::from_utf8_lossy(&body).into_owned());
            db::webhook_log::create(&raw, false, Some(&err.to_string()), &state.db).await?;
            let response = WebhookResponse::error("Invalid JSON payload");
            return Ok((StatusCode::BAD_REQUEST, Json(response)).into_response());
        }
    };

    match ingress::receive(&state, &payload).await {
        Ok(receipt) => {
            db::webhook_log::create(
                &payload,
                receipt.error.is_none(),
                receipt.error.as_deref(),
                &state.db,
            )
            .await?;
            Ok((StatusCode::OK, Json(receipt.response)).into_response())
        }
        Err(err) => {
            let message = err.to_string();
            if let Err(log_err) =
                db::webhook_log::create(&payload, false, Some(&message), &state.db).await
            {
                error!(error = %log_err, "failed to write webhook log");
            }
            match err.inner() {
                LobbybeeErrorKind::BadRequest(reason) => {
                    let response = WebhookResponse::error(reason);
                    Ok((StatusCode::BAD_REQUEST, Json(response)).into_response())
                }
                _ => {
                    error!(error = %err, "webhook processing failed");
                    Err(err)
                }
            }
        }
    }
}

/*
Contexts
*/

/// The active context, else the most recent one.
async fn latest_context(
    user_id: &str,
    db: &DatabaseConnection,
) -> Result<Option<conversation_context::Model>> {
    let mut contexts = db::context::list_by_user(user_id, db).await?;
    let active = contexts.iter().rposition(|c| c.is_active);
    Ok(match active {
        Some(index) => Some(contexts.swap_remove(index)),
        None => contexts.pop(),
    })
}

pub async fn get_context(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
) -> Result<impl IntoResponse> {
    match latest_context(&user_id, &state.db).await? {
        Some(context) => Ok((StatusCode::OK, Json(context)).into_response()),
        None => Ok((StatusCode::NOT_FOUND, ()).into_response()),
    }
}

pub async fn get_context_messages(
    Path(user_id): Path<String>,
    Query(params): Query<QueryPagination>,
    State(state): State<ApiState>,
) -> Result<impl IntoResponse> {
    let Some(context) = latest_context(&user_id, &state.db).await? else {
        return Ok((StatusCode::NOT_FOUND, ()).into_response());
    };
    let messages =
        db::message::list_by_context(context.id, params.limit, params.offset, &state.db).await?;
    Ok((StatusCode::OK, Json(messages)).into_response())
}

pub async fn delete_user(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
) -> Result<impl IntoResponse> {
    let _turn = state.turns.lock(&user_id).await;
    let removed = maintenance::wipe_user(&user_id, &state.db).await?;
    Ok((StatusCode::OK, Json(removed)))
}

pub async fn get_user_queue(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
) -> Result<impl IntoResponse> {
    let queue = db::queue::list_by_user(&user_id, &state.db).await?;
    Ok((StatusCode::OK, Json(queue)))
}

/*
Messages
*/

pub async fn post_message(
    State(state): State<ApiState>,
    Json(request): Json<OutboundRequest>,
) -> Result<impl IntoResponse> {
    let payload = match request.message {
        Value::String(text) => json!({ "text": text }),
        payload @ Value::Object(_) => payload,
        _ => {
            return Err(LobbybeeErrorKind::BadRequest(
                "message must be text or an object".to_owned(),
            )
            .into());
        }
    };
    let delivery = outbound::deliver(
        &state,
        &request.user_id,
        request.hotel_id.as_deref(),
        &payload,
    )
    .await?;
    Ok(match delivery {
        Delivery::Sent => (StatusCode::OK, Json(json!({ "status": "sent" }))),
        Delivery::Queued(id) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "queued", "queue_id": id })),
        ),
    })
}

/*
Maintenance
*/

pub async fn post_cleanup(State(state): State<ApiState>) -> Result<impl IntoResponse> {
    let removed = maintenance::cleanup(&state.settings, &state.db).await?;
    Ok((StatusCode::OK, Json(removed)))
}

pub async fn get_webhook_logs(
    Query(params): Query<QueryPagination>,
    State(state): State<ApiState>,
) -> Result<impl IntoResponse> {
    let logs = db::webhook_log::list(params.limit, params.offset, &state.db).await?;
    Ok((StatusCode::OK, Json(logs)))
}

/*
Hotels
*/

pub async fn get_notifications(
    Path(hotel_id): Path<String>,
    State(state): State<ApiState>,
) -> Result<impl IntoResponse> {
    let notifications = db::notification::list_by_hotel(Some(&hotel_id), &state.db).await?;
    Ok((StatusCode::OK, Json(notifications)))
}

/// Register a stay so the guest's next message opens the in-stay flow.
pub async fn post_stay(
    State(state): State<ApiState>,
    Json(request): Json<StayRequest>,
) -> Result<impl IntoResponse> {
    if request.check_out_date <= request.check_in_date {
        return Err(LobbybeeErrorKind::BadRequest(
            "check_out_date must be after check_in_date".to_owned(),
        )
        .into());
    }
    if db::hotel::get_by_id(&request.hotel_id, &state.db).await?.is_none() {
        return Ok((StatusCode::NOT_FOUND, ()).into_response());
    }

    let number = normalize_phone(&request.whatsapp_number);
    let guest = match db::guest::get_by_number(&number, &state.db).await? {
        Some(guest) => guest,
        None => db::guest::create(&number, request.full_name.as_deref(), &state.db).await?,
    };
    let stay = db::stay::create(
        guest.id,
        &request.hotel_id,
        request.room_number.as_deref(),
        request.check_in_date,
        request.check_out_date,
        "active",
        &state.db,
    )
    .await?;
    info!(hotel_id = %request.hotel_id, guest_id = guest.id, stay_id = stay.id, "registered stay");
    reminder::schedule_extension(&state, &guest, &stay).await?;
    Ok((StatusCode::CREATED, Json(stay)).into_response())
}

pub async fn put_step(
    Path((hotel_id, template_id)): Path<(String, i32)>,
    State(state): State<ApiState>,
    Json(overrides): Json<StepOverrides>,
) -> Result<impl IntoResponse> {
    let template = db::template::get_step_template(template_id, &state.db).await?;
    let Some(template) = template else {
        return Ok((StatusCode::NOT_FOUND, ()).into_response());
    };
    if db::hotel::get_by_id(&hotel_id, &state.db).await?.is_none() {
        return Ok((StatusCode::NOT_FOUND, ()).into_response());
    }
    if !template.is_customizable {
        return Err(LobbybeeErrorKind::BadRequest(format!(
            "step {} is not customizable",
            template.step_name
        ))
        .into());
    }
    let step = db::flow_step::customize(template_id, &hotel_id, overrides, &state.db).await?;
    info!(hotel_id, template_id, "customized step");
    Ok((StatusCode::OK, Json(step)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::get_test_server;
    use axum::{
        Router,
        routing::{delete, get, post, put},
    };
    use chrono::Utc;

    fn app() -> Router<ApiState> {
        Router::new()
            .route("/webhook", post(post_webhook))
            .route("/contexts/{user_id}", get(get_context))
            .route("/contexts/{user_id}/messages", get(get_context_messages))
            .route("/users/{user_id}", delete(delete_user))
            .route("/messages", post(post_message))
            .route("/cleanup", post(post_cleanup))
            .route("/hotels/{hotel_id}/steps/{template_id}", put(put_step))
            .route("/hotels/{hotel_id}/notifications", get(get_notifications))
            .route("/users/{user_id}/queue", get(get_user_queue))
            .route("/webhooks", get(get_webhook_logs))
            .route("/stays", post(post_stay))
    }

    #[tokio::test]
    async fn it_should_answer_webhooks() {
        let (server, state) = get_test_server(app()).await;

        let response = server
            .post("/webhook")
            .json(&json!({ "from_no": "15550001111", "message": "hello" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Welcome to Seaside Inn!\n1. Create Account");

        let logs = db::webhook_log::list(None, None, &state.db).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].success);
    }

    #[tokio::test]
    async fn it_should_reject_bad_webhooks() {
        let (server, state) = get_test_server(app()).await;

        let response = server
            .post("/webhook")
            .json(&json!({ "from_no": "15550001111" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["status"], "error");

        server
            .post("/webhook")
            .text("{not json")
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let logs = db::webhook_log::list(None, None, &state.db).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|log| !log.success));
        assert!(logs.iter().any(|log| log.payload == json!("{not json")));
    }

    #[tokio::test]
    async fn it_should_expose_contexts_and_transcripts() {
        let (server, _) = get_test_server(app()).await;
        server
            .get("/contexts/15550001111")
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server
            .post("/webhook")
            .json(&json!({ "from_no": "15550001111", "message": "hello" }))
            .await;
        server
            .post("/webhook")
            .json(&json!({ "from_no": "15550001111", "message": "1" }))
            .await;

        let context: Value = server.get("/contexts/15550001111").await.json();
        assert_eq!(context["is_active"], true);
        assert_eq!(context["hotel_id"], "H1");

        let messages: Vec<Value> = server
            .get("/contexts/15550001111/messages")
            .add_query_param("limit", 2)
            .await
            .json();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["message_content"], "hello");
    }

    #[tokio::test]
    async fn it_should_delete_users() {
        let (server, state) = get_test_server(app()).await;
        server
            .post("/webhook")
            .json(&json!({ "from_no": "15550001111", "message": "hello" }))
            .await;

        let removed: Value = server.delete("/users/15550001111").await.json();
        assert_eq!(removed["contexts"], 1);
        assert!(db::context::list_by_user("15550001111", &state.db)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn it_should_queue_messages_outside_the_window() {
        let (server, state) = get_test_server(app()).await;
        let response = server
            .post("/messages")
            .json(&json!({
                "user_id": "15550001111",
                "hotel_id": "H1",
                "message": "Your room is ready"
            }))
            .await;
        response.assert_status(StatusCode::ACCEPTED);
        let body: Value = response.json();
        assert_eq!(body["status"], "queued");

        let queued = db::queue::list_pending("15550001111", Utc::now(), &state.db)
            .await
            .unwrap();
        assert_eq!(queued[0].message_content, json!({ "text": "Your room is ready" }));

        server
            .post("/messages")
            .json(&json!({ "user_id": "15550001111", "message": 5 }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn it_should_send_messages_inside_the_window() {
        let (server, state) = get_test_server(app()).await;
        server
            .post("/webhook")
            .json(&json!({ "from_no": "15550001111", "message": "hello" }))
            .await;

        let body: Value = server
            .post("/messages")
            .json(&json!({
                "user_id": "15550001111",
                "message": { "type": "text", "text": { "body": "Hi" } }
            }))
            .await
            .json();
        assert_eq!(body["status"], "sent");
        assert!(db::queue::list_by_user("15550001111", &state.db)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn it_should_run_cleanup() {
        let (server, state) = get_test_server(app()).await;
        let mut stale = db::context::get_or_create(
            "15550001111",
            None,
            crate::data::ContextData::new(),
            Utc::now(),
            &state.db,
        )
        .await
        .unwrap();
        stale.last_activity = Utc::now() - chrono::Duration::days(30);
        db::context::save(&stale, &state.db).await.unwrap();

        let removed: Value = server.post("/cleanup").await.json();
        assert_eq!(removed["contexts"], 1);
    }

    #[tokio::test]
    async fn it_should_customize_steps_per_hotel() {
        let (server, state) = get_test_server(app()).await;
        let flow = db::template::get_active_flow("random_guest", &state.db)
            .await
            .unwrap()
            .unwrap();
        let entry = db::template::get_entry_step(flow.id, &state.db)
            .await
            .unwrap()
            .unwrap();

        server
            .put(&format!("/hotels/H1/steps/{}", entry.id))
            .json(&json!({ "message_template": "Hello from {hotel_name}!" }))
            .await
            .assert_status_ok();
        server
            .put("/hotels/NOPE/steps/1")
            .json(&json!({}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let response = server
            .post("/webhook")
            .json(&json!({ "from_no": "15550001111", "message": "hello" }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["message"], "Hello from Seaside Inn!\n1. Create Account");
    }

    #[tokio::test]
    async fn it_should_route_guests_with_a_registered_stay() {
        let (server, state) = get_test_server(app()).await;
        let stay = json!({
            "whatsapp_number": "whatsapp:+15550003333",
            "full_name": "Ana",
            "hotel_id": "H1",
            "room_number": "101",
            "check_in_date": Utc::now() - chrono::Duration::hours(2),
            "check_out_date": Utc::now() + chrono::Duration::days(2),
        });
        server.post("/stays").json(&stay).await.assert_status(StatusCode::CREATED);
        let reminders = db::queue::list_by_user("+15550003333", &state.db).await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].message_type, reminder::EXTENSION_REMINDER);

        let mut unknown_hotel = stay.clone();
        unknown_hotel["hotel_id"] = json!("NOPE");
        server
            .post("/stays")
            .json(&unknown_hotel)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let body: Value = server
            .post("/webhook")
            .json(&json!({ "from_no": "+15550003333", "message": "hi" }))
            .await
            .json();
        assert_eq!(body["message"], "Services menu\n1. Late checkout");

        server
            .post("/webhook")
            .json(&json!({ "from_no": "+15550003333", "message": "1" }))
            .await;
        let notes: Vec<Value> = server.get("/hotels/H1/notifications").await.json();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["message"], "Ana requests late checkout");

        let logs: Vec<Value> = server
            .get("/webhooks")
            .add_query_param("limit", 1)
            .await
            .json();
        assert_eq!(logs.len(), 1);
        assert_eq!(
            db::queue::list_pending("+15550003333", Utc::now(), &state.db)
                .await
                .unwrap()
                .len(),
            0
        );
        assert!(db::guest::get_by_number("+15550003333", &state.db)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn it_should_list_a_users_queue() {
        let (server, _) = get_test_server(app()).await;
        server
            .post("/messages")
            .json(&json!({ "user_id": "15550001111", "message": "Checkout is at 11" }))
            .await;
        let queue: Vec<Value> = server.get("/users/15550001111/queue").await.json();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0]["status"], "pending");
    }
}
