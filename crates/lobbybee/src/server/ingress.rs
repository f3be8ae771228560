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

//! Webhook ingress: normalize, lock, dispatch.

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::context;
use crate::db::{self, entities::whatsapp_media};
use crate::engine::{self, Reply};
use crate::error::Result;
use crate::server::api::ApiState;
use crate::transport::DownloadedMedia;
use lobbybee_common::webhook::{
    InboundMessage, ReplyStatus, WebhookResponse, normalize_phone,
};

pub const GENERIC_ERROR: &str = "An error occurred. Please try again.";
pub const ADMIN_USAGE: &str = "Usage: admin_reset_user:<user_id_to_reset>";
const ADMIN_RESET: &str = "admin_reset_user:";

/// Outcome of one webhook call. `error` is set when the turn failed inside
/// the engine and the guest was sent the generic apology.
#[derive(Debug)]
pub struct Receipt {
    pub response: WebhookResponse,
    pub error: Option<String>,
}

/// Handle one inbound payload. Missing fields are a `BadRequest`; failures
/// inside the turn become a generic reply so the provider does not retry.
pub async fn receive(state: &ApiState, payload: &serde_json::Value) -> Result<Receipt> {
    let inbound = InboundMessage::from_payload(payload)?;
    let _turn = state.turns.lock(&inbound.phone_number).await;

    if let Some(reply) = admin_command(state, &inbound).await? {
        return Ok(Receipt {
            response: reply.into_response(),
            error: None,
        });
    }

    let media_id = store_inbound_media(state, &inbound).await;
    match engine::dispatch(state, &inbound, media_id).await {
        Ok(reply) => Ok(Receipt {
            response: reply.into_response(),
            error: None,
        }),
        Err(err) => {
            error!(user_id = %inbound.phone_number, error = %err, "failed to process message");
            Ok(Receipt {
                response: WebhookResponse::error(GENERIC_ERROR),
                error: Some(err.to_string()),
            })
        }
    }
}

async fn admin_command(state: &ApiState, inbound: &InboundMessage) -> Result<Option<Reply>> {
    let Some(admin) = state.settings.admin_number.as_deref() else {
        return Ok(None);
    };
    let text = inbound.text.trim();
    if normalize_phone(admin) != inbound.phone_number
        || !text.to_lowercase().starts_with(ADMIN_RESET)
    {
        return Ok(None);
    }

    let target = normalize_phone(text.get(ADMIN_RESET.len()..).unwrap_or_default());
    if target.is_empty() {
        return Ok(Some(Reply::text(ReplyStatus::Error, ADMIN_USAGE)));
    }
    let _target = match target == inbound.phone_number {
        true => None,
        false => Some(state.turns.lock(&target).await),
    };
    let deleted = context::wipe(state, &target).await?;
    info!(admin = %inbound.phone_number, target = %target, deleted, "admin reset");
    Ok(Some(Reply::text(
        ReplyStatus::Success,
        &format!("Conversation data for user {target} reset. Deleted {deleted} contexts."),
    )))
}

/// Download media the guest sent, by provider id or direct URL. A failure is
/// logged and the turn goes on without a stored file.
async fn store_inbound_media(state: &ApiState, inbound: &InboundMessage) -> Option<i32> {
    if !inbound.kind.is_media() {
        return None;
    }
    let provider_id = inbound.media_id.as_deref();
    let download = match (provider_id, inbound.media_url.as_deref()) {
        (Some(id), _) => state.transport.download_media(id).await,
        (None, Some(url)) => state.transport.download_url(url).await,
        (None, None) => return None,
    };
    let stored = match download {
        Ok(media) => save_media(state, &media, provider_id).await,
        Err(err) => Err(err),
    };
    match stored {
        Ok(media) => Some(media.id),
        Err(err) => {
            warn!(
                user_id = %inbound.phone_number,
                provider_id,
                media_url = ?inbound.media_url,
                error = %err,
                "could not store inbound media"
            );
            None
        }
    }
}

async fn save_media(
    state: &ApiState,
    media: &DownloadedMedia,
    provider_id: Option<&str>,
) -> Result<whatsapp_media::Model> {
    let extension = mime_guess::get_mime_extensions_str(&media.mime_type)
        .and_then(|extensions| extensions.first())
        .copied()
        .unwrap_or("bin");
    let file_name = format!("{}.{extension}", Uuid::new_v4());

    tokio::fs::create_dir_all(&state.settings.media_dir).await?;
    tokio::fs::write(state.settings.media_dir.join(&file_name), &media.bytes).await?;
    let size = i64::try_from(media.bytes.len()).unwrap_or(i64::MAX);
    db::media::create(&file_name, &media.mime_type, size, provider_id, &state.db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{get_fixture_state, media_dir_state};
    use serde_json::json;

    #[tokio::test]
    async fn it_should_reject_payloads_without_a_sender() {
        let state = get_fixture_state().await;
        let err = receive(&state, &json!({ "message": "hi" })).await.unwrap_err();
        assert!(matches!(
            err.inner(),
            crate::error::LobbybeeErrorKind::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn it_should_reset_users_on_admin_request() {
        let mut state = get_fixture_state().await;
        state.settings = std::sync::Arc::new(crate::settings::Settings {
            admin_number: Some("whatsapp:+15550000000".to_owned()),
            ..(*state.settings).clone()
        });
        receive(&state, &json!({ "from_no": "15550001111", "message": "hi" }))
            .await
            .unwrap();

        let receipt = receive(
            &state,
            &json!({ "from_no": "+15550000000", "message": "admin_reset_user:15550001111" }),
        )
        .await
        .unwrap();
        assert_eq!(
            receipt.response.message,
            Some(json!(
                "Conversation data for user 15550001111 reset. Deleted 1 contexts."
            ))
        );
        assert!(db::context::get_active("15550001111", &state.db)
            .await
            .unwrap()
            .is_none());

        let receipt = receive(
            &state,
            &json!({ "from_no": "+15550000000", "message": "admin_reset_user:" }),
        )
        .await
        .unwrap();
        assert_eq!(receipt.response.message, Some(json!(ADMIN_USAGE)));

        let receipt = receive(
            &state,
            &json!({ "from_no": "15550002222", "message": "admin_reset_user:15550001111" }),
        )
        .await
        .unwrap();
        assert_eq!(receipt.response.status, ReplyStatus::Success);
        assert!(db::context::get_active("15550002222", &state.db)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn it_should_serialize_turns_of_one_user() {
        let state = get_fixture_state().await;
        receive(&state, &json!({ "from_no": "15550001111", "message": "hi" }))
            .await
            .unwrap();

        let payload = json!({ "from_no": "15550001111", "message": "1" });
        let (a, b) = tokio::join!(receive(&state, &payload), receive(&state, &payload));
        a.unwrap();
        b.unwrap();

        let conversation = db::context::get_active("15550001111", &state.db)
            .await
            .unwrap()
            .unwrap();
        let mut seen = conversation.navigation_stack.clone();
        seen.dedup();
        assert_eq!(seen, conversation.navigation_stack);
        assert_eq!(conversation.navigation_stack.len(), 3);
        assert_eq!(conversation.data.accumulated_str("full_name"), Some("1"));
    }

    #[tokio::test]
    async fn it_should_store_inbound_media() {
        let (state, transport, dir) = media_dir_state().await;
        transport.add_download("WA-IN", b"jpeg-bytes", "image/jpeg");
        receive(&state, &json!({ "from_no": "15550001111", "message": "hi" }))
            .await
            .unwrap();

        let receipt = receive(
            &state,
            &json!({ "from_no": "15550001111", "media_id": "WA-IN", "message_type": "image" }),
        )
        .await
        .unwrap();
        assert!(receipt.error.is_none());

        let media = db::media::get_by_id(1, &state.db).await.unwrap().unwrap();
        assert_eq!(media.whatsapp_media_id.as_deref(), Some("WA-IN"));
        assert!(dir.path().join(&media.file_path).exists());

        let receipt = receive(
            &state,
            &json!({ "from_no": "15550001111", "media_id": "WA-UNKNOWN", "message_type": "image" }),
        )
        .await
        .unwrap();
        assert!(receipt.error.is_none());
    }

    #[tokio::test]
    async fn it_should_store_media_linked_by_url() {
        let (state, transport, dir) = media_dir_state().await;
        let url = "https://api.twilio.com/Media/ME1";
        transport.add_download(url, b"png-bytes", "image/png");

        let receipt = receive(
            &state,
            &json!({
                "From": "whatsapp:+15550001111",
                "MediaUrl0": url,
                "MediaContentType0": "image/png"
            }),
        )
        .await
        .unwrap();
        assert!(receipt.error.is_none());

        let media = db::media::get_by_id(1, &state.db).await.unwrap().unwrap();
        assert_eq!(media.whatsapp_media_id, None);
        assert_eq!(media.mime_type, "image/png");
        assert!(media.file_path.ends_with(".png"));
        let stored = std::fs::read(dir.path().join(&media.file_path)).unwrap();
        assert_eq!(stored, b"png-bytes");
    }
}
