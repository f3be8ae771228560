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

pub mod placeholder;

use serde_json::{Map, Value, json};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::data::Conversation;
use crate::db::{self, entities::whatsapp_media};
use crate::engine::step::EffectiveStep;
use crate::error::Result;
use crate::server::api::ApiState;
use placeholder::{Sources, Substitutions};

/// Render a step into provider-ready payloads.
///
/// A step with attached media becomes a single media payload when the media
/// can be prepared; anything going wrong on that path falls back to the text
/// form of the template.
pub async fn render_step(
    state: &ApiState,
    conversation: &Conversation,
    step: &EffectiveStep,
) -> Result<Vec<Value>> {
    let sources = Sources::load(conversation, &state.db).await?;
    let subs = Substitutions::prepare(&step.message_template, &sources, &state.db).await?;

    if let Some(media_id) = step.media_id {
        match render_media(state, media_id, &step.message_template, &subs).await {
            Ok(Some(payload)) => return Ok(vec![payload]),
            Ok(None) => {}
            Err(err) => {
                warn!(
                    step = %step.step_name,
                    media_id,
                    error = %err,
                    "media render failed, sending text"
                );
            }
        }
    }

    Ok(render_template(&step.message_template, &step.options, &subs))
}

/// Plain strings get the options list appended; structured payloads are
/// substituted and passed through. An array yields one message per item.
pub fn render_template(
    template: &Value,
    options: &[(String, String)],
    subs: &Substitutions,
) -> Vec<Value> {
    match template {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => {
                render_template(&parsed, options, subs)
            }
            _ => vec![json!({ "text": with_options(&subs.substitute(text), options) })],
        },
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => json!({ "text": subs.substitute(text) }),
                other => subs.apply(other),
            })
            .collect(),
        Value::Object(_) => vec![subs.apply(template)],
        Value::Null => vec![json!({ "text": with_options("", options) })],
        other => vec![json!({ "text": with_options(&other.to_string(), options) })],
    }
}

fn with_options(body: &str, options: &[(String, String)]) -> String {
    let mut text = body.to_owned();
    for (key, label) in options {
        text.push_str(&format!("\n{key}. {label}"));
    }
    text
}

/// Provider message kind for a MIME type.
pub fn media_kind(mime_type: &str) -> Option<&'static str> {
    match mime_type.split('/').next().unwrap_or_default() {
        "image" => Some("image"),
        "video" => Some("video"),
        "audio" => Some("audio"),
        "application" | "text" => Some("document"),
        _ => None,
    }
}

fn caption(template: &Value, subs: &Substitutions) -> Option<String> {
    let text = match template {
        Value::String(text) => text.as_str(),
        Value::Object(map) => map
            .get("caption")
            .or_else(|| map.get("text"))
            .and_then(Value::as_str)?,
        _ => return None,
    };
    let text = subs.substitute(text);
    (!text.trim().is_empty()).then_some(text)
}

async fn render_media(
    state: &ApiState,
    media_id: i32,
    template: &Value,
    subs: &Substitutions,
) -> Result<Option<Value>> {
    let Some(media) = db::media::get_by_id(media_id, &state.db).await? else {
        warn!(media_id, "step references missing media");
        return Ok(None);
    };
    let Some(kind) = media_kind(&media.mime_type) else {
        warn!(media_id, mime_type = %media.mime_type, "unsupported media type");
        return Ok(None);
    };

    let provider_id = ensure_uploaded(state, &media).await?;
    let mut body = Map::new();
    body.insert("id".to_owned(), json!(provider_id));
    if kind != "audio" {
        if let Some(caption) = caption(template, subs) {
            body.insert("caption".to_owned(), json!(caption));
        }
    }
    Ok(Some(json!({ "type": kind, kind: body })))
}

/// A usable provider media id, uploading the file again when the cached id
/// is gone. Concurrent renders may both upload; the last id written wins.
pub async fn ensure_uploaded(state: &ApiState, media: &whatsapp_media::Model) -> Result<String> {
    if let Some(id) = media.whatsapp_media_id.as_deref() {
        if state.transport.get_media_info(id).await?.is_some() {
            return Ok(id.to_owned());
        }
        debug!(media_id = media.id, provider_id = id, "provider media id expired");
    }

    let path = PathBuf::from(&media.file_path);
    let path = if path.is_absolute() {
        path
    } else {
        state.settings.media_dir.join(path)
    };
    let provider_id = state.transport.upload_media(&path, &media.mime_type).await?;
    db::media::set_whatsapp_media_id(media.id, Some(&provider_id), &state.db).await?;
    debug!(media_id = media.id, provider_id = %provider_id, "uploaded media");
    Ok(provider_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{get_test_state, media_fixture};

    fn options() -> Vec<(String, String)> {
        vec![
            ("1".to_owned(), "Yes".to_owned()),
            ("2".to_owned(), "No".to_owned()),
        ]
    }

    #[test]
    fn it_should_append_options_to_text() {
        let rendered = render_template(&json!("Continue?"), &options(), &Substitutions::default());
        assert_eq!(rendered, vec![json!({ "text": "Continue?\n1. Yes\n2. No" })]);
    }

    #[test]
    fn it_should_pass_structured_payloads_through() {
        let template = json!({ "type": "interactive", "body": { "text": "Pick" } });
        let rendered = render_template(&template, &options(), &Substitutions::default());
        assert_eq!(rendered, vec![template.clone()]);

        let encoded = json!(r#"[{"type":"text","text":"a"},"b"]"#);
        let rendered = render_template(&encoded, &[], &Substitutions::default());
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[1], json!({ "text": "b" }));
    }

    #[test]
    fn it_should_map_mime_types() {
        assert_eq!(media_kind("image/jpeg"), Some("image"));
        assert_eq!(media_kind("application/pdf"), Some("document"));
        assert_eq!(media_kind("audio/ogg"), Some("audio"));
        assert_eq!(media_kind("model/gltf"), None);
    }

    #[tokio::test]
    async fn it_should_reuse_a_valid_provider_id() {
        let (state, transport) = get_test_state().await;
        let media = media_fixture(&state, "image/png", Some("WA-VALID")).await;
        transport.add_valid_media("WA-VALID");

        let id = ensure_uploaded(&state, &media).await.unwrap();
        assert_eq!(id, "WA-VALID");
        assert_eq!(transport.upload_count(), 0);
    }

    #[tokio::test]
    async fn it_should_reupload_expired_media() {
        let (state, transport) = get_test_state().await;
        let media = media_fixture(&state, "image/png", Some("WA-EXPIRED")).await;

        let id = ensure_uploaded(&state, &media).await.unwrap();
        assert_ne!(id, "WA-EXPIRED");
        assert_eq!(transport.upload_count(), 1);

        let stored = db::media::get_by_id(media.id, &state.db).await.unwrap().unwrap();
        assert_eq!(stored.whatsapp_media_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn it_should_fall_back_to_text_when_upload_fails() {
        let (state, transport) = get_test_state().await;
        let media = media_fixture(&state, "image/png", None).await;
        transport.fail_uploads(true);

        let subs = Substitutions::default();
        let result = render_media(&state, media.id, &json!("Lobby"), &subs).await;
        assert!(result.is_err());

        let media = media_fixture(&state, "model/gltf", None).await;
        let result = render_media(&state, media.id, &json!("Lobby"), &subs).await;
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn it_should_build_captioned_media_payloads() {
        let (state, transport) = get_test_state().await;
        let media = media_fixture(&state, "image/jpeg", Some("WA-1")).await;
        transport.add_valid_media("WA-1");

        let payload = render_media(&state, media.id, &json!("Our lobby"), &Substitutions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            payload,
            json!({ "type": "image", "image": { "id": "WA-1", "caption": "Our lobby" } })
        );
    }
}
