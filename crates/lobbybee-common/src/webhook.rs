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

//! Wire types for the inbound webhook.
//!
//! Providers deliver guest messages in several shapes. They are all
//! normalized into an [`InboundMessage`] before reaching the flow engine,
//! and every turn is answered with a [`WebhookResponse`] envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LobbybeeErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundKind {
    Text,
    Interactive,
    Image,
    Voice,
    Video,
    Document,
    Audio,
}

impl InboundKind {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "voice" => Self::Voice,
            "video" => Self::Video,
            "document" => Self::Document,
            "audio" => Self::Audio,
            "interactive" | "button" => Self::Interactive,
            _ => Self::Text,
        }
    }

    /// Map a MIME type such as `image/jpeg` onto an inbound kind.
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().unwrap_or_default() {
            "image" => Self::Image,
            "audio" => Self::Audio,
            "video" => Self::Video,
            _ => Self::Document,
        }
    }

    pub fn is_media(self) -> bool {
        matches!(
            self,
            Self::Image | Self::Voice | Self::Video | Self::Document | Self::Audio
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Interactive => "interactive",
            Self::Image => "image",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Document => "document",
            Self::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub phone_number: String,
    pub text: String,
    pub kind: InboundKind,
    pub media_id: Option<String>,
    pub media_url: Option<String>,
}

pub fn normalize_phone(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("whatsapp:")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn str_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn owned_field(payload: &Value, key: &str) -> Option<String> {
    str_field(payload, key)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
}

impl InboundMessage {
    /// Normalize any of the supported provider payloads.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let message = if payload.get("From").is_some() || payload.get("Body").is_some() {
            Self::from_twilio(payload)
        } else if payload.get("from_no").is_some() {
            Self::from_flat(payload, "from_no", "message", "message_type")
        } else if payload.get("from").is_some() {
            Self::from_flat(payload, "from", "body", "type")
        } else if payload.get("entry").is_some() {
            Self::from_cloud_api(payload)
        } else {
            None
        };

        match message {
            Some(message) if !message.phone_number.is_empty() && !message.text.is_empty() => {
                Ok(message)
            }
            _ => Err(LobbybeeErrorKind::BadRequest(
                "Missing 'from_no' or 'message' in payload".to_owned(),
            )
            .into()),
        }
    }

    fn from_twilio(payload: &Value) -> Option<Self> {
        let phone_number = normalize_phone(str_field(payload, "From")?);
        let media_url = owned_field(payload, "MediaUrl0");
        let kind = match str_field(payload, "MediaContentType0") {
            Some(mime) if media_url.is_some() => InboundKind::from_mime(mime),
            _ => InboundKind::Text,
        };
        let text = match owned_field(payload, "Body") {
            Some(body) => body,
            None => media_url.clone().unwrap_or_default(),
        };
        Some(Self {
            phone_number,
            text,
            kind,
            media_id: None,
            media_url,
        })
    }

    fn from_flat(payload: &Value, from: &str, body: &str, kind: &str) -> Option<Self> {
        let phone_number = normalize_phone(str_field(payload, from)?);
        let media_id = owned_field(payload, "media_id");
        let media_url = owned_field(payload, "media_url");
        let kind = str_field(payload, kind)
            .map(InboundKind::parse)
            .unwrap_or(InboundKind::Text);
        let text = owned_field(payload, body)
            .or_else(|| media_id.clone())
            .or_else(|| media_url.clone())
            .unwrap_or_default();
        Some(Self {
            phone_number,
            text,
            kind,
            media_id,
            media_url,
        })
    }

    fn from_cloud_api(payload: &Value) -> Option<Self> {
        let message = payload
            .pointer("/entry/0/changes/0/value/messages/0")
            .filter(|m| m.is_object())?;
        let phone_number = normalize_phone(str_field(message, "from")?);
        let raw_kind = str_field(message, "type").unwrap_or("text");
        let kind = InboundKind::parse(raw_kind);

        let (text, media_id) = if kind.is_media() {
            let id = message
                .pointer(&format!("/{raw_kind}/id"))
                .and_then(Value::as_str)
                .map(str::to_owned);
            (id.clone().unwrap_or_default(), id)
        } else {
            let text = [
                "/text/body",
                "/interactive/button_reply/id",
                "/interactive/list_reply/id",
                "/button/payload",
            ]
            .iter()
            .find_map(|p| message.pointer(p).and_then(Value::as_str))
            .unwrap_or_default()
            .to_owned();
            (text, None)
        };

        Some(Self {
            phone_number,
            text,
            kind,
            media_id,
            media_url: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// Response envelope returned to the provider for every turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Value>>,
}

impl WebhookResponse {
    pub fn new(status: ReplyStatus, mut payloads: Vec<Value>) -> Self {
        if payloads.len() > 1 {
            return Self {
                status,
                message: None,
                messages: Some(payloads),
            };
        }
        let message = payloads.pop().map(|payload| match text_only(&payload) {
            Some(text) => Value::String(text.to_owned()),
            None => payload,
        });
        Self {
            status,
            message,
            messages: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: Some(Value::String(message.to_owned())),
            messages: None,
        }
    }
}

/// The body of a `{"text": ...}` payload carrying nothing else.
pub fn text_only(payload: &Value) -> Option<&str> {
    match payload {
        Value::Object(map) if map.len() == 1 => map.get("text").and_then(Value::as_str),
        _ => None,
    }
}
