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

//! Provider transport.
//!
//! The engine only talks to the [`Transport`] trait. [`WhatsappClient`]
//! implements it against the WhatsApp Business Cloud API.

use async_trait::async_trait;
use reqwest::{
    RequestBuilder, StatusCode,
    multipart::{Form, Part},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{path::Path, time::Duration};
use tracing::debug;

use crate::error::{LobbybeeErrorKind, Result};
use crate::settings::WhatsappSettings;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Upload a file and return the provider's media id.
    async fn upload_media(&self, path: &Path, mime_type: &str) -> Result<String>;
    /// `None` when the provider no longer knows the id.
    async fn get_media_info(&self, media_id: &str) -> Result<Option<MediaInfo>>;
    async fn send_message(&self, to: &str, payload: &Value) -> Result<()>;
    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia>;
    /// Fetch media the provider links to directly, as Twilio's `MediaUrl0`.
    async fn download_url(&self, url: &str) -> Result<DownloadedMedia>;
}

#[derive(Debug, Clone)]
pub struct WhatsappClient {
    client: reqwest::Client,
    api_base: String,
    phone_number_id: String,
    access_token: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

/// Wrap an engine payload into a Cloud API message.
pub fn to_cloud_payload(to: &str, payload: &Value) -> Value {
    let mut message = match payload {
        Value::Object(map) if map.contains_key("type") => Value::Object(map.clone()),
        Value::Object(map) => match map.get("text") {
            Some(Value::String(body)) => json!({ "type": "text", "text": { "body": body } }),
            _ => Value::Object(map.clone()),
        },
        Value::String(body) => json!({ "type": "text", "text": { "body": body } }),
        other => json!({ "type": "text", "text": { "body": other.to_string() } }),
    };
    if let Value::Object(map) = &mut message {
        map.insert("messaging_product".to_owned(), json!("whatsapp"));
        map.insert("recipient_type".to_owned(), json!("individual"));
        map.insert("to".to_owned(), json!(to));
    }
    message
}

impl WhatsappClient {
    pub fn new(settings: &WhatsappSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_owned(),
            phone_number_id: settings.phone_number_id.clone(),
            access_token: settings.access_token.clone(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(LobbybeeErrorKind::Transport(format!("provider returned {status}: {body}")).into())
    }

    /// Download a body, preferring `mime_type` over the response header.
    async fn fetch(request: RequestBuilder, mime_type: Option<String>) -> Result<DownloadedMedia> {
        let response = Self::check(request.send().await?).await?;
        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await?.to_vec();
        let mime_type = mime_type
            .or(header_mime)
            .unwrap_or_else(|| "application/octet-stream".to_owned());
        Ok(DownloadedMedia { bytes, mime_type })
    }
}

#[async_trait]
impl Transport for WhatsappClient {
    async fn upload_media(&self, path: &Path, mime_type: &str) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_owned());
        let part = Part::bytes(bytes).file_name(file_name).mime_str(mime_type)?;
        let form = Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_owned())
            .part("file", part);

        let url = format!("{}/{}/media", self.api_base, self.phone_number_id);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::check(response).await?.json().await?;
        debug!(media_id = %uploaded.id, "uploaded media");
        Ok(uploaded.id)
    }

    async fn get_media_info(&self, media_id: &str) -> Result<Option<MediaInfo>> {
        let url = format!("{}/{}", self.api_base, media_id);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST | StatusCode::GONE
        ) {
            return Ok(None);
        }
        let info: MediaInfo = Self::check(response).await?.json().await?;
        Ok(Some(info))
    }

    async fn send_message(&self, to: &str, payload: &Value) -> Result<()> {
        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&to_cloud_payload(to, payload))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia> {
        let info = self.get_media_info(media_id).await?.ok_or_else(|| {
            LobbybeeErrorKind::Transport(format!("unknown media id {media_id}"))
        })?;
        let url = info.url.ok_or_else(|| {
            LobbybeeErrorKind::Transport(format!("media {media_id} has no download url"))
        })?;

        let request = self.client.get(url).bearer_auth(&self.access_token);
        Self::fetch(request, info.mime_type).await
    }

    async fn download_url(&self, url: &str) -> Result<DownloadedMedia> {
        Self::fetch(self.client.get(url), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_wrap_plain_text() {
        let wire = to_cloud_payload("1555", &json!({ "text": "Hello" }));
        assert_eq!(wire["type"], "text");
        assert_eq!(wire["text"]["body"], "Hello");
        assert_eq!(wire["to"], "1555");
        assert_eq!(wire["messaging_product"], "whatsapp");
    }

    #[test]
    fn it_should_pass_typed_payloads_through() {
        let payload = json!({ "type": "image", "image": { "id": "M1", "caption": "Lobby" } });
        let wire = to_cloud_payload("1555", &payload);
        assert_eq!(wire["image"]["id"], "M1");
        assert_eq!(wire["recipient_type"], "individual");
    }

    #[test]
    fn it_should_build_a_client_from_settings() {
        let settings = WhatsappSettings {
            api_base: "http://localhost:9/v20.0/".to_owned(),
            ..Default::default()
        };
        let client = WhatsappClient::new(&settings).unwrap();
        assert_eq!(client.api_base, "http://localhost:9/v20.0");
    }
}
