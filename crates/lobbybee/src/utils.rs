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

//! Test harness: in-memory database, a recording transport and a small
//! flow bundle exercising every engine path.

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use lobbybee_common::flow::FlowBundle;
use lobbybee_common::webhook::{InboundKind, InboundMessage};
use sea_orm::Database;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tempfile::TempDir;

use crate::db::{self, entities::whatsapp_media, migration::Migrator};
use crate::engine::step::{EffectiveStep, MessageType};
use crate::error::{LobbybeeErrorKind, Result};
use crate::import;
use crate::locks::KeyedLocks;
use crate::server::api::ApiState;
use crate::settings::Settings;
use crate::transport::{DownloadedMedia, MediaInfo, Transport};
use sea_orm_migration::MigratorTrait;

#[derive(Default)]
pub struct MockTransport {
    valid: Mutex<HashSet<String>>,
    downloads: Mutex<HashMap<String, DownloadedMedia>>,
    sent: Mutex<Vec<(String, Value)>>,
    uploads: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_sends: AtomicBool,
}

impl MockTransport {
    pub fn add_valid_media(&self, id: &str) {
        self.valid.lock().unwrap().insert(id.to_owned());
    }

    /// Serve `bytes` for a provider media id or a direct URL.
    pub fn add_download(&self, id: &str, bytes: &[u8], mime_type: &str) {
        self.downloads.lock().unwrap().insert(
            id.to_owned(),
            DownloadedMedia {
                bytes: bytes.to_vec(),
                mime_type: mime_type.to_owned(),
            },
        );
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn upload_media(&self, _path: &Path, _mime_type: &str) -> Result<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(LobbybeeErrorKind::Transport("upload rejected".to_owned()).into());
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("WA-UPLOAD-{n}");
        self.add_valid_media(&id);
        Ok(id)
    }

    async fn get_media_info(&self, media_id: &str) -> Result<Option<MediaInfo>> {
        let known = self.valid.lock().unwrap().contains(media_id);
        Ok(known.then(|| MediaInfo {
            id: media_id.to_owned(),
            url: None,
            mime_type: None,
            file_size: None,
        }))
    }

    async fn send_message(&self, to: &str, payload: &Value) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(LobbybeeErrorKind::Transport("send rejected".to_owned()).into());
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_owned(), payload.clone()));
        Ok(())
    }

    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia> {
        self.downloads
            .lock()
            .unwrap()
            .get(media_id)
            .cloned()
            .ok_or_else(|| LobbybeeErrorKind::Transport(format!("unknown media {media_id}")).into())
    }

    async fn download_url(&self, url: &str) -> Result<DownloadedMedia> {
        self.download_media(url).await
    }
}

async fn state_with(settings: Settings) -> (ApiState, Arc<MockTransport>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::refresh(&db).await.unwrap();
    let transport = Arc::new(MockTransport::default());
    let state = ApiState {
        db,
        auth: "test".into(),
        settings: Arc::new(settings),
        transport: transport.clone(),
        turns: KeyedLocks::new(),
        drains: KeyedLocks::new(),
    };
    (state, transport)
}

pub async fn get_test_state() -> (ApiState, Arc<MockTransport>) {
    state_with(Settings::default()).await
}

pub async fn get_fixture_state() -> ApiState {
    let (state, _) = get_test_state().await;
    import::import_bundle(&fixture_bundle(), Path::new("media"), &state.db)
        .await
        .unwrap();
    state
}

/// Fixture state whose `media_dir` is a fresh temporary directory.
pub async fn media_dir_state() -> (ApiState, Arc<MockTransport>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        media_dir: dir.path().to_path_buf(),
        ..Settings::default()
    };
    let (state, transport) = state_with(settings).await;
    import::import_bundle(&fixture_bundle(), dir.path(), &state.db)
        .await
        .unwrap();
    (state, transport, dir)
}

pub async fn get_test_server(app: Router<ApiState>) -> (TestServer, ApiState) {
    let state = get_fixture_state().await;
    let server = TestServer::new(app.with_state(state.clone())).unwrap();
    (server, state)
}

pub async fn media_fixture(
    state: &ApiState,
    mime_type: &str,
    whatsapp_media_id: Option<&str>,
) -> whatsapp_media::Model {
    db::media::create("fixture.bin", mime_type, 4, whatsapp_media_id, &state.db)
        .await
        .unwrap()
}

pub fn inbound(user_id: &str, text: &str, kind: InboundKind) -> InboundMessage {
    InboundMessage {
        phone_number: user_id.to_owned(),
        text: text.to_owned(),
        kind,
        media_id: None,
        media_url: None,
    }
}

/// Id of the H1 hotel's row for the named step.
pub async fn step_id_by_name(state: &ApiState, step_name: &str, category: &str) -> i32 {
    let flow = db::template::get_active_flow(category, &state.db)
        .await
        .unwrap()
        .unwrap();
    let template = db::template::list_steps(flow.id, &state.db)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.step_name == step_name)
        .unwrap();
    db::flow_step::get_or_create(template.id, Some("H1"), &state.db)
        .await
        .unwrap()
        .id
}

pub fn bare_step(step_name: &str) -> EffectiveStep {
    EffectiveStep {
        id: 1,
        template_id: 1,
        flow_template_id: 1,
        category: "random_guest".to_owned(),
        step_name: step_name.to_owned(),
        message_template: json!(""),
        message_type: MessageType::Text,
        options: Vec::new(),
        actions: Vec::new(),
        next_step_template_id: None,
        conditional_next_steps: HashMap::new(),
        allowed_flow_categories: Vec::new(),
        media_id: None,
        data_key: None,
    }
}

pub fn fixture_bundle() -> FlowBundle {
    FlowBundle::from_json(
        r#"{
        "hotels": [
            {
                "id": "H1",
                "name": "Seaside Inn",
                "unique_qr_code": "seaside",
                "wifi_password": "waves"
            },
            { "id": "DEMO", "name": "Demo Hotel", "is_demo": true }
        ],
        "placeholders": [
            { "name": "guest_name", "resolving_logic": "guest.full_name" },
            { "name": "hotel_name", "resolving_logic": "hotel.name" },
            { "name": "wifi", "resolving_logic": "hotel.wifi_password" }
        ],
        "flows": [
            {
                "name": "Main Menu",
                "category": "main_menu",
                "steps": [{
                    "key": "menu",
                    "step_name": "Main Menu",
                    "message_template": "How can we help?",
                    "options": { "1": "Check in", "2": "Services" },
                    "conditional_next_steps": { "1": "checkin_start", "2": "services_start" },
                    "allowed_flow_categories": ["in_stay_services"]
                }]
            },
            {
                "name": "Discovery",
                "category": "random_guest",
                "steps": [
                    {
                        "key": "welcome",
                        "step_name": "Welcome",
                        "order": 1,
                        "message_template": "Welcome to {hotel_name}!",
                        "options": { "1": "Create Account" },
                        "next_step": "full_name"
                    },
                    {
                        "key": "full_name",
                        "step_name": "Collect Full Name",
                        "order": 2,
                        "message_template": "What is your full name?",
                        "next_step": "email"
                    },
                    {
                        "key": "email",
                        "step_name": "Collect Email",
                        "order": 3,
                        "message_template": "Thanks {full_name}, what is your email?"
                    }
                ]
            },
            {
                "name": "Check-in",
                "category": "hotel_checkin",
                "steps": [
                    {
                        "key": "checkin_start",
                        "step_name": "Check-in Welcome",
                        "order": 1,
                        "message_template": "Welcome to {hotel_name}. Ready to check in?",
                        "options": { "1": "Yes", "2": "No" },
                        "conditional_next_steps": { "1": "checkin_name", "2": "menu" }
                    },
                    {
                        "key": "checkin_name",
                        "step_name": "Guest Name",
                        "order": 2,
                        "message_template": "Please tell us your full name.",
                        "actions": ["validate_guest_name"],
                        "next_step": "checkin_photo"
                    },
                    {
                        "key": "checkin_photo",
                        "step_name": "ID Photo Upload",
                        "order": 3,
                        "message_template": "Please send a photo of your ID.",
                        "message_type": "media",
                        "actions": ["save_document"],
                        "next_step": "checkin_confirm"
                    },
                    {
                        "key": "checkin_confirm",
                        "step_name": "Confirm Details",
                        "order": 4,
                        "message_template": "Thanks {guest_name}, please confirm.",
                        "options": { "1": "Confirm", "2": "Services" },
                        "conditional_next_steps": { "2": "services_start" },
                        "allowed_flow_categories": ["in_stay_services"]
                    }
                ]
            },
            {
                "name": "Services",
                "category": "in_stay_services",
                "steps": [
                    {
                        "key": "services_start",
                        "step_name": "Services",
                        "order": 1,
                        "message_template": "Services menu",
                        "options": { "1": "Late checkout" },
                        "actions": [{
                            "type": "send_notification",
                            "title": "Late checkout",
                            "message": "{guest_name} requests late checkout"
                        }],
                        "conditional_next_steps": { "*": "services_ack" }
                    },
                    {
                        "key": "services_ack",
                        "step_name": "Request Received",
                        "order": 2,
                        "message_template": "We'll get back to you."
                    }
                ]
            }
        ]
    }"#,
    )
    .unwrap()
}
