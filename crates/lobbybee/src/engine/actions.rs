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

//! Side effects a step runs once its input has been accepted.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::step::EffectiveStep;
use crate::data::Conversation;
use crate::error::Result;
use crate::notify::notify;
use crate::render::placeholder::{Sources, Substitutions};
use crate::server::api::ApiState;
use lobbybee_common::webhook::InboundMessage;

fn default_title() -> String {
    "Guest request".to_owned()
}

/// Actions are authored either as a bare name or as `{"type": name, ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    ValidateGuestName,
    SaveDocument,
    SendNotification {
        #[serde(default = "default_title")]
        title: String,
        #[serde(default)]
        message: String,
    },
    StartRelay {
        #[serde(default)]
        department: String,
    },
}

impl Action {
    /// `None`, with a warning, for anything that is not a known action.
    pub fn parse(descriptor: &Value) -> Option<Self> {
        let tagged = match descriptor {
            Value::String(name) => json!({ "type": name }),
            other => other.clone(),
        };
        match serde_json::from_value(tagged) {
            Ok(action) => Some(action),
            Err(err) => {
                warn!(action = %descriptor, error = %err, "skipping unknown action");
                None
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub async fn run(
    state: &ApiState,
    conversation: &mut Conversation,
    step: &EffectiveStep,
    inbound: &InboundMessage,
) -> Result<()> {
    for action in &step.actions {
        debug!(user_id = %conversation.user_id, step = %step.step_name, ?action, "running action");
        match action {
            Action::ValidateGuestName => {
                let name = collapse_whitespace(&inbound.text);
                if !name.is_empty() {
                    super::store_answer(&state.settings, conversation, step, "guest_name", &name);
                }
            }
            Action::SaveDocument => {
                if !inbound.kind.is_media() {
                    debug!(user_id = %conversation.user_id, "no document attached");
                    continue;
                }
                let document = inbound
                    .media_id
                    .as_deref()
                    .or(inbound.media_url.as_deref())
                    .unwrap_or(inbound.text.as_str());
                super::store_answer(
                    &state.settings,
                    conversation,
                    step,
                    "id_document_media_id",
                    document,
                );
            }
            Action::SendNotification { title, message } => {
                let sources = Sources::load(conversation, &state.db).await?;
                let template = Value::String(message.clone());
                let subs = Substitutions::prepare(&template, &sources, &state.db).await?;
                notify(
                    state,
                    conversation.hotel_id.as_deref(),
                    Some(&conversation.user_id),
                    title,
                    &subs.substitute(message),
                    None,
                )
                .await;
            }
            Action::StartRelay { department } => {
                conversation.data.set("relay_department", json!(department));
                let message = format!(
                    "Guest {} asked to be connected with {department}.",
                    conversation.user_id
                );
                notify(
                    state,
                    conversation.hotel_id.as_deref(),
                    Some(&conversation.user_id),
                    "Guest relay request",
                    &message,
                    None,
                )
                .await;
            }
        }
    }
    Ok(())
}
