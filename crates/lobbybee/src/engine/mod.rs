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

//! The conversational flow engine.
//!
//! One call handles one guest turn: expiry, navigation, validation, data
//! accumulation, actions, transition and rendering. Conversational outcomes
//! (invalid input, missing flows, finished flows) are replies, never errors;
//! `Err` only carries persistence and similar failures.

pub mod actions;
pub mod navigation;
pub mod step;
pub mod validate;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::data::{ContextData, Conversation};
use crate::db::{self, entities::flow_step_template};
use crate::error::Result;
use crate::server::api::ApiState;
use crate::settings::Settings;
use crate::{checkin, context, outbound, render};
use lobbybee_common::webhook::{InboundMessage, ReplyStatus, WebhookResponse, text_only};
use step::EffectiveStep;
use validate::Validation;

pub const SESSION_EXPIRED: &str = "Your session has expired. Returning to the main menu.";
pub const INVALID_STATE: &str = "Your conversation state is invalid. Returning to the main menu.";
pub const TOO_MANY_ERRORS: &str =
    "Too many consecutive errors. Conversation paused. Please start a new conversation.";
pub const FLOW_COMPLETED: &str = "Thank you. Conversation completed.";
pub const SERVICE_UNAVAILABLE: &str = "This service is currently unavailable.";
pub const NOT_CONFIGURED: &str = "This service is not configured correctly.";
pub const INVALID_HOTEL: &str = "Invalid hotel identifier.";
pub const NO_HOTELS: &str = "No hotels are configured.";

const START_PREFIX: &str = "start-";
const DEMO_COMMAND: &str = "demo";

/// What the engine answers for one turn.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub messages: Vec<Value>,
}

impl Reply {
    pub fn new(messages: Vec<Value>) -> Self {
        Self {
            status: ReplyStatus::Success,
            messages,
        }
    }

    pub fn text(status: ReplyStatus, text: &str) -> Self {
        Self {
            status,
            messages: vec![json!({ "text": text })],
        }
    }

    /// Prefix a notice onto a plain text reply, or send it as its own
    /// message ahead of structured payloads.
    pub fn with_notice(mut self, notice: &str) -> Self {
        match self.messages.first().and_then(text_only).map(str::to_owned) {
            Some(body) => self.messages[0] = json!({ "text": format!("{notice}\n\n{body}") }),
            None => self.messages.insert(0, json!({ "text": notice })),
        }
        self
    }

    pub fn into_response(self) -> WebhookResponse {
        WebhookResponse::new(self.status, self.messages)
    }
}

/// Deep links and `demo` always start over, even mid-conversation.
pub fn is_entry_command(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    text.starts_with(START_PREFIX) || text == DEMO_COMMAND
}

/// Route a turn to the active conversation or to initial contact. The
/// caller holds the user's turn lock.
pub async fn dispatch(
    state: &ApiState,
    inbound: &InboundMessage,
    media_id: Option<i32>,
) -> Result<Reply> {
    match context::get_active(state, &inbound.phone_number).await? {
        Some(conversation) if !is_entry_command(&inbound.text) => {
            handle_message(state, conversation, inbound, media_id).await
        }
        _ => handle_initial_contact(state, inbound, media_id).await,
    }
}

pub async fn handle_message(
    state: &ApiState,
    mut conversation: Conversation,
    inbound: &InboundMessage,
    media_id: Option<i32>,
) -> Result<Reply> {
    context::update_activity(state, &mut conversation, inbound, media_id).await?;
    let context_id = conversation.id;
    let hotel_id = conversation.hotel_id.clone();
    let reply = process(state, conversation, inbound).await?;
    finish_turn(state, context_id, &inbound.phone_number, hotel_id.as_deref(), &reply).await?;
    Ok(reply)
}

/// First message of a conversation: pick a hotel and a flow.
pub async fn handle_initial_contact(
    state: &ApiState,
    inbound: &InboundMessage,
    media_id: Option<i32>,
) -> Result<Reply> {
    let flows = &state.settings.flows;
    let user_id = inbound.phone_number.as_str();
    let text = inbound.text.trim();
    let lowered = text.to_lowercase();
    let guest = db::guest::get_by_number(user_id, &state.db).await?;

    let (category, hotel) = if lowered.starts_with(START_PREFIX) {
        let reference = text.get(START_PREFIX.len()..).unwrap_or_default().trim();
        match db::hotel::get_by_reference(reference, &state.db).await? {
            Some(hotel) => (flows.checkin.as_str(), Some(hotel)),
            None => {
                info!(user_id, reference, "unknown hotel in deep link");
                return Ok(Reply::text(ReplyStatus::Error, INVALID_HOTEL));
            }
        }
    } else if lowered == DEMO_COMMAND {
        let hotel = match db::hotel::get_demo(&state.db).await? {
            Some(hotel) => Some(hotel),
            None => db::hotel::get_default(&state.db).await?,
        };
        (flows.demo.as_str(), hotel)
    } else {
        match &guest {
            Some(guest) => {
                let stay = db::stay::get_active(guest.id, None, Utc::now(), &state.db).await?;
                match stay {
                    Some(stay) => (
                        flows.in_stay.as_str(),
                        db::hotel::get_by_id(&stay.hotel_id, &state.db).await?,
                    ),
                    None => (
                        flows.returning.as_str(),
                        db::hotel::get_default(&state.db).await?,
                    ),
                }
            }
            None => (
                flows.discovery.as_str(),
                db::hotel::get_default(&state.db).await?,
            ),
        }
    };
    let Some(hotel) = hotel else {
        warn!(user_id, category, "no hotel available for a new conversation");
        return Ok(Reply::text(ReplyStatus::Error, NO_HOTELS));
    };

    let mut data = ContextData::new();
    match &guest {
        Some(guest) => data.set_guest_id(guest.id),
        None => data.mark_temp_guest(user_id),
    }
    let mut conversation =
        context::get_or_create(state, user_id, Some(&hotel.id), data.clone()).await?;
    conversation.data = data;
    conversation.navigation_stack.clear();
    conversation.current_step_id = None;
    conversation.error_count = 0;
    context::update_activity(state, &mut conversation, inbound, media_id).await?;
    info!(user_id, hotel_id = %hotel.id, category, "starting conversation");

    let context_id = conversation.id;
    let reply = start_flow(state, conversation, category).await?;
    finish_turn(state, context_id, user_id, Some(&hotel.id), &reply).await?;
    Ok(reply)
}

async fn finish_turn(
    state: &ApiState,
    context_id: i32,
    user_id: &str,
    hotel_id: Option<&str>,
    reply: &Reply,
) -> Result<()> {
    context::log_outbound(state, context_id, &reply.messages).await?;
    if state.settings.delivery.send_replies {
        for payload in &reply.messages {
            outbound::deliver(state, user_id, hotel_id, payload).await?;
        }
    }
    Ok(())
}

async fn process(
    state: &ApiState,
    mut conversation: Conversation,
    inbound: &InboundMessage,
) -> Result<Reply> {
    if conversation.is_expired(Utc::now()) {
        info!(user_id = %conversation.user_id, "session expired");
        return navigation::main_menu(state, conversation, SESSION_EXPIRED).await;
    }

    match inbound.text.trim().to_lowercase().as_str() {
        "back" => return navigation::back(state, conversation).await,
        "main menu" => {
            return navigation::main_menu(state, conversation, navigation::MAIN_MENU_NOTICE).await;
        }
        _ => {}
    }

    let step = match conversation.current_step_id {
        Some(id) => step::load(id, &state.db).await?,
        None => None,
    };
    let Some(step) = step else {
        warn!(
            user_id = %conversation.user_id,
            step_id = ?conversation.current_step_id,
            "conversation has no usable step"
        );
        return navigation::main_menu(state, conversation, INVALID_STATE).await;
    };

    match validate::validate(&step, inbound) {
        Validation::Invalid(message) => return register_error(state, conversation, message).await,
        Validation::Jump(category) => {
            conversation.error_count = 0;
            let checkin = &state.settings.flows.checkin;
            if step.category == *checkin && category != *checkin {
                checkin::finalize(state, &mut conversation).await?;
            }
            info!(
                user_id = %conversation.user_id,
                from = %step.category,
                category = %category,
                "jumping to another flow"
            );
            return start_flow(state, conversation, &category).await;
        }
        Validation::Valid => conversation.error_count = 0,
    }

    accumulate(&state.settings, &mut conversation, &step, inbound);
    actions::run(state, &mut conversation, &step, inbound).await?;
    transition(state, conversation, &step, inbound.text.trim()).await
}

async fn register_error(
    state: &ApiState,
    mut conversation: Conversation,
    message: String,
) -> Result<Reply> {
    conversation.error_count += 1;
    if conversation.error_count >= state.settings.session.max_errors {
        conversation.is_active = false;
        db::context::save(&conversation, &state.db).await?;
        warn!(
            user_id = %conversation.user_id,
            error_count = conversation.error_count,
            "too many consecutive errors, conversation paused"
        );
        return Ok(Reply::text(ReplyStatus::Error, TOO_MANY_ERRORS));
    }
    db::context::save(&conversation, &state.db).await?;
    debug!(
        user_id = %conversation.user_id,
        error_count = conversation.error_count,
        "invalid input"
    );
    Ok(Reply::text(ReplyStatus::Success, &message))
}

fn normalize_key(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Key an answer is stored under: the explicit `data_key`, else the step
/// name with `collect` removed. Media answers get a `_media_id` suffix.
pub fn data_key(step: &EffectiveStep, media: bool) -> Option<String> {
    let base = match &step.data_key {
        Some(key) => Some(normalize_key(key)),
        None => {
            let name = step.step_name.to_lowercase();
            name.contains("collect")
                .then(|| normalize_key(&name.replace("collect", "")))
        }
    };
    base.filter(|key| !key.is_empty())
        .map(|key| if media { format!("{key}_media_id") } else { key })
}

/// Store an answer; check-in answers are also kept for finalization.
pub(crate) fn store_answer(
    settings: &Settings,
    conversation: &mut Conversation,
    step: &EffectiveStep,
    key: &str,
    value: &str,
) {
    conversation.data.accumulate(key, value);
    if step.category == settings.flows.checkin {
        conversation.data.collect_checkin(key, value);
    }
}

fn accumulate(
    settings: &Settings,
    conversation: &mut Conversation,
    step: &EffectiveStep,
    inbound: &InboundMessage,
) {
    if let Some(key) = data_key(step, inbound.kind.is_media()) {
        store_answer(settings, conversation, step, &key, inbound.text.trim());
    }
}

enum Next {
    Step(flow_step_template::Model),
    End,
    Broken,
}

async fn next_template(state: &ApiState, step: &EffectiveStep, input: &str) -> Result<Next> {
    for token in [input, "*"] {
        let Some(target) = step.conditional_target(token) else {
            continue;
        };
        if let Some(id) = target {
            if let Some(template) = db::template::get_step_template(id, &state.db).await? {
                return Ok(Next::Step(template));
            }
        }
        warn!(
            step = %step.step_name,
            token,
            "conditional target does not resolve, using the default"
        );
        break;
    }

    match step.next_step_template_id {
        None => Ok(Next::End),
        Some(id) => match db::template::get_step_template(id, &state.db).await? {
            Some(template) => Ok(Next::Step(template)),
            None => {
                warn!(step = %step.step_name, next = id, "default transition does not resolve");
                Ok(Next::Broken)
            }
        },
    }
}

async fn transition(
    state: &ApiState,
    mut conversation: Conversation,
    step: &EffectiveStep,
    input: &str,
) -> Result<Reply> {
    let checkin = state.settings.flows.checkin.as_str();
    match next_template(state, step, input).await? {
        Next::Step(target) => {
            if step.category == checkin {
                let category = db::template::get_flow(target.flow_template_id, &state.db)
                    .await?
                    .map(|flow| flow.category);
                if category.as_deref() != Some(checkin) {
                    checkin::finalize(state, &mut conversation).await?;
                }
            }
            enter_step(state, conversation, target.id).await
        }
        Next::End => {
            if step.category == checkin {
                checkin::finalize(state, &mut conversation).await?;
            }
            conversation.is_active = false;
            conversation.current_step_id = None;
            db::context::save(&conversation, &state.db).await?;
            info!(user_id = %conversation.user_id, category = %step.category, "flow completed");
            Ok(Reply::text(ReplyStatus::Success, FLOW_COMPLETED))
        }
        Next::Broken => config_failure(state, &conversation, NOT_CONFIGURED).await,
    }
}

async fn config_failure(
    state: &ApiState,
    conversation: &Conversation,
    message: &str,
) -> Result<Reply> {
    db::context::save(conversation, &state.db).await?;
    Ok(Reply::text(ReplyStatus::Error, message))
}

/// Enter the entry step of the active flow of `category` with a fresh
/// navigation stack.
pub async fn start_flow(
    state: &ApiState,
    mut conversation: Conversation,
    category: &str,
) -> Result<Reply> {
    let Some(flow) = db::template::get_active_flow(category, &state.db).await? else {
        warn!(user_id = %conversation.user_id, category, "no active flow for category");
        return config_failure(state, &conversation, SERVICE_UNAVAILABLE).await;
    };
    let Some(entry) = db::template::get_entry_step(flow.id, &state.db).await? else {
        warn!(user_id = %conversation.user_id, category, "flow has no steps");
        return config_failure(state, &conversation, NOT_CONFIGURED).await;
    };
    conversation.navigation_stack.clear();
    enter_step(state, conversation, entry.id).await
}

async fn enter_step(
    state: &ApiState,
    mut conversation: Conversation,
    template_id: i32,
) -> Result<Reply> {
    let row =
        db::flow_step::get_or_create(template_id, conversation.hotel_id.as_deref(), &state.db)
            .await?;
    let Some(step) = step::load(row.id, &state.db).await? else {
        warn!(user_id = %conversation.user_id, template_id, "step template vanished");
        return config_failure(state, &conversation, NOT_CONFIGURED).await;
    };

    conversation.current_step_id = Some(row.id);
    conversation.navigation_stack.push(row.id);
    conversation.last_activity = Utc::now();
    conversation.flow_expires_at = Some(context::session_deadline(&state.settings));
    db::context::save(&conversation, &state.db).await?;
    debug!(
        user_id = %conversation.user_id,
        step = %step.step_name,
        category = %step.category,
        "entered step"
    );

    Ok(Reply::new(render::render_step(state, &conversation, &step).await?))
}
