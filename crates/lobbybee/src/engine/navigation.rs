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

//! `back` and `main menu`.

use chrono::Utc;
use tracing::{info, warn};

use super::{Reply, SERVICE_UNAVAILABLE, step};
use crate::context;
use crate::data::Conversation;
use crate::db;
use crate::error::Result;
use crate::render::render_step;
use crate::server::api::ApiState;
use lobbybee_common::webhook::ReplyStatus;

pub const MAIN_MENU_NOTICE: &str = "Returning to the main menu.";
pub const AT_BEGINNING: &str = "You are at the beginning. Returning to main menu.";
pub const BACK_FAILED: &str = "Could not navigate back. Returning to main menu.";

/// Clear the conversation and start the first configured main menu flow.
pub async fn main_menu(
    state: &ApiState,
    mut conversation: Conversation,
    notice: &str,
) -> Result<Reply> {
    context::reset(state, &mut conversation).await?;

    let mut menu = None;
    for category in &state.settings.flows.main_menu {
        if db::template::get_active_flow(category, &state.db)
            .await?
            .is_some()
        {
            menu = Some(category.as_str());
            break;
        }
    }

    let reply = match menu {
        Some(category) => super::start_flow(state, conversation, category).await?,
        None => {
            warn!(user_id = %conversation.user_id, "no main menu flow is configured");
            Reply::text(ReplyStatus::Error, SERVICE_UNAVAILABLE)
        }
    };
    Ok(reply.with_notice(notice))
}

/// Pop one step. With nothing left to pop this is `main menu`.
pub async fn back(state: &ApiState, mut conversation: Conversation) -> Result<Reply> {
    if conversation.navigation_stack.len() <= 1 {
        return main_menu(state, conversation, AT_BEGINNING).await;
    }
    conversation.navigation_stack.pop();
    let Some(&previous) = conversation.navigation_stack.last() else {
        return main_menu(state, conversation, AT_BEGINNING).await;
    };
    let Some(step) = step::load(previous, &state.db).await? else {
        warn!(
            user_id = %conversation.user_id,
            step_id = previous,
            "previous step no longer exists"
        );
        return main_menu(state, conversation, BACK_FAILED).await;
    };

    conversation.current_step_id = Some(previous);
    conversation.error_count = 0;
    conversation.last_activity = Utc::now();
    conversation.flow_expires_at = Some(context::session_deadline(&state.settings));
    db::context::save(&conversation, &state.db).await?;
    info!(user_id = %conversation.user_id, step = %step.step_name, "navigated back");

    Ok(Reply::new(render_step(state, &conversation, &step).await?))
}
