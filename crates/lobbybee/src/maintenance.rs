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

//! Maintenance jobs shared by the CLI and the admin API.

use chrono::{Duration, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::info;

use crate::db;
use crate::error::Result;
use crate::settings::Settings;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Cleanup {
    pub contexts: u64,
    pub queued: u64,
}

/// Delete contexts idle for longer than `session.stale_after_days`, along
/// with their transcripts.
pub async fn cleanup(settings: &Settings, db: &DatabaseConnection) -> Result<Cleanup> {
    let cutoff = Utc::now() - Duration::days(settings.session.stale_after_days);
    let contexts = db::context::delete_stale(cutoff, db).await?;
    info!(contexts, %cutoff, "deleted stale contexts");
    Ok(Cleanup {
        contexts,
        queued: 0,
    })
}

/// Forget every conversation held with the demo hotels.
pub async fn reset_demo(db: &DatabaseConnection) -> Result<Cleanup> {
    let hotels = db::hotel::list_demo_ids(db).await?;
    if hotels.is_empty() {
        info!("no demo hotels to reset");
        return Ok(Cleanup::default());
    }
    let queued = db::queue::delete_by_hotels(&hotels, db).await?;
    let contexts = db::context::delete_by_hotels(&hotels, db).await?;
    info!(hotels = hotels.len(), contexts, queued, "reset demo conversations");
    Ok(Cleanup { contexts, queued })
}

pub async fn wipe_user(user_id: &str, db: &DatabaseConnection) -> Result<Cleanup> {
    let queued = db::queue::delete_by_user(user_id, db).await?;
    let contexts = db::context::delete_by_user(user_id, db).await?;
    info!(user_id, contexts, queued, "wiped user data");
    Ok(Cleanup { contexts, queued })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ContextData, Conversation};
    use crate::server::api::ApiState;
    use crate::utils::get_fixture_state;
    use serde_json::json;

    async fn open_context(state: &ApiState, user_id: &str, hotel_id: Option<&str>) -> Conversation {
        db::context::get_or_create(user_id, hotel_id, ContextData::new(), Utc::now(), &state.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn it_should_delete_only_stale_contexts() {
        let state = get_fixture_state().await;
        let mut stale = open_context(&state, "15550001111", None).await;
        db::message::create(stale.id, "hi", true, "text", None, &state.db)
            .await
            .unwrap();
        stale.last_activity = Utc::now() - Duration::days(8);
        db::context::save(&stale, &state.db).await.unwrap();
        open_context(&state, "15550002222", None).await;

        let result = cleanup(&state.settings, &state.db).await.unwrap();
        assert_eq!(result.contexts, 1);
        assert!(db::context::get_by_id(stale.id, &state.db).await.unwrap().is_none());
        assert!(db::message::list_by_context(stale.id, None, None, &state.db)
            .await
            .unwrap()
            .is_empty());
        assert!(db::context::get_active("15550002222", &state.db).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn it_should_reset_demo_conversations() {
        let state = get_fixture_state().await;
        open_context(&state, "15550001111", Some("DEMO")).await;
        open_context(&state, "15550002222", Some("H1")).await;
        let payload = json!({ "text": "x" });
        db::queue::create("15550001111", Some("DEMO"), "text", &payload, Utc::now(), &state.db)
            .await
            .unwrap();

        let result = reset_demo(&state.db).await.unwrap();
        assert_eq!(result, Cleanup { contexts: 1, queued: 1 });
        assert!(db::context::get_active("15550002222", &state.db).await.unwrap().is_some());
    }
}
