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

//! Stay reminders, queued ahead of time when a stay is registered.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, info};

use crate::db::entities::{guest, stay};
use crate::error::Result;
use crate::outbound;
use crate::server::api::ApiState;
use crate::settings::ReminderSettings;

pub const EXTENSION_REMINDER: &str = "extend_checkin";

/// When the guest is offered an extension: a fixed delay after check-in,
/// longer for stays of a day or more.
pub fn extension_due(settings: &ReminderSettings, stay: &stay::Model) -> DateTime<Utc> {
    let length = stay.check_out_date - stay.check_in_date;
    let hours = if length >= Duration::hours(24) {
        settings.long_stay_hours
    } else {
        settings.short_stay_hours
    };
    stay.check_in_date + Duration::hours(hours)
}

/// Queue the extension offer for a new stay. Returns the queue id, or
/// `None` when reminders are off or the stay ends first.
pub async fn schedule_extension(
    state: &ApiState,
    guest: &guest::Model,
    stay: &stay::Model,
) -> Result<Option<i32>> {
    let settings = &state.settings.reminders;
    if !settings.enabled {
        return Ok(None);
    }
    let due = extension_due(settings, stay);
    if due >= stay.check_out_date {
        debug!(stay_id = stay.id, "stay ends before the extension reminder");
        return Ok(None);
    }

    let payload = json!({ "text": settings.extension_message });
    let id = outbound::schedule(
        state,
        &guest.whatsapp_number,
        Some(&stay.hotel_id),
        EXTENSION_REMINDER,
        &payload,
        due,
    )
    .await?;
    info!(
        stay_id = stay.id,
        guest_id = guest.id,
        queue_id = id,
        %due,
        "scheduled extension reminder"
    );
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::settings::Settings;
    use crate::utils::get_fixture_state;
    use std::sync::Arc;

    fn stay_of(hours: i64) -> stay::Model {
        let check_in = Utc::now();
        stay::Model {
            id: 1,
            guest_id: 1,
            hotel_id: "H1".to_owned(),
            room_number: None,
            check_in_date: check_in,
            check_out_date: check_in + Duration::hours(hours),
            status: "active".to_owned(),
            created_at: check_in,
        }
    }

    async fn register(state: &ApiState, stay_hours: i64) -> (guest::Model, stay::Model) {
        let guest = db::guest::create("15550001111", Some("Ana"), &state.db)
            .await
            .unwrap();
        let check_in = Utc::now();
        let stay = db::stay::create(
            guest.id,
            "H1",
            Some("101"),
            check_in,
            check_in + Duration::hours(stay_hours),
            "active",
            &state.db,
        )
        .await
        .unwrap();
        (guest, stay)
    }

    #[test]
    fn it_should_pick_the_delay_from_the_stay_length() {
        let settings = ReminderSettings::default();
        let short = stay_of(12);
        assert_eq!(extension_due(&settings, &short), short.check_in_date + Duration::hours(11));
        let long = stay_of(48);
        assert_eq!(extension_due(&settings, &long), long.check_in_date + Duration::hours(23));
    }

    #[tokio::test]
    async fn it_should_queue_the_extension_offer() {
        let state = get_fixture_state().await;
        let (guest, stay) = register(&state, 48).await;

        let id = schedule_extension(&state, &guest, &stay).await.unwrap().unwrap();
        let rows = db::queue::list_by_user("15550001111", &state.db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].message_type, EXTENSION_REMINDER);
        assert_eq!(rows[0].hotel_id.as_deref(), Some("H1"));
        let expected = stay.check_in_date + Duration::hours(23);
        assert!((rows[0].scheduled_time - expected).abs() < Duration::seconds(1));
        assert_eq!(
            rows[0].message_content,
            json!({ "text": "Would you like to extend your check-in?" })
        );
    }

    #[tokio::test]
    async fn it_should_skip_stays_that_end_first() {
        let state = get_fixture_state().await;
        let (guest, stay) = register(&state, 6).await;
        assert_eq!(schedule_extension(&state, &guest, &stay).await.unwrap(), None);
        assert!(db::queue::list_by_user("15550001111", &state.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn it_should_not_schedule_when_disabled() {
        let mut state = get_fixture_state().await;
        state.settings = Arc::new(Settings {
            reminders: ReminderSettings {
                enabled: false,
                ..ReminderSettings::default()
            },
            ..(*state.settings).clone()
        });
        let (guest, stay) = register(&state, 48).await;
        assert_eq!(schedule_extension(&state, &guest, &stay).await.unwrap(), None);
        assert!(db::queue::list_by_user("15550001111", &state.db).await.unwrap().is_empty());
    }
}
