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

//! Check-in finalization: turns collected answers into a guest record.

use tracing::info;

use crate::data::Conversation;
use crate::db::{self, entities::guest};
use crate::error::Result;
use crate::server::api::ApiState;

/// Create or update the guest behind this conversation from its
/// `collected_checkin_data`, link it and drop the scratch keys. The caller
/// persists the conversation.
pub async fn finalize(state: &ApiState, conversation: &mut Conversation) -> Result<guest::Model> {
    let collected = conversation.data.checkin_data();
    let number = conversation
        .data
        .temp_whatsapp_number()
        .unwrap_or(conversation.user_id.as_str())
        .to_owned();
    let was_temp = conversation.data.is_temp_guest();

    let guest = db::guest::upsert_from_checkin(&number, &collected, &state.db).await?;
    conversation.data.set_guest_id(guest.id);
    conversation.data.clear_checkin_scratch();

    info!(
        user_id = %conversation.user_id,
        hotel_id = ?conversation.hotel_id,
        guest_id = guest.id,
        fields = collected.len(),
        was_temp,
        "check-in finalized"
    );
    Ok(guest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ContextData;
    use crate::utils::get_test_state;

    #[tokio::test]
    async fn it_should_create_a_guest_from_collected_data() {
        let (state, _) = get_test_state().await;
        let mut data = ContextData::new();
        data.mark_temp_guest("15550001111");
        data.collect_checkin("full_name", "John Doe");
        data.collect_checkin("email", "john@example.com");
        let mut conversation = db::context::get_or_create(
            "15550001111",
            None,
            data,
            chrono::Utc::now(),
            &state.db,
        )
        .await
        .unwrap();

        let guest = finalize(&state, &mut conversation).await.unwrap();
        assert_eq!(guest.full_name.as_deref(), Some("John Doe"));
        assert_eq!(guest.email.as_deref(), Some("john@example.com"));
        assert_eq!(conversation.data.guest_id(), Some(guest.id));
        assert!(!conversation.data.is_temp_guest());
        assert!(conversation.data.checkin_data().is_empty());
    }

    #[tokio::test]
    async fn it_should_update_an_existing_guest() {
        let (state, _) = get_test_state().await;
        let existing = db::guest::create("15550001111", Some("Johnny"), &state.db)
            .await
            .unwrap();
        let mut data = ContextData::new();
        data.set_guest_id(existing.id);
        data.collect_checkin("nationality", "PT");
        let mut conversation = db::context::get_or_create(
            "15550001111",
            None,
            data,
            chrono::Utc::now(),
            &state.db,
        )
        .await
        .unwrap();

        let guest = finalize(&state, &mut conversation).await.unwrap();
        assert_eq!(guest.id, existing.id);
        assert_eq!(guest.full_name.as_deref(), Some("Johnny"));
        assert_eq!(guest.nationality.as_deref(), Some("PT"));
    }
}
