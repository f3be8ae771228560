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

//! Staff notifications, stored for the dashboard. Failures are logged and
//! never reach the guest.

use tracing::{error, info};

use crate::db;
use crate::server::api::ApiState;

pub async fn notify(
    state: &ApiState,
    hotel_id: Option<&str>,
    guest_number: Option<&str>,
    title: &str,
    message: &str,
    link: Option<&str>,
) {
    match db::notification::create(hotel_id, guest_number, title, message, link, &state.db).await
    {
        Ok(entry) => {
            info!(notification_id = entry.id, hotel_id = ?hotel_id, title, "staff notified")
        }
        Err(err) => {
            error!(hotel_id = ?hotel_id, title, error = %err, "failed to store notification")
        }
    }
}
