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

use sea_orm::DatabaseConnection;
pub use sea_orm_migration::prelude::*;

use crate::error::Result;

mod m20250301_000001_create_hotel;
mod m20250301_000002_create_guest;
mod m20250301_000003_create_stay;
mod m20250301_000004_create_whatsapp_media;
mod m20250301_000005_create_flow_template;
mod m20250301_000006_create_flow_step_template;
mod m20250301_000007_create_flow_step;
mod m20250301_000008_create_placeholder;
mod m20250301_000009_create_conversation_context;
mod m20250301_000010_create_conversation_message;
mod m20250301_000011_create_message_queue;
mod m20250301_000012_create_webhook_log;
mod m20250301_000013_create_notification;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_hotel::Migration),
            Box::new(m20250301_000002_create_guest::Migration),
            Box::new(m20250301_000003_create_stay::Migration),
            Box::new(m20250301_000004_create_whatsapp_media::Migration),
            Box::new(m20250301_000005_create_flow_template::Migration),
            Box::new(m20250301_000006_create_flow_step_template::Migration),
            Box::new(m20250301_000007_create_flow_step::Migration),
            Box::new(m20250301_000008_create_placeholder::Migration),
            Box::new(m20250301_000009_create_conversation_context::Migration),
            Box::new(m20250301_000010_create_conversation_message::Migration),
            Box::new(m20250301_000011_create_message_queue::Migration),
            Box::new(m20250301_000012_create_webhook_log::Migration),
            Box::new(m20250301_000013_create_notification::Migration),
        ]
    }
}

pub async fn migrate(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None).await?;
    Ok(())
}

/// Keep `updated_at` current on every row update. Timestamps are stored as
/// RFC 3339 text so they compare and decode like the ones written by the
/// application.
pub(crate) fn updated_at_trigger(table: &str) -> String {
    format!(
        "CREATE TRIGGER IF NOT EXISTS {table}_updated_at
        AFTER UPDATE ON {table}
        FOR EACH ROW
        BEGIN
            UPDATE {table}
            SET updated_at = (strftime('%Y-%m-%dT%H:%M:%f+00:00', 'now'))
            WHERE id = NEW.id;
        END;"
    )
}
