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

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "conversation_context")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: String,
    pub hotel_id: Option<String>,
    pub current_step_id: Option<i32>,
    pub navigation_stack: Json,
    pub context_data: Json,
    pub error_count: i32,
    pub is_active: bool,
    pub last_activity: DateTimeUtc,
    pub last_guest_message_at: Option<DateTimeUtc>,
    pub flow_expires_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::conversation_message::Entity")]
    ConversationMessage,
}

impl Related<super::conversation_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConversationMessage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
