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
#[sea_orm(table_name = "conversation_message")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub context_id: i32,
    pub message_content: String,
    pub is_from_guest: bool,
    pub message_type: String,
    pub media_id: Option<i32>,
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::conversation_context::Entity",
        from = "Column::ContextId",
        to = "super::conversation_context::Column::Id",
        on_delete = "Cascade"
    )]
    ConversationContext,
}

impl Related<super::conversation_context::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConversationContext.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
