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

/// Per-hotel customization of a step template. `None` fields fall back to
/// the template.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "flow_step")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub template_id: i32,
    pub hotel_id: Option<String>,
    pub message_template: Option<Json>,
    pub message_type: Option<String>,
    pub options: Option<Json>,
    pub media_id: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::flow_step_template::Entity",
        from = "Column::TemplateId",
        to = "super::flow_step_template::Column::Id",
        on_delete = "Cascade"
    )]
    FlowStepTemplate,
}

impl Related<super::flow_step_template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FlowStepTemplate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
