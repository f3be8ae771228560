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
#[sea_orm(table_name = "flow_step_template")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub flow_template_id: i32,
    pub step_name: String,
    pub step_order: i32,
    pub message_template: Json,
    pub message_type: String,
    pub options: Json,
    pub actions: Json,
    pub next_step_template_id: Option<i32>,
    pub conditional_next_steps: Json,
    pub allowed_flow_categories: Json,
    pub quick_reply_navigation: Option<Json>,
    pub is_customizable: bool,
    pub media_id: Option<i32>,
    pub data_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::flow_template::Entity",
        from = "Column::FlowTemplateId",
        to = "super::flow_template::Column::Id",
        on_delete = "Cascade"
    )]
    FlowTemplate,
}

impl Related<super::flow_template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FlowTemplate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
