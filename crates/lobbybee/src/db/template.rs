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

use chrono::Utc;
use lobbybee_common::flow::{FlowSpec, StepSpec};
use sea_orm::*;
use serde_json::{Value, json};

use super::entities::{prelude::*, *};
use crate::error::Result;

pub async fn get_flow<C: ConnectionTrait>(
    id: i32,
    db: &C,
) -> Result<Option<flow_template::Model>> {
    Ok(FlowTemplate::find_by_id(id).one(db).await?)
}

/// The active flow of a category; the oldest wins if several exist.
pub async fn get_active_flow<C: ConnectionTrait>(
    category: &str,
    db: &C,
) -> Result<Option<flow_template::Model>> {
    let entry = FlowTemplate::find()
        .filter(flow_template::Column::Category.eq(category))
        .filter(flow_template::Column::IsActive.eq(true))
        .order_by(flow_template::Column::Id, Order::Asc)
        .one(db)
        .await?;
    Ok(entry)
}

pub async fn get_step_template<C: ConnectionTrait>(
    id: i32,
    db: &C,
) -> Result<Option<flow_step_template::Model>> {
    Ok(FlowStepTemplate::find_by_id(id).one(db).await?)
}

/// First step of a flow by `(step_order, id)`.
pub async fn get_entry_step<C: ConnectionTrait>(
    flow_template_id: i32,
    db: &C,
) -> Result<Option<flow_step_template::Model>> {
    let entry = FlowStepTemplate::find()
        .filter(flow_step_template::Column::FlowTemplateId.eq(flow_template_id))
        .order_by(flow_step_template::Column::StepOrder, Order::Asc)
        .order_by(flow_step_template::Column::Id, Order::Asc)
        .one(db)
        .await?;
    Ok(entry)
}

pub async fn list_steps<C: ConnectionTrait>(
    flow_template_id: i32,
    db: &C,
) -> Result<Vec<flow_step_template::Model>> {
    let entries = FlowStepTemplate::find()
        .filter(flow_step_template::Column::FlowTemplateId.eq(flow_template_id))
        .order_by(flow_step_template::Column::StepOrder, Order::Asc)
        .order_by(flow_step_template::Column::Id, Order::Asc)
        .all(db)
        .await?;
    Ok(entries)
}

/// Remove flows with the same name and category, cascading their steps.
pub async fn delete_flow<C: ConnectionTrait>(name: &str, category: &str, db: &C) -> Result<u64> {
    let res = FlowTemplate::delete_many()
        .filter(flow_template::Column::Name.eq(name))
        .filter(flow_template::Column::Category.eq(category))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

pub async fn create_flow<C: ConnectionTrait>(
    spec: &FlowSpec,
    db: &C,
) -> Result<flow_template::Model> {
    let entry = flow_template::ActiveModel {
        name: ActiveValue::Set(spec.name.clone()),
        description: ActiveValue::Set(spec.description.clone()),
        category: ActiveValue::Set(spec.category.clone()),
        is_active: ActiveValue::Set(spec.is_active),
        created_at: ActiveValue::Set(Utc::now()),
        ..Default::default()
    };
    Ok(entry.insert(db).await?)
}

/// Insert a step without transitions; those are linked once every step has
/// an id.
pub async fn create_step_template<C: ConnectionTrait>(
    flow_template_id: i32,
    spec: &StepSpec,
    media_id: Option<i32>,
    db: &C,
) -> Result<flow_step_template::Model> {
    let entry = flow_step_template::ActiveModel {
        flow_template_id: ActiveValue::Set(flow_template_id),
        step_name: ActiveValue::Set(spec.step_name.clone()),
        step_order: ActiveValue::Set(spec.order),
        message_template: ActiveValue::Set(spec.message_template.clone()),
        message_type: ActiveValue::Set(spec.message_type.clone()),
        options: ActiveValue::Set(Value::Object(spec.options.clone())),
        actions: ActiveValue::Set(Value::Array(spec.actions.clone())),
        next_step_template_id: ActiveValue::Set(None),
        conditional_next_steps: ActiveValue::Set(json!({})),
        allowed_flow_categories: ActiveValue::Set(json!(spec.allowed_flow_categories)),
        quick_reply_navigation: ActiveValue::Set(spec.quick_reply_navigation.clone()),
        is_customizable: ActiveValue::Set(spec.is_customizable),
        media_id: ActiveValue::Set(media_id),
        data_key: ActiveValue::Set(spec.data_key.clone()),
        ..Default::default()
    };
    Ok(entry.insert(db).await?)
}

pub async fn set_transitions<C: ConnectionTrait>(
    id: i32,
    next_step_template_id: Option<i32>,
    conditional_next_steps: Value,
    db: &C,
) -> Result<()> {
    let entry = flow_step_template::ActiveModel {
        id: ActiveValue::Unchanged(id),
        next_step_template_id: ActiveValue::Set(next_step_template_id),
        conditional_next_steps: ActiveValue::Set(conditional_next_steps),
        ..Default::default()
    };
    entry.update(db).await?;
    Ok(())
}
