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
use sea_orm::sea_query::SimpleExpr;
use sea_orm::*;
use serde::Deserialize;
use serde_json::Value;

use super::entities::{prelude::*, *};
use crate::error::Result;

/// Hotel-specific values that replace the template's when present.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StepOverrides {
    pub message_template: Option<Value>,
    pub message_type: Option<String>,
    pub options: Option<Value>,
    pub media_id: Option<i32>,
}

fn hotel_filter(hotel_id: Option<&str>) -> SimpleExpr {
    match hotel_id {
        Some(id) => flow_step::Column::HotelId.eq(id),
        None => flow_step::Column::HotelId.is_null(),
    }
}

pub async fn get_with_template<C: ConnectionTrait>(
    id: i32,
    db: &C,
) -> Result<Option<(flow_step::Model, flow_step_template::Model)>> {
    let entry = FlowStep::find_by_id(id)
        .find_also_related(FlowStepTemplate)
        .one(db)
        .await?;
    Ok(entry.and_then(|(step, template)| template.map(|t| (step, t))))
}

pub async fn find<C: ConnectionTrait>(
    template_id: i32,
    hotel_id: Option<&str>,
    db: &C,
) -> Result<Option<flow_step::Model>> {
    let entry = FlowStep::find()
        .filter(flow_step::Column::TemplateId.eq(template_id))
        .filter(hotel_filter(hotel_id))
        .one(db)
        .await?;
    Ok(entry)
}

/// Materialize the hotel's step for a template.
///
/// Two concurrent callers may both miss the lookup; the unique index rejects
/// the second insert, which then reads the winner's row.
pub async fn get_or_create<C: ConnectionTrait>(
    template_id: i32,
    hotel_id: Option<&str>,
    db: &C,
) -> Result<flow_step::Model> {
    if let Some(entry) = find(template_id, hotel_id, db).await? {
        return Ok(entry);
    }

    let now = Utc::now();
    let entry = flow_step::ActiveModel {
        template_id: ActiveValue::Set(template_id),
        hotel_id: ActiveValue::Set(hotel_id.map(str::to_owned)),
        message_template: ActiveValue::Set(None),
        message_type: ActiveValue::Set(None),
        options: ActiveValue::Set(None),
        media_id: ActiveValue::Set(None),
        is_active: ActiveValue::Set(true),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
        ..Default::default()
    };

    match entry.insert(db).await {
        Ok(entry) => Ok(entry),
        Err(err) => match find(template_id, hotel_id, db).await? {
            Some(entry) => Ok(entry),
            None => Err(err.into()),
        },
    }
}

pub async fn customize<C: ConnectionTrait>(
    template_id: i32,
    hotel_id: &str,
    overrides: StepOverrides,
    db: &C,
) -> Result<flow_step::Model> {
    let entry = get_or_create(template_id, Some(hotel_id), db).await?;
    let mut entry: flow_step::ActiveModel = entry.into();
    entry.message_template = ActiveValue::Set(overrides.message_template);
    entry.message_type = ActiveValue::Set(overrides.message_type);
    entry.options = ActiveValue::Set(overrides.options);
    entry.media_id = ActiveValue::Set(overrides.media_id);
    Ok(entry.update(db).await?)
}
