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
use sea_orm::*;
use serde_json::Value;

use super::entities::{prelude::*, *};
use crate::error::Result;

pub async fn create<C: ConnectionTrait>(
    payload: &Value,
    success: bool,
    error_message: Option<&str>,
    db: &C,
) -> Result<webhook_log::Model> {
    let entry = webhook_log::ActiveModel {
        payload: ActiveValue::Set(payload.clone()),
        success: ActiveValue::Set(success),
        error_message: ActiveValue::Set(error_message.map(str::to_owned)),
        created_at: ActiveValue::Set(Utc::now()),
        ..Default::default()
    };
    Ok(entry.insert(db).await?)
}

pub async fn list<C: ConnectionTrait>(
    limit: Option<u64>,
    offset: Option<u64>,
    db: &C,
) -> Result<Vec<webhook_log::Model>> {
    let entries = WebhookLog::find()
        .order_by(webhook_log::Column::Id, Order::Desc)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?;
    Ok(entries)
}
