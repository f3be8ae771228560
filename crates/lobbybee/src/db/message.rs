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

use super::entities::{prelude::*, *};
use crate::error::Result;

pub async fn create<C: ConnectionTrait>(
    context_id: i32,
    content: &str,
    is_from_guest: bool,
    message_type: &str,
    media_id: Option<i32>,
    db: &C,
) -> Result<conversation_message::Model> {
    let entry = conversation_message::ActiveModel {
        context_id: ActiveValue::Set(context_id),
        message_content: ActiveValue::Set(content.to_owned()),
        is_from_guest: ActiveValue::Set(is_from_guest),
        message_type: ActiveValue::Set(message_type.to_owned()),
        media_id: ActiveValue::Set(media_id),
        timestamp: ActiveValue::Set(Utc::now()),
        ..Default::default()
    };
    Ok(entry.insert(db).await?)
}

pub async fn list_by_context<C: ConnectionTrait>(
    context_id: i32,
    limit: Option<u64>,
    offset: Option<u64>,
    db: &C,
) -> Result<Vec<conversation_message::Model>> {
    let entries = ConversationMessage::find()
        .filter(conversation_message::Column::ContextId.eq(context_id))
        .order_by(conversation_message::Column::Timestamp, Order::Asc)
        .order_by(conversation_message::Column::Id, Order::Asc)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?;
    Ok(entries)
}

pub async fn delete_by_contexts<C: ConnectionTrait>(context_ids: &[i32], db: &C) -> Result<u64> {
    let res = ConversationMessage::delete_many()
        .filter(conversation_message::Column::ContextId.is_in(context_ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}
