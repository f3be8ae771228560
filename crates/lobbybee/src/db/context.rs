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

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::*;
use serde_json::json;

use super::entities::{prelude::*, *};
use crate::data::{ContextData, Conversation};
use crate::error::Result;

fn hotel_filter(hotel_id: Option<&str>) -> SimpleExpr {
    match hotel_id {
        Some(id) => conversation_context::Column::HotelId.eq(id),
        None => conversation_context::Column::HotelId.is_null(),
    }
}

pub async fn get_by_id<C: ConnectionTrait>(id: i32, db: &C) -> Result<Option<Conversation>> {
    let entry = ConversationContext::find_by_id(id).one(db).await?;
    Ok(entry.map(Conversation::from))
}

/// The user's active conversation, if any.
pub async fn get_active<C: ConnectionTrait>(user_id: &str, db: &C) -> Result<Option<Conversation>> {
    let entry = ConversationContext::find()
        .filter(conversation_context::Column::UserId.eq(user_id))
        .filter(conversation_context::Column::IsActive.eq(true))
        .order_by(conversation_context::Column::LastActivity, Order::Desc)
        .one(db)
        .await?;
    Ok(entry.map(Conversation::from))
}

/// Latest inbound message time over all of the user's contexts.
pub async fn last_guest_message_at<C: ConnectionTrait>(
    user_id: &str,
    db: &C,
) -> Result<Option<DateTime<Utc>>> {
    let entry = ConversationContext::find()
        .filter(conversation_context::Column::UserId.eq(user_id))
        .filter(conversation_context::Column::LastGuestMessageAt.is_not_null())
        .order_by(conversation_context::Column::LastGuestMessageAt, Order::Desc)
        .one(db)
        .await?;
    Ok(entry.and_then(|model| model.last_guest_message_at))
}

pub async fn list_by_user<C: ConnectionTrait>(
    user_id: &str,
    db: &C,
) -> Result<Vec<conversation_context::Model>> {
    let entries = ConversationContext::find()
        .filter(conversation_context::Column::UserId.eq(user_id))
        .order_by(conversation_context::Column::Id, Order::Asc)
        .all(db)
        .await?;
    Ok(entries)
}

/// Get-or-create keyed on `(user_id, hotel_id)`.
///
/// An inactive row is reactivated with a clean slate instead of inserting a
/// second one, and every other active context of the same user is
/// deactivated so the user ends up with exactly one.
pub async fn get_or_create(
    user_id: &str,
    hotel_id: Option<&str>,
    data: ContextData,
    expires_at: DateTime<Utc>,
    db: &DatabaseConnection,
) -> Result<Conversation> {
    let txn = db.begin().await?;
    let now = Utc::now();

    let existing = ConversationContext::find()
        .filter(conversation_context::Column::UserId.eq(user_id))
        .filter(hotel_filter(hotel_id))
        .one(&txn)
        .await?;

    let model = match existing {
        Some(model) if model.is_active => model,
        Some(model) => {
            let mut entry: conversation_context::ActiveModel = model.into();
            entry.is_active = ActiveValue::Set(true);
            entry.current_step_id = ActiveValue::Set(None);
            entry.navigation_stack = ActiveValue::Set(json!([]));
            entry.context_data = ActiveValue::Set(data.into_value());
            entry.error_count = ActiveValue::Set(0);
            entry.last_activity = ActiveValue::Set(now);
            entry.flow_expires_at = ActiveValue::Set(Some(expires_at));
            entry.update(&txn).await?
        }
        None => {
            let entry = conversation_context::ActiveModel {
                user_id: ActiveValue::Set(user_id.to_owned()),
                hotel_id: ActiveValue::Set(hotel_id.map(str::to_owned)),
                current_step_id: ActiveValue::Set(None),
                navigation_stack: ActiveValue::Set(json!([])),
                context_data: ActiveValue::Set(data.into_value()),
                error_count: ActiveValue::Set(0),
                is_active: ActiveValue::Set(true),
                last_activity: ActiveValue::Set(now),
                last_guest_message_at: ActiveValue::Set(None),
                flow_expires_at: ActiveValue::Set(Some(expires_at)),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
                ..Default::default()
            };
            entry.insert(&txn).await?
        }
    };

    ConversationContext::update_many()
        .col_expr(conversation_context::Column::IsActive, Expr::value(false))
        .filter(conversation_context::Column::UserId.eq(user_id))
        .filter(conversation_context::Column::Id.ne(model.id))
        .filter(conversation_context::Column::IsActive.eq(true))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(model.into())
}

/// Write every mutable column of the conversation back.
pub async fn save<C: ConnectionTrait>(conversation: &Conversation, db: &C) -> Result<()> {
    conversation.to_active_model().update(db).await?;
    Ok(())
}

/// Delete contexts (and their transcripts) of one user.
pub async fn delete_by_user(user_id: &str, db: &DatabaseConnection) -> Result<u64> {
    let ids = ConversationContext::find()
        .select_only()
        .column(conversation_context::Column::Id)
        .filter(conversation_context::Column::UserId.eq(user_id))
        .into_tuple::<i32>()
        .all(db)
        .await?;
    delete_by_ids(ids, db).await
}

/// Delete contexts idle since before `cutoff`.
pub async fn delete_stale(cutoff: DateTime<Utc>, db: &DatabaseConnection) -> Result<u64> {
    let ids = ConversationContext::find()
        .select_only()
        .column(conversation_context::Column::Id)
        .filter(conversation_context::Column::LastActivity.lt(cutoff))
        .into_tuple::<i32>()
        .all(db)
        .await?;
    delete_by_ids(ids, db).await
}

pub async fn delete_by_hotels(hotel_ids: &[String], db: &DatabaseConnection) -> Result<u64> {
    if hotel_ids.is_empty() {
        return Ok(0);
    }
    let ids = ConversationContext::find()
        .select_only()
        .column(conversation_context::Column::Id)
        .filter(conversation_context::Column::HotelId.is_in(hotel_ids.iter().cloned()))
        .into_tuple::<i32>()
        .all(db)
        .await?;
    delete_by_ids(ids, db).await
}

async fn delete_by_ids(ids: Vec<i32>, db: &DatabaseConnection) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let txn = db.begin().await?;
    super::message::delete_by_contexts(&ids, &txn).await?;
    let res = ConversationContext::delete_many()
        .filter(conversation_context::Column::Id.is_in(ids))
        .exec(&txn)
        .await?;
    txn.commit().await?;
    Ok(res.rows_affected)
}
