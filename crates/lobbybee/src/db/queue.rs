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
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde_json::Value;

use super::entities::{message_queue::QueueStatus, prelude::*, *};
use crate::error::Result;

pub async fn create<C: ConnectionTrait>(
    user_id: &str,
    hotel_id: Option<&str>,
    message_type: &str,
    content: &Value,
    scheduled_time: DateTime<Utc>,
    db: &C,
) -> Result<message_queue::Model> {
    let entry = message_queue::ActiveModel {
        user_id: ActiveValue::Set(user_id.to_owned()),
        hotel_id: ActiveValue::Set(hotel_id.map(str::to_owned)),
        message_type: ActiveValue::Set(message_type.to_owned()),
        message_content: ActiveValue::Set(content.clone()),
        scheduled_time: ActiveValue::Set(scheduled_time),
        status: ActiveValue::Set(QueueStatus::Pending),
        sent_time: ActiveValue::Set(None),
        retry_count: ActiveValue::Set(0),
        created_at: ActiveValue::Set(Utc::now()),
        ..Default::default()
    };
    Ok(entry.insert(db).await?)
}

/// Pending rows of one user that are due by `now`, oldest first.
pub async fn list_pending<C: ConnectionTrait>(
    user_id: &str,
    now: DateTime<Utc>,
    db: &C,
) -> Result<Vec<message_queue::Model>> {
    let entries = MessageQueue::find()
        .filter(message_queue::Column::UserId.eq(user_id))
        .filter(message_queue::Column::Status.eq(QueueStatus::Pending))
        .filter(message_queue::Column::ScheduledTime.lte(now))
        .order_by(message_queue::Column::ScheduledTime, Order::Asc)
        .order_by(message_queue::Column::Id, Order::Asc)
        .all(db)
        .await?;
    Ok(entries)
}

/// Users holding at least one pending row due by `now`.
pub async fn list_due_users<C: ConnectionTrait>(
    now: DateTime<Utc>,
    db: &C,
) -> Result<Vec<String>> {
    let users = MessageQueue::find()
        .select_only()
        .column(message_queue::Column::UserId)
        .filter(message_queue::Column::Status.eq(QueueStatus::Pending))
        .filter(message_queue::Column::ScheduledTime.lte(now))
        .distinct()
        .order_by(message_queue::Column::UserId, Order::Asc)
        .into_tuple::<String>()
        .all(db)
        .await?;
    Ok(users)
}

pub async fn list_by_user<C: ConnectionTrait>(
    user_id: &str,
    db: &C,
) -> Result<Vec<message_queue::Model>> {
    let entries = MessageQueue::find()
        .filter(message_queue::Column::UserId.eq(user_id))
        .order_by(message_queue::Column::Id, Order::Asc)
        .all(db)
        .await?;
    Ok(entries)
}

/// Only a pending row moves to sent.
pub async fn mark_sent<C: ConnectionTrait>(id: i32, db: &C) -> Result<bool> {
    let res = MessageQueue::update_many()
        .col_expr(message_queue::Column::Status, Expr::value(QueueStatus::Sent))
        .col_expr(message_queue::Column::SentTime, Expr::value(Utc::now()))
        .filter(message_queue::Column::Id.eq(id))
        .filter(message_queue::Column::Status.eq(QueueStatus::Pending))
        .exec(db)
        .await?;
    Ok(res.rows_affected == 1)
}

/// Count a failed delivery; the row is given up on after `max_retries`.
pub async fn record_failure<C: ConnectionTrait>(
    id: i32,
    max_retries: i32,
    db: &C,
) -> Result<Option<QueueStatus>> {
    let Some(entry) = MessageQueue::find_by_id(id).one(db).await? else {
        return Ok(None);
    };
    let retry_count = entry.retry_count + 1;
    let status = if retry_count >= max_retries {
        QueueStatus::Failed
    } else {
        QueueStatus::Pending
    };
    let mut entry: message_queue::ActiveModel = entry.into();
    entry.retry_count = ActiveValue::Set(retry_count);
    entry.status = ActiveValue::Set(status);
    entry.update(db).await?;
    Ok(Some(status))
}

pub async fn delete_by_user<C: ConnectionTrait>(user_id: &str, db: &C) -> Result<u64> {
    let res = MessageQueue::delete_many()
        .filter(message_queue::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

pub async fn delete_by_hotels<C: ConnectionTrait>(hotel_ids: &[String], db: &C) -> Result<u64> {
    let res = MessageQueue::delete_many()
        .filter(message_queue::Column::HotelId.is_in(hotel_ids.iter().cloned()))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}
