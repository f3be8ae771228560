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
    hotel_id: Option<&str>,
    guest_number: Option<&str>,
    title: &str,
    message: &str,
    link: Option<&str>,
    db: &C,
) -> Result<notification::Model> {
    let entry = notification::ActiveModel {
        hotel_id: ActiveValue::Set(hotel_id.map(str::to_owned)),
        guest_number: ActiveValue::Set(guest_number.map(str::to_owned)),
        title: ActiveValue::Set(title.to_owned()),
        message: ActiveValue::Set(message.to_owned()),
        link: ActiveValue::Set(link.map(str::to_owned)),
        is_read: ActiveValue::Set(false),
        created_at: ActiveValue::Set(Utc::now()),
        ..Default::default()
    };
    Ok(entry.insert(db).await?)
}

pub async fn list_by_hotel<C: ConnectionTrait>(
    hotel_id: Option<&str>,
    db: &C,
) -> Result<Vec<notification::Model>> {
    let query = match hotel_id {
        Some(id) => Notification::find().filter(notification::Column::HotelId.eq(id)),
        None => Notification::find().filter(notification::Column::HotelId.is_null()),
    };
    let entries = query
        .order_by(notification::Column::Id, Order::Asc)
        .all(db)
        .await?;
    Ok(entries)
}
