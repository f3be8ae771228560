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
use sea_orm::*;

use super::entities::{prelude::*, *};
use crate::error::Result;

/// A stay that is `active` and whose dates cover `now`.
pub async fn get_active<C: ConnectionTrait>(
    guest_id: i32,
    hotel_id: Option<&str>,
    now: DateTime<Utc>,
    db: &C,
) -> Result<Option<stay::Model>> {
    let mut query = Stay::find()
        .filter(stay::Column::GuestId.eq(guest_id))
        .filter(stay::Column::Status.eq("active"))
        .filter(stay::Column::CheckInDate.lte(now))
        .filter(stay::Column::CheckOutDate.gte(now));
    if let Some(hotel_id) = hotel_id {
        query = query.filter(stay::Column::HotelId.eq(hotel_id));
    }
    let entry = query
        .order_by(stay::Column::CheckInDate, Order::Desc)
        .one(db)
        .await?;
    Ok(entry)
}

pub async fn create<C: ConnectionTrait>(
    guest_id: i32,
    hotel_id: &str,
    room_number: Option<&str>,
    check_in_date: DateTime<Utc>,
    check_out_date: DateTime<Utc>,
    status: &str,
    db: &C,
) -> Result<stay::Model> {
    let entry = stay::ActiveModel {
        guest_id: ActiveValue::Set(guest_id),
        hotel_id: ActiveValue::Set(hotel_id.to_owned()),
        room_number: ActiveValue::Set(room_number.map(str::to_owned)),
        check_in_date: ActiveValue::Set(check_in_date),
        check_out_date: ActiveValue::Set(check_out_date),
        status: ActiveValue::Set(status.to_owned()),
        created_at: ActiveValue::Set(Utc::now()),
        ..Default::default()
    };
    Ok(entry.insert(db).await?)
}
