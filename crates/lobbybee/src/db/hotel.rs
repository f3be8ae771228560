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
use lobbybee_common::flow::HotelSpec;
use sea_orm::*;

use super::entities::{prelude::*, *};
use crate::error::Result;

pub async fn get_by_id<C: ConnectionTrait>(id: &str, db: &C) -> Result<Option<hotel::Model>> {
    Ok(Hotel::find_by_id(id.to_owned()).one(db).await?)
}

/// Resolve a deep-link token: a hotel id or its QR slug.
pub async fn get_by_reference<C: ConnectionTrait>(
    reference: &str,
    db: &C,
) -> Result<Option<hotel::Model>> {
    let entry = Hotel::find()
        .filter(
            Condition::any()
                .add(hotel::Column::Id.eq(reference))
                .add(hotel::Column::UniqueQrCode.eq(reference)),
        )
        .filter(hotel::Column::IsActive.eq(true))
        .one(db)
        .await?;
    Ok(entry)
}

/// The platform's default hotel: the oldest active one, demo hotels last.
pub async fn get_default<C: ConnectionTrait>(db: &C) -> Result<Option<hotel::Model>> {
    let entry = Hotel::find()
        .filter(hotel::Column::IsActive.eq(true))
        .order_by(hotel::Column::IsDemo, Order::Asc)
        .order_by(hotel::Column::CreatedAt, Order::Asc)
        .order_by(hotel::Column::Id, Order::Asc)
        .one(db)
        .await?;
    Ok(entry)
}

pub async fn get_demo<C: ConnectionTrait>(db: &C) -> Result<Option<hotel::Model>> {
    let entry = Hotel::find()
        .filter(hotel::Column::IsDemo.eq(true))
        .filter(hotel::Column::IsActive.eq(true))
        .order_by(hotel::Column::CreatedAt, Order::Asc)
        .one(db)
        .await?;
    Ok(entry)
}

pub async fn list_demo_ids<C: ConnectionTrait>(db: &C) -> Result<Vec<String>> {
    let ids = Hotel::find()
        .select_only()
        .column(hotel::Column::Id)
        .filter(hotel::Column::IsDemo.eq(true))
        .into_tuple::<String>()
        .all(db)
        .await?;
    Ok(ids)
}

pub async fn upsert<C: ConnectionTrait>(spec: &HotelSpec, db: &C) -> Result<hotel::Model> {
    let entry = hotel::ActiveModel {
        id: ActiveValue::Set(spec.id.clone()),
        name: ActiveValue::Set(spec.name.clone()),
        unique_qr_code: ActiveValue::Set(spec.unique_qr_code.clone()),
        wifi_password: ActiveValue::Set(spec.wifi_password.clone()),
        address: ActiveValue::Set(spec.address.clone()),
        phone: ActiveValue::Set(spec.phone.clone()),
        timezone: ActiveValue::Set(spec.timezone.clone()),
        is_demo: ActiveValue::Set(spec.is_demo),
        is_active: ActiveValue::Set(true),
        created_at: ActiveValue::Set(Utc::now()),
    };
    match get_by_id(&spec.id, db).await? {
        Some(_) => {
            let mut entry = entry;
            entry.created_at = ActiveValue::NotSet;
            Ok(entry.update(db).await?)
        }
        None => Ok(entry.insert(db).await?),
    }
}
