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
use serde_json::{Map, Value};

use super::entities::{prelude::*, *};
use crate::error::Result;

pub async fn get_by_id<C: ConnectionTrait>(id: i32, db: &C) -> Result<Option<guest::Model>> {
    Ok(Guest::find_by_id(id).one(db).await?)
}

pub async fn get_by_number<C: ConnectionTrait>(
    whatsapp_number: &str,
    db: &C,
) -> Result<Option<guest::Model>> {
    let entry = Guest::find()
        .filter(guest::Column::WhatsappNumber.eq(whatsapp_number))
        .one(db)
        .await?;
    Ok(entry)
}

pub async fn create<C: ConnectionTrait>(
    whatsapp_number: &str,
    full_name: Option<&str>,
    db: &C,
) -> Result<guest::Model> {
    let now = Utc::now();
    let entry = guest::ActiveModel {
        whatsapp_number: ActiveValue::Set(whatsapp_number.to_owned()),
        full_name: ActiveValue::Set(full_name.map(str::to_owned)),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
        ..Default::default()
    };
    Ok(entry.insert(db).await?)
}

fn field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Create or update a guest from answers collected during check-in. Only
/// fields that were actually collected overwrite stored values.
pub async fn upsert_from_checkin<C: ConnectionTrait>(
    whatsapp_number: &str,
    fields: &Map<String, Value>,
    db: &C,
) -> Result<guest::Model> {
    let existing = get_by_number(whatsapp_number, db).await?;
    let mut entry: guest::ActiveModel = match existing {
        Some(model) => {
            let mut entry: guest::ActiveModel = model.into();
            entry.updated_at = ActiveValue::Set(Utc::now());
            entry
        }
        None => {
            let now = Utc::now();
            guest::ActiveModel {
                whatsapp_number: ActiveValue::Set(whatsapp_number.to_owned()),
                full_name: ActiveValue::Set(Some("Guest".to_owned())),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
                ..Default::default()
            }
        }
    };

    let full_name = field(fields, "full_name").or_else(|| field(fields, "guest_name"));
    if let Some(name) = full_name.filter(|n| n != "Guest") {
        entry.full_name = ActiveValue::Set(Some(name));
    }
    if let Some(email) = field(fields, "email") {
        entry.email = ActiveValue::Set(Some(email));
    }
    if let Some(nationality) = field(fields, "nationality") {
        entry.nationality = ActiveValue::Set(Some(nationality));
    }
    if let Some(dob) = field(fields, "date_of_birth") {
        entry.date_of_birth = ActiveValue::Set(Some(dob));
    }
    if let Some(language) = field(fields, "preferred_language") {
        entry.preferred_language = ActiveValue::Set(Some(language));
    }
    let document = fields
        .iter()
        .filter(|(k, _)| k.ends_with("_media_id"))
        .find_map(|(k, _)| field(fields, k));
    if let Some(document) = field(fields, "id_document_media_id").or(document) {
        entry.id_document_media_id = ActiveValue::Set(Some(document));
    }

    Ok(entry.save(db).await?.try_into_model()?)
}
