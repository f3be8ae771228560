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

pub async fn get_by_id<C: ConnectionTrait>(
    id: i32,
    db: &C,
) -> Result<Option<whatsapp_media::Model>> {
    Ok(WhatsappMedia::find_by_id(id).one(db).await?)
}

pub async fn create<C: ConnectionTrait>(
    file_path: &str,
    mime_type: &str,
    file_size: i64,
    whatsapp_media_id: Option<&str>,
    db: &C,
) -> Result<whatsapp_media::Model> {
    let now = Utc::now();
    let entry = whatsapp_media::ActiveModel {
        whatsapp_media_id: ActiveValue::Set(whatsapp_media_id.map(str::to_owned)),
        file_path: ActiveValue::Set(file_path.to_owned()),
        mime_type: ActiveValue::Set(mime_type.to_owned()),
        file_size: ActiveValue::Set(file_size),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
        ..Default::default()
    };
    Ok(entry.insert(db).await?)
}

pub async fn set_whatsapp_media_id<C: ConnectionTrait>(
    id: i32,
    whatsapp_media_id: Option<&str>,
    db: &C,
) -> Result<()> {
    let entry = whatsapp_media::ActiveModel {
        id: ActiveValue::Unchanged(id),
        whatsapp_media_id: ActiveValue::Set(whatsapp_media_id.map(str::to_owned)),
        ..Default::default()
    };
    entry.update(db).await?;
    Ok(())
}
