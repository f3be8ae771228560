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

use lobbybee_common::flow::PlaceholderSpec;
use sea_orm::*;

use super::entities::{prelude::*, *};
use crate::error::Result;

pub async fn list_by_names<C: ConnectionTrait>(
    names: &[String],
    db: &C,
) -> Result<Vec<placeholder::Model>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let entries = Placeholder::find()
        .filter(placeholder::Column::Name.is_in(names.iter().cloned()))
        .all(db)
        .await?;
    Ok(entries)
}

pub async fn upsert<C: ConnectionTrait>(
    spec: &PlaceholderSpec,
    db: &C,
) -> Result<placeholder::Model> {
    let existing = Placeholder::find()
        .filter(placeholder::Column::Name.eq(spec.name.as_str()))
        .one(db)
        .await?;
    let entry = match existing {
        Some(model) => {
            let mut entry: placeholder::ActiveModel = model.into();
            entry.resolving_logic = ActiveValue::Set(spec.resolving_logic.clone());
            entry.description = ActiveValue::Set(spec.description.clone());
            entry.update(db).await?
        }
        None => {
            placeholder::ActiveModel {
                name: ActiveValue::Set(spec.name.clone()),
                resolving_logic: ActiveValue::Set(spec.resolving_logic.clone()),
                description: ActiveValue::Set(spec.description.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };
    Ok(entry)
}
