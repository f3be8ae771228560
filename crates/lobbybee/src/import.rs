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

//! Flow bundle import.
//!
//! Hotels and placeholders are upserted. A flow is replaced wholesale: any
//! flow with the same name and category is deleted (cascading to its steps
//! and hotel customizations) before the new one is inserted. Step keys are
//! resolved to template ids in a second pass so transitions may point
//! forward and across flows.

use lobbybee_common::flow::{FlowBundle, MediaSpec};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::db::{self, entities::whatsapp_media};
use crate::error::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub hotels: usize,
    pub placeholders: usize,
    pub flows: usize,
    pub steps: usize,
}

pub async fn import_file(
    path: &Path,
    media_dir: &Path,
    db: &DatabaseConnection,
) -> Result<ImportSummary> {
    let raw = tokio::fs::read_to_string(path).await?;
    let bundle = FlowBundle::from_json(&raw)?;
    import_bundle(&bundle, media_dir, db).await
}

pub async fn import_bundle(
    bundle: &FlowBundle,
    media_dir: &Path,
    db: &DatabaseConnection,
) -> Result<ImportSummary> {
    bundle.validate()?;
    let txn = db.begin().await?;
    let mut summary = ImportSummary::default();

    for hotel in &bundle.hotels {
        db::hotel::upsert(hotel, &txn).await?;
        summary.hotels += 1;
    }
    for placeholder in &bundle.placeholders {
        db::placeholder::upsert(placeholder, &txn).await?;
        summary.placeholders += 1;
    }

    let mut ids: HashMap<&str, i32> = HashMap::new();
    for flow in &bundle.flows {
        let replaced = db::template::delete_flow(&flow.name, &flow.category, &txn).await?;
        let created = db::template::create_flow(flow, &txn).await?;
        for step in &flow.steps {
            let media_id = match &step.media {
                Some(media) => Some(import_media(media, media_dir, &txn).await?.id),
                None => None,
            };
            let row = db::template::create_step_template(created.id, step, media_id, &txn).await?;
            ids.insert(step.key.as_str(), row.id);
            summary.steps += 1;
        }
        info!(
            flow = %flow.name,
            category = %flow.category,
            replaced,
            steps = flow.steps.len(),
            "imported flow"
        );
        summary.flows += 1;
    }

    for step in bundle.steps() {
        let Some(&id) = ids.get(step.key.as_str()) else {
            continue;
        };
        let next = step
            .next_step
            .as_deref()
            .and_then(|key| ids.get(key).copied());
        let conditional: Map<String, Value> = step
            .conditional_next_steps
            .iter()
            .filter_map(|(token, key)| {
                let target = ids.get(key.as_str()?)?;
                Some((token.clone(), json!(target)))
            })
            .collect();
        db::template::set_transitions(id, next, Value::Object(conditional), &txn).await?;
    }

    txn.commit().await?;
    Ok(summary)
}

async fn import_media<C: ConnectionTrait>(
    spec: &MediaSpec,
    media_dir: &Path,
    db: &C,
) -> Result<whatsapp_media::Model> {
    let mime_type = match &spec.mime_type {
        Some(mime) => mime.clone(),
        None => mime_guess::from_path(&spec.path)
            .first_or_octet_stream()
            .essence_str()
            .to_owned(),
    };
    let size = match tokio::fs::metadata(media_dir.join(&spec.path)).await {
        Ok(meta) => i64::try_from(meta.len()).unwrap_or(i64::MAX),
        Err(err) => {
            warn!(path = %spec.path, error = %err, "media file not found, it will fail to upload");
            0
        }
    };
    db::media::create(
        &spec.path,
        &mime_type,
        size,
        spec.whatsapp_media_id.as_deref(),
        db,
    )
    .await
}
