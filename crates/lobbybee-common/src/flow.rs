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

//! Flow bundle format.
//!
//! A bundle is a JSON document describing flows, their steps, placeholders
//! and optionally hotels. Steps reference each other by symbolic `key`; the
//! importer resolves those keys to template ids once every step exists, so
//! transitions may point across flows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::{LobbybeeErrorKind, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowBundle {
    #[serde(default)]
    pub hotels: Vec<HotelSpec>,
    #[serde(default)]
    pub placeholders: Vec<PlaceholderSpec>,
    #[serde(default)]
    pub flows: Vec<FlowSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotelSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unique_qr_code: Option<String>,
    #[serde(default)]
    pub wifi_password: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub is_demo: bool,
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceholderSpec {
    pub name: String,
    pub resolving_logic: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

fn default_true() -> bool {
    true
}

fn default_message_type() -> String {
    "text".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSpec {
    pub path: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub whatsapp_media_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub key: String,
    pub step_name: String,
    #[serde(default)]
    pub order: i32,
    pub message_template: Value,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub actions: Vec<Value>,
    #[serde(default)]
    pub next_step: Option<String>,
    /// Input token (or `*`) to step key.
    #[serde(default)]
    pub conditional_next_steps: Map<String, Value>,
    #[serde(default)]
    pub allowed_flow_categories: Vec<String>,
    #[serde(default)]
    pub quick_reply_navigation: Option<Value>,
    #[serde(default = "default_true")]
    pub is_customizable: bool,
    #[serde(default)]
    pub data_key: Option<String>,
    #[serde(default)]
    pub media: Option<MediaSpec>,
}

impl FlowBundle {
    pub fn from_json(raw: &str) -> Result<Self> {
        let bundle: FlowBundle = serde_json::from_str(raw)?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepSpec> {
        self.flows.iter().flat_map(|f| f.steps.iter())
    }

    /// Check that step keys are unique and every transition names a known key.
    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        for step in self.steps() {
            if !keys.insert(step.key.as_str()) {
                return Err(LobbybeeErrorKind::Config(format!(
                    "duplicate step key {}",
                    step.key
                ))
                .into());
            }
        }

        for step in self.steps() {
            let targets = step.next_step.iter().map(String::as_str).chain(
                step.conditional_next_steps
                    .values()
                    .filter_map(Value::as_str),
            );
            for target in targets {
                if !keys.contains(target) {
                    return Err(LobbybeeErrorKind::Config(format!(
                        "step {} points at unknown step {}",
                        step.key, target
                    ))
                    .into());
                }
            }
            if step.conditional_next_steps.values().any(|v| !v.is_string()) {
                return Err(LobbybeeErrorKind::Config(format!(
                    "step {} has a non-string conditional target",
                    step.key
                ))
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_parse_a_bundle() {
        let bundle = FlowBundle::from_json(
            r#"{
                "placeholders": [{ "name": "guest_name", "resolving_logic": "guest.full_name" }],
                "flows": [{
                    "name": "Check-in",
                    "category": "hotel_checkin",
                    "steps": [
                        { "key": "a", "step_name": "Welcome", "message_template": "Hi",
                          "options": { "1": "Start" }, "next_step": "b" },
                        {
                            "key": "b",
                            "step_name": "Collect Full Name",
                            "message_template": "Name?"
                        }
                    ]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(bundle.steps().count(), 2);
        assert_eq!(bundle.flows[0].steps[1].message_type, "text");
        assert!(bundle.flows[0].is_active);
    }

    #[test]
    fn it_should_reject_dangling_targets() {
        let err = FlowBundle::from_json(
            r#"{ "flows": [{ "name": "x", "category": "x", "steps": [
                { "key": "a", "step_name": "A", "message_template": "A",
                  "conditional_next_steps": { "*": "missing" } }
            ]}]}"#,
        );
        assert!(err.is_err());
    }
}
