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

//! Effective step: a hotel's step merged over its template.

use sea_orm::ConnectionTrait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use super::actions::Action;
use crate::db;
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Text,
    Media,
    QuickReply,
    ListPicker,
    CallToAction,
    Template,
}

impl MessageType {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().replace('_', "-").as_str() {
            "media" => Self::Media,
            "quick-reply" => Self::QuickReply,
            "list-picker" => Self::ListPicker,
            "call-to-action" => Self::CallToAction,
            "template" => Self::Template,
            _ => Self::Text,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EffectiveStep {
    /// Id of the hotel's `flow_step` row.
    pub id: i32,
    pub template_id: i32,
    pub flow_template_id: i32,
    pub category: String,
    pub step_name: String,
    pub message_template: Value,
    pub message_type: MessageType,
    /// Valid replies in authoring order, token to label.
    pub options: Vec<(String, String)>,
    pub actions: Vec<Action>,
    pub next_step_template_id: Option<i32>,
    pub conditional_next_steps: HashMap<String, Value>,
    pub allowed_flow_categories: Vec<String>,
    pub media_id: Option<i32>,
    pub data_key: Option<String>,
}

fn parse_options(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, label)| {
                let label = match label {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), label)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}

impl EffectiveStep {
    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    pub fn is_option(&self, token: &str) -> bool {
        self.options.iter().any(|(key, _)| key == token)
    }

    pub fn option_keys(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|(key, _)| key.as_str())
    }

    /// A transition target id; ids may be stored as numbers or numeric strings.
    pub fn conditional_target(&self, token: &str) -> Option<Option<i32>> {
        self.conditional_next_steps.get(token).map(|target| match target {
            Value::Number(n) => n.as_i64().and_then(|id| i32::try_from(id).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}

/// Load a step with overrides applied. `None` if the step or its template
/// is gone.
pub async fn load<C: ConnectionTrait>(step_id: i32, db: &C) -> Result<Option<EffectiveStep>> {
    let Some((step, template)) = db::flow_step::get_with_template(step_id, db).await? else {
        return Ok(None);
    };
    let Some(flow) = db::template::get_flow(template.flow_template_id, db).await? else {
        return Ok(None);
    };

    let options = parse_options(step.options.as_ref().unwrap_or(&template.options));
    let message_type = MessageType::parse(
        step.message_type
            .as_deref()
            .unwrap_or(template.message_type.as_str()),
    );

    let actions = match &template.actions {
        Value::Array(items) => items.iter().filter_map(Action::parse).collect(),
        Value::Null => Vec::new(),
        other => {
            warn!(step = %template.step_name, actions = %other, "ignoring malformed actions");
            Vec::new()
        }
    };

    let conditional_next_steps = match &template.conditional_next_steps {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => HashMap::new(),
    };

    Ok(Some(EffectiveStep {
        id: step.id,
        template_id: template.id,
        flow_template_id: template.flow_template_id,
        category: flow.category,
        step_name: template.step_name,
        message_template: step.message_template.unwrap_or(template.message_template),
        message_type,
        options,
        actions,
        next_step_template_id: template.next_step_template_id,
        conditional_next_steps,
        allowed_flow_categories: parse_strings(&template.allowed_flow_categories),
        media_id: step.media_id.or(template.media_id),
        data_key: template.data_key.filter(|k| !k.trim().is_empty()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_should_parse_message_types() {
        assert_eq!(MessageType::parse("quick_reply"), MessageType::QuickReply);
        assert_eq!(MessageType::parse("List-Picker"), MessageType::ListPicker);
        assert_eq!(MessageType::parse("whatever"), MessageType::Text);
    }

    #[test]
    fn it_should_keep_option_order() {
        let options = parse_options(&json!({ "2": "No", "1": "Yes", "10": { "label": "x" } }));
        let keys: Vec<_> = options.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["2", "1", "10"]);
        assert_eq!(options[0].1, "No");
    }
}
