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

//! Typed views over the schemaless JSON columns of a conversation.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue;
use serde_json::{Map, Value, json};

use crate::db::entities::conversation_context;

const ACCUMULATED: &str = "accumulated_data";
const CHECKIN: &str = "collected_checkin_data";
const GUEST_ID: &str = "guest_id";
const TEMP_GUEST: &str = "is_temp_guest";
const TEMP_NUMBER: &str = "temp_whatsapp_number";

/// Free-form `context_data` document with typed accessors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextData(Map<String, Value>);

impl ContextData {
    pub fn new() -> Self {
        let mut map = Map::new();
        map.insert(ACCUMULATED.to_owned(), json!({}));
        Self(map)
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_owned(), value);
    }

    fn bucket(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object)
    }

    fn insert_into(&mut self, bucket: &str, key: &str, value: &str) {
        let mut map = self.bucket(bucket).cloned().unwrap_or_default();
        map.insert(key.to_owned(), Value::String(value.to_owned()));
        self.0.insert(bucket.to_owned(), Value::Object(map));
    }

    pub fn accumulated(&self) -> Map<String, Value> {
        self.bucket(ACCUMULATED).cloned().unwrap_or_default()
    }

    pub fn accumulated_str(&self, key: &str) -> Option<&str> {
        self.bucket(ACCUMULATED)
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }

    pub fn accumulate(&mut self, key: &str, value: &str) {
        self.insert_into(ACCUMULATED, key, value);
    }

    pub fn clear_accumulated(&mut self) {
        self.0.insert(ACCUMULATED.to_owned(), json!({}));
    }

    pub fn checkin_data(&self) -> Map<String, Value> {
        self.bucket(CHECKIN).cloned().unwrap_or_default()
    }

    pub fn collect_checkin(&mut self, key: &str, value: &str) {
        self.insert_into(CHECKIN, key, value);
    }

    pub fn guest_id(&self) -> Option<i32> {
        self.0
            .get(GUEST_ID)
            .and_then(Value::as_i64)
            .and_then(|id| i32::try_from(id).ok())
    }

    pub fn set_guest_id(&mut self, id: i32) {
        self.0.insert(GUEST_ID.to_owned(), json!(id));
    }

    pub fn is_temp_guest(&self) -> bool {
        self.0
            .get(TEMP_GUEST)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn temp_whatsapp_number(&self) -> Option<&str> {
        self.get_str(TEMP_NUMBER)
    }

    pub fn mark_temp_guest(&mut self, number: &str) {
        self.0.insert(TEMP_GUEST.to_owned(), Value::Bool(true));
        self.0
            .insert(TEMP_NUMBER.to_owned(), Value::String(number.to_owned()));
    }

    /// Drop the check-in scratch keys once a guest record exists.
    pub fn clear_checkin_scratch(&mut self) {
        self.0.remove(TEMP_GUEST);
        self.0.remove(TEMP_NUMBER);
        self.0.remove(CHECKIN);
    }
}

/// A conversation context with its JSON columns decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversation {
    pub id: i32,
    pub user_id: String,
    pub hotel_id: Option<String>,
    pub current_step_id: Option<i32>,
    pub navigation_stack: Vec<i32>,
    pub data: ContextData,
    pub error_count: i32,
    pub is_active: bool,
    pub last_activity: DateTime<Utc>,
    pub last_guest_message_at: Option<DateTime<Utc>>,
    pub flow_expires_at: Option<DateTime<Utc>>,
}

impl From<conversation_context::Model> for Conversation {
    fn from(model: conversation_context::Model) -> Self {
        let navigation_stack = match model.navigation_stack {
            Value::Array(ids) => ids
                .iter()
                .filter_map(Value::as_i64)
                .filter_map(|id| i32::try_from(id).ok())
                .collect(),
            _ => Vec::new(),
        };
        Self {
            id: model.id,
            user_id: model.user_id,
            hotel_id: model.hotel_id,
            current_step_id: model.current_step_id,
            navigation_stack,
            data: ContextData::from_value(model.context_data),
            error_count: model.error_count,
            is_active: model.is_active,
            last_activity: model.last_activity,
            last_guest_message_at: model.last_guest_message_at,
            flow_expires_at: model.flow_expires_at,
        }
    }
}

impl Conversation {
    /// Every mutable column marked for writing.
    pub fn to_active_model(&self) -> conversation_context::ActiveModel {
        conversation_context::ActiveModel {
            id: ActiveValue::Unchanged(self.id),
            user_id: ActiveValue::Set(self.user_id.clone()),
            hotel_id: ActiveValue::Set(self.hotel_id.clone()),
            current_step_id: ActiveValue::Set(self.current_step_id),
            navigation_stack: ActiveValue::Set(json!(self.navigation_stack)),
            context_data: ActiveValue::Set(self.data.clone().into_value()),
            error_count: ActiveValue::Set(self.error_count),
            is_active: ActiveValue::Set(self.is_active),
            last_activity: ActiveValue::Set(self.last_activity),
            last_guest_message_at: ActiveValue::Set(self.last_guest_message_at),
            flow_expires_at: ActiveValue::Set(self.flow_expires_at),
            ..Default::default()
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.flow_expires_at.is_some_and(|expires| now > expires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_keep_buckets_separate() {
        let mut data = ContextData::new();
        data.accumulate("full_name", "John Doe");
        data.collect_checkin("full_name", "John Doe");
        data.mark_temp_guest("+1555");
        assert_eq!(data.accumulated_str("full_name"), Some("John Doe"));
        assert!(data.is_temp_guest());

        data.clear_checkin_scratch();
        assert!(!data.is_temp_guest());
        assert!(data.checkin_data().is_empty());
        assert_eq!(data.accumulated_str("full_name"), Some("John Doe"));

        data.clear_accumulated();
        assert!(data.accumulated().is_empty());
    }

    #[test]
    fn it_should_recover_from_malformed_documents() {
        let mut data = ContextData::from_value(json!("nonsense"));
        assert!(data.accumulated().is_empty());
        data.set("accumulated_data", json!(3));
        data.accumulate("room", "101");
        assert_eq!(data.accumulated_str("room"), Some("101"));
    }
}
