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

//! Placeholder substitution.
//!
//! Tokens look like `{name}`. A `placeholder` row maps a name to a dotted
//! `source.attribute` path over the guest, hotel, stay or accumulated data,
//! and accumulated keys are usable directly as tokens. A token nothing
//! resolves is left in the text as is.

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use sea_orm::ConnectionTrait;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::debug;

use crate::data::Conversation;
use crate::db::{self, entities::placeholder};
use crate::error::Result;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

const DATE_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Objects placeholders read from, serialized to JSON documents.
#[derive(Clone, Debug, Default)]
pub struct Sources {
    pub guest: Option<Value>,
    pub hotel: Option<Value>,
    pub stay: Option<Value>,
    pub accumulated: Map<String, Value>,
}

enum Resolution {
    Resolved(String),
    SourceMissing,
}

impl Sources {
    pub async fn load<C: ConnectionTrait>(conversation: &Conversation, db: &C) -> Result<Self> {
        let guest = match conversation.data.guest_id() {
            Some(id) => db::guest::get_by_id(id, db).await?,
            None => None,
        };
        let hotel = match conversation.hotel_id.as_deref() {
            Some(id) => db::hotel::get_by_id(id, db).await?,
            None => None,
        };
        let stay = match &guest {
            Some(guest) => {
                db::stay::get_active(guest.id, conversation.hotel_id.as_deref(), Utc::now(), db)
                    .await?
            }
            None => None,
        };

        Ok(Self {
            guest: guest.map(serde_json::to_value).transpose()?,
            hotel: hotel.map(serde_json::to_value).transpose()?,
            stay: stay.map(serde_json::to_value).transpose()?,
            accumulated: conversation.data.accumulated(),
        })
    }

    fn resolve(&self, logic: &str) -> Resolution {
        let Some((source, path)) = logic.trim().split_once('.') else {
            return Resolution::Resolved(String::new());
        };
        let root = match source {
            "guest" => self.guest.as_ref(),
            "hotel" => self.hotel.as_ref(),
            "stay" => self.stay.as_ref(),
            "accumulated_data" => {
                let (head, rest) = path.split_once('.').unwrap_or((path, ""));
                let value = self
                    .accumulated
                    .get(head)
                    .and_then(|v| if rest.is_empty() { Some(v) } else { walk(v, rest) });
                return Resolution::Resolved(value.map(display).unwrap_or_default());
            }
            _ => return Resolution::Resolved(String::new()),
        };
        match root {
            Some(root) => Resolution::Resolved(walk(root, path).map(display).unwrap_or_default()),
            None => Resolution::SourceMissing,
        }
    }
}

fn walk<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |node, segment| node.get(segment))
}

/// Datetimes are shown as `dd-mm-YYYY HH:MM`.
fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(at) => at.with_timezone(&Utc).format(DATE_FORMAT).to_string(),
            Err(_) => s.clone(),
        },
        other => other.to_string(),
    }
}

/// Every token name used anywhere inside `value`.
pub fn token_names(value: &Value) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect(value, &mut names);
    names
}

fn collect(value: &Value, names: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            for caps in TOKEN.captures_iter(s) {
                names.insert(caps[1].to_owned());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect(v, names)),
        Value::Object(map) => map.values().for_each(|v| collect(v, names)),
        _ => {}
    }
}

/// Replacement table for one render.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Substitutions(HashMap<String, String>);

impl Substitutions {
    pub fn build<'a>(
        names: impl IntoIterator<Item = &'a String>,
        rows: &[placeholder::Model],
        sources: &Sources,
    ) -> Self {
        let rows: HashMap<&str, &str> = rows
            .iter()
            .map(|row| (row.name.as_str(), row.resolving_logic.as_str()))
            .collect();
        let mut table = HashMap::new();
        for name in names {
            let direct = sources.accumulated.get(name).map(display);
            let value = match rows.get(name.as_str()) {
                Some(logic) => match sources.resolve(logic) {
                    Resolution::Resolved(value) => Some(value),
                    Resolution::SourceMissing => direct,
                },
                None => direct,
            };
            match value {
                Some(value) => {
                    table.insert(name.clone(), value);
                }
                None => debug!(placeholder = %name, "placeholder left unresolved"),
            }
        }
        Self(table)
    }

    /// Look up placeholder rows for every token in `template`.
    pub async fn prepare<C: ConnectionTrait>(
        template: &Value,
        sources: &Sources,
        db: &C,
    ) -> Result<Self> {
        let names: Vec<String> = token_names(template).into_iter().collect();
        if names.is_empty() {
            return Ok(Self::default());
        }
        let rows = db::placeholder::list_by_names(&names, db).await?;
        Ok(Self::build(&names, &rows, sources))
    }

    pub fn substitute(&self, text: &str) -> String {
        TOKEN
            .replace_all(text, |caps: &Captures| match self.0.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_owned(),
            })
            .into_owned()
    }

    /// Substitute every string leaf, leaving the input untouched.
    pub fn apply(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.substitute(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.apply(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.apply(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(name: &str, logic: &str) -> placeholder::Model {
        placeholder::Model {
            id: 0,
            name: name.to_owned(),
            resolving_logic: logic.to_owned(),
            description: None,
        }
    }

    fn rows() -> Vec<placeholder::Model> {
        vec![
            row("guest_name", "guest.full_name"),
            row("hotel_name", "hotel.name"),
            row("checkout", "stay.check_out_date"),
            row("broken", "nowhere.name"),
            row("missing_attr", "hotel.nonexistent"),
        ]
    }

    #[test]
    fn it_should_resolve_guest_and_hotel_tokens() {
        let sources = Sources {
            guest: Some(json!({ "full_name": "John Doe" })),
            hotel: Some(json!({ "name": "Seaside Inn" })),
            ..Default::default()
        };
        let template = json!("Hello {guest_name}, welcome to {hotel_name}!");
        let subs = Substitutions::build(&token_names(&template), &rows(), &sources);
        assert_eq!(
            subs.apply(&template),
            json!("Hello John Doe, welcome to Seaside Inn!")
        );
    }

    #[test]
    fn it_should_leave_unresolvable_tokens_alone() {
        let sources = Sources {
            hotel: Some(json!({ "name": "Seaside Inn" })),
            ..Default::default()
        };
        let template = json!("Hello {guest_name} at {hotel_name} {unknown_token}");
        let subs = Substitutions::build(&token_names(&template), &rows(), &sources);
        assert_eq!(
            subs.apply(&template),
            json!("Hello {guest_name} at Seaside Inn {unknown_token}")
        );
    }

    #[test]
    fn it_should_blank_bad_paths_and_format_dates() {
        let sources = Sources {
            hotel: Some(json!({ "name": "Seaside Inn" })),
            stay: Some(json!({ "check_out_date": "2025-03-04T11:30:00Z" })),
            ..Default::default()
        };
        let template = json!("[{broken}][{missing_attr}] out {checkout}");
        let subs = Substitutions::build(&token_names(&template), &rows(), &sources);
        assert_eq!(subs.apply(&template), json!("[][] out 04-03-2025 11:30"));
    }

    #[test]
    fn it_should_expose_accumulated_keys_and_walk_nested_payloads() {
        let mut accumulated = Map::new();
        accumulated.insert("room".to_owned(), json!("101"));
        accumulated.insert("guest_name".to_owned(), json!("Jane"));
        let sources = Sources {
            accumulated,
            ..Default::default()
        };
        let template = json!({
            "type": "interactive",
            "body": { "text": "Room {room} for {guest_name}" },
            "buttons": [{ "title": "{room}" }, 3, null]
        });
        let subs = Substitutions::build(&token_names(&template), &rows(), &sources);
        let rendered = subs.apply(&template);
        assert_eq!(rendered["body"]["text"], "Room 101 for Jane");
        assert_eq!(rendered["buttons"], json!([{ "title": "101" }, 3, null]));
        assert_eq!(template["body"]["text"], "Room {room} for {guest_name}");
    }
}
