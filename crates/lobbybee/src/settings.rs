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

//! Layered configuration: compiled defaults, then `lobbybee.toml` (or the
//! file given with `--config`), then `LOBBYBEE_*` environment variables.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `LOBBYBEE_SERVER__AUTH`. Any key may instead be read from a file by
//! appending `_FILE`, e.g. `LOBBYBEE_WHATSAPP__ACCESS_TOKEN_FILE`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use figment_file_provider_adapter::FileAdapter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const DEFAULT_CONFIG_FILE: &str = "lobbybee.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub auth: String,
    pub database: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_owned(),
            auth: String::new(),
            database: "sqlite://lobbybee.db?mode=rwc".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsappSettings {
    pub api_base: String,
    pub phone_number_id: String,
    pub access_token: String,
    pub timeout_secs: u64,
}

impl Default for WhatsappSettings {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com/v20.0".to_owned(),
            phone_number_id: String::new(),
            access_token: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub expiry_hours: i64,
    pub max_errors: i32,
    pub window_hours: i64,
    pub stale_after_days: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            expiry_hours: 5,
            max_errors: 5,
            window_hours: 24,
            stale_after_days: 7,
        }
    }
}

/// Flow categories the engine dispatches to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    /// Tried in order; the first category with an active flow is the menu.
    pub main_menu: Vec<String>,
    pub checkin: String,
    pub discovery: String,
    pub demo: String,
    pub returning: String,
    pub in_stay: String,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            main_menu: vec!["main_menu".to_owned(), "random_guest".to_owned()],
            checkin: "hotel_checkin".to_owned(),
            discovery: "random_guest".to_owned(),
            demo: "new_guest_discovery".to_owned(),
            returning: "returning_guest".to_owned(),
            in_stay: "in_stay_services".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    /// Also push engine replies through the provider.
    pub send_replies: bool,
    pub max_retries: i32,
    pub task_timeout_secs: u64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            send_replies: false,
            max_retries: 3,
            task_timeout_secs: 30,
        }
    }
}

/// Messages queued ahead of time when a stay is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    pub enabled: bool,
    /// Hours after check-in to offer an extension, for stays under a day.
    pub short_stay_hours: i64,
    /// The same, for stays of a day or more.
    pub long_stay_hours: i64,
    pub extension_message: String,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            short_stay_hours: 11,
            long_stay_hours: 23,
            extension_message: "Would you like to extend your check-in?".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub whatsapp: WhatsappSettings,
    pub session: SessionSettings,
    pub flows: FlowSettings,
    pub delivery: DeliverySettings,
    pub reminders: ReminderSettings,
    pub media_dir: PathBuf,
    pub admin_number: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            whatsapp: WhatsappSettings::default(),
            session: SessionSettings::default(),
            flows: FlowSettings::default(),
            delivery: DeliverySettings::default(),
            reminders: ReminderSettings::default(),
            media_dir: PathBuf::from("media"),
            admin_number: None,
        }
    }
}

pub fn figment(path: Option<&Path>) -> Figment {
    let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    Figment::from(Serialized::defaults(Settings::default()))
        .merge(Toml::file(file))
        .merge(FileAdapter::wrap(Env::prefixed("LOBBYBEE_").split("__")))
}

pub fn load(path: Option<&Path>) -> Result<Settings> {
    Ok(figment(path).extract()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn it_should_use_defaults() {
        Jail::expect_with(|_| {
            let settings: Settings = figment(None).extract()?;
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.session.max_errors, 5);
            assert_eq!(settings.flows.main_menu[0], "main_menu");
            Ok(())
        });
    }

    #[test]
    fn it_should_layer_file_and_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "lobbybee.toml",
                r#"
                media_dir = "/srv/media"

                [server]
                bind = "0.0.0.0:8080"

                [session]
                expiry_hours = 2
                "#,
            )?;
            jail.create_file("admin.txt", "admin-phone")?;
            jail.set_env("LOBBYBEE_SERVER__AUTH", "bearer");
            jail.set_env("LOBBYBEE_ADMIN_NUMBER_FILE", "admin.txt");

            let settings: Settings = figment(None).extract()?;
            assert_eq!(settings.server.bind, "0.0.0.0:8080");
            assert_eq!(settings.server.auth, "bearer");
            assert_eq!(settings.session.expiry_hours, 2);
            assert_eq!(settings.session.window_hours, 24);
            assert_eq!(settings.media_dir, PathBuf::from("/srv/media"));
            assert_eq!(settings.admin_number.as_deref(), Some("admin-phone"));
            Ok(())
        });
    }
}
