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

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde_json::{Error as SerdeError, json};
use std::io;
use thiserror::Error;

#[derive(Debug, Error, thiserror_ext::Box)]
#[thiserror_ext(newtype(name = LobbybeeError))]
pub enum LobbybeeErrorKind {
    #[error("API error: `{0}`")]
    Api(String),
    #[error("Bad request: `{0}`")]
    BadRequest(String),
    #[error("Engine error: `{0}`")]
    Engine(String),
    #[error("Configuration error: `{0}`")]
    Config(String),
    #[error("Transport error: `{0}`")]
    Transport(String),
    #[error("Database error: `{0}`")]
    Db(#[from] DbErr),
    #[error("I/O error: `{0}`")]
    Io(#[from] io::Error),
    #[error("Figment error: `{0}`")]
    Figment(#[from] figment::Error),
    #[error("Serialization/deserialization error: `{0}`")]
    Serde(#[from] SerdeError),
    #[error("HTTP error: `{0}`")]
    Http(#[from] reqwest::Error),
    #[error("Task timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

impl IntoResponse for LobbybeeError {
    fn into_response(self) -> Response {
        let status = match self.inner() {
            LobbybeeErrorKind::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(json!({ "status": "error", "message": self.to_string() })),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, LobbybeeError>;
