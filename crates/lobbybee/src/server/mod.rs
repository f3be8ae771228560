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

pub mod api;
pub mod ingress;

use axum::{
    Router,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
};
use clap::Args;
use sea_orm::Database;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use crate::db;
use crate::error::Result;
use crate::locks::KeyedLocks;
use crate::{maintenance, outbound};
use crate::settings::{self, Settings};
use crate::transport::WhatsappClient;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Args)]
pub struct ServerArgs {
    /// Configuration file (defaults to ./lobbybee.toml)
    #[arg(short, long, env = "LOBBYBEE_CONFIG")]
    pub config: Option<PathBuf>,

    /// API authentication token
    #[arg(short, long)]
    pub auth: Option<String>,

    /// IP address and port to bind to
    #[arg(short, long)]
    pub bind: Option<String>,

    /// SQLite database URI
    #[arg(short, long)]
    pub database: Option<String>,
}

impl ServerArgs {
    /// Settings from the configuration layers with explicit flags on top.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = settings::load(self.config.as_deref())?;
        if let Some(auth) = &self.auth {
            settings.server.auth = auth.clone();
        }
        if let Some(bind) = &self.bind {
            settings.server.bind = bind.clone();
        }
        if let Some(database) = &self.database {
            settings.server.database = database.clone();
        }
        Ok(settings)
    }
}

async fn authenticate(
    State(state): State<api::ApiState>,
    req: Request,
    next: Next,
) -> std::result::Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .map(|header| header.strip_prefix("Bearer ").unwrap_or(header));

    match auth_header {
        Some(auth_header) if !state.auth.is_empty() && auth_header == state.auth => {
            Ok(next.run(req).await)
        }
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// The webhook is public; everything under `/api/v1` needs the token.
pub fn router(state: api::ApiState) -> Router {
    let admin = Router::new()
        .route("/api/v1/contexts/{user_id}", get(api::get_context))
        .route(
            "/api/v1/contexts/{user_id}/messages",
            get(api::get_context_messages),
        )
        .route("/api/v1/users/{user_id}", delete(api::delete_user))
        .route("/api/v1/users/{user_id}/queue", get(api::get_user_queue))
        .route("/api/v1/messages", post(api::post_message))
        .route("/api/v1/maintenance/cleanup", post(api::post_cleanup))
        .route("/api/v1/webhooks", get(api::get_webhook_logs))
        .route("/api/v1/stays", post(api::post_stay))
        .route(
            "/api/v1/hotels/{hotel_id}/notifications",
            get(api::get_notifications),
        )
        .route(
            "/api/v1/hotels/{hotel_id}/steps/{template_id}",
            put(api::put_step),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/webhook", post(api::post_webhook))
        .merge(admin)
        .with_state(state)
}

/// Hourly stale-context cleanup and lock table pruning.
fn spawn_maintenance(state: api::ApiState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        let limit = Duration::from_secs(state.settings.delivery.task_timeout_secs);
        loop {
            interval.tick().await;
            match tokio::time::timeout(limit, maintenance::cleanup(&state.settings, &state.db))
                .await
            {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => error!(error = %err, "scheduled cleanup failed"),
                Err(_) => warn!("scheduled cleanup timed out"),
            }
            match tokio::time::timeout(limit, outbound::drain_due(&state)).await {
                Ok(Ok(0)) => {}
                Ok(Ok(sent)) => info!(sent, "sent due queued messages"),
                Ok(Err(err)) => error!(error = %err, "failed to send due messages"),
                Err(_) => warn!("sending due messages timed out"),
            }
            state.turns.prune();
            state.drains.prune();
            debug!(turns = state.turns.len(), drains = state.drains.len(), "pruned lock tables");
        }
    });
}

pub async fn init_server(server: ServerArgs) -> Result<()> {
    let settings = server.settings()?;
    if settings.server.auth.is_empty() {
        warn!("no API token configured, the admin API will reject every request");
    }

    let db = Database::connect(&settings.server.database).await?;
    db::migration::migrate(&db).await?;

    let transport = WhatsappClient::new(&settings.whatsapp)?;
    let state = api::ApiState {
        db,
        auth: settings.server.auth.clone(),
        settings: Arc::new(settings),
        transport: Arc::new(transport),
        turns: KeyedLocks::new(),
        drains: KeyedLocks::new(),
    };
    spawn_maintenance(state.clone());

    let bind = state.settings.server.bind.clone();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(%bind, "server is running");
    axum::serve(listener, app).await?;
    Ok(())
}
