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

pub mod checkin;
pub mod context;
pub mod data;
pub mod db;
pub mod engine;
pub mod error;
pub mod import;
pub mod locks;
pub mod maintenance;
pub mod notify;
pub mod outbound;
pub mod reminder;
pub mod render;
pub mod server;
pub mod settings;
pub mod transport;
#[cfg(test)]
pub mod utils;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use sea_orm::{Database, DatabaseConnection};
use std::path::PathBuf;
use tracing::info;
use tracing_log::AsTrace;
use tracing_subscriber::EnvFilter;

use error::Result;
use settings::Settings;

/// The Lobbybee guest-engagement service
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Verbosity
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Configuration file (defaults to ./lobbybee.toml)
    #[arg(short, long, env = "LOBBYBEE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database URI
    #[arg(short, long)]
    database: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the webhook and admin API server
    Server(server::ServerArgs),
    /// Import a flow bundle
    Import {
        file: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Delete stale conversations
    Cleanup(StoreArgs),
    /// Delete every conversation with a demo hotel
    ResetDemo(StoreArgs),
    /// Delete everything stored about one user
    Wipe {
        user_id: String,
        #[command(flatten)]
        store: StoreArgs,
    },
}

fn init_tracing(verbose: &Verbosity<InfoLevel>) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbose.log_level_filter().as_trace().into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn open_store(args: &StoreArgs) -> Result<(Settings, DatabaseConnection)> {
    let mut settings = settings::load(args.config.as_deref())?;
    if let Some(database) = &args.database {
        settings.server.database = database.clone();
    }
    let db = Database::connect(&settings.server.database).await?;
    db::migration::migrate(&db).await?;
    Ok((settings, db))
}

////////////////////////////////////////////////////////////////////////////////
// PUBLIC FUNCTION
////////////////////////////////////////////////////////////////////////////////

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.verbose);

    match args.command {
        Commands::Server(server) => server::init_server(server).await,
        Commands::Import { file, store } => {
            let (settings, db) = open_store(&store).await?;
            let summary = import::import_file(&file, &settings.media_dir, &db).await?;
            info!(
                hotels = summary.hotels,
                placeholders = summary.placeholders,
                flows = summary.flows,
                steps = summary.steps,
                "imported {}",
                file.display()
            );
            Ok(())
        }
        Commands::Cleanup(store) => {
            let (settings, db) = open_store(&store).await?;
            maintenance::cleanup(&settings, &db).await?;
            Ok(())
        }
        Commands::ResetDemo(store) => {
            let (_, db) = open_store(&store).await?;
            maintenance::reset_demo(&db).await?;
            Ok(())
        }
        Commands::Wipe { user_id, store } => {
            let (_, db) = open_store(&store).await?;
            let user_id = lobbybee_common::webhook::normalize_phone(&user_id);
            maintenance::wipe_user(&user_id, &db).await?;
            Ok(())
        }
    }
}
