mod config;
mod map;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{config::ServerConfig, state::AppState};

/// HTTP journey planner over GTFS timetables
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: PathBuf,
    /// Address to listen on, overriding the configuration file
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn init_logger() {
    let default_level = LevelFilter::INFO;
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();
    let cli = Cli::parse();

    let mut config = match ServerConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    let loader_config = config.clone();
    let state = match tokio::task::spawn_blocking(move || AppState::load(&loader_config)).await {
        Ok(Ok(state)) => Arc::new(state),
        Ok(Err(e)) => {
            error!("failed to load timetable: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("loader task failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        stops = state.graph.node_count(),
        edges = state.graph.edge_count(),
        "transit graph ready"
    );

    let app = routes::build_router(state, config.max_concurrent_requests);
    let listener = match tokio::net::TcpListener::bind(config.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("cannot bind {}: {e}", config.bind);
            return ExitCode::FAILURE;
        }
    };
    info!("listening on {}", config.bind);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {e}");
        return ExitCode::FAILURE;
    }
    info!("shut down");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("cannot listen for shutdown signal: {e}");
    }
}
