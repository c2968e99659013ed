use clap::Parser;
use tracing::info;

use symserv_server::{config::Config, http, state::AppState, telemetry};

/// Native crash-report symbol server.
///
/// All configuration is read from the environment (`SYMBOL_URLS` and
/// friends); this only exists for `--help` and `--version`.
#[derive(Parser)]
#[command(version, about)]
struct Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Cli::parse();
    telemetry::init();

    let config = Config::from_env()?;
    let bind_addr = config.bind_addr.clone();

    let state = AppState::build(config).await?;
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "symserv listening");
    axum::serve(listener, app).await?;
    Ok(())
}
