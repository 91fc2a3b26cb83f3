//! Demo backend: a thin proxy in front of a Traction agent plus the
//! socket relay that pushes agent webhooks to connected browsers.

#[macro_use]
extern crate log;

mod config;
mod error;
mod routes;
mod socket;
mod traction;

use std::sync::Arc;

use chrono::Utc;

use crate::{config::Config, socket::SocketRegistry, traction::TractionClient};

/// Shared handler state: one Traction client, one socket registry, and the
/// process start time doubling as the last-reset marker (the demo
/// environment is wiped by redeploying).
#[derive(Clone, Debug)]
pub struct AppState {
    pub traction: Arc<TractionClient>,
    pub sockets: SocketRegistry,
    pub started_at: chrono::DateTime<Utc>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    setup_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };
    let bind_address = config.bind_address();
    info!("Demo backend listening on {}", bind_address);

    let state = AppState {
        traction: Arc::new(TractionClient::new(&config)),
        sockets: SocketRegistry::new(),
        started_at: Utc::now(),
    };
    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|err| panic!("Cannot bind {bind_address}: {err}"));
    axum::serve(listener, app).await.unwrap();
}

fn setup_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);
}
