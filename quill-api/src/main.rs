use quill_common::{
    snowflake::{SnowflakeError, SnowflakeGenerator},
    util::PositiveDuration,
};
use quill_db::{
    client::DbClient,
    memory::MemoryStore,
    store::{DbError, Store},
};
use serde::Deserialize;
use server::{ServerState, Settings, SiteInfo};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tokio::signal::ctrl_c;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;
mod social;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid snowflake configuration: {0}")]
    Snowflake(#[from] SnowflakeError),
    #[error("Error preparing the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    #[serde(default = "default_server_address")]
    server_address: IpAddr,
    #[serde(default = "default_server_port")]
    server_port: u16,
    /// Without it everything lives in memory and is gone on restart.
    database_url: Option<String>,
    #[serde(default)]
    worker_id: u8,
    #[serde(default)]
    process_id: u8,
    #[serde(default = "default_page_size")]
    page_size: usize,
    /// Zero or unset means tokens never expire.
    token_lifetime_hours: Option<u32>,
    #[serde(default = "default_site_title")]
    site_title: String,
    #[serde(default)]
    site_header: String,
}

fn default_server_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_server_port() -> u16 {
    3000
}

fn default_page_size() -> usize {
    quill_common::page::DEFAULT_PER_PAGE
}

fn default_site_title() -> String {
    "Quill".to_owned()
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quill_api=debug,quill_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn open_store(env: &Env) -> Result<Arc<dyn Store>, InitError> {
    let snowflake_generator = SnowflakeGenerator::new(env.worker_id, env.process_id)?;

    match &env.database_url {
        Some(url) => {
            let client = DbClient::connect(url, snowflake_generator).await?;
            client.migrate().await?;
            info!("Connected to database");
            Ok(Arc::new(client))
        }
        None => {
            warn!("DATABASE_URL is not set, keeping everything in memory");
            Ok(Arc::new(MemoryStore::new(snowflake_generator)))
        }
    }
}

fn settings(env: &Env) -> Settings {
    Settings {
        site: SiteInfo {
            title: env.site_title.clone(),
            header: env.site_header.clone(),
        },
        page_size: env.page_size.max(1),
        token_lifetime: env
            .token_lifetime_hours
            .and_then(|hours| PositiveDuration::new(time::Duration::hours(hours.into()))),
    }
}

/// Cancels `shutdown` on Ctrl+C.
fn watch_for_shutdown(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => error!(%err, "Could not listen for Ctrl+C, shutting down"),
        }
        shutdown.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let state = ServerState {
        store: open_store(&env).await?,
        settings: Arc::new(settings(&env)),
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().with_state(state).layer(tracing_layer);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = CancellationToken::new();
    watch_for_shutdown(shutdown.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
