use lostfound_common::{
    snowflake::{NodeId, NodeIdOutOfRangeError},
    util::{NonPositiveDurationError, PositiveDuration},
};
use lostfound_db::{DbError, MemoryStore, PgStore, Store};
use serde::Deserialize;
use server::ServerState;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid NODE_ID: {0}")]
    NodeId(#[from] NodeIdOutOfRangeError),
    #[error("TOKEN_TTL_SECONDS must be positive: {0}")]
    TokenTtl(#[from] NonPositiveDurationError),
    #[error("Error setting up the database: {0}")]
    Db(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: Option<String>,
    #[serde(default)]
    node_id: u16,
    token_ttl_seconds: Option<i64>,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lostfound_api=debug,\
                lostfound_db=debug,\
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

async fn connect_store(env: &Env) -> Result<Arc<dyn Store>, InitError> {
    let node_id = NodeId::try_from(env.node_id)?;

    if let Some(database_url) = &env.database_url {
        let store = PgStore::connect(database_url, node_id).await?;
        info!("Using postgres store");
        Ok(Arc::new(store))
    } else {
        warn!("DATABASE_URL is not set, posts will only be kept in memory");
        Ok(Arc::new(MemoryStore::new(node_id)))
    }
}

/// Cancels `token` on Ctrl-C or SIGTERM.
fn cancel_on_shutdown_signal(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                error!(%err, "Could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut terminate) => {
                    terminate.recv().await;
                }
                Err(err) => {
                    error!(%err, "Could not listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        info!("Shutting down");
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let token_ttl = env
        .token_ttl_seconds
        .map(|seconds| PositiveDuration::try_from(Duration::seconds(seconds)))
        .transpose()?;
    let store = connect_store(&env).await?;

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::app(ServerState { store, token_ttl }).layer(tracing_layer);

    let shutdown = CancellationToken::new();
    cancel_on_shutdown_signal(shutdown.clone());

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
