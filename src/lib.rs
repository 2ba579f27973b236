pub mod authentication;
pub mod client;
pub mod config;
pub mod entities;
pub mod error;
pub mod routes;
pub mod store;
pub mod templates;

use axum::http::HeaderValue;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tokio::net::TcpListener;

use authentication::TokenKeys;
use config::Config;
use store::Store;

/// Opens the database, initializes the schema and serves the API until the
/// process is stopped.
pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Store::new(pool);
    store.init_schema().await?;

    let keys = TokenKeys::from_secret(&config.jwt_secret);
    let origin = HeaderValue::from_str(&config.frontend_origin)?;
    let app = routes::router(store, keys, &origin);

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
