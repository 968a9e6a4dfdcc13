//! # Rusty-Forum Binary
//!
//! Assembles the store, bookkeeping plugins and HTTP layer selected at
//! compile time, then serves the API.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use rf_api::middleware::{cors_policy, request_logger, security_headers};
use rf_api::{configure_routes, AppState};
use rf_config::{DatabaseSettings, LogSettings, Settings};
use rf_core::hooks::PostHooks;
use rf_core::traits::ObjectStore;
use rf_posts::PostService;
use tracing_subscriber::EnvFilter;

#[cfg(not(any(feature = "db-sqlite", feature = "db-memory")))]
compile_error!("enable a store backend: `db-sqlite` or `db-memory`");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);
    if let Some(path) = &settings.env_file {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let store = open_store(&settings.database).await?;
    let posts = PostService::new(
        Arc::clone(&store),
        Arc::new(PostHooks::new()),
        rf_bookkeeping::subsystems(Arc::clone(&store)),
        Arc::new(settings.posts),
    );
    let state = web::Data::new(AppState::new(Arc::new(posts), store));

    let (host, port) = (settings.server.host.clone(), settings.server.port);
    tracing::info!(%host, port, "rusty-forum listening");

    HttpServer::new(move || {
        App::new()
            .wrap(security_headers())
            .wrap(cors_policy())
            .wrap(request_logger())
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[cfg(feature = "db-sqlite")]
async fn open_store(database: &DatabaseSettings) -> anyhow::Result<Arc<dyn ObjectStore>> {
    use secrecy::ExposeSecret;

    let store = rf_db_sqlite::SqliteObjectStore::new(database.url.expose_secret()).await?;
    Ok(Arc::new(store))
}

#[cfg(all(feature = "db-memory", not(feature = "db-sqlite")))]
async fn open_store(_: &DatabaseSettings) -> anyhow::Result<Arc<dyn ObjectStore>> {
    tracing::warn!("using the in-memory store; nothing survives a restart");
    Ok(Arc::new(rf_db_memory::MemoryStore::new()))
}
