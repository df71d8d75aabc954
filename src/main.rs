use std::net::SocketAddr;
use std::sync::Arc;

use clipcast_relay::archive::blobstore::{BlobStore, LocalFsBlobStore};
use clipcast_relay::broker::router::{LocationRouter, DEFAULT_SHARDS};
use clipcast_relay::broker::Broker;
use clipcast_relay::config::Config;
use clipcast_relay::state::AppState;
use clipcast_relay::store::EventStore;
use clipcast_relay::{archive, http};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(50)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations").run(&pool).await.expect("failed to run migrations");

    let blob_store: Arc<dyn BlobStore> = Arc::new(LocalFsBlobStore::new(&config.archive_root));

    let archive_handle = archive::spawn(pool.clone(), blob_store.clone(), config.clone());
    drop(archive_handle); // runs for the life of the process; nothing observes its JoinHandle

    let broker = Broker::spawn(DEFAULT_SHARDS);
    let router = Arc::new(LocationRouter::default_table());

    let state = AppState {
        store: EventStore::new(pool),
        config: Arc::new(config.clone()),
        broker,
        blob_store,
        router,
    };

    let app = http::router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.relay_port).parse().expect("invalid RELAY_PORT");
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listening socket");
    axum::serve(listener, app).await.expect("server error");
}
