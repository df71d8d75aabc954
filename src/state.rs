//! Shared process state handed to every axum handler and WebSocket session,
//! mirroring the teacher's single `AppState` struct passed via `State<...>`.

use std::sync::Arc;

use crate::archive::blobstore::BlobStore;
use crate::broker::router::LocationRouter;
use crate::broker::Broker;
use crate::config::Config;
use crate::store::EventStore;

#[derive(Clone)]
pub struct AppState {
    pub store: EventStore,
    pub config: Arc<Config>,
    pub broker: Broker,
    pub blob_store: Arc<dyn BlobStore>,
    pub router: Arc<LocationRouter>,
}
