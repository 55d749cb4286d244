//! # wx-web
//!
//! HTTP surface of the weather station.
//!
//! This crate provides two routers, served on separate ports:
//! - [`ingest_router`] accepts device uploads on any path
//! - [`create_router`] serves the JSON query API under `/api`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wx_web::{create_router, ingest_router, ServerState};
//!
//! let state = Arc::new(ServerState::new(ingestor, station, registry.stats()));
//!
//! let listener = TcpListener::bind("0.0.0.0:8090").await?;
//! axum::serve(listener, ingest_router(state.clone())).await?;
//! ```

pub mod routes;

pub use routes::{create_router, ingest_router};

use std::sync::Arc;

use wx_core::{LatestReading, ReadingStore, Station};
use wx_server::{Ingestor, PublisherStats};

/// Shared state for all route handlers.
pub struct ServerState {
    pub ingestor: Ingestor,
    pub cache: Arc<LatestReading>,
    pub store: Arc<dyn ReadingStore>,
    pub station: Station,
    pub publishers: Vec<Arc<PublisherStats>>,
}

impl ServerState {
    /// Create state around an ingestor, sharing its cache and store.
    pub fn new(ingestor: Ingestor, station: Station, publishers: Vec<Arc<PublisherStats>>) -> Self {
        Self {
            cache: ingestor.cache().clone(),
            store: ingestor.store().clone(),
            ingestor,
            station,
            publishers,
        }
    }
}

/// Type alias for shared state in Axum handlers.
pub type AppState = Arc<ServerState>;
