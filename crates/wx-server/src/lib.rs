//! # wx-server
//!
//! Runtime services for the weather station, built on tokio.
//!
//! - [`Ingestor`] turns device payloads into readings and hands them to the
//!   latest-reading cache and the store, in that order
//! - [`publisher`] periodically republishes the latest stored reading to
//!   external services, one independent schedule per destination

pub mod error;
pub mod ingest;
pub mod publisher;

pub use error::{PublishError, PublisherError};
pub use ingest::{IngestOutcome, Ingestor};
pub use publisher::{
    EndpointPublisher, MultiPublisher, PublishOutcome, Publisher, PublisherRegistry,
    PublisherStats, PublisherStatus, ScheduledPublisher,
};
