//! Periodic republishing of the latest reading.
//!
//! - [`Publisher`]: one publish attempt to one destination (or a group)
//! - [`EndpointPublisher`]: the HTTP destinations, built from configuration
//! - [`ScheduledPublisher`]: Stopped/Running lifecycle around a publisher,
//!   ticking every `interval` seconds
//! - [`MultiPublisher`]: best-effort fan-out over several publishers
//! - [`PublisherRegistry`]: everything built from the configuration file

mod destination;
mod fanout;
mod registry;
mod scheduler;
mod stats;

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::PublishError;

pub use destination::{Destination, EndpointPublisher, PUBLISH_TIMEOUT};
pub use fanout::{MultiPublisher, PublishOutcome};
pub use registry::PublisherRegistry;
pub use scheduler::ScheduledPublisher;
pub use stats::{PublisherStats, PublisherStatus};

/// A destination the latest reading can be published to.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Name used in logs and statistics.
    fn name(&self) -> &str;

    /// Publish the current reading once.
    async fn publish(&self) -> Result<(), PublishError>;
}

/// Run one publish, turning a panic into [`PublishError::Panicked`].
pub(crate) async fn publish_guarded(publisher: &dyn Publisher) -> Result<(), PublishError> {
    match AssertUnwindSafe(publisher.publish()).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(PublishError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
