//! Best-effort broadcast to several publishers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{publish_guarded, Publisher};
use crate::error::PublishError;

/// Outcome of one member of a fan-out.
#[derive(Debug)]
pub struct PublishOutcome {
    pub name: String,
    pub result: Result<(), PublishError>,
}

impl PublishOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Publishes to every member in order.
///
/// A member failing, or panicking, never keeps the remaining members from
/// being attempted.
#[derive(Clone, Default)]
pub struct MultiPublisher {
    members: Vec<Arc<dyn Publisher>>,
}

impl MultiPublisher {
    pub fn new(members: Vec<Arc<dyn Publisher>>) -> Self {
        Self { members }
    }

    pub fn push(&mut self, publisher: Arc<dyn Publisher>) {
        self.members.push(publisher);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Publish to all members and collect each outcome.
    pub async fn publish_all(&self) -> Vec<PublishOutcome> {
        let mut outcomes = Vec::with_capacity(self.members.len());

        for member in &self.members {
            let result = publish_guarded(member.as_ref()).await;
            if let Err(e) = &result {
                warn!(publisher = %member.name(), "Publish failed: {}", e);
            }
            outcomes.push(PublishOutcome {
                name: member.name().to_string(),
                result,
            });
        }

        outcomes
    }
}

#[async_trait]
impl Publisher for MultiPublisher {
    fn name(&self) -> &str {
        "multi"
    }

    /// Member failures are logged by [`MultiPublisher::publish_all`] and do
    /// not fail the broadcast.
    async fn publish(&self) -> Result<(), PublishError> {
        self.publish_all().await;
        Ok(())
    }
}
