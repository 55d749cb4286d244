//! Publishers built from configuration.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use wx_core::{ConfigError, PublisherConfig, ReadingStore};

use super::destination::EndpointPublisher;
use super::fanout::MultiPublisher;
use super::scheduler::ScheduledPublisher;
use super::stats::PublisherStats;
use super::Publisher;
use crate::error::PublisherError;

/// The set of scheduled publishers for this process.
#[derive(Default)]
pub struct PublisherRegistry {
    publishers: Vec<ScheduledPublisher>,
}

impl PublisherRegistry {
    pub fn new(publishers: Vec<ScheduledPublisher>) -> Self {
        Self { publishers }
    }

    /// Build publishers from decoded configuration entries.
    ///
    /// Disabled and invalid entries are skipped with a log line; they never
    /// prevent the remaining publishers from being built.
    pub fn from_configs(
        entries: Vec<Result<PublisherConfig, ConfigError>>,
        store: Arc<dyn ReadingStore>,
    ) -> Result<Self, PublisherError> {
        let client = EndpointPublisher::http_client()?;
        let mut publishers = Vec::new();

        for entry in entries {
            let config = match entry {
                Ok(config) => config,
                Err(e) => {
                    warn!("Skipping publisher: {}", e);
                    continue;
                }
            };

            if !config.enabled {
                info!(publisher = %config.name, "Publisher disabled");
                continue;
            }

            match build(&config, store.clone(), client.clone()) {
                Ok(publisher) => publishers.push(publisher),
                Err(e) => warn!("Skipping publisher {}: {}", config.name, e),
            }
        }

        Ok(Self { publishers })
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }

    pub fn publishers(&self) -> &[ScheduledPublisher] {
        &self.publishers
    }

    /// Statistics handles for every publisher, in configuration order.
    pub fn stats(&self) -> Vec<Arc<PublisherStats>> {
        self.publishers.iter().map(|p| p.stats().clone()).collect()
    }

    /// A fan-out over every publisher.
    pub fn fanout(&self) -> MultiPublisher {
        MultiPublisher::new(
            self.publishers
                .iter()
                .map(|p| p.publisher().clone())
                .collect(),
        )
    }

    /// Start every publisher. Returns how many were started.
    pub async fn start_all(&self) -> usize {
        let mut started = 0;
        for publisher in &self.publishers {
            match publisher.start().await {
                Ok(()) => started += 1,
                Err(e) => warn!("{}", e),
            }
        }
        started
    }

    /// Stop every publisher, waiting for in-flight publishes.
    pub async fn stop_all(&self) {
        for publisher in &self.publishers {
            if let Err(e) = publisher.stop().await {
                warn!("{}", e);
            }
        }
    }
}

fn build(
    config: &PublisherConfig,
    store: Arc<dyn ReadingStore>,
    client: Client,
) -> Result<ScheduledPublisher, PublisherError> {
    let endpoint = EndpointPublisher::new(config, store, client)?;
    let stats = Arc::new(PublisherStats::new(
        config.name.clone(),
        endpoint.destination().kind(),
        config.interval,
    ));
    let publisher: Arc<dyn Publisher> = Arc::new(endpoint);

    Ok(ScheduledPublisher::new(
        publisher,
        Duration::from_secs(config.interval),
        stats,
    ))
}
