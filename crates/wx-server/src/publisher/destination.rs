//! HTTP publish destinations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use tracing::debug;

use wx_core::{ConfigError, DestinationConfig, PublisherConfig, Reading, ReadingStore};
use wx_protocol::{CustomPayload, WundergroundUpload, WUNDERGROUND_URL};

use super::Publisher;
use crate::error::{PublishError, PublisherError};

/// Upper bound on one outbound HTTP call.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of response body bytes kept in a status error.
const ERROR_BODY_LIMIT: usize = 1024;

/// A validated destination.
#[derive(Debug, Clone)]
pub enum Destination {
    /// JSON body sent with a configured method and headers.
    Custom {
        url: Url,
        method: Method,
        headers: HeaderMap,
    },
    /// Weather Underground `updateraw` GET request.
    Wunderground {
        upload: WundergroundUpload,
        base_url: Url,
    },
}

impl Destination {
    /// Validate destination settings for the publisher `name`.
    pub fn from_config(name: &str, config: &DestinationConfig) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::Publisher {
            name: name.to_string(),
            reason,
        };

        match config {
            DestinationConfig::Custom {
                url,
                method,
                headers,
            } => {
                let url = Url::parse(url.trim()).map_err(|e| invalid(format!("bad url: {e}")))?;

                let method = match method.as_deref().map(str::trim) {
                    None | Some("") => Method::POST,
                    Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                        .map_err(|_| invalid(format!("bad HTTP method {m:?}")))?,
                };

                let mut header_map = HeaderMap::new();
                for (key, value) in headers {
                    let header_name = HeaderName::from_bytes(key.as_bytes())
                        .map_err(|_| invalid(format!("bad header name {key:?}")))?;
                    let header_value = HeaderValue::from_str(value)
                        .map_err(|_| invalid(format!("bad value for header {key:?}")))?;
                    header_map.insert(header_name, header_value);
                }

                Ok(Destination::Custom {
                    url,
                    method,
                    headers: header_map,
                })
            }
            DestinationConfig::Wunderground {
                station_id,
                api_key,
                base_url,
            } => {
                let base = base_url.as_deref().unwrap_or(WUNDERGROUND_URL);
                let base_url =
                    Url::parse(base).map_err(|e| invalid(format!("bad baseUrl: {e}")))?;

                Ok(Destination::Wunderground {
                    upload: WundergroundUpload::new(station_id.trim(), api_key.trim()),
                    base_url,
                })
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Destination::Custom { .. } => "custom",
            Destination::Wunderground { .. } => "wunderground",
        }
    }

    fn request(&self, client: &Client, reading: &Reading) -> RequestBuilder {
        match self {
            Destination::Custom {
                url,
                method,
                headers,
            } => client
                .request(method.clone(), url.clone())
                .json(&CustomPayload::from(reading))
                .headers(headers.clone()),
            Destination::Wunderground { upload, base_url } => {
                client.get(base_url.clone()).query(&upload.query(reading))
            }
        }
    }
}

/// Publishes the latest stored reading to one HTTP destination.
pub struct EndpointPublisher {
    name: String,
    destination: Destination,
    store: Arc<dyn ReadingStore>,
    client: Client,
    max_age: chrono::Duration,
}

impl EndpointPublisher {
    /// Build a publisher from validated configuration.
    ///
    /// `client` should come from [`EndpointPublisher::http_client`] so the
    /// request timeout applies.
    pub fn new(
        config: &PublisherConfig,
        store: Arc<dyn ReadingStore>,
        client: Client,
    ) -> Result<Self, PublisherError> {
        config.validate()?;
        let destination = Destination::from_config(&config.name, &config.destination)?;
        let max_age_secs = i64::try_from(config.max_age_secs()).unwrap_or(i64::MAX);

        Ok(Self {
            name: config.name.clone(),
            destination,
            store,
            client,
            max_age: chrono::Duration::seconds(max_age_secs),
        })
    }

    /// HTTP client with the publish timeout applied.
    pub fn http_client() -> Result<Client, PublisherError> {
        Ok(Client::builder().timeout(PUBLISH_TIMEOUT).build()?)
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Latest stored reading, if it is fresh enough to publish.
    async fn fresh_reading(&self) -> Result<Reading, PublishError> {
        let store = self.store.clone();
        let reading = tokio::task::spawn_blocking(move || store.latest())
            .await
            .map_err(|e| PublishError::Panicked(e.to_string()))??;

        let age = reading.age(Utc::now());
        if age > self.max_age {
            return Err(PublishError::Stale {
                timestamp: reading.timestamp(),
                age_secs: age.num_seconds(),
            });
        }

        Ok(reading)
    }
}

#[async_trait]
impl Publisher for EndpointPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self) -> Result<(), PublishError> {
        let reading = self.fresh_reading().await?;

        let response = self
            .destination
            .request(&self.client, &reading)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Status {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        debug!(
            publisher = %self.name,
            destination = self.destination.kind(),
            "Published reading from {}",
            reading.timestamp()
        );
        Ok(())
    }
}

/// Read at most [`ERROR_BODY_LIMIT`] bytes of an error response, dropping
/// the rest unread.
async fn error_body(mut response: Response) -> String {
    let mut bytes = Vec::new();
    while bytes.len() < ERROR_BODY_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => bytes.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }
    bytes.truncate(ERROR_BODY_LIMIT);

    let mut body = String::from_utf8_lossy(&bytes).into_owned();
    // A multibyte character split at the limit decodes to a wider
    // replacement character.
    if body.len() > ERROR_BODY_LIMIT {
        let cut = (0..=ERROR_BODY_LIMIT)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    body
}
