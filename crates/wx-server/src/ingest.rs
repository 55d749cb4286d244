//! Device payload ingestion.
//!
//! One call per inbound request. The cache is updated before the store
//! append so queries see the reading as soon as the handler returns, even
//! when persistence fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use wx_core::{LatestReading, Reading, ReadingStore};
use wx_protocol::{DeviceKind, FormPayload};

/// Result of ingesting one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The payload was converted and recorded.
    Accepted(Reading),
    /// The configured device type is not supported; nothing was recorded.
    Ignored,
}

/// Converts device payloads into readings and records them.
#[derive(Clone)]
pub struct Ingestor {
    device: Option<DeviceKind>,
    device_name: String,
    cache: Arc<LatestReading>,
    store: Arc<dyn ReadingStore>,
}

impl Ingestor {
    /// Create an ingestor for the configured device type.
    ///
    /// An unknown device type is accepted here; requests are then
    /// acknowledged but ignored.
    pub fn new(
        device_name: impl Into<String>,
        cache: Arc<LatestReading>,
        store: Arc<dyn ReadingStore>,
    ) -> Self {
        let device_name = device_name.into();
        Self {
            device: DeviceKind::from_name(&device_name),
            device_name,
            cache,
            store,
        }
    }

    pub fn device(&self) -> Option<DeviceKind> {
        self.device
    }

    pub fn cache(&self) -> &Arc<LatestReading> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    /// Ingest a payload stamped with the current time.
    pub fn ingest(&self, payload: &FormPayload) -> IngestOutcome {
        self.ingest_at(payload, Utc::now())
    }

    /// Ingest a payload stamped with `now`.
    ///
    /// Store failures are logged and do not change the outcome.
    pub fn ingest_at(&self, payload: &FormPayload, now: DateTime<Utc>) -> IngestOutcome {
        debug!(fields = ?payload.keys().collect::<Vec<_>>(), "Received weather data");

        let Some(device) = self.device else {
            warn!(device = %self.device_name, "Unsupported device type");
            return IngestOutcome::Ignored;
        };

        let reading = device.to_reading(payload, now);

        self.cache.update(reading);

        if let Err(e) = self.store.append(&reading) {
            error!("Error saving weather data: {}", e);
        }

        IngestOutcome::Accepted(reading)
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("device", &self.device_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wx_core::{MemoryStore, StoreError};

    struct FailingStore {
        attempts: AtomicUsize,
    }

    impl ReadingStore for FailingStore {
        fn append(&self, _reading: &Reading) -> Result<(), StoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }

        fn latest(&self) -> Result<Reading, StoreError> {
            Err(StoreError::Empty)
        }

        fn range(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Reading>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 17, 10, 0, 0).unwrap()
    }

    fn payload() -> FormPayload {
        FormPayload::parse("tempf=70.5&humidity=45&baromabsin=29.92&windspeedmph=5.5&winddir=180&uv=5")
            .unwrap()
    }

    #[test]
    fn test_ingest_updates_cache_and_store() {
        let cache = Arc::new(LatestReading::new());
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new("ecowitt", cache.clone(), store.clone());

        let outcome = ingestor.ingest_at(&payload(), now());
        let IngestOutcome::Accepted(reading) = outcome else {
            panic!("expected accepted");
        };

        assert_eq!(cache.get(), Some(reading));
        assert_eq!(store.latest().unwrap(), reading);
        assert_eq!(reading.wind_direction(), 180.0);
    }

    #[test]
    fn test_store_failure_still_updates_cache() {
        let cache = Arc::new(LatestReading::new());
        let store = Arc::new(FailingStore {
            attempts: AtomicUsize::new(0),
        });
        let ingestor = Ingestor::new("ecowitt", cache.clone(), store.clone());

        let outcome = ingestor.ingest_at(&payload(), now());

        assert!(matches!(outcome, IngestOutcome::Accepted(_)));
        assert!(cache.get().is_some());
        assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsupported_device_is_ignored() {
        let cache = Arc::new(LatestReading::new());
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new("davis", cache.clone(), store.clone());

        assert_eq!(ingestor.device(), None);
        assert_eq!(ingestor.ingest_at(&payload(), now()), IngestOutcome::Ignored);
        assert!(cache.get().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_device_name_is_case_insensitive() {
        let ingestor = Ingestor::new(
            "ECOWITT",
            Arc::new(LatestReading::new()),
            Arc::new(MemoryStore::new()),
        );
        assert_eq!(ingestor.device(), Some(DeviceKind::Ecowitt));
    }
}
