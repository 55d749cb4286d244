//! Per-publisher statistics.
//!
//! Counters are updated by the scheduler task and read by the web API
//! without touching the scheduler's lifecycle lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Tracks outcomes of one publisher.
#[derive(Debug)]
pub struct PublisherStats {
    name: String,
    kind: &'static str,
    interval_secs: u64,
    running: AtomicBool,
    successes: AtomicU64,
    failures: AtomicU64,
    last_error: Mutex<Option<String>>,
    last_success: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time view of a publisher, as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub interval: u64,
    pub running: bool,
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

impl PublisherStats {
    pub fn new(name: impl Into<String>, kind: &'static str, interval_secs: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            interval_secs,
            running: AtomicBool::new(false),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_error: Mutex::new(None),
            last_success: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn record_success(&self, at: DateTime<Utc>) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        *self
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(at);
    }

    pub fn record_failure(&self, error: &dyn std::fmt::Display) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PublisherStatus {
        PublisherStatus {
            name: self.name.clone(),
            kind: self.kind.to_string(),
            interval: self.interval_secs,
            running: self.running.load(Ordering::Relaxed),
            successes: self.successes(),
            failures: self.failures(),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            last_success: *self
                .last_success
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_outcome_tracking() {
        let stats = PublisherStats::new("wu", "wunderground", 60);
        let at = Utc.with_ymd_and_hms(2024, 1, 17, 10, 0, 0).unwrap();

        stats.record_success(at);
        stats.record_failure(&"connection refused");
        stats.record_failure(&"timeout");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.failures, 2);
        assert_eq!(snapshot.last_error.as_deref(), Some("timeout"));
        assert_eq!(snapshot.last_success, Some(at));
        assert!(!snapshot.running);
    }

    #[test]
    fn test_status_json_shape() {
        let stats = PublisherStats::new("home", "custom", 30);
        stats.set_running(true);

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["name"], "home");
        assert_eq!(json["type"], "custom");
        assert_eq!(json["interval"], 30);
        assert_eq!(json["running"], true);
        assert!(json["lastError"].is_null());
    }
}
