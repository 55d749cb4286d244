//! # wx-core
//!
//! Core weather station data model and store implementation.
//!
//! This crate provides:
//! - The [`Reading`] record and its primary [`Measurements`]
//! - Derived metrics (dew point, wind chill, heat index, cloud base)
//! - The [`LatestReading`] cache shared between ingestion and queries
//! - The [`ReadingStore`] contract with memory and file implementations
//! - Application configuration types
//!
//! This crate is intentionally runtime-agnostic and contains no async code.

pub mod cache;
pub mod config;
pub mod derived;
pub mod model;
pub mod store;
pub mod units;

pub use cache::LatestReading;
pub use config::{AppConfig, ConfigError, DestinationConfig, PublisherConfig, StorageConfig};
pub use derived::DerivedMetrics;
pub use model::{Measurements, Reading, Station};
pub use store::{FileStore, MemoryStore, ReadingStore, StoreError};
