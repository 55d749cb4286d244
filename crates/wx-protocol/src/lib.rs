//! # wx-protocol
//!
//! Wire formats for the weather station pipeline.
//!
//! This crate defines:
//! - [`FormPayload`], the key/value form encoding devices push to us
//! - The Ecowitt protocol adapter turning a payload into a [`wx_core::Reading`]
//! - Outbound payloads for the custom endpoint and Weather Underground

pub mod ecowitt;
pub mod form;
pub mod outbound;

pub use ecowitt::DeviceKind;
pub use form::{FormError, FormPayload};
pub use outbound::{CustomPayload, WundergroundUpload, WUNDERGROUND_URL};
