//! Wayfarer: a caching, credential-forwarding proxy gateway for free
//! travel-information APIs.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;

pub use wayfarer_api_types as api_types;
