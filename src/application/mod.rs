//! Application services: credential resolution, upstream normalization and
//! the caching gateway.

pub mod credentials;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod transport;
