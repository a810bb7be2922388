//! Domain layer: the endpoint catalog and request validation rules.

pub mod endpoint;
pub mod error;
pub mod request;

pub use endpoint::{EndpointId, Provider, TtlClass};
pub use error::DomainError;
pub use request::{BoundingBox, QueryParams, UpstreamRequest};
