//! Report pipelines built on top of a [`Querier`](crate::querier::Querier).

pub mod endpoints;
pub mod summary;
pub mod util;

pub use endpoints::{list_endpoints, ListEndpointsArgs};
pub use summary::directory_summary;
