//! Remote story API: endpoint catalog, wire types, and the clients.

pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod endpoints;
pub mod types;
