// src/integrations/mod.rs
//
// External Integrations Module
//
// HTTP clients for the remote catalog and the user's watch list, behind the
// gateway traits the sync services consume.

pub mod catalog_api;
pub mod gateways;
pub mod myanimelist;

pub use catalog_api::CatalogApiClient;
pub use gateways::{CatalogQuery, ExternalListProvider, RemoteCatalogGateway};
pub use myanimelist::MyAnimeListClient;

#[cfg(test)]
pub use gateways::{MockExternalListProvider, MockRemoteCatalogGateway};
