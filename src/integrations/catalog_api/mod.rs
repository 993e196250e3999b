// src/integrations/catalog_api/mod.rs

pub mod client;

pub use client::CatalogApiClient;
