pub mod entity;
pub mod invariants;

pub use entity::{AiringStatus, AnimeType, CatalogEntity, ExternalId};
pub use invariants::validate_catalog_entity;
