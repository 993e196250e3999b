use super::entity::CatalogEntity;
use crate::domain::{DomainError, DomainResult};

/// Validates all CatalogEntity invariants
pub fn validate_catalog_entity(entity: &CatalogEntity) -> DomainResult<()> {
    if entity.external_id.value() <= 0 {
        return Err(DomainError::InvariantViolation(format!(
            "External id must be positive, got {}",
            entity.external_id
        )));
    }

    if entity.title.trim().is_empty() {
        return Err(DomainError::InvariantViolation(format!(
            "Catalog entity {} has an empty title",
            entity.external_id
        )));
    }

    Ok(())
}

/// Invariants that must hold true for catalog entities:
///
/// 1. External id is positive and stable
/// 2. Title cannot be empty
/// 3. At most one entity per external id within a partition

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::ExternalId;

    #[test]
    fn test_valid_entity() {
        let entity = CatalogEntity::new(ExternalId(1), "Cowboy Bebop");
        assert!(validate_catalog_entity(&entity).is_ok());
    }

    #[test]
    fn test_empty_title_fails() {
        let entity = CatalogEntity::new(ExternalId(1), "  ");
        assert!(validate_catalog_entity(&entity).is_err());
    }

    #[test]
    fn test_non_positive_id_fails() {
        let entity = CatalogEntity::new(ExternalId(0), "Trigun");
        assert!(validate_catalog_entity(&entity).is_err());
    }
}
