//! # Identifier Generation
//!
//! Gateway entities are identified by 32 character lower-case hex strings, policies and
//! encapsulated assertions additionally by a dashed UUID guid. Identifiers are either
//! assigned by the target gateway (and carried in the source files) or generated
//! locally while loading a bundle.
//!
//! Generated identifiers are name based: the first 16 bytes of
//! `sha256(seed, kind, key, field)`. A bundle therefore deploys the same ids whether
//! it is compiled on its own or loaded as a dependency of another bundle, and
//! references into it stay valid across builds.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::bundle::EntityKind;

pub const DEFAULT_ID_SEED: &str = "gateway-bundler";

/// Which identifier of an entity is being generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdField {
    Id,
    /// Policies and encapsulated assertions carry a guid next to their id
    Guid,
}

impl IdField {
    fn label(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Guid => "guid",
        }
    }
}

/// Produces the identifier for one field of one entity
pub trait IdGenerator: Send + Sync + std::fmt::Debug {
    /// `key` is the entity's source key: folder or policy path, or entity name
    fn generate(&self, kind: EntityKind, key: &str, field: IdField) -> String;
}

/// Generator deriving identifiers from the entity they identify
#[derive(Debug, Clone)]
pub struct NameBasedIdGenerator {
    seed: String,
}

impl NameBasedIdGenerator {
    pub fn new<S: Into<String>>(seed: S) -> Self {
        Self { seed: seed.into() }
    }
}

impl Default for NameBasedIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_SEED)
    }
}

impl IdGenerator for NameBasedIdGenerator {
    fn generate(&self, kind: EntityKind, key: &str, field: IdField) -> String {
        let mut hasher = Sha256::new();
        // Separators keep ("ab", "c") and ("a", "bc") apart
        for part in [self.seed.as_str(), kind.wire_type(), key, field.label()] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        match field {
            IdField::Id => hex::encode(bytes),
            IdField::Guid => Uuid::from_bytes(bytes).hyphenated().to_string(),
        }
    }
}

/// Identifier settings from the compiler configuration
///
/// Every bundle that references another must be built with the same seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdGeneration {
    pub seed: String,
}

impl Default for IdGeneration {
    fn default() -> Self {
        Self {
            seed: DEFAULT_ID_SEED.to_string(),
        }
    }
}

impl IdGeneration {
    pub fn generator(&self) -> NameBasedIdGenerator {
        NameBasedIdGenerator::new(self.seed.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_32_lowercase_hex_chars() {
        let id = NameBasedIdGenerator::default().generate(EntityKind::Policy, "a/b", IdField::Id);
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let guid = NameBasedIdGenerator::default().generate(EntityKind::Policy, "a/b", IdField::Guid);
        assert_eq!(guid.len(), 36);
        assert!(Uuid::parse_str(&guid).is_ok());
    }

    #[test]
    fn test_ids_depend_only_on_their_inputs() {
        let a = NameBasedIdGenerator::new("seed");
        let b = NameBasedIdGenerator::new("seed");
        let id = a.generate(EntityKind::Policy, "lib/auth", IdField::Id);

        assert_eq!(id, b.generate(EntityKind::Policy, "lib/auth", IdField::Id));
        assert_eq!(id, a.generate(EntityKind::Policy, "lib/auth", IdField::Id));
        assert_ne!(id, a.generate(EntityKind::Policy, "lib/auth", IdField::Guid));
        assert_ne!(id, a.generate(EntityKind::Encass, "lib/auth", IdField::Id));
        assert_ne!(id, a.generate(EntityKind::Policy, "lib/other", IdField::Id));
        assert_ne!(
            id,
            NameBasedIdGenerator::new("other").generate(EntityKind::Policy, "lib/auth", IdField::Id)
        );
    }

    #[test]
    fn test_parts_are_not_concatenated_ambiguously() {
        let ids = NameBasedIdGenerator::new("ab");
        assert_ne!(
            ids.generate(EntityKind::Folder, "c", IdField::Id),
            NameBasedIdGenerator::new("a").generate(EntityKind::Folder, "bc", IdField::Id)
        );
    }
}
