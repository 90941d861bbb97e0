//! Static table of source-file metadata per entity kind

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bundle::EntityKind;

/// Format of a source configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Yaml,
    Json,
    Properties,
}

impl FileKind {
    /// Extensions recognised for this format, in lookup order
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Yaml => &["yml", "yaml"],
            Self::Json => &["json"],
            Self::Properties => &["properties"],
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        [Self::Yaml, Self::Json, Self::Properties]
            .into_iter()
            .find(|kind| kind.extensions().contains(&extension))
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml => write!(f, "yaml"),
            Self::Json => write!(f, "json"),
            Self::Properties => write!(f, "properties"),
        }
    }
}

/// Where the entities of one kind are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeEntry {
    pub kind: EntityKind,
    /// File name without extension, under the `config` directory
    pub file_name: &'static str,
    pub file_kinds: &'static [FileKind],
}

impl EntityTypeEntry {
    pub fn tag(&self) -> &'static str {
        self.kind.wire_type()
    }
}

const STRUCTURED: &[FileKind] = &[FileKind::Yaml, FileKind::Json];
const WITH_PROPERTIES: &[FileKind] = &[FileKind::Yaml, FileKind::Json, FileKind::Properties];

/// Entity kinds read from configuration files
///
/// Folders have no file of their own; they follow from the paths of policies and
/// services.
#[derive(Debug, Clone)]
pub struct EntityTypeRegistry {
    entries: Vec<EntityTypeEntry>,
}

impl Default for EntityTypeRegistry {
    fn default() -> Self {
        let entry = |kind, file_name, file_kinds| EntityTypeEntry {
            kind,
            file_name,
            file_kinds,
        };
        Self {
            entries: vec![
                entry(EntityKind::Policy, "policies", STRUCTURED),
                entry(EntityKind::Service, "services", STRUCTURED),
                entry(EntityKind::Encass, "encass", STRUCTURED),
                entry(EntityKind::ListenPort, "listen-ports", STRUCTURED),
                entry(EntityKind::IdentityProvider, "identity-providers", STRUCTURED),
                entry(EntityKind::JdbcConnection, "jdbc-connections", STRUCTURED),
                entry(EntityKind::TrustedCert, "trusted-certs", STRUCTURED),
                entry(EntityKind::StoredPassword, "stored-passwords", STRUCTURED),
                entry(EntityKind::PrivateKey, "private-keys", STRUCTURED),
                entry(EntityKind::ScheduledTask, "scheduled-tasks", STRUCTURED),
                entry(EntityKind::JmsDestination, "jms-destinations", STRUCTURED),
                entry(EntityKind::PolicyBackedService, "policy-backed-services", STRUCTURED),
                entry(EntityKind::ClusterProperty, "cluster-properties", WITH_PROPERTIES),
            ],
        }
    }
}

impl EntityTypeRegistry {
    pub fn new(entries: Vec<EntityTypeEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> impl Iterator<Item = &EntityTypeEntry> {
        self.entries.iter()
    }

    pub fn entry(&self, kind: EntityKind) -> Option<&EntityTypeEntry> {
        self.entries.iter().find(|entry| entry.kind == kind)
    }

    /// Entity kind registered under a wire type tag
    pub fn entity_kind(&self, tag: &str) -> Option<EntityKind> {
        self.entries
            .iter()
            .find(|entry| entry.tag() == tag)
            .map(|entry| entry.kind)
    }

    /// Wire type tag of a registered kind
    pub fn tag(&self, kind: EntityKind) -> Option<&'static str> {
        self.entry(kind).map(EntityTypeEntry::tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_lookups_are_inverse() {
        let registry = EntityTypeRegistry::default();
        for entry in registry.entries() {
            assert_eq!(registry.entity_kind(entry.tag()), Some(entry.kind));
            assert_eq!(registry.tag(entry.kind), Some(entry.tag()));
        }
        assert_eq!(registry.entity_kind("FOLDER"), None);
        assert_eq!(registry.entity_kind("NOT_A_TYPE"), None);
    }

    #[test]
    fn test_only_cluster_properties_accept_properties_files() {
        let registry = EntityTypeRegistry::default();
        let with_properties: Vec<EntityKind> = registry
            .entries()
            .filter(|entry| entry.file_kinds.contains(&FileKind::Properties))
            .map(|entry| entry.kind)
            .collect();
        assert_eq!(with_properties, vec![EntityKind::ClusterProperty]);
        assert_eq!(FileKind::from_extension("yaml"), Some(FileKind::Yaml));
        assert_eq!(FileKind::from_extension("xml"), None);
    }
}
