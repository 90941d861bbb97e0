//! # Bundle Entity Store
//!
//! A `Bundle` holds every entity loaded for one configuration unit: one sorted map per
//! entity kind, the certificate files supplied alongside the sources, and read-only
//! references to dependency bundles used to satisfy references that cannot be
//! resolved locally.
//!
//! ## Lifecycle
//! 1. Loaders populate the entity maps (the only phase that mutates them)
//! 2. [`Bundle::assign_identities`] gives every entity lacking an id one derived from
//!    its kind and key
//! 3. [`Bundle::build_folder_tree`] freezes the folder hierarchy
//! 4. From here on the bundle and its dependencies are only read

pub mod entities;
pub mod folder_tree;
pub mod kind;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::core::error::{BundleError, BundleResult};
use crate::core::ids::{IdField, IdGenerator};

pub use entities::*;
pub use folder_tree::FolderTree;
pub use kind::EntityKind;

/// Which kind of bundle is being produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleMode {
    /// Solution bundle: environment entities are referenced, not carried
    #[default]
    Deployment,
    /// Environment bundle: environment entities carry their full configuration
    Environment,
}

/// Cross-bundle lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    pub entity_type: EntityKind,
}

impl Dependency {
    pub fn new<S: Into<String>>(id: S, entity_type: EntityKind) -> Self {
        Self {
            id: id.into(),
            entity_type,
        }
    }
}

/// Where a reference was satisfied
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a, T> {
    Local(&'a T),
    /// Found in exactly one dependency bundle, identified by its position
    External { bundle: usize, entity: &'a T },
}

impl<'a, T> Resolved<'a, T> {
    pub fn entity(&self) -> &'a T {
        match self {
            Self::Local(entity) => entity,
            Self::External { entity, .. } => entity,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bundle {
    /// Keyed by folder path, the root folder has the empty path
    pub folders: BTreeMap<String, Folder>,
    /// Keyed by policy path
    pub policies: BTreeMap<String, Policy>,
    /// Keyed by service path (equal to the backing policy's path)
    pub services: BTreeMap<String, Service>,
    pub encasses: BTreeMap<String, Encass>,
    pub listen_ports: BTreeMap<String, ListenPort>,
    pub identity_providers: BTreeMap<String, IdentityProvider>,
    pub jdbc_connections: BTreeMap<String, JdbcConnection>,
    pub trusted_certs: BTreeMap<String, TrustedCert>,
    pub stored_passwords: BTreeMap<String, StoredPassword>,
    /// Keyed by alias
    pub private_keys: BTreeMap<String, PrivateKey>,
    pub scheduled_tasks: BTreeMap<String, ScheduledTask>,
    pub jms_destinations: BTreeMap<String, JmsDestination>,
    pub policy_backed_services: BTreeMap<String, PolicyBackedService>,
    pub cluster_properties: BTreeMap<String, ClusterProperty>,
    /// Certificate name -> file holding the PEM or DER encoded certificate
    pub certificate_files: BTreeMap<String, PathBuf>,
    folder_tree: Option<FolderTree>,
    dependencies: Vec<Arc<Bundle>>,
    mode: Option<BundleMode>,
}

impl Bundle {
    pub fn new() -> Self {
        let mut bundle = Self::default();
        bundle.folders.insert(String::new(), Folder::root());
        bundle
    }

    pub fn with_mode(mut self, mode: BundleMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn mode(&self) -> BundleMode {
        self.mode.unwrap_or_default()
    }

    pub fn add_dependency(&mut self, dependency: Arc<Bundle>) {
        self.dependencies.push(dependency);
    }

    pub fn dependencies(&self) -> &[Arc<Bundle>] {
        &self.dependencies
    }

    /// Make sure the folder at `path` and all of its ancestors exist, returning its id
    pub fn ensure_folder(&mut self, path: &str, ids: &dyn IdGenerator) -> String {
        if let Some(folder) = self.folders.get(path) {
            return folder.id.clone();
        }
        if path.is_empty() {
            let root = Folder::root();
            let id = root.id.clone();
            self.folders.insert(String::new(), root);
            return id;
        }
        let parent_id = self.ensure_folder(parent_path(path), ids);
        let folder = Folder::new(ids.generate(EntityKind::Folder, path, IdField::Id), path, Some(parent_id));
        let id = folder.id.clone();
        debug!(path = %path, id = %id, "Created folder");
        self.folders.insert(path.to_string(), folder);
        id
    }

    /// Insert a policy, merging it into an existing record with the same path
    pub fn add_policy(&mut self, policy: Policy) {
        match self.policies.get_mut(&policy.path) {
            Some(existing) => existing.merge(policy),
            None => {
                self.policies.insert(policy.path.clone(), policy);
            }
        }
    }

    /// Give every entity without an identifier a generated one
    ///
    /// Generated identifiers depend only on the entity's kind and key, so assigning
    /// them again (or in another build of the same sources) changes nothing.
    pub fn assign_identities(&mut self, ids: &dyn IdGenerator) {
        fn fill<T>(
            map: &mut BTreeMap<String, T>,
            kind: EntityKind,
            ids: &dyn IdGenerator,
            field: IdField,
            slot_of: impl Fn(&mut T) -> &mut Option<String>,
        ) {
            for (key, entity) in map.iter_mut() {
                let slot = slot_of(entity);
                if slot.is_none() {
                    *slot = Some(ids.generate(kind, key, field));
                }
            }
        }

        use EntityKind as K;
        use IdField::{Guid, Id};
        fill(&mut self.policies, K::Policy, ids, Id, |e| &mut e.id);
        fill(&mut self.policies, K::Policy, ids, Guid, |e| &mut e.guid);
        fill(&mut self.services, K::Service, ids, Id, |e| &mut e.id);
        fill(&mut self.encasses, K::Encass, ids, Id, |e| &mut e.id);
        fill(&mut self.encasses, K::Encass, ids, Guid, |e| &mut e.guid);
        fill(&mut self.listen_ports, K::ListenPort, ids, Id, |e| &mut e.id);
        fill(&mut self.identity_providers, K::IdentityProvider, ids, Id, |e| &mut e.id);
        fill(&mut self.jdbc_connections, K::JdbcConnection, ids, Id, |e| &mut e.id);
        fill(&mut self.trusted_certs, K::TrustedCert, ids, Id, |e| &mut e.id);
        fill(&mut self.stored_passwords, K::StoredPassword, ids, Id, |e| &mut e.id);
        fill(&mut self.scheduled_tasks, K::ScheduledTask, ids, Id, |e| &mut e.id);
        fill(&mut self.jms_destinations, K::JmsDestination, ids, Id, |e| &mut e.id);
        fill(&mut self.policy_backed_services, K::PolicyBackedService, ids, Id, |e| &mut e.id);
        fill(&mut self.cluster_properties, K::ClusterProperty, ids, Id, |e| &mut e.id);
    }

    /// Build and keep the folder tree; the folder map must not change afterwards
    pub fn build_folder_tree(&mut self) -> BundleResult<&FolderTree> {
        let tree = FolderTree::new(self.folders.values().cloned())?;
        debug!(folders = tree.len(), "Built folder tree");
        Ok(self.folder_tree.insert(tree))
    }

    pub fn folder_tree(&self) -> Option<&FolderTree> {
        self.folder_tree.as_ref()
    }

    /// Resolve `key` locally, then in exactly one dependency bundle
    ///
    /// A local entity silently shadows dependency bundles. More than one dependency
    /// bundle defining `key` is an error even when each bundle is valid on its own.
    pub fn resolve<'a, T, F>(
        &'a self,
        kind: EntityKind,
        key: &str,
        referrer: &str,
        select: F,
    ) -> BundleResult<Resolved<'a, T>>
    where
        F: Fn(&'a Bundle) -> &'a BTreeMap<String, T>,
    {
        if let Some(entity) = select(self).get(key) {
            return Ok(Resolved::Local(entity));
        }

        let mut matches = self
            .dependencies
            .iter()
            .enumerate()
            .filter_map(|(index, bundle)| select(bundle.as_ref()).get(key).map(|e| (index, e)));

        match (matches.next(), matches.count()) {
            (None, _) => Err(BundleError::missing(kind.to_string(), key, referrer)),
            (Some((bundle, entity)), 0) => Ok(Resolved::External { bundle, entity }),
            (Some(_), others) => Err(BundleError::ambiguous(kind.to_string(), key, others + 1)),
        }
    }

    pub fn resolve_policy(&self, path: &str, referrer: &str) -> BundleResult<Resolved<'_, Policy>> {
        self.resolve(EntityKind::Policy, path, referrer, |bundle| &bundle.policies)
    }

    pub fn resolve_encass(&self, name: &str, referrer: &str) -> BundleResult<Resolved<'_, Encass>> {
        self.resolve(EntityKind::Encass, name, referrer, |bundle| &bundle.encasses)
    }

    /// Name of the local entity of `kind` carrying identifier `id`
    pub fn entity_name_by_id(&self, kind: EntityKind, id: &str) -> Option<String> {
        fn find<'a, T>(
            map: &'a BTreeMap<String, T>,
            id: &str,
            get: impl Fn(&T) -> Option<&str>,
        ) -> Option<String> {
            map.iter()
                .find(|(_, entity)| get(entity) == Some(id))
                .map(|(key, _)| key.clone())
        }

        match kind {
            EntityKind::Folder => find(&self.folders, id, |e| Some(e.id.as_str())),
            EntityKind::Policy => find(&self.policies, id, |e| e.id.as_deref()),
            EntityKind::Service => find(&self.services, id, |e| e.id.as_deref()),
            EntityKind::Encass => find(&self.encasses, id, |e| e.id.as_deref()),
            EntityKind::ListenPort => find(&self.listen_ports, id, |e| e.id.as_deref()),
            EntityKind::IdentityProvider => find(&self.identity_providers, id, |e| e.id.as_deref()),
            EntityKind::JdbcConnection => find(&self.jdbc_connections, id, |e| e.id.as_deref()),
            EntityKind::TrustedCert => find(&self.trusted_certs, id, |e| e.id.as_deref()),
            EntityKind::StoredPassword => find(&self.stored_passwords, id, |e| e.id.as_deref()),
            EntityKind::PrivateKey => self
                .private_keys
                .iter()
                .find(|(_, key)| key.key_id() == id)
                .map(|(alias, _)| alias.clone()),
            EntityKind::ScheduledTask => find(&self.scheduled_tasks, id, |e| e.id.as_deref()),
            EntityKind::JmsDestination => find(&self.jms_destinations, id, |e| e.id.as_deref()),
            EntityKind::PolicyBackedService => {
                find(&self.policy_backed_services, id, |e| e.id.as_deref())
            }
            EntityKind::ClusterProperty => find(&self.cluster_properties, id, |e| e.id.as_deref()),
        }
    }

    /// Look a dependency up across the dependency bundles, returning the entity name
    pub fn find_dependency(&self, dependency: &Dependency) -> Option<String> {
        self.dependencies
            .iter()
            .find_map(|bundle| bundle.entity_name_by_id(dependency.entity_type, &dependency.id))
    }

    /// Identifier of the folder a folderable entity lives in, as sent to the gateway
    pub fn wire_folder_id<'a>(&'a self, parent_folder: Option<&'a str>) -> &'a str {
        match (parent_folder, self.folder_tree()) {
            (Some(id), Some(tree)) if tree.is_root(id) => ROOT_FOLDER_ID,
            (Some(id), _) => id,
            (None, _) => ROOT_FOLDER_ID,
        }
    }
}
