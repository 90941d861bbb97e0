//! # Source Loader
//!
//! Reads a bundle's source directory into a [`Bundle`].
//!
//! ## Layout
//! ```text
//! <dir>/
//!   config/
//!     policies.yml           metadata merged into the policy XML records
//!     services.yml           keyed by service path
//!     cluster-properties.properties
//!     <entity file>.yml|.yaml|.json
//!     certificates/<name>.pem|.crt|.cer
//!   policy/
//!     <folder>/<name>.xml    policy path = relative path without `.xml`
//! ```
//!
//! Missing directories and files are skipped. A file that exists but cannot be parsed
//! fails the load. Folders are created for the ancestors of every policy and service
//! path, and identities are assigned once everything has been read.

pub mod properties;
pub mod registry;

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::bundle::*;
use crate::core::error::{BundleError, BundleResult};
use crate::core::ids::IdGenerator;

pub use properties::parse_properties;
pub use registry::{EntityTypeEntry, EntityTypeRegistry, FileKind};

pub const CONFIG_DIR: &str = "config";
pub const POLICY_DIR: &str = "policy";
pub const CERTIFICATES_DIR: &str = "certificates";

const POLICY_EXTENSION: &str = "xml";
const CERTIFICATE_EXTENSIONS: &[&str] = &["pem", "crt", "cer"];

/// A bean whose key (name, path or alias) is the map key in its source file
pub trait SourceEntity: DeserializeOwned {
    fn set_key(&mut self, key: &str);
}

macro_rules! source_entity {
    ($($bean:ty => $field:ident),* $(,)?) => {
        $(
            impl SourceEntity for $bean {
                fn set_key(&mut self, key: &str) {
                    self.$field = key.to_string();
                }
            }
        )*
    };
}

source_entity! {
    Policy => path,
    Service => path,
    Encass => name,
    ListenPort => name,
    IdentityProvider => name,
    JdbcConnection => name,
    TrustedCert => name,
    StoredPassword => name,
    PrivateKey => alias,
    ScheduledTask => name,
    JmsDestination => name,
    PolicyBackedService => name,
    ClusterProperty => name,
}

/// Load the bundle sources under `dir`
#[instrument(skip(registry, ids))]
pub async fn load_bundle(
    dir: &Path,
    registry: &EntityTypeRegistry,
    ids: &dyn IdGenerator,
    mode: BundleMode,
) -> BundleResult<Bundle> {
    if !is_dir(dir).await {
        return Err(BundleError::load(
            dir.display().to_string(),
            "source directory does not exist",
        ));
    }

    let mut bundle = Bundle::new().with_mode(mode);
    let config_dir = dir.join(CONFIG_DIR);

    for (path, file) in policy_files(&dir.join(POLICY_DIR)).await? {
        let xml = read_file(&file).await?;
        let mut policy = Policy::new(path);
        policy.policy_xml = Some(xml);
        bundle.add_policy(policy);
    }

    for entry in registry.entries() {
        load_entry(&mut bundle, &config_dir, entry).await?;
    }

    place_in_folders(&mut bundle, ids);
    bundle.certificate_files = certificate_files(&config_dir.join(CERTIFICATES_DIR)).await?;
    bundle.assign_identities(ids);

    info!(
        dir = %dir.display(),
        folders = bundle.folders.len(),
        policies = bundle.policies.len(),
        services = bundle.services.len(),
        encasses = bundle.encasses.len(),
        "Loaded bundle sources"
    );
    Ok(bundle)
}

async fn load_entry(bundle: &mut Bundle, config_dir: &Path, entry: &EntityTypeEntry) -> BundleResult<()> {
    match entry.kind {
        // Folders follow from entity paths
        EntityKind::Folder => {}
        EntityKind::Policy => {
            for (_, policy) in load_entities::<Policy>(config_dir, entry).await? {
                bundle.add_policy(policy);
            }
        }
        EntityKind::Service => bundle.services = load_entities(config_dir, entry).await?,
        EntityKind::Encass => bundle.encasses = load_entities(config_dir, entry).await?,
        EntityKind::ListenPort => bundle.listen_ports = load_entities(config_dir, entry).await?,
        EntityKind::IdentityProvider => {
            bundle.identity_providers = load_entities(config_dir, entry).await?
        }
        EntityKind::JdbcConnection => {
            bundle.jdbc_connections = load_entities(config_dir, entry).await?
        }
        EntityKind::TrustedCert => bundle.trusted_certs = load_entities(config_dir, entry).await?,
        EntityKind::StoredPassword => {
            bundle.stored_passwords = load_entities(config_dir, entry).await?
        }
        EntityKind::PrivateKey => bundle.private_keys = load_entities(config_dir, entry).await?,
        EntityKind::ScheduledTask => {
            bundle.scheduled_tasks = load_entities(config_dir, entry).await?
        }
        EntityKind::JmsDestination => {
            bundle.jms_destinations = load_entities(config_dir, entry).await?
        }
        EntityKind::PolicyBackedService => {
            bundle.policy_backed_services = load_entities(config_dir, entry).await?
        }
        EntityKind::ClusterProperty => {
            bundle.cluster_properties = load_entities(config_dir, entry).await?
        }
    }
    Ok(())
}

/// Read every file registered for `entry`, merging them into one keyed map
///
/// The same key appearing in two files (say `services.yml` and `services.json`) is
/// rejected.
pub async fn load_entities<T: SourceEntity>(
    config_dir: &Path,
    entry: &EntityTypeEntry,
) -> BundleResult<BTreeMap<String, T>> {
    let mut loaded: BTreeMap<String, T> = BTreeMap::new();
    for &file_kind in entry.file_kinds {
        for extension in file_kind.extensions() {
            let file = config_dir.join(format!("{}.{}", entry.file_name, extension));
            if !is_file(&file).await {
                continue;
            }
            let content = read_file(&file).await?;
            let parsed: BTreeMap<String, T> = parse_entities(file_kind, &content)
                .map_err(|message| BundleError::load(file.display().to_string(), message))?;
            debug!(file = %file.display(), entities = parsed.len(), "Read entity file");

            for (key, mut bean) in parsed {
                let key = normalize_key(entry.kind, &key);
                if loaded.contains_key(&key) {
                    return Err(BundleError::load(
                        file.display().to_string(),
                        format!("{} '{}' is already defined in another file", entry.kind, key),
                    ));
                }
                bean.set_key(&key);
                loaded.insert(key, bean);
            }
        }
    }
    Ok(loaded)
}

/// Parse the contents of one entity file
pub fn parse_entities<T: DeserializeOwned>(
    file_kind: FileKind,
    content: &str,
) -> Result<BTreeMap<String, T>, String> {
    match file_kind {
        FileKind::Yaml => serde_yaml::from_str::<Option<BTreeMap<String, T>>>(content)
            .map(Option::unwrap_or_default)
            .map_err(|e| e.to_string()),
        FileKind::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        FileKind::Properties => {
            // Each property becomes `{ "value": ... }` so it deserializes like a YAML entry
            let values: serde_json::Map<String, serde_json::Value> = parse_properties(content)?
                .into_iter()
                .map(|(key, value)| (key, serde_json::json!({ "value": value })))
                .collect();
            serde_json::from_value(serde_json::Value::Object(values)).map_err(|e| e.to_string())
        }
    }
}

fn normalize_key(kind: EntityKind, key: &str) -> String {
    if kind.is_folderable() {
        key.trim_matches('/').to_string()
    } else {
        key.to_string()
    }
}

/// Create the folders holding policies and services and point them at their folder
fn place_in_folders(bundle: &mut Bundle, ids: &dyn IdGenerator) {
    let policy_paths: Vec<String> = bundle.policies.keys().cloned().collect();
    for path in policy_paths {
        let folder_id = bundle.ensure_folder(parent_path(&path), ids);
        if let Some(policy) = bundle.policies.get_mut(&path) {
            policy.parent_folder.get_or_insert(folder_id);
        }
    }

    let service_paths: Vec<String> = bundle.services.keys().cloned().collect();
    for path in service_paths {
        let folder_id = bundle.ensure_folder(parent_path(&path), ids);
        if let Some(service) = bundle.services.get_mut(&path) {
            service.parent_folder.get_or_insert(folder_id);
        }
    }
}

/// Policy XML files below `root`, keyed by slash separated path without extension
async fn policy_files(root: &Path) -> BundleResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    if !is_dir(root).await {
        debug!(dir = %root.display(), "No policy directory");
        return Ok(files);
    }

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await.map_err(|e| load_error(&dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| load_error(&dir, e))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| load_error(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if has_extension(&path, &[POLICY_EXTENSION]) {
                let key = path
                    .strip_prefix(root)
                    .map_err(|e| load_error(&path, e))?
                    .with_extension("")
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((key, path));
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Certificate files keyed by file stem
async fn certificate_files(dir: &Path) -> BundleResult<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    if !is_dir(dir).await {
        return Ok(files);
    }

    let mut entries = fs::read_dir(dir).await.map_err(|e| load_error(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| load_error(dir, e))? {
        let path = entry.path();
        if !has_extension(&path, CERTIFICATE_EXTENSIONS) {
            continue;
        }
        let Some(name) = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
            continue;
        };
        if let Some(previous) = files.insert(name.clone(), path.clone()) {
            return Err(BundleError::load(
                path.display().to_string(),
                format!(
                    "certificate '{}' is also supplied by {}",
                    name,
                    previous.display()
                ),
            ));
        }
    }
    Ok(files)
}

async fn read_file(path: &Path) -> BundleResult<String> {
    fs::read_to_string(path).await.map_err(|e| load_error(path, e))
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extensions.contains(&extension))
        .unwrap_or(false)
}

fn load_error<E: std::fmt::Display>(path: &Path, err: E) -> BundleError {
    BundleError::load(path.display().to_string(), err.to_string())
}
