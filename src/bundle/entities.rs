//! # Entity Beans
//!
//! Typed records for every entity kind a bundle holds. Beans are produced by the
//! source loader (deserialized with serde from YAML/JSON/properties files, or built
//! from policy XML files) and consumed read-only by the entity builders.
//!
//! Keys (paths and names) come from the map key in the source file, so they are
//! skipped during deserialization and filled in by the loader.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Well-known identifier of the gateway's root folder
pub const ROOT_FOLDER_ID: &str = "0000000000000000ffffffffffffec76";

/// Well-known name of the gateway's root folder
pub const ROOT_FOLDER_NAME: &str = "Root Node";

/// Identifier of the gateway's default key store
pub const DEFAULT_KEYSTORE_ID: &str = "00000000000000000000000000000002";

/// Prefix marking a context variable whose value is supplied at deploy time
pub const ENV_VARIABLE_PREFIX: &str = "ENV.";

/// Entities that live inside the folder hierarchy
pub trait Folderable {
    /// Slash separated path, relative to the root folder
    fn path(&self) -> &str;

    /// Identifier of the containing folder, `None` only for the root folder
    fn parent_folder(&self) -> Option<&str>;

    /// Last path segment
    fn name(&self) -> &str {
        let path = self.path();
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// Parent path of a slash separated path; the root folder has the empty path
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub path: String,
    pub parent_folder: Option<String>,
}

impl Folder {
    pub fn root() -> Self {
        Self {
            id: ROOT_FOLDER_ID.to_string(),
            name: String::new(),
            path: String::new(),
            parent_folder: None,
        }
    }

    pub fn new<I: Into<String>, P: Into<String>>(id: I, path: P, parent_folder: Option<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            id: id.into(),
            name,
            path,
            parent_folder,
        }
    }
}

impl Folderable for Folder {
    fn path(&self) -> &str {
        &self.path
    }

    fn parent_folder(&self) -> Option<&str> {
        self.parent_folder.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyType {
    Include,
    ServiceOperation,
    Global,
    Internal,
}

impl PolicyType {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Include => "Include",
            Self::ServiceOperation => "Service Operation",
            Self::Global => "Global",
            Self::Internal => "Internal",
        }
    }
}

/// A policy: raw assertion XML plus metadata
///
/// A policy is usually described by two sources: its XML file and an optional entry
/// in the policy metadata file. Both produce a `Policy` with the same path and are
/// combined with [`Policy::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(skip)]
    pub path: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(skip)]
    pub parent_folder: Option<String>,
    #[serde(skip)]
    pub policy_xml: Option<String>,
    #[serde(default)]
    pub policy_type: Option<PolicyType>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub subtag: Option<String>,
    /// Paths of policies this one includes
    #[serde(skip)]
    pub dependencies: BTreeSet<String>,
}

impl Policy {
    pub fn new<P: Into<String>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Fold `incoming` into `self`: a field is taken from `incoming` only when it is
    /// absent here, so the first source to supply a value wins. Dependencies are unioned.
    pub fn merge(&mut self, incoming: Policy) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }

        if self.path.is_empty() {
            self.path = incoming.path;
        }
        fill(&mut self.id, incoming.id);
        fill(&mut self.guid, incoming.guid);
        fill(&mut self.parent_folder, incoming.parent_folder);
        fill(&mut self.policy_xml, incoming.policy_xml);
        fill(&mut self.policy_type, incoming.policy_type);
        fill(&mut self.tag, incoming.tag);
        fill(&mut self.subtag, incoming.subtag);
        self.dependencies.extend(incoming.dependencies);
    }

    pub fn merged(mut self, incoming: Policy) -> Self {
        self.merge(incoming);
        self
    }
}

impl Folderable for Policy {
    fn path(&self) -> &str {
        &self.path
    }

    fn parent_folder(&self) -> Option<&str> {
        self.parent_folder.as_deref()
    }
}

/// A published service, backed by the policy with the same path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(skip)]
    pub path: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(skip)]
    pub parent_folder: Option<String>,
    pub url: String,
    #[serde(default)]
    pub http_methods: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Folderable for Service {
    fn path(&self) -> &str {
        &self.path
    }

    fn parent_folder(&self) -> Option<&str> {
        self.parent_folder.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encass {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub guid: Option<String>,
    /// Path of the backing policy
    pub policy: String,
    #[serde(default)]
    pub arguments: Vec<EncassArgument>,
    #[serde(default)]
    pub results: Vec<EncassResult>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncassArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub argument_type: String,
    #[serde(default)]
    pub require_explicit: bool,
    #[serde(default)]
    pub gui_prompt: bool,
    #[serde(default)]
    pub gui_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncassResult {
    pub name: String,
    #[serde(rename = "type")]
    pub result_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenPort {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    pub protocol: String,
    pub port: u16,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub enabled_features: Vec<String>,
    #[serde(default)]
    pub tls_settings: Option<TlsSettings>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    #[serde(default = "default_client_authentication")]
    pub client_authentication: String,
    #[serde(default)]
    pub enabled_versions: Vec<String>,
    #[serde(default)]
    pub enabled_cipher_suites: Vec<String>,
    /// Alias of a private key in the default key store
    #[serde(default)]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityProviderType {
    Ldap,
    BindOnlyLdap,
    Federated,
    PolicyBacked,
}

impl IdentityProviderType {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Ldap => "LDAP",
            Self::BindOnlyLdap => "Simple LDAP",
            Self::Federated => "Federated",
            Self::PolicyBacked => "Policy-Backed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProvider {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub provider_type: IdentityProviderType,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub identity_provider_detail: Option<BindOnlyLdapDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindOnlyLdapDetail {
    pub server_urls: Vec<String>,
    #[serde(default)]
    pub use_ssl_client_authentication: bool,
    #[serde(default)]
    pub bind_pattern_prefix: String,
    #[serde(default)]
    pub bind_pattern_suffix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdbcConnection {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    pub driver_class: String,
    pub jdbc_url: String,
    #[serde(default = "default_min_pool")]
    pub minimum_pool_size: u32,
    #[serde(default = "default_max_pool")]
    pub maximum_pool_size: u32,
    #[serde(default)]
    pub user: Option<String>,
    /// Name of the stored password holding the connection password
    #[serde(default)]
    pub password_ref: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub connection_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedCert {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    /// `https://host[:port]` to fetch the certificate from
    #[serde(default)]
    pub url: Option<String>,
    /// Base64 DER or PEM certificate data
    #[serde(default)]
    pub encoded_data: Option<String>,
    #[serde(default)]
    pub verify_hostname: bool,
    #[serde(default)]
    pub trust_anchor: bool,
    #[serde(default)]
    pub trusted_for_ssl: bool,
    #[serde(default)]
    pub trusted_for_signing_client_certs: bool,
    #[serde(default)]
    pub trusted_for_signing_server_certs: bool,
    #[serde(default)]
    pub trusted_as_saml_issuer: bool,
    #[serde(default)]
    pub trusted_as_saml_attesting_entity: bool,
    #[serde(default)]
    pub revocation_checking_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPassword {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_password_type", rename = "type")]
    pub password_type: String,
    #[serde(default)]
    pub usage_from_variable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKey {
    #[serde(skip)]
    pub alias: String,
    #[serde(default)]
    pub keystore: Option<String>,
    #[serde(default)]
    pub algorithm: Option<String>,
}

impl PrivateKey {
    /// Gateway identifier of a key entry: `<keystore id>:<alias>`
    pub fn key_id(&self) -> String {
        format!(
            "{}:{}",
            self.keystore.as_deref().unwrap_or(DEFAULT_KEYSTORE_ID),
            self.alias
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Path of the policy to run
    pub policy: String,
    #[serde(default)]
    pub one_node: bool,
    #[serde(default = "default_job_type")]
    pub job_type: String,
    #[serde(default = "default_job_status")]
    pub job_status: String,
    #[serde(default)]
    pub execution_date: Option<String>,
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(default)]
    pub execute_on_create: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JmsDestination {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_jms_provider")]
    pub provider_type: String,
    pub initial_context_factory_class_name: String,
    pub jndi_url: String,
    pub connection_factory_name: String,
    pub destination_name: String,
    #[serde(default = "default_destination_type")]
    pub destination_type: String,
    #[serde(default)]
    pub inbound: bool,
    #[serde(default)]
    pub template_only: bool,
    #[serde(default)]
    pub jndi_username: Option<String>,
    /// Name of the stored password holding the JNDI password
    #[serde(default)]
    pub jndi_password_ref: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBackedService {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    pub interface_name: String,
    #[serde(default)]
    pub operations: Vec<PolicyBackedServiceOperation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBackedServiceOperation {
    pub operation_name: String,
    /// Path of the implementing policy
    pub policy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterProperty {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    pub value: String,
}

fn default_true() -> bool {
    true
}

fn default_client_authentication() -> String {
    "None".to_string()
}

fn default_min_pool() -> u32 {
    3
}

fn default_max_pool() -> u32 {
    15
}

fn default_password_type() -> String {
    "Password".to_string()
}

fn default_job_type() -> String {
    "Recurring".to_string()
}

fn default_job_status() -> String {
    "Scheduled".to_string()
}

fn default_jms_provider() -> String {
    "Generic".to_string()
}

fn default_destination_type() -> String {
    "Queue".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(path: &str, tag: &str) -> Policy {
        Policy {
            path: path.to_string(),
            id: Some(format!("{}-id", tag)),
            guid: Some(format!("{}-guid", tag)),
            parent_folder: Some("folder".to_string()),
            policy_xml: Some(format!("<{}/>", tag)),
            policy_type: Some(PolicyType::Internal),
            tag: Some(tag.to_string()),
            subtag: None,
            dependencies: [format!("{}-dep", tag)].into_iter().collect(),
        }
    }

    #[test]
    fn test_merge_fills_only_absent_fields() {
        let mut from_xml = Policy::new("a/b");
        from_xml.policy_xml = Some("<wsp:Policy/>".to_string());
        let mut from_metadata = Policy::new("a/b");
        from_metadata.tag = Some("audit-sink".to_string());
        from_metadata.policy_xml = Some("<ignored/>".to_string());

        let merged = from_xml.merged(from_metadata);
        assert_eq!(merged.policy_xml.as_deref(), Some("<wsp:Policy/>"));
        assert_eq!(merged.tag.as_deref(), Some("audit-sink"));
        assert_eq!(merged.path, "a/b");
    }

    #[test]
    fn test_merge_with_self_or_empty_is_noop() {
        let x = complete("p", "x");
        assert_eq!(x.clone().merged(x.clone()), x);
        assert_eq!(x.clone().merged(Policy::default()), x);
        assert_eq!(Policy::default().merged(x.clone()), x);
    }

    #[test]
    fn test_merge_first_seen_wins_and_is_stable() {
        let x = complete("p", "x");
        let y = complete("p", "y");
        let xy = x.clone().merged(y.clone());
        assert_eq!(xy.tag.as_deref(), Some("x"));
        assert_eq!(xy.dependencies.len(), 2);
        assert_eq!(x.clone().merged(xy.clone()), xy);
        assert_ne!(y.merged(x), xy);
    }

    #[test]
    fn test_folderable_names_and_parent_paths() {
        let policy = Policy::new("a/b/c");
        assert_eq!(Folderable::name(&policy), "c");
        assert_eq!(parent_path("a/b/c"), "a/b");
        assert_eq!(parent_path("c"), "");
        assert_eq!(Folder::new("id", "a/b", None).name, "b");
    }

    #[test]
    fn test_private_key_id_uses_default_keystore() {
        let key = PrivateKey {
            alias: "ssl".to_string(),
            ..Default::default()
        };
        assert_eq!(key.key_id(), "00000000000000000000000000000002:ssl");
    }

    #[test]
    fn test_service_deserializes_with_defaults() {
        let service: Service = serde_yaml::from_str("url: /svc\nhttpMethods: [GET, POST]\n").unwrap();
        assert!(service.enabled);
        assert_eq!(service.http_methods.len(), 2);
        assert!(service.path.is_empty());
    }
}
