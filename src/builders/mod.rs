//! # Entity Builder Pipeline
//!
//! Each builder turns one entity kind of a prepared bundle into serializable
//! [`Entity`] records. Builders run in ascending `order`; the order decides where
//! their entities appear in the final document, so that everything an entity refers
//! to is imported before it.
//!
//! ## Builder Order
//! | order | builder                |
//! |-------|------------------------|
//! | 100   | cluster properties     |
//! | 200   | folders                |
//! | 250   | stored passwords       |
//! | 300   | trusted certificates   |
//! | 350   | private keys           |
//! | 400   | identity providers     |
//! | 450   | JDBC connections       |
//! | 500   | JMS destinations       |
//! | 550   | listen ports           |
//! | 600   | policies               |
//! | 700   | encapsulated assertions|
//! | 800   | policy-backed services |
//! | 900   | services               |
//! | 1000  | scheduled tasks        |

pub mod cluster_property;
pub mod encass;
pub mod folder;
pub mod identity_provider;
pub mod jdbc;
pub mod jms;
pub mod listen_port;
pub mod policy;
pub mod policy_backed_service;
pub mod private_key;
pub mod scheduled_task;
pub mod service;
pub mod stored_password;
pub mod trusted_cert;

use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::bundle::{parent_path, Bundle, BundleMode, EntityKind, FolderTree, Folderable};
use crate::certs::CertificateResolver;
use crate::core::error::{BundleError, BundleResult};
use crate::core::ids::IdGenerator;
use crate::document::{Entity, PropertyValue};
use crate::policy::PreparedPolicies;
use crate::xml::Element;

/// Everything a builder may read
pub struct BuildContext<'a> {
    pub bundle: &'a Bundle,
    pub folder_tree: &'a FolderTree,
    pub policies: &'a PreparedPolicies,
    pub certificates: &'a dyn CertificateResolver,
    /// Only used for entities synthesized during the build
    pub ids: &'a dyn IdGenerator,
}

impl<'a> BuildContext<'a> {
    pub fn mode(&self) -> BundleMode {
        self.bundle.mode()
    }
}

/// Turns one entity kind into bundle entities
pub trait EntityBuilder: Send + Sync + fmt::Debug {
    /// Builder name for identification and logging
    fn name(&self) -> &str;

    /// Position relative to other builders (lower runs first)
    fn order(&self) -> i32;

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>>;
}

/// Ordered set of builders with distinct order values
#[derive(Debug, Default)]
pub struct BuilderPipeline {
    builders: Vec<Box<dyn EntityBuilder>>,
}

impl BuilderPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline with every built-in builder registered
    pub fn standard() -> Self {
        let mut builders: Vec<Box<dyn EntityBuilder>> = vec![
            Box::new(cluster_property::ClusterPropertyEntityBuilder),
            Box::new(folder::FolderEntityBuilder),
            Box::new(stored_password::StoredPasswordEntityBuilder),
            Box::new(trusted_cert::TrustedCertEntityBuilder),
            Box::new(private_key::PrivateKeyEntityBuilder),
            Box::new(identity_provider::IdentityProviderEntityBuilder),
            Box::new(jdbc::JdbcConnectionEntityBuilder),
            Box::new(jms::JmsDestinationEntityBuilder),
            Box::new(listen_port::ListenPortEntityBuilder),
            Box::new(policy::PolicyEntityBuilder),
            Box::new(encass::EncassEntityBuilder),
            Box::new(policy_backed_service::PolicyBackedServiceEntityBuilder),
            Box::new(service::ServiceEntityBuilder),
            Box::new(scheduled_task::ScheduledTaskEntityBuilder),
        ];
        builders.sort_by_key(|builder| builder.order());
        Self { builders }
    }

    /// Add a builder; two builders may not share an order value
    pub fn register(&mut self, builder: Box<dyn EntityBuilder>) -> BundleResult<()> {
        if let Some(existing) = self.builders.iter().find(|b| b.order() == builder.order()) {
            return Err(BundleError::builder(
                builder.name(),
                format!(
                    "order {} is already used by builder '{}'",
                    builder.order(),
                    existing.name()
                ),
            ));
        }
        debug!(builder = builder.name(), order = builder.order(), "Registered entity builder");
        self.builders.push(builder);
        self.builders.sort_by_key(|b| b.order());
        Ok(())
    }

    pub fn builders(&self) -> impl Iterator<Item = &dyn EntityBuilder> {
        self.builders.iter().map(|builder| builder.as_ref())
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Run every builder in order and concatenate their entities
    pub fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        let mut entities = Vec::new();
        for builder in &self.builders {
            let built = builder.build(context)?;
            debug!(
                builder = builder.name(),
                order = builder.order(),
                entities = built.len(),
                "Builder finished"
            );
            entities.extend(built);
        }
        Ok(entities)
    }
}

/// Identifier assigned during loading; absent only if identities were never assigned
pub(crate) fn required_id<'a>(id: &'a Option<String>, kind: EntityKind, key: &str) -> BundleResult<&'a str> {
    id.as_deref().ok_or_else(|| {
        BundleError::builder(
            kind.to_string(),
            format!("'{}' has no identifier, identities must be assigned before building", key),
        )
    })
}

/// Wire identifier of the folder holding `entity`
///
/// An explicit parent folder id must name a folder of the tree; otherwise the folder is
/// found through the entity's parent path.
pub(crate) fn folder_id<'a, F: Folderable>(context: &BuildContext<'a>, entity: &'a F) -> BundleResult<&'a str> {
    let folder_id = match entity.parent_folder() {
        Some(id) => context
            .folder_tree
            .folder_by_id(id)
            .map(|folder| folder.id.as_str())
            .ok_or_else(|| BundleError::missing("folder", id, entity.path()))?,
        None => context
            .bundle
            .folders
            .get(parent_path(entity.path()))
            .map(|folder| folder.id.as_str())
            .ok_or_else(|| BundleError::missing("folder", parent_path(entity.path()), entity.path()))?,
    };
    Ok(context.bundle.wire_folder_id(Some(folder_id)))
}

/// `l7:Properties` element, or `None` when there is nothing to write
pub(crate) fn properties_element<I>(properties: I) -> Option<Element>
where
    I: IntoIterator<Item = (String, PropertyValue)>,
{
    let properties: Vec<Element> = properties
        .into_iter()
        .map(|(key, value)| value.to_property(&key))
        .collect();
    if properties.is_empty() {
        None
    } else {
        Some(Element::new("l7:Properties").with_children(properties))
    }
}

/// Free-form string properties as typed property entries
pub(crate) fn string_properties<'a>(
    properties: &'a BTreeMap<String, String>,
    prefix: &'a str,
) -> impl Iterator<Item = (String, PropertyValue)> + 'a {
    properties
        .iter()
        .map(move |(key, value)| (format!("{}{}", prefix, key), PropertyValue::string(value.as_str())))
}

/// `l7:Resources` holding a policy document, shared by policies and services
pub(crate) fn policy_resources(document: &Element) -> Element {
    Element::new("l7:Resources").with_child(
        Element::new("l7:ResourceSet").with_attr("tag", "policy").with_child(
            Element::new("l7:Resource")
                .with_attr("type", "policy")
                .with_text(document.to_xml_string()),
        ),
    )
}

/// `${secpass.<name>.plaintext}` reference to a stored password, checked to exist
pub(crate) fn stored_password_reference(bundle: &Bundle, name: &str, referrer: &str) -> BundleResult<String> {
    bundle.resolve(EntityKind::StoredPassword, name, referrer, |b| &b.stored_passwords)?;
    Ok(format!("${{secpass.{}.plaintext}}", name))
}
