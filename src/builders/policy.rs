//! Policy entities, emitted in dependency order
//!
//! Policies backing a service are left out: the service builder carries them as the
//! service's own resource.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::policy_backed_service::{operation_index, OperationBinding};
use super::{folder_id, policy_resources, properties_element, required_id, BuildContext, EntityBuilder};
use crate::bundle::{EntityKind, Policy, PolicyType};
use crate::consistency_error;
use crate::core::error::{BundleError, BundleResult};
use crate::document::{Entity, PropertyValue};
use crate::policy::{policy_order, PreparedPolicy};
use crate::xml::Element;

#[derive(Debug, Default)]
pub struct PolicyEntityBuilder;

impl EntityBuilder for PolicyEntityBuilder {
    fn name(&self) -> &str {
        "policy"
    }

    fn order(&self) -> i32 {
        600
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        let bundle = context.bundle;
        let services: BTreeSet<String> = bundle.services.keys().cloned().collect();
        let order = policy_order(&context.policies.dependency_graph(), &services)?;
        let operations = operation_index(bundle)?;
        let mut tags = TagRegistry::default();

        let mut entities = Vec::with_capacity(order.len());
        for path in &order {
            let policy = bundle
                .policies
                .get(path)
                .ok_or_else(|| BundleError::missing(EntityKind::Policy.to_string(), path.as_str(), "policy order"))?;
            let prepared = context
                .policies
                .get(path)
                .ok_or_else(|| BundleError::policy_xml(path.as_str(), "policy was not prepared"))?;

            let metadata = PolicyMetadata::of(policy, operations.get(path));
            tags.claim(path, &metadata)?;
            entities.push(build_policy(context, policy, prepared, &metadata)?);
        }
        debug!(policies = entities.len(), skipped = services.len(), "Ordered policies");
        Ok(entities)
    }
}

/// Type, tag and subtag written into a policy's detail
#[derive(Debug, Clone, PartialEq, Eq)]
struct PolicyMetadata {
    policy_type: PolicyType,
    tag: Option<String>,
    subtag: Option<String>,
}

impl PolicyMetadata {
    fn of(policy: &Policy, operation: Option<&OperationBinding>) -> Self {
        match operation {
            Some(binding) => Self {
                policy_type: PolicyType::ServiceOperation,
                tag: Some(binding.interface_name.clone()),
                subtag: Some(binding.operation_name.clone()),
            },
            None => Self {
                policy_type: policy.policy_type.unwrap_or(PolicyType::Include),
                tag: policy.tag.clone(),
                subtag: policy.subtag.clone(),
            },
        }
    }
}

/// Internal and global policies bind to fixed system hooks; each hook takes one policy
#[derive(Default)]
struct TagRegistry {
    claimed: BTreeMap<(PolicyType, String, Option<String>), String>,
}

impl TagRegistry {
    fn claim(&mut self, path: &str, metadata: &PolicyMetadata) -> BundleResult<()> {
        if !matches!(metadata.policy_type, PolicyType::Internal | PolicyType::Global) {
            return Ok(());
        }
        let Some(tag) = metadata.tag.clone() else {
            return Ok(());
        };
        let key = (metadata.policy_type, tag, metadata.subtag.clone());
        if let Some(existing) = self.claimed.get(&key) {
            return Err(consistency_error!(
                "{} policies '{}' and '{}' share tag '{}'",
                metadata.policy_type.wire_name(),
                existing,
                path,
                key.1
            ));
        }
        self.claimed.insert(key, path.to_string());
        Ok(())
    }
}

fn build_policy(
    context: &BuildContext<'_>,
    policy: &Policy,
    prepared: &PreparedPolicy,
    metadata: &PolicyMetadata,
) -> BundleResult<Entity> {
    let id = required_id(&policy.id, EntityKind::Policy, &policy.path)?;
    let guid = required_id(&policy.guid, EntityKind::Policy, &policy.path)?;
    let folder = folder_id(context, policy)?;

    let mut properties = vec![("soap".to_string(), PropertyValue::Boolean(false))];
    if let Some(tag) = &metadata.tag {
        properties.push(("tag".to_string(), PropertyValue::string(tag.as_str())));
    }
    if let Some(subtag) = &metadata.subtag {
        properties.push(("subtag".to_string(), PropertyValue::string(subtag.as_str())));
    }

    let detail = Element::new("l7:PolicyDetail")
        .with_attr("folderId", folder)
        .with_attr("guid", guid)
        .with_attr("id", id)
        .with_child(Element::text_element("l7:Name", policy.path.as_str()))
        .with_child(Element::text_element("l7:PolicyType", metadata.policy_type.wire_name()))
        .with_optional_child(properties_element(properties));

    let payload = Element::new("l7:Policy")
        .with_attr("guid", guid)
        .with_attr("id", id)
        .with_child(detail)
        .with_child(policy_resources(&prepared.document));
    Ok(Entity::new(EntityKind::Policy, policy.path.as_str(), id, payload))
}
