use std::collections::BTreeMap;

use super::{required_id, BuildContext, EntityBuilder};
use crate::bundle::{Bundle, EntityKind};
use crate::core::error::BundleResult;
use crate::consistency_error;
use crate::document::Entity;
use crate::xml::Element;

/// Interface and operation a policy implements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationBinding {
    pub interface_name: String,
    pub operation_name: String,
}

/// Policy path -> the single policy-backed service operation it implements
///
/// A policy may implement at most one operation across all local policy-backed services.
pub fn operation_index(bundle: &Bundle) -> BundleResult<BTreeMap<String, OperationBinding>> {
    let mut index: BTreeMap<String, OperationBinding> = BTreeMap::new();
    for service in bundle.policy_backed_services.values() {
        for operation in &service.operations {
            let binding = OperationBinding {
                interface_name: service.interface_name.clone(),
                operation_name: operation.operation_name.clone(),
            };
            if let Some(existing) = index.insert(operation.policy.clone(), binding) {
                return Err(consistency_error!(
                    "Policy '{}' implements more than one policy-backed service operation: {}.{} and {}.{}",
                    operation.policy,
                    existing.interface_name,
                    existing.operation_name,
                    service.interface_name,
                    operation.operation_name
                ));
            }
        }
    }
    Ok(index)
}

#[derive(Debug, Default)]
pub struct PolicyBackedServiceEntityBuilder;

impl EntityBuilder for PolicyBackedServiceEntityBuilder {
    fn name(&self) -> &str {
        "policy-backed-service"
    }

    fn order(&self) -> i32 {
        800
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        let bundle = context.bundle;
        let mut entities = Vec::with_capacity(bundle.policy_backed_services.len());
        for (name, service) in &bundle.policy_backed_services {
            let id = required_id(&service.id, EntityKind::PolicyBackedService, name)?;
            let referrer = format!("policy-backed service '{}'", name);

            let mut operations = Vec::with_capacity(service.operations.len());
            for operation in &service.operations {
                let policy = bundle.resolve_policy(&operation.policy, &referrer)?.entity();
                let policy_id = required_id(&policy.id, EntityKind::Policy, &operation.policy)?;
                operations.push(
                    Element::new("l7:PolicyBackedServiceOperation")
                        .with_child(Element::text_element("l7:PolicyId", policy_id))
                        .with_child(Element::text_element("l7:OperationName", operation.operation_name.as_str())),
                );
            }

            let payload = Element::new("l7:PolicyBackedService")
                .with_attr("id", id)
                .with_child(Element::text_element("l7:Name", name.as_str()))
                .with_child(Element::text_element("l7:InterfaceName", service.interface_name.as_str()))
                .with_child(Element::new("l7:PolicyBackedServiceOperations").with_children(operations));
            entities.push(Entity::new(EntityKind::PolicyBackedService, name.as_str(), id, payload));
        }
        Ok(entities)
    }
}
