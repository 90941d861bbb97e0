use super::{folder_id, policy_resources, properties_element, required_id, string_properties, BuildContext, EntityBuilder};
use crate::bundle::{EntityKind, Folderable, Service};
use crate::core::error::{BundleError, BundleResult};
use crate::document::{Entity, PropertyValue};
use crate::xml::Element;

/// Published services, each carrying its backing policy as its resource
#[derive(Debug, Default)]
pub struct ServiceEntityBuilder;

impl EntityBuilder for ServiceEntityBuilder {
    fn name(&self) -> &str {
        "service"
    }

    fn order(&self) -> i32 {
        900
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        context
            .bundle
            .services
            .values()
            .map(|service| build_service(context, service))
            .collect()
    }
}

fn build_service(context: &BuildContext<'_>, service: &Service) -> BundleResult<Entity> {
    let id = required_id(&service.id, EntityKind::Service, &service.path)?;
    let policy = context.policies.get(&service.path).ok_or_else(|| {
        BundleError::missing(
            EntityKind::Policy.to_string(),
            service.path.as_str(),
            format!("service '{}'", service.path),
        )
    })?;
    let folder = folder_id(context, service)?;

    let verbs = service
        .http_methods
        .iter()
        .map(|verb| Element::text_element("l7:Verb", verb.to_uppercase()));
    let mapping = Element::new("l7:ServiceMappings").with_child(
        Element::new("l7:HttpMapping")
            .with_child(Element::text_element("l7:UrlPattern", service.url.as_str()))
            .with_child(Element::new("l7:Verbs").with_children(verbs)),
    );

    let properties = [
        ("internal".to_string(), PropertyValue::Boolean(false)),
        ("soap".to_string(), PropertyValue::Boolean(false)),
    ]
    .into_iter()
    .chain(string_properties(&service.properties, "property."));

    let detail = Element::new("l7:ServiceDetail")
        .with_attr("folderId", folder)
        .with_attr("id", id)
        .with_child(Element::text_element("l7:Name", service.name()))
        .with_child(Element::text_element("l7:Enabled", service.enabled.to_string()))
        .with_child(mapping)
        .with_optional_child(properties_element(properties));

    let payload = Element::new("l7:Service")
        .with_attr("id", id)
        .with_child(detail)
        .with_child(policy_resources(&policy.document));
    Ok(Entity::new(EntityKind::Service, service.path.as_str(), id, payload))
}
