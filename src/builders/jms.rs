use super::{properties_element, required_id, stored_password_reference, string_properties, BuildContext, EntityBuilder};
use crate::bundle::{EntityKind, JmsDestination};
use crate::core::error::BundleResult;
use crate::document::{Entity, PropertyValue};
use crate::xml::Element;

#[derive(Debug, Default)]
pub struct JmsDestinationEntityBuilder;

impl EntityBuilder for JmsDestinationEntityBuilder {
    fn name(&self) -> &str {
        "jms-destination"
    }

    fn order(&self) -> i32 {
        500
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        context
            .bundle
            .jms_destinations
            .iter()
            .map(|(name, destination)| build_destination(context, name, destination))
            .collect()
    }
}

fn build_destination(context: &BuildContext<'_>, name: &str, destination: &JmsDestination) -> BundleResult<Entity> {
    let id = required_id(&destination.id, EntityKind::JmsDestination, name)?;

    let factory_key = if destination.destination_type.eq_ignore_ascii_case("topic") {
        "topic.connectionFactoryName"
    } else {
        "queue.connectionFactoryName"
    };
    let mut connection_properties = vec![
        (
            "jndi.initialContextFactoryClassname".to_string(),
            PropertyValue::string(destination.initial_context_factory_class_name.as_str()),
        ),
        (
            "jndi.providerUrl".to_string(),
            PropertyValue::string(destination.jndi_url.as_str()),
        ),
        (
            factory_key.to_string(),
            PropertyValue::string(destination.connection_factory_name.as_str()),
        ),
    ];
    if let Some(username) = &destination.jndi_username {
        connection_properties.push(("jndi.securityPrincipal".to_string(), PropertyValue::string(username.as_str())));
    }
    if let Some(password) = &destination.jndi_password_ref {
        let referrer = format!("JMS destination '{}'", name);
        let reference = stored_password_reference(context.bundle, password, &referrer)?;
        connection_properties.push(("jndi.securityCredentials".to_string(), PropertyValue::String(reference)));
    }
    connection_properties.extend(string_properties(&destination.properties, ""));

    let detail = Element::new("l7:JMSDestinationDetail")
        .with_attr("id", id)
        .with_child(Element::text_element("l7:Name", name))
        .with_child(Element::text_element("l7:DestinationName", destination.destination_name.as_str()))
        .with_child(Element::text_element("l7:Inbound", destination.inbound.to_string()))
        .with_child(Element::text_element("l7:Enabled", "true"))
        .with_child(Element::text_element("l7:TemplateOnly", destination.template_only.to_string()))
        .with_optional_child(properties_element([(
            "type".to_string(),
            PropertyValue::string(destination.destination_type.as_str()),
        )]));

    let connection = Element::new("l7:JMSConnection")
        .with_child(Element::text_element("l7:ProviderType", destination.provider_type.as_str()))
        .with_child(Element::text_element("l7:TemplateOnly", destination.template_only.to_string()))
        .with_optional_child(properties_element(connection_properties));

    let payload = Element::new("l7:JMSDestination")
        .with_attr("id", id)
        .with_child(detail)
        .with_child(connection);
    Ok(Entity::new(EntityKind::JmsDestination, name, id, payload))
}
