use super::{properties_element, required_id, stored_password_reference, string_properties, BuildContext, EntityBuilder};
use crate::bundle::{EntityKind, JdbcConnection};
use crate::consistency_error;
use crate::core::error::BundleResult;
use crate::document::{Entity, PropertyValue};
use crate::xml::Element;

#[derive(Debug, Default)]
pub struct JdbcConnectionEntityBuilder;

impl EntityBuilder for JdbcConnectionEntityBuilder {
    fn name(&self) -> &str {
        "jdbc-connection"
    }

    fn order(&self) -> i32 {
        450
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        context
            .bundle
            .jdbc_connections
            .iter()
            .map(|(name, connection)| build_connection(context, name, connection))
            .collect()
    }
}

fn build_connection(context: &BuildContext<'_>, name: &str, connection: &JdbcConnection) -> BundleResult<Entity> {
    let id = required_id(&connection.id, EntityKind::JdbcConnection, name)?;
    if connection.minimum_pool_size > connection.maximum_pool_size {
        return Err(consistency_error!(
            "JDBC connection '{}' has minimumPoolSize {} above maximumPoolSize {}",
            name,
            connection.minimum_pool_size,
            connection.maximum_pool_size
        ));
    }

    let properties = [
        (
            "maximumPoolSize".to_string(),
            PropertyValue::Integer(i64::from(connection.maximum_pool_size)),
        ),
        (
            "minimumPoolSize".to_string(),
            PropertyValue::Integer(i64::from(connection.minimum_pool_size)),
        ),
    ]
    .into_iter()
    .chain(string_properties(&connection.properties, ""));

    let mut connection_properties: Vec<(String, PropertyValue)> =
        string_properties(&connection.connection_properties, "").collect();
    if let Some(user) = &connection.user {
        connection_properties.push(("user".to_string(), PropertyValue::string(user.as_str())));
    }
    if let Some(password) = &connection.password_ref {
        let referrer = format!("JDBC connection '{}'", name);
        let reference = stored_password_reference(context.bundle, password, &referrer)?;
        connection_properties.push(("password".to_string(), PropertyValue::String(reference)));
    }

    let extension = Element::new("l7:Extension")
        .with_child(Element::text_element("l7:DriverClass", connection.driver_class.as_str()))
        .with_child(Element::text_element("l7:JdbcUrl", connection.jdbc_url.as_str()))
        .with_child(
            Element::new("l7:ConnectionProperties").with_children(
                connection_properties
                    .into_iter()
                    .map(|(key, value)| value.to_property(&key)),
            ),
        );

    let payload = Element::new("l7:JDBCConnection")
        .with_attr("id", id)
        .with_child(Element::text_element("l7:Name", name))
        .with_child(Element::text_element("l7:Enabled", "true"))
        .with_optional_child(properties_element(properties))
        .with_child(extension);
    Ok(Entity::new(EntityKind::JdbcConnection, name, id, payload))
}
