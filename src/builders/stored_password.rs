use super::{properties_element, required_id, BuildContext, EntityBuilder};
use crate::bundle::{BundleMode, EntityKind, StoredPassword};
use crate::core::error::{BundleError, BundleResult};
use crate::document::{Entity, PropertyValue};
use crate::xml::Element;

/// Stored passwords carry secrets only in environment bundles
///
/// Deployment bundles reference them by name and fail the import if the gateway does
/// not have them yet.
#[derive(Debug, Default)]
pub struct StoredPasswordEntityBuilder;

impl EntityBuilder for StoredPasswordEntityBuilder {
    fn name(&self) -> &str {
        "stored-password"
    }

    fn order(&self) -> i32 {
        250
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        let mode = context.mode();
        context
            .bundle
            .stored_passwords
            .iter()
            .map(|(name, password)| {
                let id = required_id(&password.id, EntityKind::StoredPassword, name)?;
                match mode {
                    BundleMode::Deployment => Ok(Entity::reference_only(EntityKind::StoredPassword, name.as_str(), id)),
                    BundleMode::Environment => build_password(self.name(), name, id, password),
                }
            })
            .collect()
    }
}

fn build_password(builder: &str, name: &str, id: &str, password: &StoredPassword) -> BundleResult<Entity> {
    let secret = password.password.as_deref().ok_or_else(|| {
        BundleError::builder(builder, format!("stored password '{}' has no password value", name))
    })?;

    let properties = vec![
        (
            "description".to_string(),
            PropertyValue::string(password.description.clone().unwrap_or_default()),
        ),
        ("type".to_string(), PropertyValue::string(password.password_type.as_str())),
        (
            "usageFromVariable".to_string(),
            PropertyValue::Boolean(password.usage_from_variable),
        ),
    ];

    let payload = Element::new("l7:StoredPassword")
        .with_attr("id", id)
        .with_child(Element::text_element("l7:Name", name))
        .with_child(Element::text_element("l7:Password", secret))
        .with_optional_child(properties_element(properties));
    Ok(Entity::new(EntityKind::StoredPassword, name, id, payload).map_by_name())
}
