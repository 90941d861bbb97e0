use super::{required_id, BuildContext, EntityBuilder};
use crate::bundle::EntityKind;
use crate::core::error::BundleResult;
use crate::document::Entity;
use crate::xml::Element;

/// Cluster-wide properties, matched by name so existing values are overwritten
#[derive(Debug, Default)]
pub struct ClusterPropertyEntityBuilder;

impl EntityBuilder for ClusterPropertyEntityBuilder {
    fn name(&self) -> &str {
        "cluster-property"
    }

    fn order(&self) -> i32 {
        100
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        context
            .bundle
            .cluster_properties
            .iter()
            .map(|(name, property)| {
                let id = required_id(&property.id, EntityKind::ClusterProperty, name)?;
                let payload = Element::new("l7:ClusterProperty")
                    .with_attr("id", id)
                    .with_child(Element::text_element("l7:Name", name.as_str()))
                    .with_child(Element::text_element("l7:Value", property.value.as_str()));
                Ok(Entity::new(EntityKind::ClusterProperty, name.as_str(), id, payload).map_by_name())
            })
            .collect()
    }
}
