use super::{properties_element, required_id, string_properties, BuildContext, EntityBuilder};
use crate::bundle::{Encass, EntityKind};
use crate::core::error::BundleResult;
use crate::document::Entity;
use crate::xml::Element;

/// Encapsulated assertion definitions with their arguments and results in call order
#[derive(Debug, Default)]
pub struct EncassEntityBuilder;

impl EntityBuilder for EncassEntityBuilder {
    fn name(&self) -> &str {
        "encass"
    }

    fn order(&self) -> i32 {
        700
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        context
            .bundle
            .encasses
            .iter()
            .map(|(name, encass)| build_encass(context, name, encass))
            .collect()
    }
}

fn build_encass(context: &BuildContext<'_>, name: &str, encass: &Encass) -> BundleResult<Entity> {
    let id = required_id(&encass.id, EntityKind::Encass, name)?;
    let guid = required_id(&encass.guid, EntityKind::Encass, name)?;
    let referrer = format!("encass '{}'", name);
    let policy = context.bundle.resolve_policy(&encass.policy, &referrer)?.entity();
    let policy_id = required_id(&policy.id, EntityKind::Policy, &encass.policy)?;

    let arguments = encass.arguments.iter().enumerate().map(|(index, argument)| {
        Element::new("l7:EncapsulatedAssertionArgument")
            .with_child(Element::text_element("l7:Ordinal", (index + 1).to_string()))
            .with_child(Element::text_element("l7:ArgumentName", argument.name.as_str()))
            .with_child(Element::text_element("l7:ArgumentType", argument.argument_type.as_str()))
            .with_optional_child(
                argument
                    .gui_label
                    .as_deref()
                    .map(|label| Element::text_element("l7:GuiLabel", label)),
            )
            .with_child(Element::text_element("l7:GuiPrompt", argument.gui_prompt.to_string()))
            .with_child(Element::text_element(
                "l7:RequireExplicit",
                argument.require_explicit.to_string(),
            ))
    });
    let results = encass.results.iter().map(|result| {
        Element::new("l7:EncapsulatedAssertionResult")
            .with_child(Element::text_element("l7:ResultName", result.name.as_str()))
            .with_child(Element::text_element("l7:ResultType", result.result_type.as_str()))
    });

    let payload = Element::new("l7:EncapsulatedAssertion")
        .with_attr("id", id)
        .with_child(Element::text_element("l7:Name", name))
        .with_child(Element::text_element("l7:Guid", guid))
        .with_child(Element::new("l7:PolicyReference").with_attr("id", policy_id))
        .with_child(Element::new("l7:EncapsulatedArguments").with_children(arguments))
        .with_child(Element::new("l7:EncapsulatedResults").with_children(results))
        .with_optional_child(properties_element(string_properties(&encass.properties, "")));
    Ok(Entity::new(EntityKind::Encass, name, id, payload))
}
