//! # Bundle Document Assembler
//!
//! Runs every registered builder in order and splits their output into the two
//! sections of a gateway management bundle:
//! - `l7:References`: one `l7:Item` per entity that carries a payload
//! - `l7:Mappings`: one `l7:Mapping` per entity, always
//!
//! The assembler does not reorder or transform entities.

pub mod entity;

use tracing::{info, instrument};

pub use entity::{Entity, MappingAction, PropertyValue};

use crate::builders::{BuildContext, BuilderPipeline};
use crate::core::error::BundleResult;
use crate::xml::Element;

/// Namespace of the gateway management protocol
pub const GATEWAY_MANAGEMENT_NS: &str = "http://ns.l7tech.com/2010/04/gateway-management";

/// Assembled bundle: entities in builder order
#[derive(Debug, Clone, PartialEq)]
pub struct BundleDocument {
    entities: Vec<Entity>,
}

impl BundleDocument {
    pub fn from_entities(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn references(&self) -> impl Iterator<Item = Element> + '_ {
        self.entities.iter().filter_map(Entity::reference_item)
    }

    pub fn mappings(&self) -> impl Iterator<Item = Element> + '_ {
        self.entities.iter().map(Entity::mapping)
    }

    pub fn to_element(&self) -> Element {
        Element::new("l7:Bundle")
            .with_attr("xmlns:l7", GATEWAY_MANAGEMENT_NS)
            .with_child(Element::new("l7:References").with_children(self.references()))
            .with_child(Element::new("l7:Mappings").with_children(self.mappings()))
    }

    pub fn to_xml(&self) -> String {
        self.to_element().to_document_string()
    }
}

/// Run `pipeline` over `context` and collect the output into a document
#[instrument(skip_all)]
pub fn assemble(pipeline: &BuilderPipeline, context: &BuildContext<'_>) -> BundleResult<BundleDocument> {
    let entities = pipeline.build(context)?;
    let with_payload = entities.iter().filter(|e| e.payload.is_some()).count();
    info!(
        entities = entities.len(),
        references = with_payload,
        "Assembled bundle document"
    );
    Ok(BundleDocument::from_entities(entities))
}
