use std::fmt;

use crate::bundle::EntityKind;
use crate::xml::Element;

/// How the gateway reconciles an incoming entity with its existing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingAction {
    /// Create when absent, otherwise reuse the existing entity untouched
    NewOrExisting,
    /// Create when absent, otherwise overwrite the existing entity
    NewOrUpdate,
}

impl MappingAction {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::NewOrExisting => "NewOrExisting",
            Self::NewOrUpdate => "NewOrUpdate",
        }
    }
}

impl fmt::Display for MappingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Typed value of a mapping or entity property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    String(String),
    Boolean(bool),
    Integer(i64),
}

impl PropertyValue {
    pub fn string<S: Into<String>>(value: S) -> Self {
        Self::String(value.into())
    }

    /// `l7:Property` element carrying this value
    pub fn to_property(&self, key: &str) -> Element {
        let value = match self {
            Self::String(value) => Element::text_element("l7:StringValue", value.as_str()),
            Self::Boolean(value) => Element::text_element("l7:BooleanValue", value.to_string()),
            Self::Integer(value) => Element::text_element("l7:IntegerValue", value.to_string()),
        };
        Element::new("l7:Property").with_attr("key", key).with_child(value)
    }
}

pub const MAP_BY: &str = "MapBy";
pub const MAP_TO: &str = "MapTo";
pub const FAIL_ON_NEW: &str = "FailOnNew";

/// Serializable unit produced by a builder
///
/// Built once by a builder and never changed afterwards; the assembler only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
    pub id: String,
    pub payload: Option<Element>,
    pub mapping_action: MappingAction,
    pub mapping_properties: Vec<(String, PropertyValue)>,
}

impl Entity {
    /// Entity carrying a full payload, reconciled by its id
    pub fn new<N: Into<String>, I: Into<String>>(kind: EntityKind, name: N, id: I, payload: Element) -> Self {
        Self {
            kind,
            name: name.into(),
            id: id.into(),
            payload: Some(payload),
            mapping_action: MappingAction::NewOrUpdate,
            mapping_properties: Vec::new(),
        }
    }

    /// Entity expected to exist on the gateway already: matched by name, never created
    pub fn reference_only<N: Into<String>, I: Into<String>>(kind: EntityKind, name: N, id: I) -> Self {
        Self {
            kind,
            name: name.into(),
            id: id.into(),
            payload: None,
            mapping_action: MappingAction::NewOrExisting,
            mapping_properties: Vec::new(),
        }
        .map_by_name()
        .fail_on_new()
    }

    pub fn with_action(mut self, action: MappingAction) -> Self {
        self.mapping_action = action;
        self
    }

    /// Match against the gateway's entity with the same name rather than the same id
    pub fn map_by_name(mut self) -> Self {
        let name = self.name.clone();
        self.set_property(MAP_BY, PropertyValue::string("name"));
        self.set_property(MAP_TO, PropertyValue::String(name));
        self
    }

    /// Fail the import if the gateway would have to create this entity
    pub fn fail_on_new(mut self) -> Self {
        self.set_property(FAIL_ON_NEW, PropertyValue::Boolean(true));
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.mapping_properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    fn set_property(&mut self, key: &str, value: PropertyValue) {
        match self.mapping_properties.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.mapping_properties.push((key.to_string(), value)),
        }
    }

    /// `l7:Item` for the references section, only for entities with a payload
    pub fn reference_item(&self) -> Option<Element> {
        let payload = self.payload.as_ref()?;
        Some(
            Element::new("l7:Item")
                .with_child(Element::text_element("l7:Name", self.name.as_str()))
                .with_child(Element::text_element("l7:Id", self.id.as_str()))
                .with_child(Element::text_element("l7:Type", self.kind.wire_type()))
                .with_child(Element::new("l7:Resource").with_child(payload.clone())),
        )
    }

    /// `l7:Mapping` for the mappings section
    pub fn mapping(&self) -> Element {
        let mapping = Element::new("l7:Mapping")
            .with_attr("action", self.mapping_action.wire_name())
            .with_attr("srcId", self.id.as_str())
            .with_attr("type", self.kind.wire_type());
        if self.mapping_properties.is_empty() {
            return mapping;
        }
        mapping.with_child(
            Element::new("l7:Properties").with_children(
                self.mapping_properties
                    .iter()
                    .map(|(key, value)| value.to_property(key)),
            ),
        )
    }
}
