//! # Policy Graph Preparer
//!
//! Parses every policy's raw XML once and produces a rewritten copy in which:
//! - include assertions carry the included policy's guid instead of its path
//! - encapsulated assertions carry the encass guid and name instead of its path
//! - set-variable expressions are base64 encoded, or turned into deploy time
//!   placeholders for `ENV.` variables
//! - hardcoded response bodies are base64 encoded
//!
//! The source `Policy` records are never modified, so preparing a bundle twice gives
//! equal results.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

use super::vocabulary::*;
use crate::bundle::{Bundle, Dependency, EntityKind, Policy, Resolved, ENV_VARIABLE_PREFIX};
use crate::core::error::{BundleError, BundleResult};
use crate::xml::{self, Element, Node};

/// A policy whose symbolic references have been resolved
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPolicy {
    pub path: String,
    pub document: Element,
    /// Paths of local policies this policy depends on
    pub dependencies: BTreeSet<String>,
    /// Policies and encasses satisfied by dependency bundles
    pub external_dependencies: BTreeSet<Dependency>,
}

/// Prepared form of every policy in a bundle, keyed by path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedPolicies {
    policies: BTreeMap<String, PreparedPolicy>,
}

impl PreparedPolicies {
    pub fn get(&self, path: &str) -> Option<&PreparedPolicy> {
        self.policies.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PreparedPolicy> {
        self.policies.values()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Adjacency list of local include/encass dependencies
    pub fn dependency_graph(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.policies
            .iter()
            .map(|(path, policy)| (path.clone(), policy.dependencies.clone()))
            .collect()
    }

    pub fn external_dependencies(&self) -> BTreeSet<Dependency> {
        self.policies
            .values()
            .flat_map(|policy| policy.external_dependencies.iter().cloned())
            .collect()
    }
}

#[derive(Default)]
struct Collected {
    local: BTreeSet<String>,
    external: BTreeSet<Dependency>,
}

/// Resolve and rewrite the references of every policy in `bundle`
#[instrument(skip(bundle), fields(policies = bundle.policies.len()))]
pub fn prepare_policies(bundle: &Bundle) -> BundleResult<PreparedPolicies> {
    let preparer = Preparer { bundle };
    let mut policies = BTreeMap::new();
    for policy in bundle.policies.values() {
        let prepared = preparer.prepare(policy)?;
        debug!(
            policy = %prepared.path,
            dependencies = prepared.dependencies.len(),
            external = prepared.external_dependencies.len(),
            "Prepared policy"
        );
        policies.insert(prepared.path.clone(), prepared);
    }
    info!("Prepared {} policies", policies.len());
    Ok(PreparedPolicies { policies })
}

struct Preparer<'a> {
    bundle: &'a Bundle,
}

impl<'a> Preparer<'a> {
    fn prepare(&self, policy: &Policy) -> BundleResult<PreparedPolicy> {
        let raw = policy
            .policy_xml
            .as_deref()
            .ok_or_else(|| BundleError::policy_xml(&policy.path, "policy has no XML content"))?;
        let parsed = xml::parse(raw).map_err(|e| BundleError::policy_xml(&policy.path, e.to_string()))?;

        let mut collected = Collected {
            local: policy.dependencies.clone(),
            external: BTreeSet::new(),
        };
        let document = self.rewrite(&policy.path, &parsed, &mut collected)?;

        Ok(PreparedPolicy {
            path: policy.path.clone(),
            document,
            dependencies: collected.local,
            external_dependencies: collected.external,
        })
    }

    fn rewrite(&self, path: &str, element: &Element, collected: &mut Collected) -> BundleResult<Element> {
        let mut copy = Element {
            name: element.name.clone(),
            attributes: element.attributes.clone(),
            children: Vec::with_capacity(element.children.len()),
        };
        for node in &element.children {
            let node = match node {
                Node::Element(child) => Node::Element(self.rewrite(path, child, collected)?),
                other => other.clone(),
            };
            copy.children.push(node);
        }

        match copy.name.as_str() {
            INCLUDE => self.prepare_include(path, &mut copy, collected)?,
            ENCAPSULATED => self.prepare_encass(path, &mut copy, collected)?,
            SET_VARIABLE => prepare_set_variable(&mut copy),
            HARDCODED_RESPONSE => prepare_hardcoded_response(&mut copy),
            _ => {}
        }
        Ok(copy)
    }

    fn prepare_include(&self, path: &str, element: &mut Element, collected: &mut Collected) -> BundleResult<()> {
        let guid_element = element.child_mut(POLICY_GUID).ok_or_else(|| {
            BundleError::policy_xml(path, "Include assertion is missing its L7p:PolicyGuid element")
        })?;
        let included_path = guid_element
            .attr(STRING_VALUE)
            .ok_or_else(|| BundleError::policy_xml(path, "L7p:PolicyGuid has no stringValue"))?
            .to_string();

        let referrer = format!("policy '{}'", path);
        let resolved = self.bundle.resolve_policy(&included_path, &referrer)?;
        let included = resolved.entity();
        let guid = included.guid.clone().ok_or_else(|| {
            BundleError::policy_xml(path, format!("included policy '{}' has no guid", included_path))
        })?;
        guid_element.set_attr(STRING_VALUE, guid);

        match resolved {
            Resolved::Local(_) => {
                collected.local.insert(included_path);
            }
            Resolved::External { .. } => {
                collected
                    .external
                    .insert(self.external_dependency(path, &included_path, included.id.as_deref(), EntityKind::Policy)?);
            }
        }
        Ok(())
    }

    fn prepare_encass(&self, path: &str, element: &mut Element, collected: &mut Collected) -> BundleResult<()> {
        let Some(encass_name) = element.remove_attr(ENCASS_PATH) else {
            // Already in gateway form
            if element.child(ENCASS_CONFIG_GUID).is_some() {
                return Ok(());
            }
            return Err(BundleError::policy_xml(
                path,
                "Encapsulated assertion has neither an encassPath nor a config guid",
            ));
        };

        let referrer = format!("policy '{}'", path);
        let resolved = self.bundle.resolve_encass(&encass_name, &referrer)?;
        let encass = resolved.entity();
        let guid = encass.guid.clone().ok_or_else(|| {
            BundleError::policy_xml(path, format!("encass '{}' has no guid", encass_name))
        })?;

        element.replace_child(
            ENCASS_CONFIG_GUID,
            Element::new(ENCASS_CONFIG_GUID).with_attr(STRING_VALUE, guid),
        );
        element.replace_child(
            ENCASS_CONFIG_NAME,
            Element::new(ENCASS_CONFIG_NAME).with_attr(STRING_VALUE, encass_name.as_str()),
        );

        match resolved {
            // The encass definition itself is emitted later; order against its backing policy
            Resolved::Local(encass) if self.bundle.policies.contains_key(&encass.policy) => {
                collected.local.insert(encass.policy.clone());
            }
            Resolved::Local(_) => {}
            Resolved::External { .. } => {
                collected
                    .external
                    .insert(self.external_dependency(path, &encass_name, encass.id.as_deref(), EntityKind::Encass)?);
            }
        }
        Ok(())
    }

    /// Cross-bundle dependency on `key`, which must be identifiable in the dependency bundles
    fn external_dependency(
        &self,
        path: &str,
        key: &str,
        id: Option<&str>,
        kind: EntityKind,
    ) -> BundleResult<Dependency> {
        let id = id.ok_or_else(|| {
            BundleError::policy_xml(path, format!("{} '{}' in dependency bundle has no id", kind, key))
        })?;
        let dependency = Dependency::new(id, kind);
        match self.bundle.find_dependency(&dependency) {
            Some(found) if found == key => Ok(dependency),
            Some(found) => Err(BundleError::consistency(format!(
                "{} '{}' referenced by policy '{}' shares id {} with '{}' in the dependency bundles",
                kind, key, path, id, found
            ))),
            None => Err(BundleError::missing(kind.to_string(), id, format!("policy '{}'", path))),
        }
    }
}

fn prepare_set_variable(element: &mut Element) {
    let Some(expression) = element.child(EXPRESSION) else {
        return;
    };
    let value = expression_value(expression);
    let variable = element
        .child(VARIABLE_TO_SET)
        .and_then(|variable| variable.attr(STRING_VALUE))
        .unwrap_or_default()
        .to_string();

    let replacement = if variable.starts_with(ENV_VARIABLE_PREFIX) {
        Element::new(BASE64_EXPRESSION).with_attr(ENV_PARAM_NAME, variable)
    } else {
        Element::new(BASE64_EXPRESSION).with_attr(STRING_VALUE, STANDARD.encode(value))
    };
    element.replace_child(EXPRESSION, replacement);
}

fn prepare_hardcoded_response(element: &mut Element) {
    let Some(body) = element.child(RESPONSE_BODY) else {
        return;
    };
    let encoded = STANDARD.encode(expression_value(body));
    element.replace_child(
        RESPONSE_BODY,
        Element::new(BASE64_RESPONSE_BODY).with_attr(STRING_VALUE, encoded),
    );
}

/// Payload of an expression element: its text/CDATA, or a `stringValue` attribute
fn expression_value(element: &Element) -> String {
    let text = element.text();
    if text.is_empty() {
        element.attr(STRING_VALUE).unwrap_or_default().to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn policy(path: &str, guid: &str, xml: &str) -> Policy {
        let mut policy = Policy::new(path);
        policy.id = Some(format!("{}-id", guid));
        policy.guid = Some(guid.to_string());
        policy.policy_xml = Some(xml.to_string());
        policy
    }

    fn include(path: &str) -> String {
        format!(
            r#"<wsp:Policy><wsp:All><L7p:Include><L7p:PolicyGuid stringValue="{}"/></L7p:Include></wsp:All></wsp:Policy>"#,
            path
        )
    }

    fn encass_call(name: &str) -> String {
        format!(
            r#"<wsp:Policy><wsp:All><L7p:Encapsulated encassPath="{}"/></wsp:All></wsp:Policy>"#,
            name
        )
    }

    fn encass(name: &str, guid: &str, policy: &str) -> Encass {
        Encass {
            name: name.to_string(),
            id: Some(format!("{}-id", guid)),
            guid: Some(guid.to_string()),
            policy: policy.to_string(),
            ..Default::default()
        }
    }

    use crate::bundle::Encass;

    #[test]
    fn test_include_is_rewritten_to_guid_and_recorded() {
        let mut bundle = Bundle::new();
        bundle.add_policy(policy("main", "g-main", &include("lib/helper")));
        bundle.add_policy(policy("lib/helper", "g-helper", "<wsp:Policy/>"));

        let prepared = prepare_policies(&bundle).unwrap();
        let main = prepared.get("main").unwrap();
        assert_eq!(main.dependencies, ["lib/helper".to_string()].into_iter().collect());
        let guid = main.document.find(POLICY_GUID).unwrap();
        assert_eq!(guid.attr(STRING_VALUE), Some("g-helper"));

        // Source XML is untouched, so a second pass is identical
        assert_eq!(prepare_policies(&bundle).unwrap(), prepared);
    }

    #[test]
    fn test_include_resolved_from_single_dependency_bundle() {
        let mut dependency = Bundle::new();
        dependency.add_policy(policy("lib/shared", "g-shared", "<wsp:Policy/>"));
        let mut bundle = Bundle::new();
        bundle.add_dependency(Arc::new(dependency));
        bundle.add_policy(policy("main", "g-main", &include("lib/shared")));

        let prepared = prepare_policies(&bundle).unwrap();
        let main = prepared.get("main").unwrap();
        assert!(main.dependencies.is_empty());
        assert_eq!(
            prepared.external_dependencies().into_iter().collect::<Vec<_>>(),
            vec![Dependency::new("g-shared-id", EntityKind::Policy)]
        );
    }

    #[test]
    fn test_include_ambiguous_across_dependency_bundles() {
        let mut bundle = Bundle::new();
        for _ in 0..2 {
            let mut dependency = Bundle::new();
            dependency.add_policy(policy("lib/shared", "g", "<wsp:Policy/>"));
            bundle.add_dependency(Arc::new(dependency));
        }
        bundle.add_policy(policy("main", "g-main", &include("lib/shared")));
        let err = prepare_policies(&bundle).unwrap_err();
        assert!(matches!(err, BundleError::AmbiguousReference { count: 2, .. }));
        assert!(err.to_string().contains("lib/shared"));
    }

    #[test]
    fn test_missing_include_and_missing_guid_element() {
        let mut bundle = Bundle::new();
        bundle.add_policy(policy("main", "g-main", &include("nowhere")));
        assert!(matches!(
            prepare_policies(&bundle),
            Err(BundleError::MissingReference { .. })
        ));

        let mut bundle = Bundle::new();
        bundle.add_policy(policy("main", "g", "<wsp:Policy><L7p:Include/></wsp:Policy>"));
        assert!(matches!(prepare_policies(&bundle), Err(BundleError::PolicyXml { .. })));
    }

    #[test]
    fn test_encass_invocation_rewritten() {
        let mut bundle = Bundle::new();
        bundle.add_policy(policy("main", "g-main", &encass_call("Tools/Echo")));
        bundle.add_policy(policy("encass/echo", "g-echo", "<wsp:Policy/>"));
        bundle
            .encasses
            .insert("Tools/Echo".to_string(), encass("Tools/Echo", "e-guid", "encass/echo"));

        let prepared = prepare_policies(&bundle).unwrap();
        let main = prepared.get("main").unwrap();
        let call = main.document.find(ENCAPSULATED).unwrap();
        assert_eq!(call.attr(ENCASS_PATH), None);
        assert_eq!(call.child(ENCASS_CONFIG_GUID).unwrap().attr(STRING_VALUE), Some("e-guid"));
        assert_eq!(call.child(ENCASS_CONFIG_NAME).unwrap().attr(STRING_VALUE), Some("Tools/Echo"));
        assert!(main.dependencies.contains("encass/echo"));
    }

    #[test]
    fn test_encass_ambiguous_across_dependency_bundles() {
        let mut bundle = Bundle::new();
        for _ in 0..2 {
            let mut dependency = Bundle::new();
            dependency
                .encasses
                .insert("Shared".to_string(), encass("Shared", "e", "p"));
            bundle.add_dependency(Arc::new(dependency));
        }
        bundle.add_policy(policy("main", "g-main", &encass_call("Shared")));
        assert!(matches!(
            prepare_policies(&bundle),
            Err(BundleError::AmbiguousReference { .. })
        ));
    }

    #[test]
    fn test_set_variable_and_hardcoded_response_encoding() {
        let xml = r#"<wsp:Policy><wsp:All>
            <L7p:SetVariable><L7p:Expression><![CDATA[hello]]></L7p:Expression><L7p:VariableToSet stringValue="greeting"/></L7p:SetVariable>
            <L7p:SetVariable><L7p:Expression><![CDATA[secret]]></L7p:Expression><L7p:VariableToSet stringValue="ENV.backend.url"/></L7p:SetVariable>
            <L7p:SetVariable><L7p:VariableToSet stringValue="empty"/></L7p:SetVariable>
            <L7p:HardcodedResponse><L7p:ResponseBody><![CDATA[{"ok":true}]]></L7p:ResponseBody></L7p:HardcodedResponse>
        </wsp:All></wsp:Policy>"#;
        let mut bundle = Bundle::new();
        bundle.add_policy(policy("main", "g", xml));

        let prepared = prepare_policies(&bundle).unwrap();
        let all = prepared.get("main").unwrap().document.child("wsp:All").unwrap();
        let set_variables: Vec<&Element> = all.elements().filter(|e| e.name == SET_VARIABLE).collect();

        let plain = set_variables[0].child(BASE64_EXPRESSION).unwrap();
        assert_eq!(plain.attr(STRING_VALUE), Some("aGVsbG8="));
        assert!(set_variables[0].child(EXPRESSION).is_none());

        let env = set_variables[1].child(BASE64_EXPRESSION).unwrap();
        assert_eq!(env.attr(ENV_PARAM_NAME), Some("ENV.backend.url"));
        assert_eq!(env.attr(STRING_VALUE), None);

        assert!(set_variables[2].child(BASE64_EXPRESSION).is_none());

        let response = all.child(HARDCODED_RESPONSE).unwrap();
        assert_eq!(
            response.child(BASE64_RESPONSE_BODY).unwrap().attr(STRING_VALUE),
            Some("eyJvayI6dHJ1ZX0=")
        );
    }

    #[test]
    fn test_dependency_ids_must_identify_a_single_entity() {
        let mut dependency = Bundle::new();
        dependency.add_policy(policy("lib/a", "g-a", "<wsp:Policy/>"));
        let mut clash = policy("lib/b", "g-b", "<wsp:Policy/>");
        clash.id = Some("g-a-id".to_string());
        dependency.add_policy(clash);

        let mut bundle = Bundle::new();
        bundle.add_dependency(Arc::new(dependency));
        bundle.add_policy(policy("main", "g-main", &include("lib/b")));
        let err = prepare_policies(&bundle).unwrap_err();
        assert!(matches!(err, BundleError::Consistency { .. }));
        assert!(err.to_string().contains("lib/a"));
    }

    #[test]
    fn test_hardcoded_response_without_body_is_left_alone() {
        let xml = r#"<wsp:Policy><wsp:All><L7p:HardcodedResponse><L7p:ResponseStatus stringValue="204"/></L7p:HardcodedResponse></wsp:All></wsp:Policy>"#;
        let mut bundle = Bundle::new();
        bundle.add_policy(policy("main", "g", xml));

        let prepared = prepare_policies(&bundle).unwrap();
        let response = prepared.get("main").unwrap().document.find(HARDCODED_RESPONSE).unwrap();
        assert!(response.child(BASE64_RESPONSE_BODY).is_none());
        assert_eq!(
            response.child("L7p:ResponseStatus").unwrap().attr(STRING_VALUE),
            Some("204")
        );
    }

    #[test]
    fn test_encass_in_gateway_form_passes_through() {
        let xml = r#"<wsp:Policy><wsp:All><L7p:Encapsulated><L7p:EncapsulatedAssertionConfigGuid stringValue="existing-guid"/><L7p:EncapsulatedAssertionConfigName stringValue="Echo"/></L7p:Encapsulated></wsp:All></wsp:Policy>"#;
        let mut bundle = Bundle::new();
        bundle.add_policy(policy("main", "g", xml));

        let prepared = prepare_policies(&bundle).unwrap();
        let main = prepared.get("main").unwrap();
        assert_eq!(main.document, xml::parse(xml).unwrap());
        assert!(main.dependencies.is_empty());
        assert!(main.external_dependencies.is_empty());
    }

    #[test]
    fn test_encass_without_path_or_guid_fails() {
        let xml = r#"<wsp:Policy><wsp:All><L7p:Encapsulated/></wsp:All></wsp:Policy>"#;
        let mut bundle = Bundle::new();
        bundle.add_policy(policy("main", "g", xml));
        assert!(matches!(
            prepare_policies(&bundle),
            Err(BundleError::PolicyXml { .. })
        ));
    }

    #[test]
    fn test_policy_without_xml_fails() {
        let mut bundle = Bundle::new();
        bundle.add_policy(Policy::new("metadata/only"));
        let err = prepare_policies(&bundle).unwrap_err();
        assert!(err.to_string().contains("metadata/only"));
    }
}
