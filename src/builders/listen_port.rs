//! Listen ports, plus the gateway's default HTTP/HTTPS ports for environment bundles
//!
//! A default port is only synthesized when no declared port already claims its number.
//! Synthesized ports are matched by name, so they reconcile with the ports the gateway
//! was installed with.

use tracing::debug;

use super::{properties_element, required_id, string_properties, BuildContext, EntityBuilder};
use crate::bundle::{BundleMode, EntityKind, ListenPort, TlsSettings};
use crate::core::error::BundleResult;
use crate::core::ids::IdField;
use crate::document::Entity;
use crate::xml::Element;

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_HTTPS_PORT: u16 = 8443;
pub const DEFAULT_HTTP_PORT_NAME: &str = "Default HTTP (8080)";
pub const DEFAULT_HTTPS_PORT_NAME: &str = "Default HTTPS (8443)";

const DEFAULT_FEATURES: [&str; 4] = [
    "Published service message input",
    "Administrative access",
    "Browser-based administration",
    "Built-in services",
];

#[derive(Debug, Default)]
pub struct ListenPortEntityBuilder;

impl EntityBuilder for ListenPortEntityBuilder {
    fn name(&self) -> &str {
        "listen-port"
    }

    fn order(&self) -> i32 {
        550
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        let bundle = context.bundle;
        let mut entities = Vec::with_capacity(bundle.listen_ports.len() + 2);
        for (name, port) in &bundle.listen_ports {
            let id = required_id(&port.id, EntityKind::ListenPort, name)?;
            entities.push(build_port(context, name, id, port)?);
        }

        if context.mode() == BundleMode::Environment {
            for default in default_ports() {
                if bundle.listen_ports.values().any(|port| port.port == default.port) {
                    debug!(port = default.port, "Default listen port already claimed");
                    continue;
                }
                let id = context.ids.generate(EntityKind::ListenPort, &default.name, IdField::Id);
                entities.push(build_port(context, &default.name, &id, &default)?.map_by_name());
            }
        }
        Ok(entities)
    }
}

/// Ports the gateway ships with
pub fn default_ports() -> [ListenPort; 2] {
    let features: Vec<String> = DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect();
    [
        ListenPort {
            name: DEFAULT_HTTP_PORT_NAME.to_string(),
            protocol: "HTTP".to_string(),
            port: DEFAULT_HTTP_PORT,
            enabled: true,
            enabled_features: features.clone(),
            ..Default::default()
        },
        ListenPort {
            name: DEFAULT_HTTPS_PORT_NAME.to_string(),
            protocol: "HTTPS".to_string(),
            port: DEFAULT_HTTPS_PORT,
            enabled: true,
            enabled_features: features,
            tls_settings: Some(TlsSettings {
                client_authentication: "Optional".to_string(),
                enabled_versions: vec!["TLSv1.2".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        },
    ]
}

fn build_port(context: &BuildContext<'_>, name: &str, id: &str, port: &ListenPort) -> BundleResult<Entity> {
    let features = port
        .enabled_features
        .iter()
        .map(|feature| Element::text_element("l7:StringValue", feature.as_str()));

    let tls = match &port.tls_settings {
        Some(settings) => Some(build_tls(context, name, settings)?),
        None => None,
    };

    let payload = Element::new("l7:ListenPort")
        .with_attr("id", id)
        .with_child(Element::text_element("l7:Name", name))
        .with_child(Element::text_element("l7:Enabled", port.enabled.to_string()))
        .with_child(Element::text_element("l7:Protocol", port.protocol.as_str()))
        .with_child(Element::text_element("l7:Port", port.port.to_string()))
        .with_child(Element::new("l7:EnabledFeatures").with_children(features))
        .with_optional_child(tls)
        .with_optional_child(properties_element(string_properties(&port.properties, "")));
    Ok(Entity::new(EntityKind::ListenPort, name, id, payload))
}

fn build_tls(context: &BuildContext<'_>, port: &str, settings: &TlsSettings) -> BundleResult<Element> {
    let private_key = match settings.private_key.as_deref() {
        Some(alias) => {
            let referrer = format!("listen port '{}'", port);
            let key = context
                .bundle
                .resolve(EntityKind::PrivateKey, alias, &referrer, |b| &b.private_keys)?
                .entity();
            Some(Element::text_element("l7:PrivateKey", key.key_id()))
        }
        None => None,
    };

    let string_values = |values: &[String]| {
        values
            .iter()
            .map(|value| Element::text_element("l7:StringValue", value.as_str()))
            .collect::<Vec<_>>()
    };

    Ok(Element::new("l7:TlsSettings")
        .with_child(Element::text_element(
            "l7:ClientAuthentication",
            settings.client_authentication.as_str(),
        ))
        .with_optional_child(private_key)
        .with_child(Element::new("l7:EnabledVersions").with_children(string_values(&settings.enabled_versions)))
        .with_child(
            Element::new("l7:EnabledCipherSuites").with_children(string_values(&settings.enabled_cipher_suites)),
        )
        .with_child(Element::text_element("l7:UseCipherSuitesOrder", "true")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::test_support::run;
    use crate::bundle::{Bundle, PrivateKey};
    use crate::core::error::BundleError;
    use crate::document::entity::{PropertyValue, MAP_BY, MAP_TO};

    fn port(number: u16) -> ListenPort {
        ListenPort {
            name: format!("custom-{}", number),
            protocol: "HTTP".to_string(),
            port: number,
            enabled: true,
            ..Default::default()
        }
    }

    fn names(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_deployment_mode_emits_only_declared_ports() {
        let mut bundle = Bundle::new();
        bundle.listen_ports.insert("custom".to_string(), port(9000));
        let entities = run(&ListenPortEntityBuilder, bundle).unwrap();
        assert_eq!(names(&entities), vec!["custom"]);
    }

    #[test]
    fn test_environment_mode_adds_unclaimed_defaults() {
        let mut bundle = Bundle::new().with_mode(BundleMode::Environment);
        bundle.listen_ports.insert("custom".to_string(), port(9000));
        let entities = run(&ListenPortEntityBuilder, bundle).unwrap();
        assert_eq!(
            names(&entities),
            vec!["custom", DEFAULT_HTTP_PORT_NAME, DEFAULT_HTTPS_PORT_NAME]
        );
        let https = entities[2].payload.as_ref().unwrap();
        assert_eq!(https.find("l7:ClientAuthentication").unwrap().text(), "Optional");

        assert_eq!(entities[0].property(MAP_BY), None);
        for default in &entities[1..] {
            assert_eq!(default.property(MAP_BY), Some(&PropertyValue::string("name")));
            assert_eq!(
                default.property(MAP_TO),
                Some(&PropertyValue::String(default.name.clone()))
            );
        }
    }

    #[test]
    fn test_default_port_ids_are_stable() {
        let bundle = Bundle::new().with_mode(BundleMode::Environment);
        let first = run(&ListenPortEntityBuilder, bundle.clone()).unwrap();
        let second = run(&ListenPortEntityBuilder, bundle).unwrap();
        assert_eq!(first, second);
        assert_ne!(first[0].id, first[1].id);
    }

    #[test]
    fn test_claimed_default_port_is_not_synthesized() {
        let mut bundle = Bundle::new().with_mode(BundleMode::Environment);
        bundle.listen_ports.insert("mine".to_string(), port(8080));
        let entities = run(&ListenPortEntityBuilder, bundle).unwrap();
        assert_eq!(names(&entities), vec!["mine", DEFAULT_HTTPS_PORT_NAME]);
    }

    #[test]
    fn test_tls_private_key_resolves_to_key_id() {
        let mut bundle = Bundle::new();
        bundle.private_keys.insert(
            "ssl".to_string(),
            PrivateKey {
                alias: "ssl".to_string(),
                ..Default::default()
            },
        );
        let mut secure = port(9443);
        secure.protocol = "HTTPS".to_string();
        secure.tls_settings = Some(TlsSettings {
            client_authentication: "None".to_string(),
            private_key: Some("ssl".to_string()),
            ..Default::default()
        });
        bundle.listen_ports.insert("secure".to_string(), secure.clone());

        let entities = run(&ListenPortEntityBuilder, bundle).unwrap();
        let key = entities[0].payload.as_ref().unwrap().find("l7:PrivateKey").unwrap().text();
        assert_eq!(key, "00000000000000000000000000000002:ssl");

        let mut missing = Bundle::new();
        missing.listen_ports.insert("secure".to_string(), secure);
        assert!(matches!(
            run(&ListenPortEntityBuilder, missing),
            Err(BundleError::MissingReference { .. })
        ));
    }
}
