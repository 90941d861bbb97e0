use super::{properties_element, required_id, string_properties, BuildContext, EntityBuilder};
use crate::bundle::{BindOnlyLdapDetail, EntityKind, IdentityProvider, IdentityProviderType};
use crate::consistency_error;
use crate::core::error::BundleResult;
use crate::document::Entity;
use crate::xml::Element;

#[derive(Debug, Default)]
pub struct IdentityProviderEntityBuilder;

impl EntityBuilder for IdentityProviderEntityBuilder {
    fn name(&self) -> &str {
        "identity-provider"
    }

    fn order(&self) -> i32 {
        400
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        context
            .bundle
            .identity_providers
            .iter()
            .map(|(name, provider)| build_provider(name, provider))
            .collect()
    }
}

fn build_provider(name: &str, provider: &IdentityProvider) -> BundleResult<Entity> {
    let id = required_id(&provider.id, EntityKind::IdentityProvider, name)?;

    let extension = match (provider.provider_type, &provider.identity_provider_detail) {
        (IdentityProviderType::BindOnlyLdap, Some(detail)) => Some(bind_only_detail(detail)),
        (IdentityProviderType::BindOnlyLdap, None) => {
            return Err(consistency_error!(
                "Bind-only LDAP identity provider '{}' has no identityProviderDetail",
                name
            ));
        }
        _ => None,
    };

    let payload = Element::new("l7:IdentityProvider")
        .with_attr("id", id)
        .with_child(Element::text_element("l7:Name", name))
        .with_child(Element::text_element(
            "l7:IdentityProviderType",
            provider.provider_type.wire_name(),
        ))
        .with_optional_child(properties_element(string_properties(&provider.properties, "")))
        .with_optional_child(extension.map(|detail| Element::new("l7:Extension").with_child(detail)));
    Ok(Entity::new(EntityKind::IdentityProvider, name, id, payload))
}

fn bind_only_detail(detail: &BindOnlyLdapDetail) -> Element {
    Element::new("l7:BindOnlyLdapIdentityProviderDetail")
        .with_child(
            Element::new("l7:ServerUrls").with_children(
                detail
                    .server_urls
                    .iter()
                    .map(|url| Element::text_element("l7:StringValue", url.as_str())),
            ),
        )
        .with_child(Element::text_element(
            "l7:UseSslClientAuthentication",
            detail.use_ssl_client_authentication.to_string(),
        ))
        .with_child(Element::text_element("l7:BindPatternPrefix", detail.bind_pattern_prefix.as_str()))
        .with_child(Element::text_element("l7:BindPatternSuffix", detail.bind_pattern_suffix.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::BundleError;
    use std::collections::BTreeMap;

    fn provider(provider_type: IdentityProviderType, detail: Option<BindOnlyLdapDetail>) -> IdentityProvider {
        IdentityProvider {
            name: "corp".to_string(),
            id: Some("idp-1".to_string()),
            provider_type,
            properties: BTreeMap::from([("userLookupByCertMode".to_string(), "CN".to_string())]),
            identity_provider_detail: detail,
        }
    }

    #[test]
    fn test_bind_only_ldap_detail() {
        let detail = BindOnlyLdapDetail {
            server_urls: vec!["ldap://one".to_string(), "ldap://two".to_string()],
            bind_pattern_prefix: "cn=".to_string(),
            bind_pattern_suffix: ",dc=example".to_string(),
            ..Default::default()
        };
        let entity = build_provider("corp", &provider(IdentityProviderType::BindOnlyLdap, Some(detail))).unwrap();
        let payload = entity.payload.unwrap();
        assert_eq!(payload.child("l7:IdentityProviderType").unwrap().text(), "Simple LDAP");
        assert_eq!(payload.find("l7:ServerUrls").unwrap().elements().count(), 2);
        assert_eq!(payload.find("l7:BindPatternSuffix").unwrap().text(), ",dc=example");
    }

    #[test]
    fn test_bind_only_ldap_without_detail_fails() {
        assert!(matches!(
            build_provider("corp", &provider(IdentityProviderType::BindOnlyLdap, None)),
            Err(BundleError::Consistency { .. })
        ));
    }

    #[test]
    fn test_other_providers_have_no_extension() {
        let entity = build_provider("corp", &provider(IdentityProviderType::Ldap, None)).unwrap();
        assert!(entity.payload.unwrap().child("l7:Extension").is_none());
    }
}
