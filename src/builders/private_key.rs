use super::{BuildContext, EntityBuilder};
use crate::bundle::EntityKind;
use crate::core::error::BundleResult;
use crate::document::Entity;

/// Private keys never leave the gateway: each declared key becomes a match-only entity
#[derive(Debug, Default)]
pub struct PrivateKeyEntityBuilder;

impl EntityBuilder for PrivateKeyEntityBuilder {
    fn name(&self) -> &str {
        "private-key"
    }

    fn order(&self) -> i32 {
        350
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        Ok(context
            .bundle
            .private_keys
            .values()
            .map(|key| Entity::reference_only(EntityKind::PrivateKey, key.alias.as_str(), key.key_id()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::test_support::run;
    use crate::bundle::{Bundle, PrivateKey};
    use crate::document::MappingAction;

    #[test]
    fn test_keys_are_match_only_with_keystore_ids() {
        let mut bundle = Bundle::new();
        bundle.private_keys.insert(
            "ssl".to_string(),
            PrivateKey {
                alias: "ssl".to_string(),
                ..Default::default()
            },
        );
        bundle.private_keys.insert(
            "signer".to_string(),
            PrivateKey {
                alias: "signer".to_string(),
                keystore: Some("hsm".to_string()),
                algorithm: Some("RSA".to_string()),
            },
        );

        let entities = run(&PrivateKeyEntityBuilder, bundle).unwrap();
        let ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["hsm:signer", "00000000000000000000000000000002:ssl"]);
        assert!(entities.iter().all(|e| e.payload.is_none()));
        assert!(entities
            .iter()
            .all(|e| e.mapping_action == MappingAction::NewOrExisting));
    }
}
