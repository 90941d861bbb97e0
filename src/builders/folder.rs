use super::{BuildContext, EntityBuilder};
use crate::bundle::{EntityKind, ROOT_FOLDER_ID, ROOT_FOLDER_NAME};
use crate::core::error::BundleResult;
use crate::document::{Entity, MappingAction};
use crate::xml::Element;

/// Emits every folder of the tree in pre-order, so parents precede their children
#[derive(Debug, Default)]
pub struct FolderEntityBuilder;

impl EntityBuilder for FolderEntityBuilder {
    fn name(&self) -> &str {
        "folder"
    }

    fn order(&self) -> i32 {
        200
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        let tree = context.folder_tree;
        let entities = tree
            .stream()
            .map(|folder| {
                if tree.is_root(&folder.id) {
                    // The root always exists on the gateway and is never recreated
                    let payload = Element::new("l7:Folder")
                        .with_attr("id", ROOT_FOLDER_ID)
                        .with_child(Element::text_element("l7:Name", ROOT_FOLDER_NAME));
                    return Entity::new(EntityKind::Folder, ROOT_FOLDER_NAME, ROOT_FOLDER_ID, payload)
                        .with_action(MappingAction::NewOrExisting);
                }

                let parent = context.bundle.wire_folder_id(folder.parent_folder.as_deref());
                let payload = Element::new("l7:Folder")
                    .with_attr("folderId", parent)
                    .with_attr("id", folder.id.as_str())
                    .with_child(Element::text_element("l7:Name", folder.name.as_str()));
                Entity::new(EntityKind::Folder, tree.path_string(folder), folder.id.as_str(), payload)
            })
            .collect();
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::test_support::run;
    use crate::bundle::Bundle;
    use crate::core::ids::NameBasedIdGenerator;

    #[test]
    fn test_folders_emitted_parent_first_with_fixed_root() {
        let ids = NameBasedIdGenerator::new("folders");
        let mut bundle = Bundle::new();
        bundle.ensure_folder("b/inner", &ids);
        bundle.ensure_folder("a", &ids);

        let entities = run(&FolderEntityBuilder, bundle).unwrap();
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![ROOT_FOLDER_NAME, "a", "b", "b/inner"]);

        let root = &entities[0];
        assert_eq!(root.id, ROOT_FOLDER_ID);
        assert_eq!(root.mapping_action, MappingAction::NewOrExisting);

        let inner = entities[3].payload.as_ref().unwrap();
        assert_eq!(inner.attr("folderId"), Some(entities[2].id.as_str()));
        assert_eq!(inner.child("l7:Name").unwrap().text(), "inner");
        assert_eq!(
            entities[1].payload.as_ref().unwrap().attr("folderId"),
            Some(ROOT_FOLDER_ID)
        );
    }
}
