//! # Folder Tree
//!
//! Rebuilds the folder hierarchy from a flat collection of folders that only know their
//! parent's identifier. The tree is a read-only view: it is computed once and has to
//! be rebuilt from scratch if the folder collection changes.

use std::collections::{BTreeMap, BTreeSet};

use crate::bundle::entities::Folder;
use crate::core::error::{BundleError, BundleResult};

#[derive(Debug, Clone)]
pub struct FolderTree {
    root_id: String,
    id_folder_map: BTreeMap<String, Folder>,
    /// parent id -> child ids, children ordered by name
    children_map: BTreeMap<String, Vec<String>>,
}

impl FolderTree {
    /// Build the tree, failing unless the folders form exactly one rooted tree
    pub fn new<I: IntoIterator<Item = Folder>>(folders: I) -> BundleResult<Self> {
        let mut id_folder_map = BTreeMap::new();
        let mut children: BTreeMap<String, BTreeSet<(String, String)>> = BTreeMap::new();
        let mut roots = Vec::new();

        for folder in folders {
            match &folder.parent_folder {
                Some(parent) => {
                    children
                        .entry(parent.clone())
                        .or_default()
                        .insert((folder.name.clone(), folder.id.clone()));
                }
                None => roots.push(folder.id.clone()),
            }
            id_folder_map.insert(folder.id.clone(), folder);
        }

        let root_id = match roots.len() {
            0 => return Err(BundleError::structure("no root folder found")),
            1 => roots.remove(0),
            _ => {
                return Err(BundleError::structure(format!(
                    "multiple root folders found: {}",
                    roots.join(", ")
                )))
            }
        };

        let orphaned: Vec<&str> = children
            .keys()
            .filter(|parent| !id_folder_map.contains_key(*parent))
            .map(String::as_str)
            .collect();
        if !orphaned.is_empty() {
            return Err(BundleError::structure(format!(
                "orphaned folder subtree, missing parent folder ids: {}",
                orphaned.join(", ")
            )));
        }

        let children_map = children
            .into_iter()
            .map(|(parent, kids)| (parent, kids.into_iter().map(|(_, id)| id).collect()))
            .collect();

        let tree = Self {
            root_id,
            id_folder_map,
            children_map,
        };

        // Parent chains that loop back on themselves never reach the root
        let reachable: BTreeSet<&str> = tree.stream().map(|folder| folder.id.as_str()).collect();
        if reachable.len() != tree.id_folder_map.len() {
            let unreachable: Vec<&str> = tree
                .id_folder_map
                .keys()
                .map(String::as_str)
                .filter(|id| !reachable.contains(id))
                .collect();
            return Err(BundleError::structure(format!(
                "folders not reachable from the root folder: {}",
                unreachable.join(", ")
            )));
        }

        Ok(tree)
    }

    pub fn root(&self) -> &Folder {
        &self.id_folder_map[&self.root_id]
    }

    pub fn is_root(&self, folder_id: &str) -> bool {
        self.root_id == folder_id
    }

    pub fn folder_by_id(&self, id: &str) -> Option<&Folder> {
        self.id_folder_map.get(id)
    }

    pub fn children(&self, id: &str) -> impl Iterator<Item = &Folder> {
        self.children_map
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.id_folder_map.get(child))
    }

    pub fn len(&self) -> usize {
        self.id_folder_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_folder_map.is_empty()
    }

    /// Folder names from the root down to `folder`; the root itself contributes nothing
    pub fn path(&self, folder: &Folder) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = Some(folder);
        while let Some(folder) = current {
            if self.is_root(&folder.id) {
                break;
            }
            segments.push(folder.name.clone());
            current = folder
                .parent_folder
                .as_deref()
                .and_then(|parent| self.id_folder_map.get(parent));
        }
        segments.reverse();
        segments
    }

    /// Slash separated form of [`FolderTree::path`]
    pub fn path_string(&self, folder: &Folder) -> String {
        self.path(folder).join("/")
    }

    /// Pre-order walk over every folder reachable from the root
    pub fn stream(&self) -> impl Iterator<Item = &Folder> + '_ {
        let mut pending = vec![self.root_id.as_str()];
        std::iter::from_fn(move || {
            let id = pending.pop()?;
            if let Some(kids) = self.children_map.get(id) {
                pending.extend(kids.iter().rev().map(String::as_str));
            }
            self.id_folder_map.get(id)
        })
    }
}
