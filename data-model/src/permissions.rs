//! FILENAME: data-model/src/permissions.rs
//! PURPOSE: The allow-list the caller supplies for collections and link types.
//! CONTEXT: The core never evaluates roles or ownership; it only consults this map.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::catalog::ResourceType;

/// Actions allowed on one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllowedActions {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub delete: bool,
}

impl AllowedActions {
    pub fn all() -> Self {
        AllowedActions {
            read: true,
            write: true,
            create: true,
            delete: true,
        }
    }

    pub fn read_only() -> Self {
        AllowedActions {
            read: true,
            ..AllowedActions::default()
        }
    }
}

/// `{collectionId | linkTypeId → allowed actions}`.
/// A resource missing from the map has no rights at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionMap {
    pub collections: FxHashMap<String, AllowedActions>,
    pub link_types: FxHashMap<String, AllowedActions>,
}

impl PermissionMap {
    pub fn new() -> Self {
        PermissionMap::default()
    }

    pub fn with_collection(mut self, id: impl Into<String>, actions: AllowedActions) -> Self {
        self.collections.insert(id.into(), actions);
        self
    }

    pub fn with_link_type(mut self, id: impl Into<String>, actions: AllowedActions) -> Self {
        self.link_types.insert(id.into(), actions);
        self
    }

    pub fn actions(&self, resource_type: ResourceType, resource_id: &str) -> AllowedActions {
        let map = match resource_type {
            ResourceType::Collection => &self.collections,
            ResourceType::LinkType => &self.link_types,
        };
        map.get(resource_id).copied().unwrap_or_default()
    }

    pub fn can_read(&self, resource_type: ResourceType, resource_id: &str) -> bool {
        self.actions(resource_type, resource_id).read
    }

    pub fn can_create(&self, resource_type: ResourceType, resource_id: &str) -> bool {
        self.actions(resource_type, resource_id).create
    }

    pub fn can_write(&self, resource_type: ResourceType, resource_id: &str) -> bool {
        self.actions(resource_type, resource_id).write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_resource_has_no_rights() {
        let permissions = PermissionMap::new().with_collection("C1", AllowedActions::read_only());
        assert!(permissions.can_read(ResourceType::Collection, "C1"));
        assert!(!permissions.can_create(ResourceType::Collection, "C1"));
        assert!(!permissions.can_read(ResourceType::Collection, "C2"));
        assert!(!permissions.can_read(ResourceType::LinkType, "C1"));
    }
}
