//! FILENAME: data-model/src/catalog.rs
//! PURPOSE: Collection and link type definitions, and the catalog that serves them.
//! CONTEXT: Definitions are immutable to the core. The catalog is built once per
//! invocation from whatever the host application holds.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;

/// Which kind of resource an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    Collection,
    LinkType,
}

/// An attribute (column) of a collection or link type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub constraint: Option<Constraint>,
}

impl Attribute {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Attribute {
            id: id.into(),
            name: name.into(),
            constraint: None,
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

/// A record-type definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Collection {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Collection {
            id: id.into(),
            name: name.into(),
            color: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attribute(&self, attribute_id: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.id == attribute_id)
    }
}

/// A typed relation between exactly two collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkType {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// The two connected collections. Link instances order their document ids the same way.
    pub collection_ids: [String; 2],
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl LinkType {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        first_collection: impl Into<String>,
        second_collection: impl Into<String>,
    ) -> Self {
        LinkType {
            id: id.into(),
            name: name.into(),
            collection_ids: [first_collection.into(), second_collection.into()],
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attribute(&self, attribute_id: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.id == attribute_id)
    }

    /// Returns the collection on the other side of `collection_id`,
    /// or None when this link type does not touch it.
    pub fn other_collection_id(&self, collection_id: &str) -> Option<&str> {
        let [first, second] = &self.collection_ids;
        if first == collection_id {
            Some(second)
        } else if second == collection_id {
            Some(first)
        } else {
            None
        }
    }

    /// Position (0 or 1) of `collection_id` within `collection_ids`.
    pub fn collection_position(&self, collection_id: &str) -> Option<usize> {
        self.collection_ids.iter().position(|id| id == collection_id)
    }
}

/// Immutable id-keyed provider of collection and link type definitions.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    collections: FxHashMap<String, Collection>,
    link_types: FxHashMap<String, LinkType>,
}

impl Catalog {
    pub fn new(collections: Vec<Collection>, link_types: Vec<LinkType>) -> Self {
        Catalog {
            collections: collections.into_iter().map(|c| (c.id.clone(), c)).collect(),
            link_types: link_types.into_iter().map(|l| (l.id.clone(), l)).collect(),
        }
    }

    pub fn collection(&self, id: &str) -> Option<&Collection> {
        self.collections.get(id)
    }

    pub fn link_type(&self, id: &str) -> Option<&LinkType> {
        self.link_types.get(id)
    }

    /// Looks up an attribute on either kind of resource.
    pub fn attribute(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        attribute_id: &str,
    ) -> Option<&Attribute> {
        match resource_type {
            ResourceType::Collection => self.collection(resource_id)?.attribute(attribute_id),
            ResourceType::LinkType => self.link_type(resource_id)?.attribute(attribute_id),
        }
    }
}
