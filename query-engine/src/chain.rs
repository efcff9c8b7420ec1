//! FILENAME: query-engine/src/chain.rs
//! Resource Chain Resolver - turns a query stem into an indexed resource chain.
//!
//! The chain alternates collections (even indices) and link types (odd indices):
//!
//!   C0 - L0 - C1 - L1 - C2 ...
//!
//! Resolution never fails. A missing base collection yields an empty chain, and
//! a missing or disconnected link type truncates the chain at that point.

use serde::{Deserialize, Serialize};
use data_model::{log_debug, Attribute, Catalog, Collection, LinkType, ResourceType};

use crate::stem::QueryStem;

// ============================================================================
// CHAIN RESOURCES
// ============================================================================

/// One resolved resource of a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainResource {
    Collection(Collection),
    LinkType(LinkType),
}

impl ChainResource {
    pub fn id(&self) -> &str {
        match self {
            ChainResource::Collection(c) => &c.id,
            ChainResource::LinkType(l) => &l.id,
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            ChainResource::Collection(_) => ResourceType::Collection,
            ChainResource::LinkType(_) => ResourceType::LinkType,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ChainResource::Collection(c) => &c.name,
            ChainResource::LinkType(l) => &l.name,
        }
    }

    /// Collections carry a color; link types do not.
    pub fn color(&self) -> Option<&str> {
        match self {
            ChainResource::Collection(c) => c.color.as_deref(),
            ChainResource::LinkType(_) => None,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        match self {
            ChainResource::Collection(c) => &c.attributes,
            ChainResource::LinkType(l) => &l.attributes,
        }
    }

    pub fn attribute(&self, attribute_id: &str) -> Option<&Attribute> {
        self.attributes().iter().find(|a| a.id == attribute_id)
    }

    fn is(&self, resource_type: ResourceType, resource_id: &str) -> bool {
        self.resource_type() == resource_type && self.id() == resource_id
    }
}

// ============================================================================
// ATTRIBUTE ADDRESS
// ============================================================================

/// Pointer to one attribute at one chain position.
/// Never trusted across chain changes; see `ResolvedChain::readdress`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeAddress {
    pub resource_index: usize,
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub attribute_id: String,
}

impl AttributeAddress {
    pub fn new(
        resource_index: usize,
        resource_id: impl Into<String>,
        resource_type: ResourceType,
        attribute_id: impl Into<String>,
    ) -> Self {
        AttributeAddress {
            resource_index,
            resource_id: resource_id.into(),
            resource_type,
            attribute_id: attribute_id.into(),
        }
    }

    /// Shorthand for an attribute of the collection at `resource_index`.
    pub fn collection(
        resource_index: usize,
        collection_id: impl Into<String>,
        attribute_id: impl Into<String>,
    ) -> Self {
        Self::new(resource_index, collection_id, ResourceType::Collection, attribute_id)
    }

    /// Shorthand for an attribute of the link type at `resource_index`.
    pub fn link_type(
        resource_index: usize,
        link_type_id: impl Into<String>,
        attribute_id: impl Into<String>,
    ) -> Self {
        Self::new(resource_index, link_type_id, ResourceType::LinkType, attribute_id)
    }

    /// True when both addresses point at the same attribute of the same resource,
    /// regardless of chain position.
    pub fn same_attribute(&self, other: &AttributeAddress) -> bool {
        self.resource_type == other.resource_type
            && self.resource_id == other.resource_id
            && self.attribute_id == other.attribute_id
    }
}

// ============================================================================
// RESOLVED CHAIN
// ============================================================================

/// Ordered chain of resources, addressable by resource index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedChain {
    resources: Vec<ChainResource>,
}

impl ResolvedChain {
    /// Resolves a stem against the catalog.
    pub fn resolve(stem: &QueryStem, catalog: &Catalog) -> Self {
        let mut resources = Vec::with_capacity(stem.link_type_ids.len() * 2 + 1);

        let Some(base) = catalog.collection(&stem.collection_id) else {
            log_debug!("CHAIN", "base collection {} missing", stem.collection_id);
            return ResolvedChain { resources };
        };
        resources.push(ChainResource::Collection(base.clone()));

        let mut previous_id = base.id.as_str();
        for link_type_id in &stem.link_type_ids {
            let Some(link_type) = catalog.link_type(link_type_id) else {
                log_debug!(
                    "CHAIN",
                    "link type {} missing, chain truncated at {}",
                    link_type_id,
                    resources.len()
                );
                break;
            };
            let Some(next_id) = link_type.other_collection_id(previous_id) else {
                log_debug!(
                    "CHAIN",
                    "link type {} does not touch {}, chain truncated",
                    link_type_id,
                    previous_id
                );
                break;
            };
            let Some(next) = catalog.collection(next_id) else {
                log_debug!(
                    "CHAIN",
                    "collection {} behind {} missing, chain truncated",
                    next_id,
                    link_type_id
                );
                break;
            };

            resources.push(ChainResource::LinkType(link_type.clone()));
            resources.push(ChainResource::Collection(next.clone()));
            previous_id = &next.id;
        }

        ResolvedChain { resources }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, resource_index: usize) -> Option<&ChainResource> {
        self.resources.get(resource_index)
    }

    pub fn resources(&self) -> &[ChainResource] {
        &self.resources
    }

    /// Number of collection positions (pipeline buckets).
    pub fn collection_count(&self) -> usize {
        (self.resources.len() + 1) / 2
    }

    /// Collection at pipeline position `position` (chain index `2 * position`).
    pub fn collection_at(&self, position: usize) -> Option<&Collection> {
        match self.resources.get(position * 2) {
            Some(ChainResource::Collection(c)) => Some(c),
            _ => None,
        }
    }

    /// Link type of hop `hop` (chain index `2 * hop + 1`).
    pub fn link_type_at(&self, hop: usize) -> Option<&LinkType> {
        match self.resources.get(hop * 2 + 1) {
            Some(ChainResource::LinkType(l)) => Some(l),
            _ => None,
        }
    }

    /// True when every link type of the stem was resolved.
    pub fn is_complete(&self, stem: &QueryStem) -> bool {
        !self.is_empty() && self.resources.len() == stem.link_type_ids.len() * 2 + 1
    }

    /// The attribute an address points at, if the address is valid for this chain.
    pub fn attribute(&self, address: &AttributeAddress) -> Option<&Attribute> {
        self.get(address.resource_index)
            .filter(|r| r.is(address.resource_type, &address.resource_id))
            .and_then(|r| r.attribute(&address.attribute_id))
    }

    /// Re-validates a possibly stale address against this chain.
    ///
    /// The original index is kept when it still holds the same resource;
    /// otherwise the first resource with matching id and type is used. The
    /// address is invalidated when no such resource exists or the attribute
    /// is gone from it.
    pub fn readdress(&self, address: &AttributeAddress) -> Option<AttributeAddress> {
        let index = match self.get(address.resource_index) {
            Some(r) if r.is(address.resource_type, &address.resource_id) => address.resource_index,
            _ => self
                .resources
                .iter()
                .position(|r| r.is(address.resource_type, &address.resource_id))?,
        };

        self.resources[index].attribute(&address.attribute_id)?;

        Some(AttributeAddress {
            resource_index: index,
            ..address.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_model::Attribute;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                Collection::new("C1", "Projects").with_attribute(Attribute::new("a1", "Name")),
                Collection::new("C2", "Tasks").with_attribute(Attribute::new("b1", "Title")),
                Collection::new("C3", "People").with_attribute(Attribute::new("p1", "Email")),
            ],
            vec![
                LinkType::new("L1", "Project tasks", "C1", "C2")
                    .with_attribute(Attribute::new("w", "Weight")),
                LinkType::new("L2", "Assignees", "C3", "C2"),
                LinkType::new("L9", "Unrelated", "C1", "C3"),
            ],
        )
    }

    #[test]
    fn test_fully_connected_stem_has_2n_plus_1_resources() {
        let stem = QueryStem::new("C1").with_link_type("L1").with_link_type("L2");
        let chain = ResolvedChain::resolve(&stem, &catalog());

        assert_eq!(chain.len(), 5);
        assert!(chain.is_complete(&stem));
        let kinds: Vec<ResourceType> =
            chain.resources().iter().map(|r| r.resource_type()).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceType::Collection,
                ResourceType::LinkType,
                ResourceType::Collection,
                ResourceType::LinkType,
                ResourceType::Collection,
            ]
        );
        let ids: Vec<&str> = chain.resources().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["C1", "L1", "C2", "L2", "C3"]);
    }

    #[test]
    fn test_missing_base_collection_yields_empty_chain() {
        let stem = QueryStem::new("nope").with_link_type("L1");
        let chain = ResolvedChain::resolve(&stem, &catalog());
        assert!(chain.is_empty());
        assert_eq!(chain.collection_count(), 0);
    }

    #[test]
    fn test_disconnected_link_type_truncates_chain() {
        // L9 connects C1-C3, but after L1 we stand on C2.
        let stem = QueryStem::new("C1").with_link_type("L1").with_link_type("L9");
        let chain = ResolvedChain::resolve(&stem, &catalog());
        assert_eq!(chain.len(), 3);
        assert!(!chain.is_complete(&stem));
    }

    #[test]
    fn test_missing_link_type_truncates_chain() {
        let stem = QueryStem::new("C1").with_link_type("missing");
        let chain = ResolvedChain::resolve(&stem, &catalog());
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.collection_at(0).map(|c| c.id.as_str()), Some("C1"));
        assert!(chain.link_type_at(0).is_none());
    }

    #[test]
    fn test_readdress_moves_to_new_index() {
        let old_chain_stem = QueryStem::new("C2").with_link_type("L1");
        let old = ResolvedChain::resolve(&old_chain_stem, &catalog());
        let address = AttributeAddress::collection(2, "C1", "a1");
        assert!(old.attribute(&address).is_some());

        let new = ResolvedChain::resolve(&QueryStem::new("C1"), &catalog());
        let moved = new.readdress(&address).unwrap();
        assert_eq!(moved.resource_index, 0);
        assert_eq!(moved.attribute_id, "a1");
    }

    #[test]
    fn test_readdress_invalidates_missing_resource_or_attribute() {
        let chain = ResolvedChain::resolve(&QueryStem::new("C1").with_link_type("L1"), &catalog());
        assert!(chain.readdress(&AttributeAddress::collection(0, "C3", "p1")).is_none());
        assert!(chain.readdress(&AttributeAddress::collection(0, "C1", "gone")).is_none());
        assert!(chain.readdress(&AttributeAddress::collection(0, "L1", "w")).is_none());
        assert_eq!(
            chain.readdress(&AttributeAddress::link_type(1, "L1", "w")),
            Some(AttributeAddress::link_type(1, "L1", "w"))
        );
    }
}
