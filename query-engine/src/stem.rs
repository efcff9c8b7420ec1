//! FILENAME: query-engine/src/stem.rs
//! Query stems and the filters that travel with them.
//!
//! These structures are designed to be:
//! - Serializable (they are part of every persisted view query)
//! - Compared structurally: two stems are the same pipeline when their
//!   base collection and ordered link type ids are equal

use serde::{Deserialize, Serialize};
use data_model::AttributeFilter;

/// One query pipeline: a base collection plus an ordered chain of link types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStem {
    pub collection_id: String,
    #[serde(default)]
    pub link_type_ids: Vec<String>,
}

impl QueryStem {
    pub fn new(collection_id: impl Into<String>) -> Self {
        QueryStem {
            collection_id: collection_id.into(),
            link_type_ids: Vec::new(),
        }
    }

    pub fn with_link_type(mut self, link_type_id: impl Into<String>) -> Self {
        self.link_type_ids.push(link_type_id.into());
        self
    }
}

/// A stem together with the attribute filters of its collections and link types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StemQuery {
    #[serde(flatten)]
    pub stem: QueryStem,
    #[serde(default)]
    pub filters: Vec<AttributeFilter>,
}

impl StemQuery {
    pub fn new(stem: QueryStem) -> Self {
        StemQuery {
            stem,
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: AttributeFilter) -> Self {
        self.filters.push(filter);
        self
    }
}

/// The query of a view: several stems plus free-text terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub stems: Vec<StemQuery>,
    #[serde(default)]
    pub fulltexts: Vec<String>,
}

impl Query {
    pub fn with_stem(mut self, stem: StemQuery) -> Self {
        self.stems.push(stem);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_equality_is_by_ids_and_order() {
        let a = QueryStem::new("C1").with_link_type("L1").with_link_type("L2");
        let b = QueryStem::new("C1").with_link_type("L1").with_link_type("L2");
        let c = QueryStem::new("C1").with_link_type("L2").with_link_type("L1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_stem_query_json_tolerates_unknown_fields() {
        let json = r#"{"collectionId":"C1","linkTypeIds":["L1"],"documentIds":["x"],"filters":[]}"#;
        let query: StemQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.stem, QueryStem::new("C1").with_link_type("L1"));
    }
}
