//! FILENAME: data-model/src/record.rs
//! PURPOSE: Documents, link instances and the per-invocation record store.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::catalog::ResourceType;
use crate::value::{DataValue, NULL_VALUE};

/// Attribute id → raw value.
pub type RecordData = FxHashMap<String, DataValue>;

/// A record belonging to a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub collection_id: String,
    #[serde(default)]
    pub data: RecordData,
}

impl Document {
    pub fn new(id: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            collection_id: collection_id.into(),
            data: RecordData::default(),
        }
    }

    pub fn with_value(
        mut self,
        attribute_id: impl Into<String>,
        value: impl Into<DataValue>,
    ) -> Self {
        self.data.insert(attribute_id.into(), value.into());
        self
    }
}

/// A record belonging to a link type, connecting two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInstance {
    pub id: String,
    pub link_type_id: String,
    /// Ordered as the link type's `collection_ids`.
    pub document_ids: [String; 2],
    #[serde(default)]
    pub data: RecordData,
}

impl LinkInstance {
    pub fn new(
        id: impl Into<String>,
        link_type_id: impl Into<String>,
        first_document: impl Into<String>,
        second_document: impl Into<String>,
    ) -> Self {
        LinkInstance {
            id: id.into(),
            link_type_id: link_type_id.into(),
            document_ids: [first_document.into(), second_document.into()],
            data: RecordData::default(),
        }
    }

    pub fn with_value(
        mut self,
        attribute_id: impl Into<String>,
        value: impl Into<DataValue>,
    ) -> Self {
        self.data.insert(attribute_id.into(), value.into());
        self
    }

    /// The document on the other end of `document_id`, if this link touches it.
    pub fn other_document_id(&self, document_id: &str) -> Option<&str> {
        let [first, second] = &self.document_ids;
        if first == document_id {
            Some(second)
        } else if second == document_id {
            Some(first)
        } else {
            None
        }
    }
}

/// Either kind of record, with uniform accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DataRecord {
    Document(Document),
    LinkInstance(LinkInstance),
}

impl DataRecord {
    pub fn id(&self) -> &str {
        match self {
            DataRecord::Document(d) => &d.id,
            DataRecord::LinkInstance(l) => &l.id,
        }
    }

    /// Id of the owning collection or link type.
    pub fn resource_id(&self) -> &str {
        match self {
            DataRecord::Document(d) => &d.collection_id,
            DataRecord::LinkInstance(l) => &l.link_type_id,
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            DataRecord::Document(_) => ResourceType::Collection,
            DataRecord::LinkInstance(_) => ResourceType::LinkType,
        }
    }

    pub fn data(&self) -> &RecordData {
        match self {
            DataRecord::Document(d) => &d.data,
            DataRecord::LinkInstance(l) => &l.data,
        }
    }

    /// Raw value of an attribute; missing attributes read as `Null`.
    pub fn value(&self, attribute_id: &str) -> &DataValue {
        self.data().get(attribute_id).unwrap_or(&NULL_VALUE)
    }
}

impl From<Document> for DataRecord {
    fn from(value: Document) -> Self {
        DataRecord::Document(value)
    }
}

impl From<LinkInstance> for DataRecord {
    fn from(value: LinkInstance) -> Self {
        DataRecord::LinkInstance(value)
    }
}

/// Already access-filtered records for one invocation,
/// documents grouped by collection id and link instances by link type id.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    documents: FxHashMap<String, Vec<Document>>,
    link_instances: FxHashMap<String, Vec<LinkInstance>>,
}

impl RecordStore {
    pub fn new(documents: Vec<Document>, link_instances: Vec<LinkInstance>) -> Self {
        let mut store = RecordStore::default();
        for document in documents {
            store.add_document(document);
        }
        for link in link_instances {
            store.add_link_instance(link);
        }
        store
    }

    pub fn add_document(&mut self, document: Document) {
        self.documents
            .entry(document.collection_id.clone())
            .or_default()
            .push(document);
    }

    pub fn add_link_instance(&mut self, link: LinkInstance) {
        self.link_instances
            .entry(link.link_type_id.clone())
            .or_default()
            .push(link);
    }

    /// Documents of a collection, in store order.
    pub fn documents(&self, collection_id: &str) -> &[Document] {
        self.documents.get(collection_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Link instances of a link type, in store order.
    pub fn link_instances(&self, link_type_id: &str) -> &[LinkInstance] {
        self.link_instances.get(link_type_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn document(&self, collection_id: &str, document_id: &str) -> Option<&Document> {
        self.documents(collection_id).iter().find(|d| d.id == document_id)
    }

    pub fn link_instance(&self, link_type_id: &str, link_id: &str) -> Option<&LinkInstance> {
        self.link_instances(link_type_id).iter().find(|l| l.id == link_id)
    }
}
