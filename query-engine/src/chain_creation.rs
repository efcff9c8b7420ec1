//! FILENAME: query-engine/src/chain_creation.rs
//! Chain Creation/Update planner.
//!
//! When a value is written at a chain position that has no record yet, every
//! missing record between the target and the nearest existing one (the anchor)
//! has to be created first. The planner walks the chain backwards from the
//! target and emits a `ChainPlan`:
//!
//!   path     [P1,   -,    -  ]       (existing project, nothing else)
//!   target   chain index 2
//!   plan     CreateDocument(2, #a)   CreateLink(1, P1 <-> #a)
//!
//! Records created by the plan are named by correlation ids so later
//! operations of the same plan can reference them before they have real ids.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use data_model::{log_info, PermissionMap, RecordData, RecordStore, ResourceType};

use crate::chain::{ChainResource, ResolvedChain};
use crate::error::ChainCreationError;

// ============================================================================
// PLAN TYPES
// ============================================================================

/// Reference to a record that either exists or is created earlier in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum RecordRef {
    Existing(String),
    Pending(String),
}

impl RecordRef {
    pub fn id(&self) -> &str {
        match self {
            RecordRef::Existing(id) | RecordRef::Pending(id) => id,
        }
    }
}

/// One step of a chain plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChainOperation {
    #[serde(rename_all = "camelCase")]
    CreateDocument {
        chain_index: usize,
        correlation_id: String,
        collection_id: String,
        data: RecordData,
    },
    #[serde(rename_all = "camelCase")]
    CreateLink {
        chain_index: usize,
        correlation_id: String,
        link_type_id: String,
        /// Ordered as the link type's `collection_ids`.
        document_refs: [RecordRef; 2],
        data: RecordData,
    },
    #[serde(rename_all = "camelCase")]
    UpdateDocument {
        chain_index: usize,
        collection_id: String,
        document_id: String,
        data: RecordData,
    },
    #[serde(rename_all = "camelCase")]
    UpdateLink {
        chain_index: usize,
        link_type_id: String,
        link_id: String,
        data: RecordData,
    },
}

impl ChainOperation {
    pub fn chain_index(&self) -> usize {
        match self {
            ChainOperation::CreateDocument { chain_index, .. }
            | ChainOperation::CreateLink { chain_index, .. }
            | ChainOperation::UpdateDocument { chain_index, .. }
            | ChainOperation::UpdateLink { chain_index, .. } => *chain_index,
        }
    }

    pub fn data(&self) -> &RecordData {
        match self {
            ChainOperation::CreateDocument { data, .. }
            | ChainOperation::CreateLink { data, .. }
            | ChainOperation::UpdateDocument { data, .. }
            | ChainOperation::UpdateLink { data, .. } => data,
        }
    }

    /// Reference other operations (or the caller) use for this operation's record.
    pub fn record_ref(&self) -> RecordRef {
        match self {
            ChainOperation::CreateDocument { correlation_id, .. }
            | ChainOperation::CreateLink { correlation_id, .. } => {
                RecordRef::Pending(correlation_id.clone())
            }
            ChainOperation::UpdateDocument { document_id, .. } => {
                RecordRef::Existing(document_id.clone())
            }
            ChainOperation::UpdateLink { link_id, .. } => RecordRef::Existing(link_id.clone()),
        }
    }
}

/// Operations in dependency order plus the reference of the target record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainPlan {
    pub operations: Vec<ChainOperation>,
    pub target: RecordRef,
}

impl ChainPlan {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// What the caller wants written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainWriteRequest {
    /// Existing record id per chain position; shorter paths are padded with `None`.
    #[serde(default)]
    pub path: Vec<Option<String>>,
    pub target_index: usize,
    #[serde(default)]
    pub data: RecordData,
}

impl ChainWriteRequest {
    pub fn new(path: Vec<Option<String>>, target_index: usize, data: RecordData) -> Self {
        ChainWriteRequest { path, target_index, data }
    }
}

// ============================================================================
// PLANNER
// ============================================================================

/// Plans the operations needed to write `request.data` at `request.target_index`.
pub fn plan_chain_write(
    chain: &ResolvedChain,
    request: &ChainWriteRequest,
    store: &RecordStore,
    permissions: &PermissionMap,
) -> Result<ChainPlan, ChainCreationError> {
    let len = chain.len();
    let target = request.target_index;
    if target >= len {
        return Err(ChainCreationError::TargetOutOfChain { index: target, len });
    }
    if request.path.len() > len {
        return Err(ChainCreationError::PathLengthMismatch {
            expected: len,
            actual: request.path.len(),
        });
    }

    let mut path: Vec<Option<&str>> = request.path.iter().map(|p| p.as_deref()).collect();
    path.resize(len, None);
    for (index, id) in path.iter().enumerate() {
        if let Some(id) = id {
            ensure_exists(chain, store, index, id)?;
        }
    }

    if let Some(existing) = path[target] {
        let operation = update_operation(chain, target, existing, &request.data, permissions)?;
        log_info!("CREATE", "update of existing record {} at chain index {}", existing, target);
        return Ok(ChainPlan {
            target: operation.record_ref(),
            operations: vec![operation],
        });
    }

    let mut planner = Planner {
        chain,
        permissions,
        refs: path
            .iter()
            .map(|id| id.map(|id| RecordRef::Existing(id.to_string())))
            .collect(),
        documents: Vec::new(),
        links: Vec::new(),
    };

    // A link needs both of its documents; the one after it is never part of
    // the backwards walk.
    let mut link_indices: Vec<usize> = Vec::new();
    let walk_start = if target % 2 == 1 {
        if path[target + 1].is_none() {
            planner.create_document(target + 1, RecordData::default())?;
        }
        link_indices.push(target);
        target - 1
    } else {
        planner.create_document(target, request.data.clone())?;
        target
    };

    let mut position = walk_start;
    loop {
        if path[position].is_some() {
            break;
        }
        if planner.refs[position].is_none() {
            planner.create_document(position, RecordData::default())?;
        }
        if position == 0 {
            break;
        }
        link_indices.push(position - 1);
        position -= 2;
    }

    for link_index in link_indices {
        let data = if link_index == target {
            request.data.clone()
        } else {
            RecordData::default()
        };
        planner.create_link(link_index, data)?;
    }

    let Some(target_ref) = planner.refs[target].clone() else {
        return Err(ChainCreationError::TargetOutOfChain { index: target, len });
    };
    let mut operations = planner.documents;
    operations.extend(planner.links);

    log_info!(
        "CREATE",
        "planned {} operations for chain index {}",
        operations.len(),
        target
    );

    Ok(ChainPlan {
        operations,
        target: target_ref,
    })
}

struct Planner<'a> {
    chain: &'a ResolvedChain,
    permissions: &'a PermissionMap,
    refs: Vec<Option<RecordRef>>,
    documents: Vec<ChainOperation>,
    links: Vec<ChainOperation>,
}

impl Planner<'_> {
    fn create_document(
        &mut self,
        index: usize,
        data: RecordData,
    ) -> Result<(), ChainCreationError> {
        let Some(ChainResource::Collection(collection)) = self.chain.get(index) else {
            return Err(ChainCreationError::TargetOutOfChain { index, len: self.chain.len() });
        };
        require_create(self.permissions, ResourceType::Collection, &collection.id)?;

        let correlation_id = new_correlation_id();
        self.refs[index] = Some(RecordRef::Pending(correlation_id.clone()));
        self.documents.push(ChainOperation::CreateDocument {
            chain_index: index,
            correlation_id,
            collection_id: collection.id.clone(),
            data,
        });
        Ok(())
    }

    fn create_link(&mut self, index: usize, data: RecordData) -> Result<(), ChainCreationError> {
        let (Some(ChainResource::LinkType(link_type)), Some(ChainResource::Collection(previous))) =
            (self.chain.get(index), self.chain.get(index - 1))
        else {
            return Err(ChainCreationError::TargetOutOfChain { index, len: self.chain.len() });
        };
        require_create(self.permissions, ResourceType::LinkType, &link_type.id)?;

        let (Some(before), Some(after)) =
            (self.refs[index - 1].clone(), self.refs[index + 1].clone())
        else {
            return Err(ChainCreationError::TargetOutOfChain { index, len: self.chain.len() });
        };
        let document_refs = match link_type.collection_position(&previous.id) {
            Some(1) => [after, before],
            _ => [before, after],
        };

        let correlation_id = new_correlation_id();
        self.refs[index] = Some(RecordRef::Pending(correlation_id.clone()));
        self.links.push(ChainOperation::CreateLink {
            chain_index: index,
            correlation_id,
            link_type_id: link_type.id.clone(),
            document_refs,
            data,
        });
        Ok(())
    }
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn require_create(
    permissions: &PermissionMap,
    resource_type: ResourceType,
    resource_id: &str,
) -> Result<(), ChainCreationError> {
    if permissions.can_create(resource_type, resource_id) {
        Ok(())
    } else {
        Err(ChainCreationError::PermissionDenied {
            action: "create",
            resource_type,
            resource_id: resource_id.to_string(),
        })
    }
}

fn ensure_exists(
    chain: &ResolvedChain,
    store: &RecordStore,
    index: usize,
    record_id: &str,
) -> Result<(), ChainCreationError> {
    let found = match chain.get(index) {
        Some(ChainResource::Collection(c)) => store.document(&c.id, record_id).is_some(),
        Some(ChainResource::LinkType(l)) => store.link_instance(&l.id, record_id).is_some(),
        None => false,
    };
    if found {
        return Ok(());
    }
    let (resource_type, resource_id) = chain
        .get(index)
        .map(|r| (r.resource_type(), r.id().to_string()))
        .unwrap_or((ResourceType::Collection, String::new()));
    Err(ChainCreationError::DanglingRecord {
        resource_type,
        resource_id,
        record_id: record_id.to_string(),
    })
}

fn update_operation(
    chain: &ResolvedChain,
    index: usize,
    record_id: &str,
    data: &RecordData,
    permissions: &PermissionMap,
) -> Result<ChainOperation, ChainCreationError> {
    let Some(resource) = chain.get(index) else {
        return Err(ChainCreationError::TargetOutOfChain { index, len: chain.len() });
    };
    if !permissions.can_write(resource.resource_type(), resource.id()) {
        return Err(ChainCreationError::PermissionDenied {
            action: "write",
            resource_type: resource.resource_type(),
            resource_id: resource.id().to_string(),
        });
    }

    Ok(match resource {
        ChainResource::Collection(c) => ChainOperation::UpdateDocument {
            chain_index: index,
            collection_id: c.id.clone(),
            document_id: record_id.to_string(),
            data: data.clone(),
        },
        ChainResource::LinkType(l) => ChainOperation::UpdateLink {
            chain_index: index,
            link_type_id: l.id.clone(),
            link_id: record_id.to_string(),
            data: data.clone(),
        },
    })
}
