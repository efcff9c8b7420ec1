//! FILENAME: query-engine/src/pipeline.rs
//! Chain-Following Aggregator - walks records along a resolved chain.
//!
//! Algorithm:
//! 1. Seed bucket 0 with the base collection's documents that pass its filters
//!    and the free-text terms
//! 2. For every hop, keep the link instances of the hop's link type that pass
//!    the link filters and start at a document already in the previous bucket
//! 3. The next bucket holds the documents those links reach that also pass
//!    their own collection's filters
//! 4. Record every (document, link, document) connection so later stages can
//!    walk complete join paths
//!
//! This is a strict inner join: a document without a qualifying partner never
//! contributes to the buckets after its own position. Unreadable resources
//! empty their bucket and every bucket behind it.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use data_model::{
    log_debug, matches_filters, matches_fulltext, AttributeFilter, Document, FormatContext,
    LinkInstance, PermissionMap, RecordStore, ResourceType,
};

use crate::chain::ResolvedChain;

// ============================================================================
// INPUT / OUTPUT
// ============================================================================

/// Everything one pipeline run reads.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInput<'a> {
    pub chain: &'a ResolvedChain,
    pub store: &'a RecordStore,
    pub filters: &'a [AttributeFilter],
    pub fulltexts: &'a [String],
    pub permissions: &'a PermissionMap,
    pub format: &'a FormatContext,
}

/// One qualifying hop: `document_buckets[k][from]` reaches
/// `document_buckets[k + 1][to]` through `link_buckets[k][link]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: usize,
    pub link: usize,
    pub to: usize,
}

/// Per-position record subsets, indexed by `floor(chain_index / 2)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Documents of the collection at chain index `2k`.
    pub document_buckets: Vec<Vec<Document>>,
    /// Link instances of the link type at chain index `2k + 1`.
    pub link_buckets: Vec<Vec<LinkInstance>>,
    /// Connections of hop `k`, in link bucket order.
    pub connections: Vec<Vec<Connection>>,
}

impl PipelineResult {
    fn empty(collection_count: usize) -> Self {
        let hops = collection_count.saturating_sub(1);
        PipelineResult {
            document_buckets: vec![Vec::new(); collection_count],
            link_buckets: vec![Vec::new(); hops],
            connections: vec![Vec::new(); hops],
        }
    }

    /// Documents at a chain index (even) or the documents next to a link bucket.
    pub fn documents_at(&self, chain_index: usize) -> &[Document] {
        self.document_buckets
            .get(chain_index / 2)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Link instances at an odd chain index.
    pub fn links_at(&self, chain_index: usize) -> &[LinkInstance] {
        if chain_index % 2 == 0 {
            return &[];
        }
        self.link_buckets
            .get(chain_index / 2)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Outgoing connections of every document in bucket `hop`, indexed by document position.
    pub fn adjacency(&self, hop: usize) -> Vec<SmallVec<[Connection; 4]>> {
        let sources = self.document_buckets.get(hop).map_or(0, Vec::len);
        let mut adjacency = vec![SmallVec::new(); sources];
        if let Some(connections) = self.connections.get(hop) {
            for connection in connections {
                if let Some(outgoing) = adjacency.get_mut(connection.from) {
                    outgoing.push(*connection);
                }
            }
        }
        adjacency
    }

    pub fn total_documents(&self) -> usize {
        self.document_buckets.iter().map(Vec::len).sum()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Runs the multi-hop inner join for one resolved chain.
pub fn run_pipeline(input: &PipelineInput) -> PipelineResult {
    let chain = input.chain;
    let mut result = PipelineResult::empty(chain.collection_count());

    let Some(base) = chain.collection_at(0) else {
        return result;
    };
    if !input.permissions.can_read(ResourceType::Collection, &base.id) {
        log_debug!("PIPELINE", "base collection {} not readable", base.id);
        return result;
    }

    result.document_buckets[0] = input
        .store
        .documents(&base.id)
        .iter()
        .filter(|d| {
            matches_filters(
                input.filters,
                ResourceType::Collection,
                &base.id,
                &d.data,
                &base.attributes,
                input.format,
            ) && matches_fulltext(&d.data, &base.attributes, input.fulltexts, input.format)
        })
        .cloned()
        .collect();

    for hop in 0..chain.collection_count().saturating_sub(1) {
        let (Some(previous), Some(link_type), Some(next)) = (
            chain.collection_at(hop),
            chain.link_type_at(hop),
            chain.collection_at(hop + 1),
        ) else {
            break;
        };

        if !input.permissions.can_read(ResourceType::LinkType, &link_type.id)
            || !input.permissions.can_read(ResourceType::Collection, &next.id)
        {
            log_debug!("PIPELINE", "hop {} through {} not readable, stopping", hop, link_type.id);
            break;
        }
        if result.document_buckets[hop].is_empty() {
            break;
        }

        let previous_index: FxHashMap<&str, usize> = result.document_buckets[hop]
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.as_str(), i))
            .collect();

        let candidates: FxHashMap<&str, &Document> = input
            .store
            .documents(&next.id)
            .iter()
            .filter(|d| {
                matches_filters(
                    input.filters,
                    ResourceType::Collection,
                    &next.id,
                    &d.data,
                    &next.attributes,
                    input.format,
                )
            })
            .map(|d| (d.id.as_str(), d))
            .collect();

        let self_link = previous.id == next.id;
        let previous_side = link_type.collection_position(&previous.id).unwrap_or(0);

        // (link, from position, to document id) in store order
        let mut hits: Vec<(&LinkInstance, usize, &str)> = Vec::new();
        for link in input.store.link_instances(&link_type.id) {
            let link_matches = matches_filters(
                input.filters,
                ResourceType::LinkType,
                &link_type.id,
                &link.data,
                &link_type.attributes,
                input.format,
            );
            if !link_matches {
                continue;
            }

            let mut ends: SmallVec<[(usize, usize); 2]> = SmallVec::new();
            ends.push((previous_side, 1 - previous_side));
            if self_link {
                ends.push((1 - previous_side, previous_side));
            }

            for (from_side, to_side) in ends {
                let from_id = link.document_ids[from_side].as_str();
                let to_id = link.document_ids[to_side].as_str();
                if !candidates.contains_key(to_id) {
                    continue;
                }
                if let Some(&from) = previous_index.get(from_id) {
                    hits.push((link, from, to_id));
                }
            }
        }

        let reached: FxHashSet<&str> = hits.iter().map(|(_, _, to)| *to).collect();
        let next_bucket: Vec<Document> = input
            .store
            .documents(&next.id)
            .iter()
            .filter(|d| reached.contains(d.id.as_str()) && candidates.contains_key(d.id.as_str()))
            .cloned()
            .collect();
        let next_index: FxHashMap<&str, usize> = next_bucket
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.as_str(), i))
            .collect();

        let mut links: Vec<LinkInstance> = Vec::new();
        let mut link_positions: FxHashMap<&str, usize> = FxHashMap::default();
        let mut connections = Vec::with_capacity(hits.len());
        for (link, from, to_id) in &hits {
            let Some(&to) = next_index.get(to_id) else {
                continue;
            };
            let position = *link_positions.entry(link.id.as_str()).or_insert_with(|| {
                links.push((*link).clone());
                links.len() - 1
            });
            connections.push(Connection { from: *from, link: position, to });
        }

        log_debug!(
            "PIPELINE",
            "hop {} via {}: {} links, {} documents of {}",
            hop,
            link_type.id,
            links.len(),
            next_bucket.len(),
            next.id
        );

        result.link_buckets[hop] = links;
        result.connections[hop] = connections;
        result.document_buckets[hop + 1] = next_bucket;
    }

    result
}
