//! FILENAME: pivot-engine/src/grouping.rs
//! Grouping/Aggregation Engine - nests pipeline records by formatted value.
//!
//! Algorithm:
//! 1. Walk every join path from bucket 0 through the qualifying links, up to
//!    the deepest chain index any configured attribute points at
//! 2. For each path, format the row values then the column values into keys
//! 3. Descend the nested map creating keys in first-seen order
//! 4. Append the records of the value resources at that path to the terminal
//!
//! Keys are display strings, so raw values that format identically share a
//! bucket. The first raw value seen for a key is kept for sorting.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use smallvec::SmallVec;
use data_model::{
    format_value, log_debug, Constraint, DataRecord, DataValue, Document, FormatContext,
    LinkInstance, RecordData, ResourceType, NULL_VALUE,
};
use query_engine::{Connection, PipelineResult, ResolvedChain};

use crate::definition::{PivotAxisAttribute, PivotValueAttribute};

// ============================================================================
// AGGREGATED MAP
// ============================================================================

/// Records of one resource collected in a terminal bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecords {
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub records: Vec<DataRecord>,
}

impl ResourceRecords {
    pub fn new(resource_id: impl Into<String>, resource_type: ResourceType) -> Self {
        ResourceRecords {
            resource_id: resource_id.into(),
            resource_type,
            records: Vec::new(),
        }
    }

    pub fn is_resource(&self, resource_type: ResourceType, resource_id: &str) -> bool {
        self.resource_type == resource_type && self.resource_id == resource_id
    }

    /// Appends the records not already present (by id).
    pub fn extend_unique(&mut self, records: impl IntoIterator<Item = DataRecord>) {
        let mut seen: FxHashSet<String> = self.records.iter().map(|r| r.id().to_string()).collect();
        for record in records {
            if seen.insert(record.id().to_string()) {
                self.records.push(record);
            }
        }
    }
}

/// Concatenates terminal lists, joining lists of the same resource.
pub fn merge_resource_records(
    target: &mut Vec<ResourceRecords>,
    incoming: impl IntoIterator<Item = ResourceRecords>,
) {
    for group in incoming {
        match target
            .iter_mut()
            .find(|t| t.is_resource(group.resource_type, &group.resource_id))
        {
            Some(existing) => existing.extend_unique(group.records),
            None => target.push(group),
        }
    }
}

/// One key of a map level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedEntry {
    pub key: String,
    /// First raw value that formatted to `key`.
    pub sort_value: DataValue,
    pub child: AggregatedMap,
}

/// Insertion-ordered level of the nested map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregatedLevel {
    entries: Vec<AggregatedEntry>,
    #[serde(skip)]
    index: FxHashMap<String, usize>,
}

impl AggregatedLevel {
    pub fn entries(&self) -> &[AggregatedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&AggregatedMap> {
        self.index.get(key).map(|&i| &self.entries[i].child)
    }

    /// Appends a new entry or returns the existing child of `key`.
    pub fn entry_or_insert(
        &mut self,
        key: &str,
        sort_value: &DataValue,
        child: AggregatedMap,
    ) -> &mut AggregatedMap {
        let position = match self.index.get(key) {
            Some(&position) => position,
            None => {
                self.entries.push(AggregatedEntry {
                    key: key.to_string(),
                    sort_value: sort_value.clone(),
                    child,
                });
                self.index.insert(key.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].child
    }
}

/// Nested `formatted value -> map`, ending in per-resource record lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregatedMap {
    Level(AggregatedLevel),
    Terminal(Vec<ResourceRecords>),
}

impl Default for AggregatedMap {
    fn default() -> Self {
        AggregatedMap::Level(AggregatedLevel::default())
    }
}

impl AggregatedMap {
    pub fn get(&self, key: &str) -> Option<&AggregatedMap> {
        match self {
            AggregatedMap::Level(level) => level.get(key),
            AggregatedMap::Terminal(_) => None,
        }
    }

    /// Descends along `keys`.
    pub fn descend(&self, keys: &[&str]) -> Option<&AggregatedMap> {
        keys.iter().try_fold(self, |map, key| map.get(key))
    }

    pub fn entries(&self) -> &[AggregatedEntry] {
        match self {
            AggregatedMap::Level(level) => level.entries(),
            AggregatedMap::Terminal(_) => &[],
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries().iter().map(|e| e.key.as_str()).collect()
    }

    pub fn terminal(&self) -> Option<&[ResourceRecords]> {
        match self {
            AggregatedMap::Terminal(groups) => Some(groups),
            AggregatedMap::Level(_) => None,
        }
    }

    /// Record ids of a terminal, per resource, in bucket order.
    pub fn terminal_ids(&self) -> Vec<Vec<&str>> {
        self.terminal()
            .unwrap_or(&[])
            .iter()
            .map(|g| g.records.iter().map(DataRecord::id).collect())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AggregatedMap::Level(level) => level.is_empty(),
            AggregatedMap::Terminal(groups) => groups.iter().all(|g| g.records.is_empty()),
        }
    }

    fn insert_path(
        &mut self,
        keys: &[String],
        sort_values: &[&DataValue],
        terminal: Vec<ResourceRecords>,
    ) {
        match self {
            AggregatedMap::Terminal(existing) => merge_resource_records(existing, terminal),
            AggregatedMap::Level(level) => {
                let (Some((key, rest)), Some((sort_value, rest_sort))) =
                    (keys.split_first(), sort_values.split_first())
                else {
                    return;
                };
                let fresh = if rest.is_empty() {
                    AggregatedMap::Terminal(Vec::new())
                } else {
                    AggregatedMap::default()
                };
                level
                    .entry_or_insert(key, sort_value, fresh)
                    .insert_path(rest, rest_sort, terminal);
            }
        }
    }
}

/// Grouping output: the map plus how many of its levels are rows and columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedData {
    pub map: AggregatedMap,
    pub row_levels: usize,
    pub column_levels: usize,
}

// ============================================================================
// PATH RECORDS
// ============================================================================

/// A record met on a join path, borrowed from the pipeline buckets.
#[derive(Debug, Clone, Copy)]
enum PathRecord<'a> {
    Document(&'a Document),
    Link(&'a LinkInstance),
}

impl<'a> PathRecord<'a> {
    fn at(pipeline: &'a PipelineResult, chain_index: usize, bucket_index: usize) -> Option<Self> {
        if chain_index % 2 == 0 {
            pipeline.documents_at(chain_index).get(bucket_index).map(PathRecord::Document)
        } else {
            pipeline.links_at(chain_index).get(bucket_index).map(PathRecord::Link)
        }
    }

    fn id(&self) -> &'a str {
        match self {
            PathRecord::Document(d) => &d.id,
            PathRecord::Link(l) => &l.id,
        }
    }

    fn data(&self) -> &'a RecordData {
        match self {
            PathRecord::Document(d) => &d.data,
            PathRecord::Link(l) => &l.data,
        }
    }

    fn value(&self, attribute_id: &str) -> &'a DataValue {
        self.data().get(attribute_id).unwrap_or(&NULL_VALUE)
    }

    fn to_record(self) -> DataRecord {
        match self {
            PathRecord::Document(d) => DataRecord::Document(d.clone()),
            PathRecord::Link(l) => DataRecord::LinkInstance(l.clone()),
        }
    }
}

/// Bucket positions of one join path, indexed by chain index.
type JoinPath = SmallVec<[usize; 8]>;

struct PathWalker<'a> {
    adjacency: Vec<Vec<SmallVec<[Connection; 4]>>>,
    depth: usize,
    paths: Vec<JoinPath>,
    pipeline: &'a PipelineResult,
}

impl<'a> PathWalker<'a> {
    fn new(pipeline: &'a PipelineResult, depth: usize) -> Self {
        let hops = (depth + 1) / 2;
        PathWalker {
            adjacency: (0..hops).map(|hop| pipeline.adjacency(hop)).collect(),
            depth,
            paths: Vec::new(),
            pipeline,
        }
    }

    fn walk(mut self) -> Vec<JoinPath> {
        let seeds = self.pipeline.document_buckets.first().map_or(0, Vec::len);
        for document in 0..seeds {
            let mut path = JoinPath::new();
            path.push(document);
            self.extend(0, &mut path);
        }
        self.paths
    }

    fn extend(&mut self, hop: usize, path: &mut JoinPath) {
        if path.len() > self.depth {
            self.paths.push(path.clone());
            return;
        }
        let Some(document) = path.last().copied() else {
            return;
        };
        let connections = match self.adjacency.get(hop).and_then(|a| a.get(document)) {
            Some(connections) => connections.clone(),
            None => return,
        };
        for connection in connections {
            path.push(connection.link);
            path.push(connection.to);
            self.extend(hop + 1, path);
            path.truncate(path.len() - 2);
        }
    }
}

// ============================================================================
// GROUPING
// ============================================================================

/// Everything one grouping run reads.
#[derive(Debug, Clone, Copy)]
pub struct GroupingInput<'a> {
    pub chain: &'a ResolvedChain,
    pub pipeline: &'a PipelineResult,
    pub rows: &'a [PivotAxisAttribute],
    pub columns: &'a [PivotAxisAttribute],
    pub values: &'a [PivotValueAttribute],
    pub format: &'a FormatContext,
}

/// A terminal under construction, keyed by its full key path.
struct PendingTerminal<'a> {
    keys: Vec<String>,
    sort_values: Vec<&'a DataValue>,
    groups: Vec<Vec<PathRecord<'a>>>,
    seen: Vec<FxHashSet<&'a str>>,
}

/// Display constraint of an axis attribute: its override, else the attribute's own.
pub fn axis_constraint<'a>(
    chain: &'a ResolvedChain,
    attribute: &'a PivotAxisAttribute,
) -> Option<&'a Constraint> {
    attribute
        .constraint
        .as_ref()
        .or_else(|| chain.attribute(&attribute.address).and_then(|a| a.constraint.as_ref()))
}

/// Groups the pipeline records of one stem.
pub fn group_records(input: &GroupingInput) -> AggregatedData {
    let axes: Vec<&PivotAxisAttribute> = input.rows.iter().chain(input.columns.iter()).collect();
    let row_levels = input.rows.len();
    let column_levels = input.columns.len();

    // Chain indices whose records end up in terminals, grouped by resource.
    let mut targets: Vec<usize> = input.values.iter().map(|v| v.address.resource_index).collect();
    if targets.is_empty() {
        targets = axes.iter().map(|a| a.address.resource_index).collect();
    }
    let mut resources: Vec<(ResourceType, String)> = Vec::new();
    let mut target_groups: Vec<(usize, usize)> = Vec::new();
    for index in dedup(targets) {
        let Some(resource) = input.chain.get(index) else {
            continue;
        };
        let key = (resource.resource_type(), resource.id().to_string());
        let group = match resources.iter().position(|r| *r == key) {
            Some(group) => group,
            None => {
                resources.push(key);
                resources.len() - 1
            }
        };
        target_groups.push((index, group));
    }

    if axes.is_empty() {
        return AggregatedData {
            map: full_buckets(input.pipeline, &resources, &target_groups),
            row_levels,
            column_levels,
        };
    }

    let depth = axes
        .iter()
        .map(|a| a.address.resource_index)
        .chain(target_groups.iter().map(|(index, _)| *index))
        .max()
        .unwrap_or(0);
    let constraints: Vec<Option<&Constraint>> =
        axes.iter().map(|a| axis_constraint(input.chain, a)).collect();

    let paths = PathWalker::new(input.pipeline, depth).walk();

    let mut pending: Vec<PendingTerminal> = Vec::new();
    let mut pending_index: FxHashMap<Vec<String>, usize> = FxHashMap::default();

    for path in &paths {
        let mut keys = Vec::with_capacity(axes.len());
        let mut sort_values = Vec::with_capacity(axes.len());
        for (axis, constraint) in axes.iter().zip(&constraints) {
            let index = axis.address.resource_index;
            let value = path
                .get(index)
                .and_then(|&position| PathRecord::at(input.pipeline, index, position))
                .map_or(&NULL_VALUE, |record| record.value(&axis.address.attribute_id));
            keys.push(format_value(value, *constraint, input.format));
            sort_values.push(value);
        }

        let slot = match pending_index.get(&keys) {
            Some(&slot) => slot,
            None => {
                pending_index.insert(keys.clone(), pending.len());
                pending.push(PendingTerminal {
                    keys,
                    sort_values,
                    groups: vec![Vec::new(); resources.len()],
                    seen: vec![FxHashSet::default(); resources.len()],
                });
                pending.len() - 1
            }
        };

        let terminal = &mut pending[slot];
        for &(index, group) in &target_groups {
            let record = path
                .get(index)
                .and_then(|&position| PathRecord::at(input.pipeline, index, position));
            if let Some(record) = record {
                if terminal.seen[group].insert(record.id()) {
                    terminal.groups[group].push(record);
                }
            }
        }
    }

    let mut map = AggregatedMap::default();
    for terminal in pending {
        let groups = build_groups(&resources, terminal.groups);
        map.insert_path(&terminal.keys, &terminal.sort_values, groups);
    }

    log_debug!(
        "GROUP",
        "{} join paths grouped ({} row / {} column levels, depth {})",
        paths.len(),
        row_levels,
        column_levels,
        depth
    );

    AggregatedData {
        map,
        row_levels,
        column_levels,
    }
}

/// Terminal of a stem without axis attributes: the whole filtered bucket of
/// every target resource.
fn full_buckets(
    pipeline: &PipelineResult,
    resources: &[(ResourceType, String)],
    target_groups: &[(usize, usize)],
) -> AggregatedMap {
    let mut groups: Vec<Vec<PathRecord>> = vec![Vec::new(); resources.len()];
    let mut seen: Vec<FxHashSet<&str>> = vec![FxHashSet::default(); resources.len()];
    for &(index, group) in target_groups {
        let bucket_len = if index % 2 == 0 {
            pipeline.documents_at(index).len()
        } else {
            pipeline.links_at(index).len()
        };
        for position in 0..bucket_len {
            if let Some(record) = PathRecord::at(pipeline, index, position) {
                if seen[group].insert(record.id()) {
                    groups[group].push(record);
                }
            }
        }
    }
    AggregatedMap::Terminal(build_groups(resources, groups))
}

fn build_groups(
    resources: &[(ResourceType, String)],
    groups: Vec<Vec<PathRecord>>,
) -> Vec<ResourceRecords> {
    resources
        .iter()
        .zip(groups)
        .map(|((resource_type, resource_id), records)| ResourceRecords {
            resource_id: resource_id.clone(),
            resource_type: *resource_type,
            records: records.into_iter().map(PathRecord::to_record).collect(),
        })
        .collect()
}

fn dedup(indices: Vec<usize>) -> Vec<usize> {
    let mut unique = Vec::with_capacity(indices.len());
    for index in indices {
        if !unique.contains(&index) {
            unique.push(index);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_model::{
        AllowedActions, Attribute, Catalog, Collection, LinkType, PermissionMap, RecordStore,
    };
    use query_engine::{run_pipeline, AttributeAddress, PipelineInput, QueryStem};
    use crate::definition::AggregationType;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                Collection::new("C1", "Clubs")
                    .with_attribute(Attribute::new("a1", "Kind"))
                    .with_attribute(Attribute::new("a2", "Founded").with_constraint(Constraint::DateTime {
                        format: Some("%Y-%m-%d".to_string()),
                    })),
                Collection::new("C2", "Members")
                    .with_attribute(Attribute::new("m1", "Name"))
                    .with_attribute(Attribute::new("m2", "Fee")),
            ],
            vec![LinkType::new("L1", "Membership", "C1", "C2").with_attribute(Attribute::new("r", "Role"))],
        )
    }

    fn store() -> RecordStore {
        RecordStore::new(
            vec![
                Document::new("D1", "C1").with_value("a1", "Sport").with_value("a2", "2024-01-05T08:00:00"),
                Document::new("D2", "C1").with_value("a1", "Sport").with_value("a2", "2024-01-05T17:30:00"),
                Document::new("D3", "C1").with_value("a1", "Dance").with_value("a2", "2023-03-01"),
                Document::new("D4", "C1").with_value("a2", "2020-01-01"),
                Document::new("M1", "C2").with_value("m1", "Ann").with_value("m2", 10.0),
                Document::new("M2", "C2").with_value("m1", "Bob").with_value("m2", 20.0),
                Document::new("M3", "C2").with_value("m1", "Cid").with_value("m2", 5.0),
            ],
            vec![
                LinkInstance::new("K1", "L1", "D1", "M1").with_value("r", "captain"),
                LinkInstance::new("K2", "L1", "D1", "M2").with_value("r", "player"),
                LinkInstance::new("K3", "L1", "D3", "M2").with_value("r", "player"),
                LinkInstance::new("K4", "L1", "D2", "M3").with_value("r", "player"),
            ],
        )
    }

    fn permissions() -> PermissionMap {
        PermissionMap::new()
            .with_collection("C1", AllowedActions::read_only())
            .with_collection("C2", AllowedActions::read_only())
            .with_link_type("L1", AllowedActions::read_only())
    }

    fn group(
        stem: QueryStem,
        rows: &[PivotAxisAttribute],
        columns: &[PivotAxisAttribute],
        values: &[PivotValueAttribute],
    ) -> AggregatedData {
        let catalog = catalog();
        let store = store();
        let chain = ResolvedChain::resolve(&stem, &catalog);
        let format = FormatContext::default();
        let permissions = permissions();
        let pipeline = run_pipeline(&PipelineInput {
            chain: &chain,
            store: &store,
            filters: &[],
            fulltexts: &[],
            permissions: &permissions,
            format: &format,
        });
        group_records(&GroupingInput {
            chain: &chain,
            pipeline: &pipeline,
            rows,
            columns,
            values,
            format: &format,
        })
    }

    fn axis(index: usize, resource_id: &str, attribute_id: &str) -> PivotAxisAttribute {
        let address = if index % 2 == 0 {
            AttributeAddress::collection(index, resource_id, attribute_id)
        } else {
            AttributeAddress::link_type(index, resource_id, attribute_id)
        };
        PivotAxisAttribute::new(address)
    }

    #[test]
    fn test_single_level_groups_by_first_seen_key() {
        let data = group(QueryStem::new("C1"), &[axis(0, "C1", "a1")], &[], &[]);
        assert_eq!(data.row_levels, 1);
        assert_eq!(data.map.keys(), vec!["Sport", "Dance", ""]);
        assert_eq!(data.map.get("Sport").unwrap().terminal_ids(), vec![vec!["D1", "D2"]]);
        assert_eq!(data.map.get("Dance").unwrap().terminal_ids(), vec![vec!["D3"]]);
        // blank values are a regular key
        assert_eq!(data.map.get("").unwrap().terminal_ids(), vec![vec!["D4"]]);
    }

    #[test]
    fn test_formatted_key_merges_same_day() {
        let data = group(QueryStem::new("C1"), &[axis(0, "C1", "a2")], &[], &[]);
        assert_eq!(data.map.keys(), vec!["2024-01-05", "2023-03-01", "2020-01-01"]);
        assert_eq!(data.map.get("2024-01-05").unwrap().terminal_ids(), vec![vec!["D1", "D2"]]);
        assert_eq!(data.map.entries()[0].sort_value, DataValue::text("2024-01-05T08:00:00"));
    }

    #[test]
    fn test_constraint_override_changes_keys() {
        let row = axis(0, "C1", "a2").with_constraint(Constraint::DateTime {
            format: Some("%Y".to_string()),
        });
        let data = group(QueryStem::new("C1"), &[row], &[], &[]);
        assert_eq!(data.map.keys(), vec!["2024", "2023", "2020"]);
    }

    #[test]
    fn test_rows_and_columns_across_link() {
        let stem = QueryStem::new("C1").with_link_type("L1");
        let values = [PivotValueAttribute::new(
            AttributeAddress::collection(2, "C2", "m2"),
            AggregationType::Sum,
        )];
        let data = group(stem, &[axis(0, "C1", "a1")], &[axis(1, "L1", "r")], &values);

        assert_eq!((data.row_levels, data.column_levels), (1, 1));
        assert_eq!(data.map.keys(), vec!["Sport", "Dance"]);
        let sport = data.map.get("Sport").unwrap();
        assert_eq!(sport.keys(), vec!["captain", "player"]);
        assert_eq!(sport.get("player").unwrap().terminal_ids(), vec![vec!["M2", "M3"]]);
        assert_eq!(
            data.map.descend(&["Dance", "player"]).unwrap().terminal_ids(),
            vec![vec!["M2"]]
        );
        // D4 has no membership and takes no part in a join path
        assert!(data.map.get("").is_none());
    }

    #[test]
    fn test_values_only_holds_full_buckets() {
        let stem = QueryStem::new("C1").with_link_type("L1");
        let values = [
            PivotValueAttribute::new(AttributeAddress::collection(0, "C1", "a1"), AggregationType::Count),
            PivotValueAttribute::new(AttributeAddress::collection(2, "C2", "m2"), AggregationType::Sum),
        ];
        let data = group(stem, &[], &[], &values);
        let groups = data.map.terminal().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].records.len(), 4);
        assert_eq!(groups[1].resource_id, "C2");
        assert_eq!(groups[1].records.len(), 3);
    }

    #[test]
    fn test_terminal_records_are_unique() {
        // D1 sits on two join paths (two memberships) under the same key
        let stem = QueryStem::new("C1").with_link_type("L1");
        let values = [
            PivotValueAttribute::new(AttributeAddress::collection(0, "C1", "a1"), AggregationType::Count),
            PivotValueAttribute::new(AttributeAddress::collection(2, "C2", "m2"), AggregationType::Sum),
        ];
        let data = group(stem, &[axis(0, "C1", "a1")], &[], &values);
        assert_eq!(
            data.map.get("Sport").unwrap().terminal_ids(),
            vec![vec!["D1", "D2"], vec!["M1", "M2", "M3"]]
        );
    }

    #[test]
    fn test_grouping_is_deterministic() {
        let stem = QueryStem::new("C1").with_link_type("L1");
        let rows = [axis(0, "C1", "a1"), axis(2, "C2", "m1")];
        let first = group(stem.clone(), &rows, &[], &[]);
        let second = group(stem, &rows, &[], &[]);
        assert_eq!(first, second);
    }
}
