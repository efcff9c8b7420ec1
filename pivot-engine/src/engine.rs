//! FILENAME: pivot-engine/src/engine.rs
//! Pivot Engine - The cross-tab builder that turns grouped records into a table.
//!
//! This module takes a `PivotSource` (one stem, or several merged stems) and
//! produces a `PivotTable` ready for rendering.
//!
//! Algorithm:
//! 1. Build axis trees: rows from the first map levels, columns from the union
//!    of the remaining levels across every row branch
//! 2. Sort each level as configured, then append summary headers
//! 3. Flatten trees into header nodes, numbering leaves with a running counter
//! 4. Cross-tabulate: for each (row leaf, column leaf) pair, aggregate the
//!    records of the leaf's value attribute
//! 5. Apply percentage value types

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};
use data_model::{
    compare_values, log_debug, Constraint, DataRecord, DataValue, FormatContext, ResourceType,
};
use query_engine::{AttributeAddress, ResolvedChain};

use crate::aggregation::aggregate;
use crate::definition::{PivotAxisAttribute, PivotValueAttribute, PivotValueType, SortOrder};
use crate::grouping::{axis_constraint, AggregatedData, AggregatedMap, ResourceRecords};
use crate::merge::StemShape;
use crate::view::{PivotHeader, PivotHeaderAttribute, PivotTable, PivotValue};

// ============================================================================
// SOURCE
// ============================================================================

/// Display metadata of one row or column level.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisLevel {
    pub attribute: PivotAxisAttribute,
    pub name: String,
    pub color: Option<String>,
    pub constraint: Option<Constraint>,
}

impl AxisLevel {
    /// `None` when the attribute is not on the chain.
    pub fn resolve(chain: &ResolvedChain, attribute: &PivotAxisAttribute) -> Option<Self> {
        let definition = chain.attribute(&attribute.address)?;
        Some(AxisLevel {
            name: definition.name.clone(),
            color: resource_color(chain, &attribute.address),
            constraint: axis_constraint(chain, attribute).cloned(),
            attribute: attribute.clone(),
        })
    }
}

/// One aggregated value attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueColumn {
    pub attribute: PivotValueAttribute,
    pub title: String,
    pub color: Option<String>,
    pub constraint: Option<Constraint>,
}

impl ValueColumn {
    pub fn resolve(chain: &ResolvedChain, attribute: &PivotValueAttribute) -> Option<Self> {
        let definition = chain.attribute(&attribute.address)?;
        Some(ValueColumn {
            title: format!("{} of {}", attribute.aggregation.title(), definition.name),
            color: resource_color(chain, &attribute.address),
            constraint: definition.constraint.clone(),
            attribute: attribute.clone(),
        })
    }
}

fn resource_color(chain: &ResolvedChain, address: &AttributeAddress) -> Option<String> {
    chain
        .get(address.resource_index)
        .and_then(|r| r.color())
        .map(str::to_string)
}

/// Everything the cross-tab builder needs for one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotSource {
    pub rows: Vec<AxisLevel>,
    pub columns: Vec<AxisLevel>,
    pub values: Vec<ValueColumn>,
    pub data: AggregatedData,
}

impl PivotSource {
    pub fn shape(&self) -> StemShape {
        StemShape::classify(self.rows.len(), self.columns.len())
    }
}

// ============================================================================
// RECORD SETS
// ============================================================================

/// Union of terminal record lists, deduplicated per resource.
#[derive(Default)]
struct RecordSet<'a> {
    groups: Vec<RecordGroup<'a>>,
}

struct RecordGroup<'a> {
    resource_type: ResourceType,
    resource_id: &'a str,
    records: Vec<&'a DataRecord>,
    seen: FxHashSet<&'a str>,
}

impl<'a> RecordSet<'a> {
    fn add(&mut self, group: &'a ResourceRecords) {
        let position = match self
            .groups
            .iter()
            .position(|g| {
                g.resource_type == group.resource_type && g.resource_id == group.resource_id
            })
        {
            Some(position) => position,
            None => {
                self.groups.push(RecordGroup {
                    resource_type: group.resource_type,
                    resource_id: &group.resource_id,
                    records: Vec::new(),
                    seen: FxHashSet::default(),
                });
                self.groups.len() - 1
            }
        };
        let target = &mut self.groups[position];
        for record in &group.records {
            if target.seen.insert(record.id()) {
                target.records.push(record);
            }
        }
    }

    fn records_of(&self, address: &AttributeAddress) -> &[&'a DataRecord] {
        self.groups
            .iter()
            .find(|g| {
                g.resource_type == address.resource_type && g.resource_id == address.resource_id
            })
            .map(|g| g.records.as_slice())
            .unwrap_or(&[])
    }

    fn all(&self) -> impl Iterator<Item = &'a DataRecord> + '_ {
        self.groups.iter().flat_map(|g| g.records.iter().copied())
    }

    fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.records.is_empty())
    }
}

// ============================================================================
// AXIS TREE STRUCTURES
// ============================================================================

/// A node in the axis tree (row or column hierarchy).
#[derive(Debug, Clone)]
struct AxisNode {
    key: String,
    sort_value: DataValue,
    /// Keys from the root down to and including this node.
    /// Summary nodes carry their parent's path.
    path: Vec<String>,
    children: Vec<AxisNode>,
    is_summary: bool,
    /// Aggregate used when sorting by a value attribute.
    rank: Option<f64>,
}

impl AxisNode {
    fn new(key: &str, sort_value: &DataValue, parent_path: &[String]) -> Self {
        let mut path = parent_path.to_vec();
        path.push(key.to_string());
        AxisNode {
            key: key.to_string(),
            sort_value: sort_value.clone(),
            path,
            children: Vec::new(),
            is_summary: false,
            rank: None,
        }
    }

    fn summary(title: &str, parent_path: &[String]) -> Self {
        AxisNode {
            key: title.to_string(),
            sort_value: DataValue::Null,
            path: parent_path.to_vec(),
            children: Vec::new(),
            is_summary: true,
            rank: None,
        }
    }
}

/// A matrix row or column: the key path to look up plus the value it shows.
#[derive(Debug, Clone)]
struct Leaf {
    path: Vec<String>,
    value_index: Option<usize>,
}

// ============================================================================
// CROSS-TAB BUILDER
// ============================================================================

struct CrossTab<'a> {
    source: &'a PivotSource,
    format: &'a FormatContext,
    row_levels: usize,
    column_levels: usize,
}

impl<'a> CrossTab<'a> {
    fn new(source: &'a PivotSource, format: &'a FormatContext) -> Self {
        CrossTab {
            source,
            format,
            row_levels: source.rows.len(),
            column_levels: source.columns.len(),
        }
    }

    /// Records under a row prefix and a column prefix; missing levels match everything.
    fn collect(&self, rows: &[String], columns: &[String]) -> RecordSet<'a> {
        let mut set = RecordSet::default();
        self.collect_into(&self.source.data.map, 0, rows, columns, &mut set);
        set
    }

    fn collect_into(
        &self,
        map: &'a AggregatedMap,
        depth: usize,
        rows: &[String],
        columns: &[String],
        set: &mut RecordSet<'a>,
    ) {
        match map {
            AggregatedMap::Terminal(groups) => {
                for group in groups {
                    set.add(group);
                }
            }
            AggregatedMap::Level(_) => {
                let wanted = if depth < self.row_levels {
                    rows.get(depth)
                } else {
                    columns.get(depth - self.row_levels)
                };
                match wanted {
                    Some(key) => {
                        if let Some(child) = map.get(key) {
                            self.collect_into(child, depth + 1, rows, columns, set);
                        }
                    }
                    None => {
                        for entry in map.entries() {
                            self.collect_into(&entry.child, depth + 1, rows, columns, set);
                        }
                    }
                }
            }
        }
    }

    /// Aggregates one value attribute over a record set; `None` when its resource
    /// contributes no record.
    fn aggregate(&self, records: &RecordSet, value: &ValueColumn) -> Option<PivotValue> {
        let address = &value.attribute.address;
        let contributing = records.records_of(address);
        if contributing.is_empty() {
            return None;
        }
        aggregate(
            value.attribute.aggregation,
            contributing.iter().map(|r| r.value(&address.attribute_id)),
            value.constraint.as_ref(),
        )
    }

    // ========================================================================
    // AXIS TREES
    // ========================================================================

    fn build_row_tree(&self) -> Vec<AxisNode> {
        tree_from_map(&self.source.data.map, 0, self.row_levels, &[])
    }

    /// Column keys of every row branch, merged in first-seen order.
    fn build_column_tree(&self) -> Vec<AxisNode> {
        let mut roots = Vec::new();
        if self.column_levels > 0 {
            self.visit_row_branches(&self.source.data.map, 0, &mut roots);
        }
        roots
    }

    fn visit_row_branches(&self, map: &AggregatedMap, depth: usize, roots: &mut Vec<AxisNode>) {
        if depth == self.row_levels {
            insert_columns(roots, map, 0, self.column_levels, &[]);
            return;
        }
        for entry in map.entries() {
            self.visit_row_branches(&entry.child, depth + 1, roots);
        }
    }

    fn sort_tree(
        &self,
        nodes: &mut Vec<AxisNode>,
        levels: &[AxisLevel],
        depth: usize,
        is_row: bool,
    ) {
        let Some(level) = levels.get(depth) else {
            return;
        };
        let sort = level.attribute.sort;

        if sort.order != SortOrder::DataSourceOrder {
            let by_value = sort.value_index.and_then(|i| self.source.values.get(i));
            match by_value {
                Some(value) => {
                    for node in nodes.iter_mut() {
                        let records = if is_row {
                            self.collect(&node.path, &[])
                        } else {
                            self.collect(&[], &node.path)
                        };
                        node.rank = self.aggregate(&records, value).and_then(|v| v.as_number());
                    }
                    nodes.sort_by(|a, b| directed(compare_ranks(a.rank, b.rank), sort.order));
                }
                None => {
                    nodes.sort_by(|a, b| {
                        directed(compare_values(&a.sort_value, &b.sort_value), sort.order)
                    });
                }
            }
        }

        for node in nodes.iter_mut() {
            self.sort_tree(&mut node.children, levels, depth + 1, is_row);
        }
    }

    /// Appends a summary node to every sibling list whose level shows sums.
    fn add_summaries(
        &self,
        nodes: &mut Vec<AxisNode>,
        levels: &[AxisLevel],
        depth: usize,
        parent_path: &[String],
    ) {
        for node in nodes.iter_mut() {
            let path = node.path.clone();
            self.add_summaries(&mut node.children, levels, depth + 1, &path);
        }
        if !nodes.is_empty() && levels.get(depth).is_some_and(|l| l.attribute.show_sums) {
            nodes.push(AxisNode::summary(&self.format.summary_title, parent_path));
        }
    }

    // ========================================================================
    // FLATTENING
    // ========================================================================

    fn flatten(
        &self,
        nodes: &[AxisNode],
        levels: &[AxisLevel],
        depth: usize,
        split_values: bool,
        leaf_value: Option<usize>,
        leaves: &mut Vec<Leaf>,
    ) -> Vec<PivotHeader> {
        let mut headers = Vec::with_capacity(nodes.len());
        let level = levels.get(depth);

        for node in nodes {
            let mut header = PivotHeader {
                title: node.key.clone(),
                constraint: if node.is_summary {
                    None
                } else {
                    level.and_then(|l| l.constraint.clone())
                },
                color: level.and_then(|l| l.color.clone()),
                attribute_name: level.map(|l| l.name.clone()),
                is_summary: node.is_summary,
                ..Default::default()
            };

            if !node.children.is_empty() {
                header.children = self.flatten(
                    &node.children,
                    levels,
                    depth + 1,
                    split_values,
                    leaf_value,
                    leaves,
                );
            } else if split_values {
                header.children = self.value_headers(&node.path, leaves);
            } else {
                header.target_index = Some(leaves.len());
                leaves.push(Leaf {
                    path: node.path.clone(),
                    value_index: leaf_value,
                });
            }
            headers.push(header);
        }

        headers
    }

    /// One leaf header per value attribute, all sharing `path`.
    fn value_headers(&self, path: &[String], leaves: &mut Vec<Leaf>) -> Vec<PivotHeader> {
        self.source
            .values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let header = PivotHeader {
                    title: value.title.clone(),
                    target_index: Some(leaves.len()),
                    constraint: value.constraint.clone(),
                    color: value.color.clone(),
                    is_value_header: true,
                    ..Default::default()
                };
                leaves.push(Leaf {
                    path: path.to_vec(),
                    value_index: Some(index),
                });
                header
            })
            .collect()
    }

    // ========================================================================
    // TABLE
    // ========================================================================

    fn build(&self) -> PivotTable {
        let source = self.source;
        let value_count = source.values.len();

        // Rows
        let mut row_tree = self.build_row_tree();
        self.sort_tree(&mut row_tree, &source.rows, 0, true);
        self.add_summaries(&mut row_tree, &source.rows, 0, &[]);
        let mut row_leaves = Vec::new();
        let row_headers = if self.row_levels == 0 {
            row_leaves.push(Leaf {
                path: Vec::new(),
                value_index: None,
            });
            Vec::new()
        } else {
            self.flatten(&row_tree, &source.rows, 0, false, None, &mut row_leaves)
        };

        // Columns; value titles always go on this axis
        let mut column_leaves = Vec::new();
        let column_headers = if self.column_levels == 0 {
            if value_count == 0 {
                column_leaves.push(Leaf {
                    path: Vec::new(),
                    value_index: None,
                });
                Vec::new()
            } else {
                self.value_headers(&[], &mut column_leaves)
            }
        } else {
            let mut column_tree = self.build_column_tree();
            self.sort_tree(&mut column_tree, &source.columns, 0, false);
            self.add_summaries(&mut column_tree, &source.columns, 0, &[]);
            let split_values = value_count >= 2;
            let leaf_value = (value_count == 1).then_some(0);
            self.flatten(
                &column_tree,
                &source.columns,
                0,
                split_values,
                leaf_value,
                &mut column_leaves,
            )
        };

        let (values, provenance) = self.fill(&row_leaves, &column_leaves);

        log_debug!(
            "PIVOT",
            "table {}x{} ({} row levels, {} column levels, {} values)",
            values.len(),
            column_leaves.len(),
            self.row_levels,
            self.column_levels,
            value_count
        );

        PivotTable {
            row_headers,
            column_headers,
            row_header_attributes: source
                .rows
                .iter()
                .map(|l| PivotHeaderAttribute {
                    title: l.name.clone(),
                    color: l.color.clone(),
                })
                .collect(),
            values,
            provenance,
            value_titles: source.values.iter().map(|v| v.title.clone()).collect(),
            value_types: source.values.iter().map(|v| v.attribute.value_type).collect(),
            row_sticky: sticky_prefix(&source.rows),
            column_sticky: sticky_prefix(&source.columns),
        }
    }

    /// Cross-tabulates every (row leaf, column leaf) pair.
    #[allow(clippy::type_complexity)]
    fn fill(
        &self,
        rows: &[Leaf],
        columns: &[Leaf],
    ) -> (Vec<Vec<Option<PivotValue>>>, Vec<Vec<Vec<DataRecord>>>) {
        let mut values = vec![vec![None; columns.len()]; rows.len()];
        let mut provenance = vec![vec![Vec::new(); columns.len()]; rows.len()];
        let mut totals = Totals::default();

        for (r, row) in rows.iter().enumerate() {
            for (c, column) in columns.iter().enumerate() {
                let records = self.collect(&row.path, &column.path);
                if records.is_empty() {
                    continue;
                }

                let Some(value_index) = column.value_index else {
                    provenance[r][c] = records.all().cloned().collect();
                    continue;
                };
                let Some(value) = self.source.values.get(value_index) else {
                    continue;
                };

                provenance[r][c] = records
                    .records_of(&value.attribute.address)
                    .iter()
                    .map(|record| (*record).clone())
                    .collect();

                let cell = self.aggregate(&records, value);
                values[r][c] = match (cell, value.attribute.value_type) {
                    (Some(PivotValue::Number(n)), value_type)
                        if value_type != PivotValueType::Default =>
                    {
                        let denominator = match value_type {
                            PivotValueType::AllPercentage => *totals
                                .grand
                                .entry(value_index)
                                .or_insert_with(|| self.total(&[], &[], value)),
                            PivotValueType::RowPercentage => *totals
                                .rows
                                .entry((r, value_index))
                                .or_insert_with(|| self.total(&row.path, &[], value)),
                            PivotValueType::ColumnPercentage => *totals
                                .columns
                                .entry(c)
                                .or_insert_with(|| self.total(&[], &column.path, value)),
                            PivotValueType::Default => None,
                        };
                        Some(PivotValue::Number(percentage(n, denominator)))
                    }
                    (cell, _) => cell,
                };
            }
        }

        (values, provenance)
    }

    fn total(&self, rows: &[String], columns: &[String], value: &ValueColumn) -> Option<f64> {
        let records = self.collect(rows, columns);
        self.aggregate(&records, value).and_then(|v| v.as_number())
    }
}

/// Memoized denominators of percentage value types.
#[derive(Default)]
struct Totals {
    grand: FxHashMap<usize, Option<f64>>,
    rows: FxHashMap<(usize, usize), Option<f64>>,
    columns: FxHashMap<usize, Option<f64>>,
}

fn percentage(value: f64, denominator: Option<f64>) -> f64 {
    match denominator {
        Some(d) if d != 0.0 => value / d,
        _ => value,
    }
}

fn tree_from_map(
    map: &AggregatedMap,
    depth: usize,
    levels: usize,
    parent_path: &[String],
) -> Vec<AxisNode> {
    if depth >= levels {
        return Vec::new();
    }
    map.entries()
        .iter()
        .map(|entry| {
            let mut node = AxisNode::new(&entry.key, &entry.sort_value, parent_path);
            node.children = tree_from_map(&entry.child, depth + 1, levels, &node.path);
            node
        })
        .collect()
}

fn insert_columns(
    nodes: &mut Vec<AxisNode>,
    map: &AggregatedMap,
    depth: usize,
    levels: usize,
    parent_path: &[String],
) {
    if depth >= levels {
        return;
    }
    for entry in map.entries() {
        let position = match nodes.iter().position(|n| n.key == entry.key) {
            Some(position) => position,
            None => {
                nodes.push(AxisNode::new(&entry.key, &entry.sort_value, parent_path));
                nodes.len() - 1
            }
        };
        let node = &mut nodes[position];
        let path = node.path.clone();
        insert_columns(&mut node.children, &entry.child, depth + 1, levels, &path);
    }
}

fn compare_ranks(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Descending => ordering.reverse(),
        SortOrder::Ascending | SortOrder::DataSourceOrder => ordering,
    }
}

/// A level is sticky only while every level above it is sticky too.
pub fn sticky_prefix(levels: &[AxisLevel]) -> Vec<bool> {
    levels
        .iter()
        .scan(true, |sticky, level| {
            *sticky = *sticky && level.attribute.sticky;
            Some(*sticky)
        })
        .collect()
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Builds the table of one (possibly merged) source.
pub fn build_pivot_table(source: &PivotSource, format: &FormatContext) -> PivotTable {
    if source.rows.is_empty() && source.columns.is_empty() && source.values.is_empty() {
        return PivotTable::default();
    }
    CrossTab::new(source, format).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{AggregationType, PivotSort};
    use crate::grouping::AggregatedLevel;
    use data_model::Document;

    fn member(id: &str, fee: f64) -> DataRecord {
        DataRecord::from(Document::new(id, "C2").with_value("fee", fee))
    }

    fn terminal(records: Vec<DataRecord>) -> AggregatedMap {
        let mut group = ResourceRecords::new("C2", ResourceType::Collection);
        group.records = records;
        AggregatedMap::Terminal(vec![group])
    }

    fn level(entries: Vec<(&str, AggregatedMap)>) -> AggregatedMap {
        let mut level = AggregatedLevel::default();
        for (key, child) in entries {
            *level.entry_or_insert(key, &DataValue::text(key), AggregatedMap::default()) = child;
        }
        AggregatedMap::Level(level)
    }

    fn axis(resource_index: usize, resource_id: &str, name: &str) -> AxisLevel {
        AxisLevel {
            attribute: PivotAxisAttribute::new(AttributeAddress::collection(
                resource_index,
                resource_id,
                "a1",
            )),
            name: name.to_string(),
            color: Some("#00f".to_string()),
            constraint: None,
        }
    }

    fn fee(aggregation: AggregationType) -> ValueColumn {
        ValueColumn {
            attribute: PivotValueAttribute::new(AttributeAddress::collection(2, "C2", "fee"), aggregation),
            title: format!("{} of Fee", aggregation.title()),
            color: None,
            constraint: None,
        }
    }

    /// Kind x Role over member fees:
    /// Sport/captain = M1, Sport/player = M2 M3, Dance/player = M2.
    fn clubs_map() -> AggregatedMap {
        level(vec![
            (
                "Sport",
                level(vec![
                    ("captain", terminal(vec![member("M1", 10.0)])),
                    ("player", terminal(vec![member("M2", 20.0), member("M3", 5.0)])),
                ]),
            ),
            ("Dance", level(vec![("player", terminal(vec![member("M2", 20.0)]))])),
        ])
    }

    fn clubs_source() -> PivotSource {
        PivotSource {
            rows: vec![axis(0, "C1", "Kind")],
            columns: vec![axis(1, "L1", "Role")],
            values: vec![fee(AggregationType::Sum)],
            data: AggregatedData {
                map: clubs_map(),
                row_levels: 1,
                column_levels: 1,
            },
        }
    }

    /// Same map with Role moved to a second row level.
    fn nested_rows_source() -> PivotSource {
        PivotSource {
            rows: vec![axis(0, "C1", "Kind"), axis(1, "L1", "Role")],
            columns: Vec::new(),
            values: vec![fee(AggregationType::Sum)],
            data: AggregatedData {
                map: clubs_map(),
                row_levels: 2,
                column_levels: 0,
            },
        }
    }

    fn numbers(table: &PivotTable) -> Vec<Vec<Option<f64>>> {
        table
            .values
            .iter()
            .map(|row| row.iter().map(|v| v.as_ref().and_then(PivotValue::as_number)).collect())
            .collect()
    }

    fn titles(headers: &[PivotHeader]) -> Vec<&str> {
        headers.iter().map(|h| h.title.as_str()).collect()
    }

    #[test]
    fn test_cross_tab_with_missing_combination() {
        let table = build_pivot_table(&clubs_source(), &FormatContext::default());

        assert_eq!(titles(&table.row_headers), vec!["Sport", "Dance"]);
        assert_eq!(titles(&table.column_headers), vec!["captain", "player"]);
        assert_eq!(numbers(&table), vec![vec![Some(10.0), Some(25.0)], vec![None, Some(20.0)]]);
        assert!(table.drill_down(1, 0).is_empty());
        assert_eq!(table.drill_down(0, 1).len(), 2);
        assert_eq!(table.row_header_attributes[0].title, "Kind");
        assert_eq!(table.value_titles, vec!["Sum of Fee"]);
    }

    #[test]
    fn test_leaf_targets_follow_tree_order() {
        let table = build_pivot_table(&clubs_source(), &FormatContext::default());
        let rows: Vec<usize> = table.row_headers.iter().flat_map(PivotHeader::leaf_indices).collect();
        let columns: Vec<usize> = table.column_headers.iter().flat_map(PivotHeader::leaf_indices).collect();
        assert_eq!(rows, vec![0, 1]);
        assert_eq!(columns, vec![0, 1]);
    }

    #[test]
    fn test_row_summary_deduplicates_records() {
        let mut source = clubs_source();
        source.rows[0].attribute.show_sums = true;

        let table = build_pivot_table(&source, &FormatContext::default());

        assert_eq!(titles(&table.row_headers), vec!["Sport", "Dance", "Summary"]);
        assert!(table.row_headers[2].is_summary);
        assert_eq!(table.row_headers[2].constraint, None);
        // M2 is counted once in the player column
        assert_eq!(numbers(&table)[2], vec![Some(10.0), Some(25.0)]);
    }

    #[test]
    fn test_sort_by_key_and_by_value() {
        let mut source = clubs_source();
        source.rows[0].attribute.sort = PivotSort::ascending();
        let table = build_pivot_table(&source, &FormatContext::default());
        assert_eq!(titles(&table.row_headers), vec!["Dance", "Sport"]);

        source.rows[0].attribute.sort = PivotSort::by_value(SortOrder::Descending, 0);
        let table = build_pivot_table(&source, &FormatContext::default());
        assert_eq!(titles(&table.row_headers), vec!["Sport", "Dance"]);

        source.columns[0].attribute.sort = PivotSort::descending();
        let table = build_pivot_table(&source, &FormatContext::default());
        assert_eq!(titles(&table.column_headers), vec!["player", "captain"]);
        assert_eq!(numbers(&table)[0], vec![Some(25.0), Some(10.0)]);
    }

    #[test]
    fn test_multiple_values_split_column_leaves() {
        let mut source = clubs_source();
        source.values.push(fee(AggregationType::Count));

        let table = build_pivot_table(&source, &FormatContext::default());

        assert_eq!(table.column_headers[0].titles(), vec!["captain", "Sum of Fee", "Count of Fee"]);
        assert!(table.column_headers[0].children[0].is_value_header);
        assert_eq!(table.column_count(), 4);
        assert_eq!(numbers(&table)[0], vec![Some(10.0), Some(1.0), Some(25.0), Some(2.0)]);
    }

    #[test]
    fn test_row_percentage_divides_by_row_total() {
        let mut source = clubs_source();
        source.values[0].attribute.value_type = PivotValueType::RowPercentage;

        let table = build_pivot_table(&source, &FormatContext::default());

        let sport = &numbers(&table)[0];
        assert_eq!(sport[0], Some(10.0 / 35.0));
        assert_eq!(sport[1], Some(25.0 / 35.0));
        assert_eq!(numbers(&table)[1], vec![None, Some(1.0)]);
    }

    #[test]
    fn test_values_only_source() {
        let source = PivotSource {
            values: vec![fee(AggregationType::Sum), fee(AggregationType::Max)],
            data: AggregatedData {
                map: terminal(vec![member("M1", 10.0), member("M2", 20.0)]),
                row_levels: 0,
                column_levels: 0,
            },
            ..Default::default()
        };

        let table = build_pivot_table(&source, &FormatContext::default());

        assert!(table.row_headers.is_empty());
        assert_eq!(titles(&table.column_headers), vec!["Sum of Fee", "Max of Fee"]);
        assert_eq!(numbers(&table), vec![vec![Some(30.0), Some(20.0)]]);
    }

    #[test]
    fn test_empty_source_builds_empty_table() {
        let table = build_pivot_table(&PivotSource::default(), &FormatContext::default());
        assert!(table.is_empty());
        assert!(table.column_headers.is_empty());
    }

    #[test]
    fn test_sticky_is_prefix_and() {
        let levels: Vec<AxisLevel> = [true, false, true]
            .iter()
            .map(|&sticky| {
                let mut level = axis(0, "C1", "Kind");
                level.attribute.sticky = sticky;
                level
            })
            .collect();
        assert_eq!(sticky_prefix(&levels), vec![true, false, false]);
        assert!(sticky_prefix(&[]).is_empty());
    }

    #[test]
    fn test_column_percentage_divides_by_column_total() {
        let mut source = clubs_source();
        source.values[0].attribute.value_type = PivotValueType::ColumnPercentage;

        let table = build_pivot_table(&source, &FormatContext::default());

        // captain total = M1 (10), player total = M2 + M3 (25, M2 once)
        assert_eq!(
            numbers(&table),
            vec![vec![Some(1.0), Some(1.0)], vec![None, Some(20.0 / 25.0)]]
        );
    }

    #[test]
    fn test_inner_level_sums_add_child_to_every_parent() {
        let mut source = nested_rows_source();
        source.rows[1].attribute.show_sums = true;

        let table = build_pivot_table(&source, &FormatContext::default());

        assert_eq!(titles(&table.row_headers), vec!["Sport", "Dance"]);
        assert_eq!(table.row_headers[0].titles(), vec!["Sport", "captain", "player", "Summary"]);
        assert_eq!(table.row_headers[1].titles(), vec!["Dance", "player", "Summary"]);
        assert!(table.row_headers[0].children[2].is_summary);
        assert_eq!(table.row_headers[0].leaf_indices(), vec![0, 1, 2]);
        assert_eq!(table.row_headers[1].leaf_indices(), vec![3, 4]);
        assert_eq!(
            numbers(&table),
            vec![
                vec![Some(10.0)],
                vec![Some(25.0)],
                vec![Some(35.0)],
                vec![Some(20.0)],
                vec![Some(20.0)],
            ]
        );
    }

    #[test]
    fn test_column_summary_splits_into_value_headers() {
        let mut source = clubs_source();
        source.columns[0].attribute.show_sums = true;
        source.values.push(fee(AggregationType::Count));

        let table = build_pivot_table(&source, &FormatContext::default());

        assert_eq!(titles(&table.column_headers), vec!["captain", "player", "Summary"]);
        let summary = &table.column_headers[2];
        assert!(summary.is_summary);
        assert_eq!(summary.titles(), vec!["Summary", "Sum of Fee", "Count of Fee"]);
        assert_eq!(summary.leaf_indices(), vec![4, 5]);
        assert_eq!(
            numbers(&table),
            vec![
                vec![Some(10.0), Some(1.0), Some(25.0), Some(2.0), Some(35.0), Some(3.0)],
                vec![None, None, Some(20.0), Some(1.0), Some(20.0), Some(1.0)],
            ]
        );
    }
}
