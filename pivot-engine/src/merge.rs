//! FILENAME: pivot-engine/src/merge.rs
//! Multi-stem merging.
//!
//! Stems whose axes line up are folded into one table. Two sources are
//! compatible when they have the same shape and the same number of levels on
//! every axis they use. Merging walks both maps in parallel: keys of the right
//! side are appended after the keys of the left side, terminals are joined per
//! resource. Axis metadata of the merged source is taken from the first stem.

use data_model::log_debug;

use crate::engine::PivotSource;
use crate::grouping::{merge_resource_records, AggregatedData, AggregatedMap};

/// Which axes a stem uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemShape {
    ValuesOnly,
    RowsOnly,
    ColumnsOnly,
    RowsAndColumns,
}

impl StemShape {
    pub fn classify(rows: usize, columns: usize) -> Self {
        match (rows > 0, columns > 0) {
            (false, false) => StemShape::ValuesOnly,
            (true, false) => StemShape::RowsOnly,
            (false, true) => StemShape::ColumnsOnly,
            (true, true) => StemShape::RowsAndColumns,
        }
    }
}

impl PivotSource {
    pub fn can_merge_with(&self, other: &PivotSource) -> bool {
        self.shape() == other.shape()
            && self.rows.len() == other.rows.len()
            && self.columns.len() == other.columns.len()
    }

    /// Folds `other` into a copy of this source.
    pub fn merged_with(&self, other: &PivotSource) -> PivotSource {
        let mut values = self.values.clone();
        for value in &other.values {
            if !values.iter().any(|v| v.attribute.same_value(&value.attribute)) {
                values.push(value.clone());
            }
        }

        PivotSource {
            rows: self.rows.clone(),
            columns: self.columns.clone(),
            values,
            data: AggregatedData {
                map: merge_maps(&self.data.map, &other.data.map),
                row_levels: self.data.row_levels,
                column_levels: self.data.column_levels,
            },
        }
    }
}

/// Parallel walk of two maps. Mismatched nodes keep the left side.
pub fn merge_maps(left: &AggregatedMap, right: &AggregatedMap) -> AggregatedMap {
    match (left, right) {
        (AggregatedMap::Level(level), AggregatedMap::Level(_)) => {
            let mut merged = level.clone();
            for entry in right.entries() {
                let combined = match merged.get(&entry.key) {
                    Some(existing) => merge_maps(existing, &entry.child),
                    None => entry.child.clone(),
                };
                *merged.entry_or_insert(&entry.key, &entry.sort_value, AggregatedMap::default()) =
                    combined;
            }
            AggregatedMap::Level(merged)
        }
        (AggregatedMap::Terminal(groups), AggregatedMap::Terminal(incoming)) => {
            let mut merged = groups.clone();
            merge_resource_records(&mut merged, incoming.iter().cloned());
            AggregatedMap::Terminal(merged)
        }
        _ => left.clone(),
    }
}

/// Greedy grouping in stem order: each source joins the first earlier group it
/// is compatible with.
pub fn merge_sources(sources: Vec<PivotSource>, merge_tables: bool) -> Vec<PivotSource> {
    if !merge_tables {
        return sources;
    }
    let count = sources.len();
    let mut merged: Vec<PivotSource> = Vec::with_capacity(count);
    for source in sources {
        match merged.iter_mut().find(|m| m.can_merge_with(&source)) {
            Some(target) => *target = target.merged_with(&source),
            None => merged.push(source),
        }
    }
    log_debug!("PIVOT", "{} stems merged into {} tables", count, merged.len());
    merged
}
