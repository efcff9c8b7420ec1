//! FILENAME: pivot-engine/src/view.rs
//! Pivot View - Renderable output for the rendering layer.
//!
//! A `PivotTable` is a header tree per axis plus a dense value matrix. Leaf
//! headers carry the `target_index` of their matrix row or column; the
//! provenance matrix keeps the source records of every cell for drill-down.

use serde::{Deserialize, Serialize};
use data_model::{Constraint, DataRecord, DataValue};

use crate::definition::PivotValueType;

// ============================================================================
// CELL VALUES
// ============================================================================

/// Aggregated content of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PivotValue {
    Number(f64),
    /// Deduplicated raw values (unique / join aggregations).
    Values(Vec<DataValue>),
}

impl PivotValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PivotValue::Number(n) => Some(*n),
            PivotValue::Values(_) => None,
        }
    }
}

impl From<f64> for PivotValue {
    fn from(value: f64) -> Self {
        PivotValue::Number(value)
    }
}

// ============================================================================
// HEADERS
// ============================================================================

/// A node of a row or column header tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotHeader {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PivotHeader>,
    /// Matrix row/column of a leaf header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<usize>,
    #[serde(default)]
    pub constraint: Option<Constraint>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub attribute_name: Option<String>,
    #[serde(default)]
    pub is_value_header: bool,
    #[serde(default)]
    pub is_summary: bool,
}

impl PivotHeader {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Titles of this header and its descendants, depth first.
    pub fn titles(&self) -> Vec<&str> {
        let mut titles = vec![self.title.as_str()];
        for child in &self.children {
            titles.extend(child.titles());
        }
        titles
    }

    /// Target indices of all leaves under this header, in tree order.
    pub fn leaf_indices(&self) -> Vec<usize> {
        match self.target_index {
            Some(index) => vec![index],
            None => self.children.iter().flat_map(PivotHeader::leaf_indices).collect(),
        }
    }
}

/// Name and color of one row attribute, shown in the corner above the row headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotHeaderAttribute {
    pub title: String,
    pub color: Option<String>,
}

// ============================================================================
// TABLE
// ============================================================================

/// One rendered pivot table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotTable {
    pub row_headers: Vec<PivotHeader>,
    pub column_headers: Vec<PivotHeader>,
    pub row_header_attributes: Vec<PivotHeaderAttribute>,
    /// `values[row][column]`; `None` where no record contributes.
    pub values: Vec<Vec<Option<PivotValue>>>,
    pub provenance: Vec<Vec<Vec<DataRecord>>>,
    pub value_titles: Vec<String>,
    pub value_types: Vec<PivotValueType>,
    /// Effective sticky flag per row level.
    pub row_sticky: Vec<bool>,
    /// Effective sticky flag per column level.
    pub column_sticky: Vec<bool>,
}

impl PivotTable {
    pub fn row_count(&self) -> usize {
        self.values.len()
    }

    pub fn column_count(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    pub fn value(&self, row: usize, column: usize) -> Option<&PivotValue> {
        self.values.get(row)?.get(column)?.as_ref()
    }

    /// Source records behind one cell; empty for empty or out-of-range cells.
    pub fn drill_down(&self, row: usize, column: usize) -> &[DataRecord] {
        self.provenance
            .get(row)
            .and_then(|r| r.get(column))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
