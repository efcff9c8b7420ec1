//! FILENAME: pivot-engine/src/definition.rs
//! Pivot Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot view.
//! These structures are designed to be:
//! - Serializable (persisted per view as camelCase JSON)
//! - Tolerant: unknown fields are ignored, missing fields take defaults
//! - Immutable snapshots of user intent

use serde::{Deserialize, Serialize};
use data_model::Constraint;
use query_engine::{AttributeAddress, QueryStem};

use crate::error::ConfigError;

/// Current configuration version.
pub const CONFIG_VERSION: &str = "1";

// ============================================================================
// AGGREGATION
// ============================================================================

/// Supported aggregation functions for value attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationType {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    Median,
    Unique,
    Join,
}

impl Default for AggregationType {
    fn default() -> Self {
        AggregationType::Sum
    }
}

impl AggregationType {
    pub fn title(self) -> &'static str {
        match self {
            AggregationType::Sum => "Sum",
            AggregationType::Avg => "Average",
            AggregationType::Min => "Min",
            AggregationType::Max => "Max",
            AggregationType::Count => "Count",
            AggregationType::Median => "Median",
            AggregationType::Unique => "Unique",
            AggregationType::Join => "Join",
        }
    }
}

/// How to display calculated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PivotValueType {
    Default,
    /// Share of the grand aggregate.
    AllPercentage,
    /// Share of the row aggregate.
    RowPercentage,
    /// Share of the column aggregate.
    ColumnPercentage,
}

impl Default for PivotValueType {
    fn default() -> Self {
        PivotValueType::Default
    }
}

// ============================================================================
// SORTING
// ============================================================================

/// Sort order for header items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Ascending,
    Descending,
    DataSourceOrder,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::DataSourceOrder
    }
}

/// Sorting of one axis level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PivotSort {
    pub order: SortOrder,
    /// Sort by the aggregate of this value attribute instead of the header key.
    pub value_index: Option<usize>,
}

impl PivotSort {
    pub fn ascending() -> Self {
        PivotSort {
            order: SortOrder::Ascending,
            value_index: None,
        }
    }

    pub fn descending() -> Self {
        PivotSort {
            order: SortOrder::Descending,
            value_index: None,
        }
    }

    pub fn by_value(order: SortOrder, value_index: usize) -> Self {
        PivotSort {
            order,
            value_index: Some(value_index),
        }
    }
}

// ============================================================================
// ATTRIBUTE DEFINITIONS
// ============================================================================

/// An attribute placed on the row or column axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotAxisAttribute {
    #[serde(flatten)]
    pub address: AttributeAddress,

    #[serde(default)]
    pub sort: PivotSort,

    /// Header level stays visible while scrolling.
    #[serde(default)]
    pub sticky: bool,

    /// Append a summary header for this level.
    #[serde(default)]
    pub show_sums: bool,

    /// Display constraint used instead of the attribute's own.
    #[serde(default)]
    pub constraint: Option<Constraint>,
}

impl PivotAxisAttribute {
    pub fn new(address: AttributeAddress) -> Self {
        PivotAxisAttribute {
            address,
            sort: PivotSort::default(),
            sticky: false,
            show_sums: false,
            constraint: None,
        }
    }

    pub fn with_sort(mut self, sort: PivotSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    pub fn with_sums(mut self, show_sums: bool) -> Self {
        self.show_sums = show_sums;
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

/// An attribute aggregated into the cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotValueAttribute {
    #[serde(flatten)]
    pub address: AttributeAddress,

    #[serde(default)]
    pub aggregation: AggregationType,

    #[serde(default)]
    pub value_type: PivotValueType,
}

impl PivotValueAttribute {
    pub fn new(address: AttributeAddress, aggregation: AggregationType) -> Self {
        PivotValueAttribute {
            address,
            aggregation,
            value_type: PivotValueType::Default,
        }
    }

    pub fn with_value_type(mut self, value_type: PivotValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Equality used when value lists of merged stems are unioned.
    /// The chain position is irrelevant; the resource is what counts.
    pub fn same_value(&self, other: &PivotValueAttribute) -> bool {
        self.address.same_attribute(&other.address)
            && self.aggregation == other.aggregation
            && self.value_type == other.value_type
    }
}

// ============================================================================
// MAIN DEFINITION STRUCTS
// ============================================================================

/// Configuration of one query stem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PivotStemConfig {
    /// The stem this configuration was made for.
    pub stem: Option<QueryStem>,
    /// Row attributes (ordered from outer to inner).
    pub row_attributes: Vec<PivotAxisAttribute>,
    /// Column attributes (ordered from outer to inner).
    pub column_attributes: Vec<PivotAxisAttribute>,
    pub value_attributes: Vec<PivotValueAttribute>,
}

impl PivotStemConfig {
    pub fn new(stem: QueryStem) -> Self {
        PivotStemConfig {
            stem: Some(stem),
            ..Default::default()
        }
    }

    pub fn with_row(mut self, attribute: PivotAxisAttribute) -> Self {
        self.row_attributes.push(attribute);
        self
    }

    pub fn with_column(mut self, attribute: PivotAxisAttribute) -> Self {
        self.column_attributes.push(attribute);
        self
    }

    pub fn with_value(mut self, attribute: PivotValueAttribute) -> Self {
        self.value_attributes.push(attribute);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.row_attributes.is_empty()
            && self.column_attributes.is_empty()
            && self.value_attributes.is_empty()
    }
}

/// The complete, serializable configuration of a pivot view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PivotConfig {
    pub version: String,
    pub stems_configs: Vec<PivotStemConfig>,
    /// Combine compatible stems into one table.
    pub merge_tables: bool,
}

impl Default for PivotConfig {
    fn default() -> Self {
        PivotConfig {
            version: CONFIG_VERSION.to_string(),
            stems_configs: Vec::new(),
            merge_tables: true,
        }
    }
}

impl PivotConfig {
    pub fn with_stem_config(mut self, config: PivotStemConfig) -> Self {
        self.stems_configs.push(config);
        self
    }

    pub fn with_merge_tables(mut self, merge_tables: bool) -> Self {
        self.merge_tables = merge_tables;
        self
    }

    /// Parses a persisted configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PivotConfig = serde_json::from_str(json)?;
        if config.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(config.version));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The configuration for the stem at `position` of the query: the one made
    /// for an equal stem, else the one at the same position, else an empty one.
    pub fn stem_config(&self, stem: &QueryStem, position: usize) -> PivotStemConfig {
        self.stems_configs
            .iter()
            .find(|c| c.stem.as_ref() == Some(stem))
            .or_else(|| self.stems_configs.get(position))
            .cloned()
            .unwrap_or_default()
    }
}
