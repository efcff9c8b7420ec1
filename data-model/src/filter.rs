//! FILENAME: data-model/src/filter.rs
//! Attribute filters and full-text matching applied while walking a stem.
//!
//! Comparison conditions are numeric when both sides read as numbers and fall
//! back to case-insensitive comparison of the formatted value otherwise.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::catalog::{Attribute, ResourceType};
use crate::constraint::{format_value, numeric_value, Constraint, FormatContext};
use crate::record::RecordData;
use crate::value::{DataValue, NULL_VALUE};

/// Condition of an attribute filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterCondition {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    BeginsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    IsEmpty,
    IsNotEmpty,
}

/// A filter on one attribute of one collection or link type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeFilter {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub attribute_id: String,
    pub condition: FilterCondition,
    #[serde(default)]
    pub value: DataValue,
}

impl AttributeFilter {
    pub fn new(
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        attribute_id: impl Into<String>,
        condition: FilterCondition,
        value: impl Into<DataValue>,
    ) -> Self {
        AttributeFilter {
            resource_type,
            resource_id: resource_id.into(),
            attribute_id: attribute_id.into(),
            condition,
            value: value.into(),
        }
    }

    pub fn applies_to(&self, resource_type: ResourceType, resource_id: &str) -> bool {
        self.resource_type == resource_type && self.resource_id == resource_id
    }

    /// Tests a record's raw value against this filter.
    pub fn matches(
        &self,
        value: &DataValue,
        constraint: Option<&Constraint>,
        ctx: &FormatContext,
    ) -> bool {
        let formatted = format_value(value, constraint, ctx).to_lowercase();
        let expected = format_value(&self.value, constraint, ctx).to_lowercase();

        match self.condition {
            FilterCondition::IsEmpty => value.is_empty(),
            FilterCondition::IsNotEmpty => !value.is_empty(),
            FilterCondition::Equals => {
                self.compare(value, constraint, &formatted, &expected) == Ordering::Equal
            }
            FilterCondition::NotEquals => {
                self.compare(value, constraint, &formatted, &expected) != Ordering::Equal
            }
            FilterCondition::Contains => formatted.contains(&expected),
            FilterCondition::NotContains => !formatted.contains(&expected),
            FilterCondition::BeginsWith => formatted.starts_with(&expected),
            FilterCondition::EndsWith => formatted.ends_with(&expected),
            FilterCondition::GreaterThan => {
                !value.is_empty()
                    && self.compare(value, constraint, &formatted, &expected) == Ordering::Greater
            }
            FilterCondition::GreaterThanOrEqual => {
                !value.is_empty()
                    && self.compare(value, constraint, &formatted, &expected) != Ordering::Less
            }
            FilterCondition::LessThan => {
                !value.is_empty()
                    && self.compare(value, constraint, &formatted, &expected) == Ordering::Less
            }
            FilterCondition::LessThanOrEqual => {
                !value.is_empty()
                    && self.compare(value, constraint, &formatted, &expected) != Ordering::Greater
            }
        }
    }

    fn compare(
        &self,
        value: &DataValue,
        constraint: Option<&Constraint>,
        formatted: &str,
        expected: &str,
    ) -> Ordering {
        match (numeric_value(value, constraint), numeric_value(&self.value, constraint)) {
            (Some(actual), Some(wanted)) => actual.partial_cmp(&wanted).unwrap_or(Ordering::Equal),
            _ => formatted.cmp(expected),
        }
    }
}

/// Checks every filter that targets the given resource against a record's data.
pub fn matches_filters(
    filters: &[AttributeFilter],
    resource_type: ResourceType,
    resource_id: &str,
    data: &RecordData,
    attributes: &[Attribute],
    ctx: &FormatContext,
) -> bool {
    filters
        .iter()
        .filter(|f| f.applies_to(resource_type, resource_id))
        .all(|f| {
            let value = data.get(&f.attribute_id).unwrap_or(&NULL_VALUE);
            let constraint = attributes
                .iter()
                .find(|a| a.id == f.attribute_id)
                .and_then(|a| a.constraint.as_ref());
            f.matches(value, constraint, ctx)
        })
}

/// Every term must appear (case-insensitive) in at least one formatted attribute value.
pub fn matches_fulltext(
    data: &RecordData,
    attributes: &[Attribute],
    terms: &[String],
    ctx: &FormatContext,
) -> bool {
    if terms.iter().all(|t| t.trim().is_empty()) {
        return true;
    }

    let formatted: Vec<String> = attributes
        .iter()
        .filter_map(|a| {
            data.get(&a.id)
                .map(|v| format_value(v, a.constraint.as_ref(), ctx).to_lowercase())
        })
        .collect();

    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .all(|term| formatted.iter().any(|value| value.contains(&term)))
}
