//! FILENAME: data-model/src/value.rs
//! PURPOSE: Defines the raw attribute value stored on documents and link instances.
//! CONTEXT: Values arrive from the record store as plain JSON scalars. Everything
//! that groups, filters or aggregates works on `DataValue` and only turns it into
//! a display string through `constraint::format_value`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single raw attribute value.
/// Dates are carried as ISO-8601 text or epoch milliseconds; the attribute's
/// constraint decides how they are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
}

/// Shared `Null` handed out for attributes a record does not carry.
pub static NULL_VALUE: DataValue = DataValue::Null;

impl Default for DataValue {
    fn default() -> Self {
        DataValue::Null
    }
}

impl DataValue {
    pub fn text(s: impl Into<String>) -> Self {
        DataValue::Text(s.into())
    }

    /// True for `Null` and for text that is blank after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            DataValue::Null => true,
            DataValue::Text(s) => s.trim().is_empty(),
            DataValue::Boolean(_) | DataValue::Number(_) => false,
        }
    }

    /// Numeric reading of the value. Numeric text is accepted, booleans are not.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            DataValue::Number(n) if n.is_finite() => Some(*n),
            DataValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Plain display string without any constraint applied.
    pub fn display(&self) -> String {
        match self {
            DataValue::Null => String::new(),
            DataValue::Boolean(b) => b.to_string(),
            DataValue::Number(n) => format_plain_number(*n),
            DataValue::Text(s) => s.clone(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            DataValue::Null => 0,
            DataValue::Number(_) => 1,
            DataValue::Text(_) => 2,
            DataValue::Boolean(_) => 3,
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Number(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Boolean(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::Text(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::Text(value)
    }
}

/// Format a number without unnecessary decimal places.
pub fn format_plain_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// Total ordering used when sorting header keys.
/// Null < Number < Text < Boolean. Numeric text sorts numerically before all
/// other text; other text compares case-insensitively.
pub fn compare_values(a: &DataValue, b: &DataValue) -> Ordering {
    match (a, b) {
        (DataValue::Number(na), DataValue::Number(nb)) => na.total_cmp(nb),
        (DataValue::Text(ta), DataValue::Text(tb)) => match (a.as_number(), b.as_number()) {
            (Some(na), Some(nb)) => na.total_cmp(&nb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => ta.to_lowercase().cmp(&tb.to_lowercase()),
        },
        (DataValue::Boolean(ba), DataValue::Boolean(bb)) => ba.cmp(bb),
        _ => a.rank().cmp(&b.rank()),
    }
}
