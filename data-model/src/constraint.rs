//! FILENAME: data-model/src/constraint.rs
//! PURPOSE: Attribute constraints and constraint-aware value formatting.
//! CONTEXT: Grouping keys, header titles and full-text matching all use the
//! formatted display string produced here. Formatting state is carried in an
//! explicit `FormatContext` so every caller stays a pure function of its inputs.

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::value::{format_plain_number, DataValue};

/// One selectable option of a `Select` constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    pub value: DataValue,
    #[serde(default)]
    pub display_value: Option<String>,
}

/// Value constraint of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Constraint {
    Text,
    Number {
        #[serde(default)]
        decimals: Option<u8>,
    },
    Percentage {
        #[serde(default)]
        decimals: Option<u8>,
    },
    Boolean,
    #[serde(rename_all = "camelCase")]
    DateTime {
        /// strftime pattern, e.g. "%Y-%m-%d".
        #[serde(default)]
        format: Option<String>,
    },
    Select {
        #[serde(default)]
        options: Vec<SelectOption>,
    },
}

/// Explicit formatting state handed to every component that formats values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatContext {
    pub true_label: String,
    pub false_label: String,
    /// Pattern used by date-time constraints without their own format.
    pub date_format: String,
    /// Title of summary (sum) headers in pivot tables.
    pub summary_title: String,
}

impl Default for FormatContext {
    fn default() -> Self {
        FormatContext {
            true_label: "true".to_string(),
            false_label: "false".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            summary_title: "Summary".to_string(),
        }
    }
}

/// Formats a raw value into its display string.
/// `Null` always renders as an empty string.
pub fn format_value(
    value: &DataValue,
    constraint: Option<&Constraint>,
    ctx: &FormatContext,
) -> String {
    if let DataValue::Null = value {
        return String::new();
    }

    match constraint {
        None | Some(Constraint::Text) => match value {
            DataValue::Boolean(b) => format_boolean(*b, ctx),
            _ => value.display(),
        },
        Some(Constraint::Number { decimals }) => match value.as_number() {
            Some(n) => format_decimal(n, *decimals),
            None => value.display(),
        },
        Some(Constraint::Percentage { decimals }) => match parse_percentage(value) {
            Some(n) => format!("{}%", format_decimal(n * 100.0, *decimals)),
            None => value.display(),
        },
        Some(Constraint::Boolean) => match parse_boolean(value) {
            Some(b) => format_boolean(b, ctx),
            None => value.display(),
        },
        Some(Constraint::DateTime { format }) => match parse_date_time(value) {
            Some(date) => {
                format_date_time(&date, format.as_deref().unwrap_or(&ctx.date_format), ctx)
            }
            None => value.display(),
        },
        Some(Constraint::Select { options }) => options
            .iter()
            .find(|option| option.value.display() == value.display())
            .map(|option| {
                option
                    .display_value
                    .clone()
                    .unwrap_or_else(|| option.value.display())
            })
            .unwrap_or_else(|| value.display()),
    }
}

/// Number used by aggregations. Percentages written as "50%" read as 0.5.
pub fn numeric_value(value: &DataValue, constraint: Option<&Constraint>) -> Option<f64> {
    match constraint {
        Some(Constraint::Percentage { .. }) => parse_percentage(value),
        _ => value.as_number(),
    }
}

fn format_boolean(b: bool, ctx: &FormatContext) -> String {
    if b { ctx.true_label.clone() } else { ctx.false_label.clone() }
}

fn format_decimal(value: f64, decimals: Option<u8>) -> String {
    match decimals {
        Some(places) => format!("{:.prec$}", value, prec = places as usize),
        None => {
            // Trim float noise such as 7.000000000000001
            let rounded = format!("{:.10}", value);
            let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
            match trimmed.parse::<f64>() {
                Ok(n) => format_plain_number(n),
                Err(_) => trimmed.to_string(),
            }
        }
    }
}

fn parse_percentage(value: &DataValue) -> Option<f64> {
    match value {
        DataValue::Text(s) => {
            let trimmed = s.trim();
            match trimmed.strip_suffix('%') {
                Some(number) => number.trim().parse::<f64>().ok().map(|n| n / 100.0),
                None => value.as_number(),
            }
        }
        _ => value.as_number(),
    }
}

fn parse_boolean(value: &DataValue) -> Option<bool> {
    match value {
        DataValue::Boolean(b) => Some(*b),
        DataValue::Number(n) => Some(*n != 0.0),
        DataValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" | "" => Some(false),
            _ => None,
        },
        DataValue::Null => None,
    }
}

/// Reads RFC 3339 text, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD` or epoch milliseconds.
pub fn parse_date_time(value: &DataValue) -> Option<NaiveDateTime> {
    match value {
        DataValue::Number(ms) => DateTime::from_timestamp_millis(*ms as i64).map(|d| d.naive_utc()),
        DataValue::Text(s) => {
            let s = s.trim();
            if let Ok(date) = DateTime::parse_from_rfc3339(s) {
                return Some(date.naive_local());
            }
            if let Ok(date) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                return Some(date);
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        _ => None,
    }
}

fn format_date_time(date: &NaiveDateTime, pattern: &str, ctx: &FormatContext) -> String {
    let items: Vec<Item> = StrftimeItems::new(pattern).collect();
    let items = if items.iter().any(|item| matches!(item, Item::Error)) {
        StrftimeItems::new(&ctx.date_format).collect()
    } else {
        items
    };

    let mut out = String::new();
    if write!(out, "{}", date.format_with_items(items.iter())).is_err() {
        out = date.format("%Y-%m-%d").to_string();
    }
    out
}
