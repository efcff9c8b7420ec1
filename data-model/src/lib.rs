//! FILENAME: data-model/src/lib.rs
//! PURPOSE: Shared data types for the stem query and pivot crates.
//! CONTEXT: Catalog definitions, records, raw values, constraint-aware
//! formatting, filters, permissions and the logging macros. The query and
//! pivot crates depend on this crate only for these shared types.

pub mod catalog;
pub mod constraint;
pub mod filter;
pub mod logging;
pub mod permissions;
pub mod record;
pub mod value;

// Re-export commonly used types at the crate root
pub use catalog::{Attribute, Catalog, Collection, LinkType, ResourceType};
pub use constraint::{format_value, numeric_value, Constraint, FormatContext, SelectOption};
pub use filter::{matches_filters, matches_fulltext, AttributeFilter, FilterCondition};
pub use permissions::{AllowedActions, PermissionMap};
pub use record::{DataRecord, Document, LinkInstance, RecordData, RecordStore};
pub use value::{compare_values, DataValue, NULL_VALUE};
