//! FILENAME: pivot-engine/src/lib.rs
//! Pivot tables over linked records.
//!
//! Layers:
//! - `definition`: Serializable configuration (what the pivot view IS)
//! - `grouping`: Nested aggregated map built from pipeline records
//! - `aggregation`: Null-safe reductions of raw values
//! - `merge`: Folding compatible stems into one table
//! - `engine`: Cross-tab builder (HOW we calculate)
//! - `view`: Renderable output (WHAT we display)

pub mod aggregation;
pub mod definition;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod merge;
pub mod view;

pub use aggregation::{aggregate, AggregateAccumulator};
pub use definition::*;
pub use engine::{build_pivot_table, sticky_prefix, AxisLevel, PivotSource, ValueColumn};
pub use error::ConfigError;
pub use grouping::{
    group_records, AggregatedData, AggregatedEntry, AggregatedMap, GroupingInput, ResourceRecords,
};
pub use merge::{merge_maps, merge_sources, StemShape};
pub use view::*;

use data_model::{
    log_debug, log_enter, log_exit, Catalog, FormatContext, PermissionMap, RecordStore,
};
use query_engine::{run_pipeline, PipelineInput, Query, ResolvedChain, StemQuery};

/// Everything a pivot build reads besides the query and its configuration.
#[derive(Debug, Clone, Copy)]
pub struct PivotContext<'a> {
    pub catalog: &'a Catalog,
    pub store: &'a RecordStore,
    pub permissions: &'a PermissionMap,
    pub format: &'a FormatContext,
}

/// Builds the pivot tables of a query: one per stem, or fewer when compatible
/// stems are merged.
pub fn build_pivot_tables(
    query: &Query,
    config: &PivotConfig,
    context: &PivotContext,
) -> Vec<PivotTable> {
    log_enter!("PIVOT", "build_pivot_tables", "stems={}", query.stems.len());

    let sources: Vec<PivotSource> = query
        .stems
        .iter()
        .enumerate()
        .map(|(position, stem_query)| {
            let stem_config = config.stem_config(&stem_query.stem, position);
            prepare_source(query, stem_query, stem_config, context)
        })
        .collect();

    let tables: Vec<PivotTable> = merge_sources(sources, config.merge_tables)
        .iter()
        .map(|source| build_pivot_table(source, context.format))
        .collect();

    log_exit!("PIVOT", "build_pivot_tables", "tables={}", tables.len());
    tables
}

/// Runs one stem through resolution, the record pipeline and grouping.
pub fn prepare_source(
    query: &Query,
    stem_query: &StemQuery,
    config: PivotStemConfig,
    context: &PivotContext,
) -> PivotSource {
    let chain = ResolvedChain::resolve(&stem_query.stem, context.catalog);

    // Attributes no longer on the chain are dropped
    let rows = readdress_axes(&chain, &config.row_attributes);
    let columns = readdress_axes(&chain, &config.column_attributes);
    let values: Vec<PivotValueAttribute> = config
        .value_attributes
        .iter()
        .filter_map(|attribute| {
            let address = chain.readdress(&attribute.address)?;
            Some(PivotValueAttribute {
                address,
                ..attribute.clone()
            })
        })
        .collect();

    let dropped = config.row_attributes.len()
        + config.column_attributes.len()
        + config.value_attributes.len()
        - rows.len()
        - columns.len()
        - values.len();
    if dropped > 0 {
        log_debug!(
            "PIVOT",
            "stem {}: dropped {} stale attributes",
            stem_query.stem.collection_id,
            dropped
        );
    }

    let pipeline = run_pipeline(&PipelineInput {
        chain: &chain,
        store: context.store,
        filters: &stem_query.filters,
        fulltexts: &query.fulltexts,
        permissions: context.permissions,
        format: context.format,
    });

    let data = group_records(&GroupingInput {
        chain: &chain,
        pipeline: &pipeline,
        rows: &rows,
        columns: &columns,
        values: &values,
        format: context.format,
    });

    PivotSource {
        rows: rows.iter().filter_map(|a| AxisLevel::resolve(&chain, a)).collect(),
        columns: columns.iter().filter_map(|a| AxisLevel::resolve(&chain, a)).collect(),
        values: values.iter().filter_map(|v| ValueColumn::resolve(&chain, v)).collect(),
        data,
    }
}

fn readdress_axes(
    chain: &ResolvedChain,
    attributes: &[PivotAxisAttribute],
) -> Vec<PivotAxisAttribute> {
    attributes
        .iter()
        .filter_map(|attribute| {
            let address = chain.readdress(&attribute.address)?;
            Some(PivotAxisAttribute {
                address,
                ..attribute.clone()
            })
        })
        .collect()
}
