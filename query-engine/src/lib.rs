//! FILENAME: query-engine/src/lib.rs
//! Stem queries: chain resolution, the chain-following record pipeline and
//! planning of writes along a chain.

pub mod chain;
pub mod chain_creation;
pub mod error;
pub mod pipeline;
pub mod stem;

pub use chain::{AttributeAddress, ChainResource, ResolvedChain};
pub use chain_creation::{plan_chain_write, ChainOperation, ChainPlan, ChainWriteRequest, RecordRef};
pub use error::ChainCreationError;
pub use pipeline::{run_pipeline, Connection, PipelineInput, PipelineResult};
pub use stem::{Query, QueryStem, StemQuery};
