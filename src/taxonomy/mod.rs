//! Taxonomy graphs: is-a hierarchies over concept sequences.
//!
//! - [`records`]: the per-concept edge source and the view it is queried with
//! - [`graph`]: [`TaxonomyGraph`] and the order-independent [`GraphAccumulator`]
//! - [`builder`]: [`TaxonomyBuilder`], the parallel fold/reduce over the universe

pub mod builder;
pub mod graph;
pub mod records;

pub use builder::TaxonomyBuilder;
pub use graph::{DroppedEdge, GraphAccumulator, TaxonomyGraph};
pub use records::{MemoryTaxonomyRecords, TaxonomyRecord, TaxonomyRecordSource, TaxonomyView};
