// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # dl-taxonomy
//!
//! Description-logic definition graphs and the taxonomy machinery around a
//! classifier.
//!
//! ## Architecture
//!
//! - **Identifiers** (`id`): local ids, concept sequences and stable ids, resolved
//!   through an injected [`id::IdentifierService`]
//! - **Logic graphs** (`logic`): content-addressed nodes, a dual internal/external
//!   binary codec, and a greedy maximal-common-subgraph diff
//! - **Taxonomy** (`taxonomy`): parallel, order-independent reduction of is-a
//!   records into bitset-backed graphs
//! - **Versions** (`version`, `stamp`): latest-version resolution with
//!   contradictions kept, ambiguity surfaced
//! - **Incremental tracking** (`tracker`): which concepts changed since the last
//!   classification
//! - **Classifier** (`classifier`, `task`): cancellable classification and
//!   expression resolution on a worker pool
//!
//! ## Library usage
//!
//! ```no_run
//! use dl_taxonomy::config::ClassifierConfig;
//! use dl_taxonomy::fixture::{FixtureSpec, Terminology};
//!
//! let spec = FixtureSpec::load(std::path::Path::new("terminology.json")).unwrap();
//! let terminology = Terminology::load(&spec).unwrap();
//! let classifier = terminology.classifier(&ClassifierConfig::default()).unwrap();
//! let stated = classifier.get_stated_taxonomy_graph();
//! println!("{} concepts, {} edges", stated.concept_count(), stated.edge_count());
//! let results = classifier.classify().wait().unwrap();
//! println!("{} affected", results.affected_concepts.len());
//! ```

pub mod audit;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fixture;
pub mod id;
pub mod logic;
pub mod stamp;
pub mod task;
pub mod taxonomy;
pub mod tracker;
pub mod version;
