//! Logical expressions: the description-logic definition of a concept.
//!
//! - [`semantic`]: closed vocabularies (node semantics, operators, encoding targets)
//! - [`node`]: the [`LogicNode`] sum type and content-derived identity
//! - [`expression`]: [`LogicalExpression`], its builder and depth-first traversal
//! - [`codec`]: the binary format, in internal (local id) or external (stable id) form
//! - [`diff`]: greedy maximal-common-subgraph matching between two versions

pub mod codec;
pub mod diff;
pub mod expression;
pub mod node;
pub mod semantic;

pub use diff::DiffSolution;
pub use expression::{
    ExpressionBuilder, ExternalExpression, InternalExpression, LogicalExpression, TreeVisit,
};
pub use node::{ConceptReference, LogicNode, NodeIdentity, NodeIndex};
pub use semantic::{ConcreteDomainOperator, DataTarget, NodeSemantic};
