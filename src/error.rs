//! Rich diagnostic error types for the dl-taxonomy core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers can tell a
//! writer/reader version skew apart from a partially loaded identifier space.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the dl-taxonomy core.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum LogicError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

impl LogicError {
    /// Whether this error is a host-requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LogicError::Task(TaskError::Cancelled { .. }))
    }
}

// ---------------------------------------------------------------------------
// Format errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum FormatError {
    #[error("unknown node semantic tag {tag} at byte {offset}")]
    #[diagnostic(
        code(dl::format::unknown_semantic),
        help(
            "The graph was written by a newer (or incompatible) writer. \
             Upgrade the reader; this is not retried."
        )
    )]
    UnknownSemantic { tag: u8, offset: usize },

    #[error("unknown concrete-domain operator ordinal {ordinal} at byte {offset}")]
    #[diagnostic(
        code(dl::format::unknown_operator),
        help(
            "Valid operator ordinals are 0..=4 (EQUALS, LESS_THAN, LESS_THAN_OR_EQUAL, \
             GREATER_THAN, GREATER_THAN_OR_EQUAL). The writer and reader disagree on the format."
        )
    )]
    UnknownOperator { ordinal: u8, offset: usize },

    #[error("unexpected end of graph data: needed {needed} byte(s) at offset {offset}")]
    #[diagnostic(
        code(dl::format::truncated),
        help("The encoded graph is truncated. Re-read it from the source version record.")
    )]
    Truncated { needed: usize, offset: usize },

    #[error("string literal at byte {offset} is not valid UTF-8")]
    #[diagnostic(code(dl::format::invalid_utf8))]
    InvalidUtf8 { offset: usize },

    #[error("{count} trailing byte(s) after the root node")]
    #[diagnostic(
        code(dl::format::trailing_bytes),
        help("A graph encodes exactly one root subtree. Extra bytes indicate corruption.")
    )]
    TrailingBytes { count: usize },

    #[error("graph nesting exceeds {limit} levels at byte {offset}")]
    #[diagnostic(
        code(dl::format::too_deep),
        help("Definition graphs are shallow. Data nested this deeply is corrupt or hostile.")
    )]
    TooDeep { offset: usize, limit: usize },
}

// ---------------------------------------------------------------------------
// Resolution errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ResolutionError {
    #[error("no stable id for local id {nid}")]
    #[diagnostic(
        code(dl::id::unknown_local),
        help(
            "The referenced concept is not registered in the identifier space. \
             The graph is corrupt or the identifier space is only partially loaded."
        )
    )]
    UnknownLocal { nid: i32 },

    #[error("no local id for stable id {uuid}")]
    #[diagnostic(
        code(dl::id::unknown_stable),
        help("Register the concept before importing graphs that reference it.")
    )]
    UnknownStable { uuid: uuid::Uuid },

    #[error("no concept sequence for local id {nid}")]
    #[diagnostic(
        code(dl::id::no_sequence),
        help("Only concepts carry a sequence number. Check that the id refers to a concept.")
    )]
    NoSequence { nid: i32 },

    #[error("unknown concept sequence {sequence}")]
    #[diagnostic(code(dl::id::unknown_sequence))]
    UnknownSequence { sequence: u32 },
}

// ---------------------------------------------------------------------------
// Expression errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExpressionError {
    #[error("logical expression has no nodes")]
    #[diagnostic(code(dl::expression::empty))]
    Empty,

    #[error("node index {index} out of bounds for expression with {len} node(s)")]
    #[diagnostic(code(dl::expression::out_of_bounds))]
    OutOfBounds { index: u32, len: usize },

    #[error("node {parent} references child {child} that does not precede it")]
    #[diagnostic(
        code(dl::expression::forward_reference),
        help(
            "Children must be created before their parent. A forward reference \
             could close a cycle, and logical expressions are acyclic."
        )
    )]
    ForwardReference { parent: u32, child: u32 },

    #[error("node {index} is not reachable from root {root}")]
    #[diagnostic(
        code(dl::expression::unreachable),
        help("Every node of an expression must be reachable from its root.")
    )]
    Unreachable { index: u32, root: u32 },

    #[error("expression is {depth} levels deep, the limit is {limit}")]
    #[diagnostic(code(dl::expression::too_deep))]
    TooDeep { depth: usize, limit: usize },
}

// ---------------------------------------------------------------------------
// Version errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum VersionError {
    #[error(
        "{count} independent definition chronologies for concept {concept} in assemblage {assemblage}"
    )]
    #[diagnostic(
        code(dl::version::ambiguous),
        help(
            "At most one definition chronology per concept and assemblage may be \
             current under a view. Retire the duplicate chronology; this is not auto-resolved."
        )
    )]
    Ambiguous {
        concept: i32,
        assemblage: i32,
        count: usize,
    },
}

// ---------------------------------------------------------------------------
// Task errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TaskError {
    #[error("task cancelled: {title}")]
    #[diagnostic(
        code(dl::task::cancelled),
        help("The host cancelled the task. No partial results were published.")
    )]
    Cancelled { title: String },

    #[error("task abandoned without a result: {title}")]
    #[diagnostic(
        code(dl::task::abandoned),
        help("The worker thread exited (most likely panicked) before delivering a result.")
    )]
    Abandoned { title: String },
}

// ---------------------------------------------------------------------------
// Classifier errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ClassifierError {
    #[error("reasoner failed: {message}")]
    #[diagnostic(
        code(dl::classifier::reasoner),
        help("The external reasoner rejected the stated taxonomy or definitions.")
    )]
    Reasoner { message: String },

    #[error("worker pool could not be created: {message}")]
    #[diagnostic(code(dl::classifier::pool))]
    Pool { message: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(code(dl::config::read))]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config: {path}")]
    #[diagnostic(code(dl::config::write))]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    #[diagnostic(
        code(dl::config::parse),
        help("Check the TOML syntax and the field names against `ClassifierConfig`.")
    )]
    Parse { path: String, message: String },

    #[error("failed to serialize config for {path}: {message}")]
    #[diagnostic(code(dl::config::serialize))]
    Serialize { path: String, message: String },

    #[error("invalid fixture: {message}")]
    #[diagnostic(code(dl::config::fixture))]
    Fixture { message: String },
}

/// Convenience alias for functions returning dl-taxonomy results.
pub type LogicResult<T> = std::result::Result<T, LogicError>;
