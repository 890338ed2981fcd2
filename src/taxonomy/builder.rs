//! Parallel taxonomy reduction over the concept universe.

use std::sync::Arc;

use rayon::prelude::*;

use crate::error::TaskError;
use crate::id::{ConceptSequence, IdentifierService};
use crate::task::{CancellationToken, TaskProgress};

use super::graph::{GraphAccumulator, TaxonomyGraph};
use super::records::{TaxonomyRecordSource, TaxonomyView};

const BUILD_TITLE: &str = "taxonomy build";

/// Builds [`TaxonomyGraph`]s by folding every concept's is-a edges into
/// per-worker accumulators and reducing them pairwise.
pub struct TaxonomyBuilder {
    ids: Arc<dyn IdentifierService>,
    records: Arc<dyn TaxonomyRecordSource>,
    pool: Arc<rayon::ThreadPool>,
}

impl TaxonomyBuilder {
    pub fn new(
        ids: Arc<dyn IdentifierService>,
        records: Arc<dyn TaxonomyRecordSource>,
        pool: Arc<rayon::ThreadPool>,
    ) -> Self {
        Self { ids, records, pool }
    }

    /// Build the graph for `view` over every registered concept.
    pub fn build(&self, view: &TaxonomyView) -> TaxonomyGraph {
        let never = CancellationToken::new();
        match self.build_cancellable(view, &never, &TaskProgress::new()) {
            Ok(graph) => graph,
            // The token above is never cancelled.
            Err(_) => GraphAccumulator::default().finish(view.premise),
        }
    }

    /// Build the graph, checking `token` before every concept. On
    /// cancellation nothing is returned.
    pub fn build_cancellable(
        &self,
        view: &TaxonomyView,
        token: &CancellationToken,
        progress: &TaskProgress,
    ) -> Result<TaxonomyGraph, TaskError> {
        let universe = self.ids.concept_sequences();
        let capacity = universe.last().map_or(0, |s| s.index() + 1);
        progress.add_total(universe.len() as u64);

        let accumulator = self.pool.install(|| {
            universe
                .par_iter()
                .try_fold(
                    || GraphAccumulator::with_capacity(capacity),
                    |mut acc, &origin| {
                        token.check(BUILD_TITLE)?;
                        acc.accumulate(origin, self.parents(origin, view));
                        progress.advance(1);
                        Ok::<_, TaskError>(acc)
                    },
                )
                .try_reduce(
                    || GraphAccumulator::with_capacity(capacity),
                    |a, b| Ok(a.combine(b)),
                )
        })?;

        let graph = accumulator.finish(view.premise);
        if !graph.dropped_edges().is_empty() {
            tracing::warn!(
                premise = %view.premise,
                dropped = graph.dropped_edges().len(),
                "taxonomy built with dropped edges"
            );
        }
        tracing::debug!(
            premise = %view.premise,
            concepts = graph.concept_count(),
            edges = graph.edge_count(),
            "taxonomy built"
        );
        Ok(graph)
    }

    fn parents(
        &self,
        origin: ConceptSequence,
        view: &TaxonomyView,
    ) -> Vec<Result<ConceptSequence, crate::id::Nid>> {
        self.records
            .is_a_destinations(origin, view)
            .into_iter()
            .map(|destination| {
                self.ids
                    .local_to_sequence(destination)
                    .map_err(|_| destination)
            })
            .collect()
    }
}

impl std::fmt::Debug for TaxonomyBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxonomyBuilder")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}
