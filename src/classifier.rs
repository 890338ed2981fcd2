//! The classifier facade: the surface a host application drives.
//!
//! [`Classifier`] sequences the taxonomy builder, the version store, the
//! incremental tracker and an external [`Reasoner`]. Classification and
//! expression resolution run as cancellable tasks on the classifier's
//! worker pool; taxonomy and definition lookups are synchronous.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audit::{GraphSizeWatermark, revision_report};
use crate::config::ClassifierConfig;
use crate::error::LogicResult;
use crate::id::{ConceptMinter, ConceptSequence, IdentifierService, Nid, StableId};
use crate::logic::{InternalExpression, NodeIdentity};
use crate::stamp::{
    EditCoordinate, LogicCoordinate, PremiseType, StampCoordinate, Status, now_millis,
};
use crate::task::{self, TaskContext, TaskHandle};
use crate::taxonomy::{TaxonomyBuilder, TaxonomyGraph, TaxonomyRecordSource, TaxonomyView};
use crate::tracker::{IncrementalTracker, ListenerRegistration};
use crate::version::{LatestVersion, VersionStore};

/// Everything a reasoner gets to classify.
#[derive(Debug, Clone)]
pub struct ReasonerInput {
    pub stated_taxonomy: TaxonomyGraph,
    /// Latest stated definitions, by concept sequence.
    pub definitions: BTreeMap<ConceptSequence, InternalExpression>,
    /// Whether `definitions` holds only the concepts changed since the last
    /// completed classification.
    pub incremental: bool,
}

/// Outcome of a classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierResults {
    /// Concepts whose inferred placement may have changed.
    pub affected_concepts: BTreeSet<ConceptSequence>,
    /// Groups of concepts the reasoner found equivalent.
    pub equivalent_sets: Vec<BTreeSet<ConceptSequence>>,
    pub incremental: bool,
}

/// The external description-logic reasoner.
pub trait Reasoner: Send + Sync {
    /// Classify `input`. Long-running implementations should call
    /// [`TaskContext::checkpoint`] periodically.
    fn classify(&self, input: &ReasonerInput, ctx: &TaskContext) -> LogicResult<ClassifierResults>;
}

/// Reasoner that only detects structurally identical definitions: concepts
/// whose definition roots share an identity are reported equivalent.
#[derive(Clone)]
pub struct StructuralReasoner {
    ids: Arc<dyn IdentifierService>,
}

impl StructuralReasoner {
    pub fn new(ids: Arc<dyn IdentifierService>) -> Self {
        Self { ids }
    }
}

impl std::fmt::Debug for StructuralReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuralReasoner").finish_non_exhaustive()
    }
}

impl Reasoner for StructuralReasoner {
    fn classify(&self, input: &ReasonerInput, ctx: &TaskContext) -> LogicResult<ClassifierResults> {
        let mut by_identity: BTreeMap<NodeIdentity, BTreeSet<ConceptSequence>> = BTreeMap::new();
        for (sequence, definition) in &input.definitions {
            ctx.checkpoint()?;
            let identity = definition.root_identity(self.ids.as_ref())?;
            by_identity.entry(identity).or_default().insert(*sequence);
        }
        Ok(ClassifierResults {
            affected_concepts: input.definitions.keys().copied().collect(),
            equivalent_sets: by_identity.into_values().filter(|s| s.len() > 1).collect(),
            incremental: input.incremental,
        })
    }
}

/// Default views a classifier works under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierCoordinates {
    pub stamp: StampCoordinate,
    pub logic: LogicCoordinate,
    pub edit: EditCoordinate,
}

/// Collaborators a classifier is assembled from.
#[derive(Clone)]
pub struct ClassifierServices {
    pub ids: Arc<dyn IdentifierService>,
    pub minter: Arc<dyn ConceptMinter>,
    pub records: Arc<dyn TaxonomyRecordSource>,
    pub versions: Arc<VersionStore>,
    pub reasoner: Arc<dyn Reasoner>,
}

/// Host-facing classifier.
pub struct Classifier {
    ids: Arc<dyn IdentifierService>,
    minter: Arc<dyn ConceptMinter>,
    versions: Arc<VersionStore>,
    reasoner: Arc<dyn Reasoner>,
    builder: Arc<TaxonomyBuilder>,
    tracker: Arc<IncrementalTracker>,
    registration: ListenerRegistration,
    pool: Arc<rayon::ThreadPool>,
    coordinates: ClassifierCoordinates,
    watermark: Arc<GraphSizeWatermark>,
    audit_verbose: bool,
}

impl Classifier {
    /// Assemble a classifier and subscribe its tracker to definition commits.
    pub fn new(
        services: ClassifierServices,
        coordinates: ClassifierCoordinates,
        config: &ClassifierConfig,
    ) -> LogicResult<Self> {
        let pool = Arc::new(config.thread_pool()?);
        let builder = Arc::new(TaxonomyBuilder::new(
            Arc::clone(&services.ids),
            services.records,
            Arc::clone(&pool),
        ));
        let tracker = Arc::new(IncrementalTracker::new(
            Arc::clone(&services.ids),
            coordinates.logic.stated_assemblage,
            config.incremental,
        ));
        let registration = services.versions.notifier().register(tracker.clone());
        tracing::info!(
            threads = pool.current_num_threads(),
            stated = %coordinates.logic.stated_assemblage,
            inferred = %coordinates.logic.inferred_assemblage,
            "classifier ready"
        );

        Ok(Self {
            ids: services.ids,
            minter: services.minter,
            versions: services.versions,
            reasoner: services.reasoner,
            builder,
            tracker,
            registration,
            pool,
            coordinates,
            watermark: Arc::new(GraphSizeWatermark::new()),
            audit_verbose: config.audit.verbose,
        })
    }

    pub fn coordinates(&self) -> &ClassifierCoordinates {
        &self.coordinates
    }

    pub fn tracker(&self) -> &IncrementalTracker {
        &self.tracker
    }

    pub fn watermark(&self) -> &GraphSizeWatermark {
        &self.watermark
    }

    /// Classify the stated definitions, incrementally when the tracker
    /// allows it. On success the concepts this run saw are cleared from the
    /// tracker; commits made while it ran are kept for the next run.
    pub fn classify(&self) -> TaskHandle<ClassifierResults> {
        let ids = Arc::clone(&self.ids);
        let versions = Arc::clone(&self.versions);
        let reasoner = Arc::clone(&self.reasoner);
        let builder = Arc::clone(&self.builder);
        let tracker = Arc::clone(&self.tracker);
        let watermark = Arc::clone(&self.watermark);
        let stamp = self.coordinates.stamp.clone();
        let stated = self.coordinates.logic.stated_assemblage;
        let verbose = self.audit_verbose;

        task::spawn(&self.pool, "classify", move |ctx| {
            let run = tracker.begin_run();
            let incremental = run.incremental;
            tracing::debug!(
                incremental,
                touched = run.touched.len(),
                "classification mode decided"
            );

            let view = TaxonomyView::new(PremiseType::Stated, stamp.clone());
            let stated_taxonomy = builder.build_cancellable(&view, ctx.token(), ctx.progress())?;

            let concepts: Vec<Nid> = if incremental {
                run.touched
                    .iter()
                    .map(|s| ids.sequence_to_local(*s))
                    .collect::<Result<_, _>>()?
            } else {
                versions.concepts(stated)
            };
            ctx.progress().add_total(concepts.len() as u64);

            let mut definitions = BTreeMap::new();
            for concept in concepts {
                ctx.checkpoint()?;
                if let Some(latest) = versions.latest(concept, stated, &stamp)? {
                    let definition = latest.value().clone();
                    if watermark.observe(definition.node_count()) && verbose {
                        tracing::debug!(
                            concept = %concept,
                            nodes = definition.node_count(),
                            "largest definition so far:\n{}",
                            definition.render()
                        );
                    }
                    definitions.insert(ids.local_to_sequence(concept)?, definition);
                }
                ctx.progress().advance(1);
            }

            let input = ReasonerInput {
                stated_taxonomy,
                definitions,
                incremental,
            };
            let results = reasoner.classify(&input, ctx)?;
            ctx.checkpoint()?;
            tracker.classify_complete_for(&run);
            tracing::info!(
                affected = results.affected_concepts.len(),
                equivalent_sets = results.equivalent_sets.len(),
                incremental,
                "classification complete"
            );
            Ok(results)
        })
    }

    /// Find the concept whose latest stated definition has the same root
    /// identity as `expression`, or mint one (stable id = root identity) and
    /// commit `expression` as its definition under `edit`.
    pub fn resolve_expression_to_concept_sequence(
        &self,
        expression: InternalExpression,
        edit: EditCoordinate,
    ) -> TaskHandle<ConceptSequence> {
        let ids = Arc::clone(&self.ids);
        let minter = Arc::clone(&self.minter);
        let versions = Arc::clone(&self.versions);
        let stamp = self.coordinates.stamp.clone();
        let stated = self.coordinates.logic.stated_assemblage;

        task::spawn(&self.pool, "resolve expression", move |ctx| {
            let identity = expression.root_identity(ids.as_ref())?;
            let candidates = versions.concepts(stated);
            ctx.progress().add_total(candidates.len() as u64);

            for concept in candidates {
                ctx.checkpoint()?;
                if let Some(latest) = versions.latest(concept, stated, &stamp)? {
                    if latest.value().root_identity(ids.as_ref())? == identity {
                        tracing::debug!(concept = %concept, "expression matches existing concept");
                        return Ok(ids.local_to_sequence(concept)?);
                    }
                }
                ctx.progress().advance(1);
            }

            ctx.checkpoint()?;
            let nid = minter.mint_concept(StableId(identity.0));
            versions.commit(
                nid,
                stated,
                edit.stamp(Status::Active, now_millis()),
                expression,
            );
            let sequence = ids.local_to_sequence(nid)?;
            tracing::info!(concept = %nid, sequence = %sequence, "minted concept for expression");
            Ok(sequence)
        })
    }

    pub fn get_stated_taxonomy_graph(&self) -> TaxonomyGraph {
        self.taxonomy(PremiseType::Stated, &self.coordinates.stamp)
    }

    pub fn get_inferred_taxonomy_graph(&self) -> TaxonomyGraph {
        self.taxonomy(PremiseType::Inferred, &self.coordinates.stamp)
    }

    /// Taxonomy for an explicit premise and stamp view.
    pub fn taxonomy(&self, premise: PremiseType, stamp: &StampCoordinate) -> TaxonomyGraph {
        self.builder.build(&TaxonomyView::new(premise, stamp.clone()))
    }

    pub fn latest_expression(
        &self,
        concept: Nid,
        assemblage: Nid,
        stamp: &StampCoordinate,
    ) -> LogicResult<Option<LatestVersion<InternalExpression>>> {
        Ok(self.versions.latest(concept, assemblage, stamp)?)
    }

    /// Concepts whose stated definitions changed since the last completed
    /// classification.
    pub fn get_new_concepts(&self) -> BTreeSet<ConceptSequence> {
        self.tracker.new_concepts()
    }

    pub fn incremental_allowed(&self) -> bool {
        self.tracker.incremental_allowed()
    }

    pub fn classify_complete(&self) {
        self.tracker.classify_complete();
    }

    /// Every version of `concept`'s definition in `assemblage`, with diffs
    /// between consecutive versions.
    pub fn revision_report(&self, concept: Nid, assemblage: Nid, label: &str) -> LogicResult<String> {
        self.ids.local_to_stable(concept)?;
        let report = revision_report(label, &self.versions.chronologies(concept, assemblage));
        if self.audit_verbose {
            tracing::debug!(concept = %concept, "revision report:\n{report}");
        }
        Ok(report)
    }

    /// Unsubscribe the tracker and release the worker pool.
    pub fn shutdown(self) {
        self.registration.unregister();
        tracing::info!("classifier shut down");
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("coordinates", &self.coordinates)
            .field("tracker", &self.tracker)
            .field("registration", &self.registration.id())
            .finish()
    }
}
