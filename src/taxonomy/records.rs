//! Source of outbound is-a records per concept.

use dashmap::DashMap;

use crate::id::{ConceptSequence, Nid};
use crate::stamp::{PremiseType, Stamp, StampCoordinate};
use crate::version::{StampedVersion, resolve_latest};

/// Which taxonomy to build and under which stamp view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyView {
    pub premise: PremiseType,
    pub stamp: StampCoordinate,
}

impl TaxonomyView {
    pub fn new(premise: PremiseType, stamp: StampCoordinate) -> Self {
        Self { premise, stamp }
    }
}

/// Per-concept is-a edges visible under a view.
///
/// Implementations must be side-effect free: the builder calls this from
/// many worker threads at once.
pub trait TaxonomyRecordSource: Send + Sync {
    /// Destinations of `origin`'s is-a edges visible under `view`, in any
    /// order. Destinations need not resolve to a concept.
    fn is_a_destinations(&self, origin: ConceptSequence, view: &TaxonomyView) -> Vec<Nid>;
}

/// One version of a single is-a edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxonomyRecord {
    pub destination: Nid,
    pub premise: PremiseType,
    pub stamp: Stamp,
}

/// In-memory record source. Each (origin, destination, premise) triple is a
/// versioned edge; its latest version under the view decides visibility.
#[derive(Debug, Default)]
pub struct MemoryTaxonomyRecords {
    records: DashMap<ConceptSequence, Vec<TaxonomyRecord>>,
}

impl MemoryTaxonomyRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, origin: ConceptSequence, record: TaxonomyRecord) {
        self.records.entry(origin).or_default().push(record);
    }

    pub fn record_count(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }
}

impl TaxonomyRecordSource for MemoryTaxonomyRecords {
    fn is_a_destinations(&self, origin: ConceptSequence, view: &TaxonomyView) -> Vec<Nid> {
        let Some(records) = self.records.get(&origin) else {
            return Vec::new();
        };
        let mut destinations: Vec<Nid> = records
            .iter()
            .filter(|r| r.premise == view.premise)
            .map(|r| r.destination)
            .collect();
        destinations.sort();
        destinations.dedup();

        destinations.retain(|destination| {
            let versions: Vec<StampedVersion<()>> = records
                .iter()
                .filter(|r| r.premise == view.premise && r.destination == *destination)
                .map(|r| StampedVersion {
                    stamp: r.stamp,
                    value: (),
                })
                .collect();
            resolve_latest(&versions, &view.stamp).is_some()
        });
        destinations
    }
}
