//! Versioned definition storage and latest-version resolution.
//!
//! A concept's definition in one assemblage is kept as one or more
//! chronologies, each an append-only list of stamped versions. Under a
//! [`StampCoordinate`] each chronology resolves to at most one latest
//! version, possibly with contradictions attached: concurrent versions
//! (same commit time) that the view's module precedence does not order.
//! Contradictions are returned alongside the primary version, never
//! discarded. More than one chronology with a visible latest version is an
//! ambiguity and surfaces as [`VersionError::Ambiguous`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::VersionError;
use crate::id::Nid;
use crate::logic::InternalExpression;
use crate::stamp::{Stamp, StampCoordinate};
use crate::tracker::{ChangeNotifier, DefinitionChange};

/// One version of a versioned record.
#[derive(Debug, Clone, PartialEq)]
pub struct StampedVersion<T> {
    pub stamp: Stamp,
    pub value: T,
}

/// The resolved latest version of a chronology under a view.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestVersion<T> {
    latest: StampedVersion<T>,
    contradictions: Vec<StampedVersion<T>>,
}

impl<T> LatestVersion<T> {
    pub fn value(&self) -> &T {
        &self.latest.value
    }

    pub fn stamp(&self) -> &Stamp {
        &self.latest.stamp
    }

    pub fn version(&self) -> &StampedVersion<T> {
        &self.latest
    }

    /// Concurrent alternatives the view could not order before the primary.
    pub fn contradictions(&self) -> &[StampedVersion<T>] {
        &self.contradictions
    }

    pub fn has_contradictions(&self) -> bool {
        !self.contradictions.is_empty()
    }

    pub fn into_parts(self) -> (StampedVersion<T>, Vec<StampedVersion<T>>) {
        (self.latest, self.contradictions)
    }
}

/// Resolve the latest version among `versions` under `view`.
///
/// Only visible versions (path, time, module) are considered. Of those, the
/// ones sharing the greatest commit time compete; module precedence keeps
/// the best-ranked module's versions. Candidates whose status the view does
/// not allow are then removed, so a retired latest version hides the record
/// rather than resurrecting an older one. The remaining first candidate is
/// primary and the rest are contradictions.
pub fn resolve_latest<T: Clone>(
    versions: &[StampedVersion<T>],
    view: &StampCoordinate,
) -> Option<LatestVersion<T>> {
    let latest_time = versions
        .iter()
        .filter(|v| view.is_visible(&v.stamp))
        .map(|v| v.stamp.time)
        .max()?;

    let mut candidates: Vec<&StampedVersion<T>> = versions
        .iter()
        .filter(|v| view.is_visible(&v.stamp) && v.stamp.time == latest_time)
        .collect();

    let best_rank = candidates
        .iter()
        .map(|v| view.module_rank(v.stamp.module))
        .min()?;
    candidates.retain(|v| view.module_rank(v.stamp.module) == best_rank);
    candidates.retain(|v| view.allows_status(v.stamp.status));
    candidates.sort_by_key(|v| (v.stamp.module, v.stamp.author, v.stamp.status));

    let mut candidates = candidates.into_iter().cloned();
    let latest = candidates.next()?;
    Some(LatestVersion {
        latest,
        contradictions: candidates.collect(),
    })
}

/// Identifier of one chronology within a [`VersionStore`].
pub type ChronologyId = u64;

#[derive(Debug)]
struct Chronology {
    id: ChronologyId,
    versions: Vec<StampedVersion<InternalExpression>>,
}

/// In-memory store of definition chronologies keyed by (concept, assemblage).
///
/// Every commit is announced through the store's [`ChangeNotifier`] after
/// the version is visible to readers.
pub struct VersionStore {
    chronologies: DashMap<(Nid, Nid), Vec<Chronology>>,
    next_chronology: AtomicU64,
    notifier: Arc<ChangeNotifier>,
}

impl VersionStore {
    pub fn new(notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            chronologies: DashMap::new(),
            next_chronology: AtomicU64::new(1),
            notifier,
        }
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Append a version to the concept's primary chronology in
    /// `assemblage`, creating it if needed.
    pub fn commit(
        &self,
        concept: Nid,
        assemblage: Nid,
        stamp: Stamp,
        expression: InternalExpression,
    ) -> ChronologyId {
        let version = StampedVersion {
            stamp,
            value: expression,
        };
        let id = {
            let mut entry = self.chronologies.entry((concept, assemblage)).or_default();
            if entry.is_empty() {
                entry.push(Chronology {
                    id: self.next_chronology.fetch_add(1, Ordering::Relaxed),
                    versions: Vec::new(),
                });
            }
            let primary = &mut entry[0];
            primary.versions.push(version);
            primary.id
        };
        self.announce(concept, assemblage, stamp);
        id
    }

    /// Start an additional, independent chronology for the same concept and
    /// assemblage. Two chronologies with visible latest versions make the
    /// pair ambiguous.
    pub fn fork(
        &self,
        concept: Nid,
        assemblage: Nid,
        stamp: Stamp,
        expression: InternalExpression,
    ) -> ChronologyId {
        let id = self.next_chronology.fetch_add(1, Ordering::Relaxed);
        self.chronologies
            .entry((concept, assemblage))
            .or_default()
            .push(Chronology {
                id,
                versions: vec![StampedVersion {
                    stamp,
                    value: expression,
                }],
            });
        self.announce(concept, assemblage, stamp);
        id
    }

    fn announce(&self, concept: Nid, assemblage: Nid, stamp: Stamp) {
        self.notifier.notify(&DefinitionChange {
            concept,
            assemblage,
            stamp,
        });
    }

    /// The latest definition of `concept` in `assemblage` under `view`.
    pub fn latest(
        &self,
        concept: Nid,
        assemblage: Nid,
        view: &StampCoordinate,
    ) -> Result<Option<LatestVersion<InternalExpression>>, VersionError> {
        let Some(chronologies) = self.chronologies.get(&(concept, assemblage)) else {
            return Ok(None);
        };
        let mut resolved: Vec<_> = chronologies
            .iter()
            .filter_map(|c| resolve_latest(&c.versions, view))
            .collect();
        match resolved.len() {
            0 => Ok(None),
            1 => Ok(resolved.pop()),
            count => Err(VersionError::Ambiguous {
                concept: concept.0,
                assemblage: assemblage.0,
                count,
            }),
        }
    }

    /// Every chronology of the pair, each ordered by commit time.
    pub fn chronologies(
        &self,
        concept: Nid,
        assemblage: Nid,
    ) -> Vec<(ChronologyId, Vec<StampedVersion<InternalExpression>>)> {
        let Some(chronologies) = self.chronologies.get(&(concept, assemblage)) else {
            return Vec::new();
        };
        chronologies
            .iter()
            .map(|c| {
                let mut versions = c.versions.clone();
                versions.sort_by_key(|v| v.stamp.time);
                (c.id, versions)
            })
            .collect()
    }

    /// Concepts with at least one chronology in `assemblage`, sorted.
    pub fn concepts(&self, assemblage: Nid) -> Vec<Nid> {
        let mut concepts: Vec<Nid> = self
            .chronologies
            .iter()
            .filter(|entry| entry.key().1 == assemblage)
            .map(|entry| entry.key().0)
            .collect();
        concepts.sort();
        concepts
    }

    /// Total number of stored versions.
    pub fn version_count(&self) -> usize {
        self.chronologies
            .iter()
            .map(|entry| entry.value().iter().map(|c| c.versions.len()).sum::<usize>())
            .sum()
    }
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore")
            .field("chronologies", &self.chronologies.len())
            .field("versions", &self.version_count())
            .finish()
    }
}
