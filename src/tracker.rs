//! Change notification and the incremental classification tracker.
//!
//! [`ChangeNotifier`] fans definition commits out to registered
//! [`ChangeListener`]s. Registration returns a [`ListenerRegistration`]; the
//! notifier keeps the listener alive until that handle is dropped or
//! explicitly unregistered.
//!
//! [`IncrementalTracker`] is a passive listener that collects the concept
//! sequences whose stated definitions changed since the last completed
//! classification, and decides whether an incremental run is allowed.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::id::{ConceptSequence, IdentifierService, Nid};
use crate::stamp::Stamp;

/// "Concept X's definition in assemblage Y changed."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionChange {
    pub concept: Nid,
    pub assemblage: Nid,
    pub stamp: Stamp,
}

/// Receiver of definition commits. Called synchronously on the committing
/// thread.
pub trait ChangeListener: Send + Sync {
    fn definition_changed(&self, change: &DefinitionChange);
}

/// Registry of change listeners.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: DashMap<u64, Arc<dyn ChangeListener>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. The notifier holds it strongly until the
    /// returned handle goes away.
    pub fn register(self: &Arc<Self>, listener: Arc<dyn ChangeListener>) -> ListenerRegistration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, listener);
        tracing::debug!(listener = id, "change listener registered");
        ListenerRegistration {
            id,
            notifier: Arc::downgrade(self),
        }
    }

    /// Deliver `change` to every registered listener.
    pub fn notify(&self, change: &DefinitionChange) {
        // Snapshot first so listeners may register or unregister re-entrantly.
        let listeners: Vec<Arc<dyn ChangeListener>> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for listener in listeners {
            listener.definition_changed(change);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn unregister(&self, id: u64) {
        if self.listeners.remove(&id).is_some() {
            tracing::debug!(listener = id, "change listener unregistered");
        }
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Owning handle for one listener registration. Dropping it unsubscribes.
#[derive(Debug)]
pub struct ListenerRegistration {
    id: u64,
    notifier: Weak<ChangeNotifier>,
}

impl ListenerRegistration {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Unsubscribe now.
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.unregister(self.id);
        }
    }
}

/// When an incremental classification may be used instead of a full one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalPolicy {
    pub enabled: bool,
    /// More touched concepts than this forces a full run.
    pub max_touched: usize,
    /// Require at least one completed classification first.
    pub require_baseline: bool,
}

impl Default for IncrementalPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_touched: 10_000,
            require_baseline: true,
        }
    }
}

/// The touched set as one classification run saw it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSnapshot {
    pub touched: BTreeSet<ConceptSequence>,
    pub incremental: bool,
}

/// Collects concepts whose stated definitions changed since the last
/// completed classification.
pub struct IncrementalTracker {
    ids: Arc<dyn IdentifierService>,
    stated_assemblage: Nid,
    policy: IncrementalPolicy,
    touched: RwLock<BTreeSet<ConceptSequence>>,
    completed_runs: AtomicU64,
}

impl IncrementalTracker {
    pub fn new(
        ids: Arc<dyn IdentifierService>,
        stated_assemblage: Nid,
        policy: IncrementalPolicy,
    ) -> Self {
        Self {
            ids,
            stated_assemblage,
            policy,
            touched: RwLock::new(BTreeSet::new()),
            completed_runs: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> IncrementalPolicy {
        self.policy
    }

    /// Mark `sequence` as touched. Idempotent.
    pub fn record(&self, sequence: ConceptSequence) {
        self.touched
            .write()
            .expect("tracker lock poisoned")
            .insert(sequence);
    }

    /// Snapshot of the touched concepts.
    pub fn new_concepts(&self) -> BTreeSet<ConceptSequence> {
        self.touched.read().expect("tracker lock poisoned").clone()
    }

    pub fn touched_count(&self) -> usize {
        self.touched.read().expect("tracker lock poisoned").len()
    }

    /// Whether the touched set currently permits an incremental run.
    ///
    /// Never allowed with nothing touched, above `max_touched`, or before
    /// the first completed run when a baseline is required.
    pub fn incremental_allowed(&self) -> bool {
        self.allows(self.touched_count())
    }

    fn allows(&self, touched: usize) -> bool {
        if !self.policy.enabled {
            return false;
        }
        if self.policy.require_baseline && self.completed_runs() == 0 {
            return false;
        }
        touched > 0 && touched <= self.policy.max_touched
    }

    /// Snapshot the touched set and the incremental decision under one read
    /// lock, at the start of a classification.
    pub fn begin_run(&self) -> RunSnapshot {
        let touched = self.touched.read().expect("tracker lock poisoned");
        RunSnapshot {
            incremental: self.allows(touched.len()),
            touched: touched.clone(),
        }
    }

    /// A classification finished: start accumulating from empty again.
    pub fn classify_complete(&self) {
        let mut touched = self.touched.write().expect("tracker lock poisoned");
        let cleared = touched.len();
        touched.clear();
        drop(touched);
        self.completed_runs.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(cleared, "incremental tracker reset");
    }

    /// The run started from `snapshot` finished. Only the concepts it saw are
    /// cleared; concepts touched while it ran stay for the next run.
    pub fn classify_complete_for(&self, snapshot: &RunSnapshot) {
        let mut touched = self.touched.write().expect("tracker lock poisoned");
        touched.retain(|s| !snapshot.touched.contains(s));
        let remaining = touched.len();
        drop(touched);
        self.completed_runs.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(
            cleared = snapshot.touched.len(),
            remaining,
            "incremental tracker advanced"
        );
    }

    pub fn completed_runs(&self) -> u64 {
        self.completed_runs.load(Ordering::Acquire)
    }
}

impl ChangeListener for IncrementalTracker {
    fn definition_changed(&self, change: &DefinitionChange) {
        if change.assemblage != self.stated_assemblage {
            return;
        }
        match self.ids.local_to_sequence(change.concept) {
            Ok(sequence) => self.record(sequence),
            Err(e) => tracing::warn!(
                concept = %change.concept,
                error = %e,
                "ignoring definition change for concept without sequence"
            ),
        }
    }
}

impl std::fmt::Debug for IncrementalTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalTracker")
            .field("stated_assemblage", &self.stated_assemblage)
            .field("policy", &self.policy)
            .field("touched", &self.touched_count())
            .field("completed_runs", &self.completed_runs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{MemoryIdentifierService, StableId};
    use crate::stamp::Status;
    use uuid::Uuid;

    const STATED: Nid = Nid(7);

    fn tracker(policy: IncrementalPolicy) -> IncrementalTracker {
        IncrementalTracker::new(Arc::new(MemoryIdentifierService::new()), STATED, policy)
    }

    fn change(concept: Nid, assemblage: Nid) -> DefinitionChange {
        DefinitionChange {
            concept,
            assemblage,
            stamp: Stamp {
                status: Status::Active,
                time: 1,
                author: Nid(1),
                module: Nid(2),
                path: Nid(3),
            },
        }
    }

    #[test]
    fn lifecycle_collects_and_clears() {
        let t = tracker(IncrementalPolicy {
            require_baseline: false,
            ..IncrementalPolicy::default()
        });
        for n in [7, 3, 7, 9] {
            t.record(ConceptSequence(n));
        }
        let expected: BTreeSet<_> = [3, 7, 9].into_iter().map(ConceptSequence).collect();
        assert_eq!(t.new_concepts(), expected);
        assert!(t.incremental_allowed());

        t.classify_complete();
        assert!(t.new_concepts().is_empty());
        assert!(!t.incremental_allowed());
        assert_eq!(t.completed_runs(), 1);
    }

    #[test]
    fn completing_a_run_keeps_concepts_touched_after_it_began() {
        let t = tracker(IncrementalPolicy {
            require_baseline: false,
            ..IncrementalPolicy::default()
        });
        t.record(ConceptSequence(1));
        let run = t.begin_run();
        assert!(run.incremental);
        assert_eq!(run.touched, [ConceptSequence(1)].into_iter().collect());

        t.record(ConceptSequence(2));
        t.classify_complete_for(&run);
        assert_eq!(t.new_concepts(), [ConceptSequence(2)].into_iter().collect());
        assert_eq!(t.completed_runs(), 1);
    }

    #[test]
    fn policy_gates_incremental_runs() {
        let t = tracker(IncrementalPolicy {
            enabled: true,
            max_touched: 2,
            require_baseline: true,
        });
        t.record(ConceptSequence(1));
        assert!(!t.incremental_allowed(), "no baseline yet");

        t.classify_complete();
        t.record(ConceptSequence(1));
        assert!(t.incremental_allowed());
        t.record(ConceptSequence(2));
        t.record(ConceptSequence(3));
        assert!(!t.incremental_allowed(), "above max_touched");

        let disabled = tracker(IncrementalPolicy {
            enabled: false,
            require_baseline: false,
            ..IncrementalPolicy::default()
        });
        disabled.record(ConceptSequence(1));
        assert!(!disabled.incremental_allowed());
    }

    #[test]
    fn listener_tracks_only_stated_assemblage() {
        let ids = Arc::new(MemoryIdentifierService::new());
        let concept = ids.register_concept(StableId(Uuid::from_u128(42)));
        let t = IncrementalTracker::new(ids.clone(), STATED, IncrementalPolicy::default());

        t.definition_changed(&change(concept, Nid(8)));
        assert_eq!(t.touched_count(), 0);
        t.definition_changed(&change(concept, STATED));
        assert_eq!(t.touched_count(), 1);
        // Unknown concepts are skipped, not fatal.
        t.definition_changed(&change(Nid(12345), STATED));
        assert_eq!(t.touched_count(), 1);
    }

    #[test]
    fn registration_keeps_listener_alive_until_dropped() {
        let ids = Arc::new(MemoryIdentifierService::new());
        let concept = ids.register_concept(StableId(Uuid::from_u128(1)));
        let notifier = Arc::new(ChangeNotifier::new());

        let tracker = Arc::new(IncrementalTracker::new(
            ids,
            STATED,
            IncrementalPolicy::default(),
        ));
        let weak = Arc::downgrade(&tracker);
        let registration = notifier.register(tracker);
        assert_eq!(notifier.listener_count(), 1);

        notifier.notify(&change(concept, STATED));
        let alive = weak.upgrade().expect("notifier owns the tracker");
        assert_eq!(alive.touched_count(), 1);
        drop(alive);

        registration.unregister();
        assert_eq!(notifier.listener_count(), 0);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn concurrent_records_and_reads_are_consistent() {
        let t = Arc::new(tracker(IncrementalPolicy::default()));
        let handles: Vec<_> = (0..4u32)
            .map(|worker| {
                let t = Arc::clone(&t);
                std::thread::spawn(move || {
                    for n in 0..250 {
                        t.record(ConceptSequence(worker * 250 + n));
                        let _ = t.new_concepts().len();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(t.touched_count(), 1000);
    }
}
