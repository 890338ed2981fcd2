//! Identifier spaces for concepts and components.
//!
//! Three identifier spaces coexist:
//!
//! - [`Nid`]: dense, process-local integer ("local id"), not stable across processes
//! - [`ConceptSequence`]: dense array index, only assigned to concepts
//! - [`StableId`]: globally stable 128-bit identifier
//!
//! The [`IdentifierService`] trait resolves between them. The registry itself is
//! external to this crate; [`MemoryIdentifierService`] is a concurrent in-memory
//! implementation used by tests, the CLI, and hosts without their own registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ResolutionError;

/// Result type for identifier lookups.
pub type IdResult<T> = std::result::Result<T, ResolutionError>;

/// Process-local integer identifier of a concept or component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Nid(pub i32);

impl std::fmt::Display for Nid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "nid:{}", self.0)
    }
}

/// Dense concept index, suitable for sizing bitsets over the concept universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ConceptSequence(pub u32);

impl ConceptSequence {
    /// The sequence as a bitset / vector index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ConceptSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Globally stable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StableId(pub Uuid);

impl StableId {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for StableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for StableId {
    fn from(uuid: Uuid) -> Self {
        StableId(uuid)
    }
}

/// Resolution between the three identifier spaces.
///
/// Every lookup is total for registered ids and fails with a
/// [`ResolutionError`] otherwise. Implementations must be safe to call
/// concurrently from the taxonomy builder's worker threads.
pub trait IdentifierService: Send + Sync {
    fn local_to_stable(&self, nid: Nid) -> IdResult<StableId>;

    fn stable_to_local(&self, stable: StableId) -> IdResult<Nid>;

    fn local_to_sequence(&self, nid: Nid) -> IdResult<ConceptSequence>;

    fn sequence_to_local(&self, sequence: ConceptSequence) -> IdResult<Nid>;

    /// Every concept sequence currently registered: the concept universe.
    fn concept_sequences(&self) -> Vec<ConceptSequence>;
}

/// Mints identifiers for concepts that do not exist yet.
pub trait ConceptMinter: Send + Sync {
    /// Register a concept for `stable`, returning its local id.
    ///
    /// Minting an already registered stable id returns the existing local id.
    fn mint_concept(&self, stable: StableId) -> Nid;
}

// ---------------------------------------------------------------------------
// In-memory registry
// ---------------------------------------------------------------------------

/// Concurrent in-memory identifier registry backed by `DashMap`s.
///
/// Local ids are allocated upward from `i32::MIN + 1`, concept sequences
/// upward from zero.
#[derive(Debug)]
pub struct MemoryIdentifierService {
    nid_to_stable: DashMap<Nid, StableId>,
    stable_to_nid: DashMap<StableId, Nid>,
    nid_to_sequence: DashMap<Nid, ConceptSequence>,
    sequence_to_nid: DashMap<ConceptSequence, Nid>,
    next_nid: AtomicI32,
    next_sequence: AtomicU32,
}

impl MemoryIdentifierService {
    pub fn new() -> Self {
        Self {
            nid_to_stable: DashMap::new(),
            stable_to_nid: DashMap::new(),
            nid_to_sequence: DashMap::new(),
            sequence_to_nid: DashMap::new(),
            next_nid: AtomicI32::new(i32::MIN + 1),
            next_sequence: AtomicU32::new(0),
        }
    }

    /// Register a concept (idempotent per stable id), assigning a local id
    /// and a concept sequence.
    pub fn register_concept(&self, stable: StableId) -> Nid {
        let nid = self.register_component(stable);
        self.nid_to_sequence.entry(nid).or_insert_with(|| {
            let sequence = ConceptSequence(self.next_sequence.fetch_add(1, Ordering::Relaxed));
            self.sequence_to_nid.insert(sequence, nid);
            sequence
        });
        nid
    }

    /// Register a non-concept component (idempotent). Components have no
    /// concept sequence.
    pub fn register_component(&self, stable: StableId) -> Nid {
        *self.stable_to_nid.entry(stable).or_insert_with(|| {
            let nid = Nid(self.next_nid.fetch_add(1, Ordering::Relaxed));
            self.nid_to_stable.insert(nid, stable);
            nid
        })
    }

    /// Number of registered concepts.
    pub fn concept_count(&self) -> usize {
        self.nid_to_sequence.len()
    }
}

impl Default for MemoryIdentifierService {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierService for MemoryIdentifierService {
    fn local_to_stable(&self, nid: Nid) -> IdResult<StableId> {
        self.nid_to_stable
            .get(&nid)
            .map(|e| *e.value())
            .ok_or(ResolutionError::UnknownLocal { nid: nid.0 })
    }

    fn stable_to_local(&self, stable: StableId) -> IdResult<Nid> {
        self.stable_to_nid
            .get(&stable)
            .map(|e| *e.value())
            .ok_or(ResolutionError::UnknownStable { uuid: stable.0 })
    }

    fn local_to_sequence(&self, nid: Nid) -> IdResult<ConceptSequence> {
        self.nid_to_sequence
            .get(&nid)
            .map(|e| *e.value())
            .ok_or(ResolutionError::NoSequence { nid: nid.0 })
    }

    fn sequence_to_local(&self, sequence: ConceptSequence) -> IdResult<Nid> {
        self.sequence_to_nid
            .get(&sequence)
            .map(|e| *e.value())
            .ok_or(ResolutionError::UnknownSequence {
                sequence: sequence.0,
            })
    }

    fn concept_sequences(&self) -> Vec<ConceptSequence> {
        let mut sequences: Vec<ConceptSequence> =
            self.sequence_to_nid.iter().map(|e| *e.key()).collect();
        sequences.sort_unstable();
        sequences
    }
}

impl ConceptMinter for MemoryIdentifierService {
    fn mint_concept(&self, stable: StableId) -> Nid {
        self.register_concept(stable)
    }
}

// ---------------------------------------------------------------------------
// Caching resolver
// ---------------------------------------------------------------------------

/// Memoizing wrapper around another [`IdentifierService`].
///
/// Stable-id lookups are cached after the first hit; misses and sequence
/// lookups always go to the inner service. Racing inserts keep the first
/// value.
pub struct CachingIdentifierService {
    inner: Arc<dyn IdentifierService>,
    stable: DashMap<Nid, StableId>,
    local: DashMap<StableId, Nid>,
}

impl CachingIdentifierService {
    pub fn new(inner: Arc<dyn IdentifierService>) -> Self {
        Self {
            inner,
            stable: DashMap::new(),
            local: DashMap::new(),
        }
    }

    /// Number of cached local → stable entries.
    pub fn cached_len(&self) -> usize {
        self.stable.len()
    }
}

impl IdentifierService for CachingIdentifierService {
    fn local_to_stable(&self, nid: Nid) -> IdResult<StableId> {
        if let Some(hit) = self.stable.get(&nid) {
            return Ok(*hit.value());
        }
        let resolved = self.inner.local_to_stable(nid)?;
        Ok(*self.stable.entry(nid).or_insert(resolved).value())
    }

    fn stable_to_local(&self, stable: StableId) -> IdResult<Nid> {
        if let Some(hit) = self.local.get(&stable) {
            return Ok(*hit.value());
        }
        let resolved = self.inner.stable_to_local(stable)?;
        Ok(*self.local.entry(stable).or_insert(resolved).value())
    }

    fn local_to_sequence(&self, nid: Nid) -> IdResult<ConceptSequence> {
        self.inner.local_to_sequence(nid)
    }

    fn sequence_to_local(&self, sequence: ConceptSequence) -> IdResult<Nid> {
        self.inner.sequence_to_local(sequence)
    }

    fn concept_sequences(&self) -> Vec<ConceptSequence> {
        self.inner.concept_sequences()
    }
}

impl std::fmt::Debug for CachingIdentifierService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingIdentifierService")
            .field("cached", &self.cached_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stable(n: u128) -> StableId {
        StableId(Uuid::from_u128(n))
    }

    #[test]
    fn register_concept_is_idempotent() {
        let ids = MemoryIdentifierService::new();
        let a = ids.register_concept(stable(1));
        let again = ids.register_concept(stable(1));
        assert_eq!(a, again);
        assert_eq!(ids.concept_count(), 1);
    }

    #[test]
    fn resolves_all_three_spaces() {
        let ids = MemoryIdentifierService::new();
        let a = ids.register_concept(stable(1));
        let b = ids.register_concept(stable(2));

        assert_eq!(ids.local_to_stable(b).unwrap(), stable(2));
        assert_eq!(ids.stable_to_local(stable(1)).unwrap(), a);
        assert_eq!(ids.local_to_sequence(a).unwrap(), ConceptSequence(0));
        assert_eq!(ids.local_to_sequence(b).unwrap(), ConceptSequence(1));
        assert_eq!(ids.sequence_to_local(ConceptSequence(1)).unwrap(), b);
        assert_eq!(
            ids.concept_sequences(),
            vec![ConceptSequence(0), ConceptSequence(1)]
        );
    }

    #[test]
    fn components_have_no_sequence() {
        let ids = MemoryIdentifierService::new();
        let c = ids.register_component(stable(9));
        assert!(matches!(
            ids.local_to_sequence(c),
            Err(ResolutionError::NoSequence { .. })
        ));
        assert!(ids.concept_sequences().is_empty());
    }

    #[test]
    fn unknown_ids_fail_to_resolve() {
        let ids = MemoryIdentifierService::new();
        assert!(matches!(
            ids.local_to_stable(Nid(5)),
            Err(ResolutionError::UnknownLocal { nid: 5 })
        ));
        assert!(ids.stable_to_local(stable(3)).is_err());
        assert!(ids.sequence_to_local(ConceptSequence(0)).is_err());
    }

    #[test]
    fn caching_resolver_matches_inner() {
        let inner = Arc::new(MemoryIdentifierService::new());
        let a = inner.register_concept(stable(1));
        let cache = CachingIdentifierService::new(inner.clone());

        assert_eq!(cache.local_to_stable(a).unwrap(), stable(1));
        assert_eq!(cache.local_to_stable(a).unwrap(), stable(1));
        assert_eq!(cache.cached_len(), 1);
        assert!(cache.local_to_stable(Nid(0)).is_err());
        assert_eq!(cache.cached_len(), 1);
    }

    #[test]
    fn caching_resolver_races_settle_consistently() {
        let inner = Arc::new(MemoryIdentifierService::new());
        let nids: Vec<Nid> = (0..64).map(|n| inner.register_concept(stable(n))).collect();
        let cache = Arc::new(CachingIdentifierService::new(inner));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let cache = &cache;
                let nids = &nids;
                scope.spawn(move || {
                    for (n, nid) in nids.iter().enumerate() {
                        assert_eq!(cache.local_to_stable(*nid).unwrap(), stable(n as u128));
                    }
                });
            }
        });
        assert_eq!(cache.cached_len(), 64);
    }
}
