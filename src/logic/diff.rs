//! Maximal-common-subgraph diff between two versions of a definition.
//!
//! A greedy, top-down structural matcher. Nodes of the subject expression are
//! visited depth-first; each one is matched against candidate nodes of the
//! other expression:
//!
//! 1. The subject root is tried against the other root.
//! 2. A node whose parent is matched is tried against the children of its
//!    parent's partner, which keeps every matched edge an edge of both
//!    expressions.
//! 3. A node left without a partner by 1 or 2 may match any unused node of
//!    the other expression whose whole subtree is equal (a moved
//!    subexpression).
//!
//! Candidates must agree on semantic and typed fields. Among candidates, a
//! fully equal subtree wins, then the candidate at the same index, then the
//! smallest index. Plain smallest-index choice would pair duplicate
//! siblings crosswise; the first two keys keep `diff(G, G)` the identity
//! mapping. The result is best-effort and not symmetric: matching A against
//! B and B against A may disagree on ties.

use std::collections::HashMap;

use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};

use super::expression::LogicalExpression;
use super::node::{ConceptReference, NodeIndex};

/// Mapping from subject node indices to equivalent node indices of the other
/// expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSolution {
    mapping: Vec<Option<NodeIndex>>,
}

impl DiffSolution {
    /// Sentinel used by the flat integer form for "no equivalent node".
    pub const NO_MATCH: i32 = -1;

    pub fn get(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.mapping.get(index.index()).copied().flatten()
    }

    pub fn mapping(&self) -> &[Option<NodeIndex>] {
        &self.mapping
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Matched `(subject, other)` pairs in subject index order.
    pub fn matched(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.mapping
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.map(|j| (NodeIndex(i as u32), j)))
    }

    pub fn matched_count(&self) -> usize {
        self.mapping.iter().filter(|m| m.is_some()).count()
    }

    /// Flat form with [`DiffSolution::NO_MATCH`] for unmatched nodes.
    pub fn to_sentinel_array(&self) -> Vec<i32> {
        self.mapping
            .iter()
            .map(|m| m.map_or(Self::NO_MATCH, |j| j.0 as i32))
            .collect()
    }

    pub fn from_sentinel_array(flat: &[i32]) -> Self {
        Self {
            mapping: flat
                .iter()
                .map(|&j| u32::try_from(j).ok().map(NodeIndex))
                .collect(),
        }
    }

    /// `(i->j)` for every matched pair.
    pub fn render_forward(&self) -> String {
        self.matched().map(|(i, j)| format!("({i}->{j})")).collect()
    }

    /// `(i<-j)` for every matched pair, for a diff computed in the opposite
    /// direction.
    pub fn render_backward(&self) -> String {
        self.matched().map(|(i, j)| format!("({i}<-{j})")).collect()
    }
}

impl<R: ConceptReference> LogicalExpression<R> {
    /// Match nodes of `self` to equivalent nodes of `other`.
    pub fn maximal_common_subgraph(&self, other: &LogicalExpression<R>) -> DiffSolution {
        let mut matcher = Matcher {
            a: self,
            b: other,
            deep: HashMap::new(),
        };
        let visit = self.depth_first(|_, _, _| {});

        let mut mapping: Vec<Option<NodeIndex>> = vec![None; self.node_count()];
        let mut used = FixedBitSet::with_capacity(other.node_count());

        for &ai in &visit.order {
            let context: Vec<NodeIndex> = match visit.parent(ai) {
                None => vec![other.root()],
                Some(pa) => match mapping[pa.index()] {
                    Some(pb) => other.nodes()[pb.index()].children().to_vec(),
                    None => Vec::new(),
                },
            };
            let mut best = matcher.best(ai, context.iter().copied(), &used, false);
            if best.is_none() {
                // Moved subexpression: anywhere, but only a whole equal subtree.
                best = matcher.best(
                    ai,
                    (0..other.node_count() as u32).map(NodeIndex),
                    &used,
                    true,
                );
            }
            if let Some(bj) = best {
                mapping[ai.index()] = Some(bj);
                used.insert(bj.index());
            }
        }

        DiffSolution { mapping }
    }
}

struct Matcher<'a, R> {
    a: &'a LogicalExpression<R>,
    b: &'a LogicalExpression<R>,
    deep: HashMap<(NodeIndex, NodeIndex), bool>,
}

impl<R: ConceptReference> Matcher<'_, R> {
    /// Pick the best unused candidate for `ai`.
    fn best(
        &mut self,
        ai: NodeIndex,
        candidates: impl Iterator<Item = NodeIndex>,
        used: &FixedBitSet,
        require_deep: bool,
    ) -> Option<NodeIndex> {
        let (a, b) = (self.a, self.b);
        let na = &a.nodes()[ai.index()];
        let mut best: Option<((bool, bool, u32), NodeIndex)> = None;
        for bj in candidates {
            if used.contains(bj.index()) {
                continue;
            }
            let nb = &b.nodes()[bj.index()];
            if na.semantic() != nb.semantic() || !na.same_content(nb) {
                continue;
            }
            let deep = self.deep_eq(ai, bj);
            if require_deep && !deep {
                continue;
            }
            // Lower is better: equal subtree, then same index, then smallest index.
            let rank = (!deep, bj != ai, bj.0);
            if best.is_none_or(|(r, _)| rank < r) {
                best = Some((rank, bj));
            }
        }
        best.map(|(_, bj)| bj)
    }

    /// Whether the subtrees rooted at `ai` and `bj` are equal, treating
    /// commutative children as multisets.
    fn deep_eq(&mut self, ai: NodeIndex, bj: NodeIndex) -> bool {
        if let Some(&known) = self.deep.get(&(ai, bj)) {
            return known;
        }
        let (a, b) = (self.a, self.b);
        let na = &a.nodes()[ai.index()];
        let nb = &b.nodes()[bj.index()];
        let equal = if na.semantic() != nb.semantic() || !na.same_content(nb) {
            false
        } else {
            let (ca, cb) = (na.children(), nb.children());
            if ca.len() != cb.len() {
                false
            } else if na.semantic().is_commutative() {
                let mut taken = vec![false; cb.len()];
                ca.iter().all(|&x| {
                    let slot = (0..cb.len()).find(|&k| !taken[k] && self.deep_eq(x, cb[k]));
                    match slot {
                        Some(k) => {
                            taken[k] = true;
                            true
                        }
                        None => false,
                    }
                })
            } else {
                ca.iter().zip(cb).all(|(&x, &y)| self.deep_eq(x, y))
            }
        };
        self.deep.insert((ai, bj), equal);
        equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{MemoryIdentifierService, Nid, StableId};
    use crate::logic::expression::{ExpressionBuilder, InternalExpression};
    use uuid::Uuid;

    fn nids(n: u128) -> Vec<Nid> {
        let ids = MemoryIdentifierService::new();
        (1..=n)
            .map(|i| ids.register_concept(StableId(Uuid::from_u128(i))))
            .collect()
    }

    /// root -> NECESSARY(AND(parent, SOME(role, filler)))
    fn definition(parent: Nid, role: Nid, filler: Nid) -> InternalExpression {
        let mut b = ExpressionBuilder::new();
        let p = b.concept(parent);
        let f = b.concept(filler);
        let s = b.some_role(role, f);
        let and = b.and([p, s]);
        let set = b.necessary_set([and]);
        b.definition([set]).unwrap()
    }

    #[test]
    fn diff_with_itself_is_identity() {
        let n = nids(3);
        let expr = definition(n[0], n[1], n[2]);
        let solution = expr.maximal_common_subgraph(&expr);
        for i in 0..expr.node_count() as u32 {
            assert_eq!(solution.get(NodeIndex(i)), Some(NodeIndex(i)));
        }
    }

    #[test]
    fn reflexive_with_duplicate_siblings() {
        let n = nids(1);
        let mut b = ExpressionBuilder::new();
        let x = b.concept(n[0]);
        let y = b.concept(n[0]);
        let and = b.and([y, x]);
        let expr = b.definition([and]).unwrap();
        let solution = expr.maximal_common_subgraph(&expr);
        assert_eq!(solution.to_sentinel_array(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn disjoint_expressions_map_to_sentinels() {
        let n = nids(2);
        let mut b = ExpressionBuilder::new();
        let c = b.concept(n[0]);
        let left = b.build(c).unwrap();

        let mut b = ExpressionBuilder::new();
        let v = b.integer(4);
        let role = b.all_role(n[1], v);
        let right = b.build(role).unwrap();

        let solution = left.maximal_common_subgraph(&right);
        assert!(solution.to_sentinel_array().iter().all(|&j| j == DiffSolution::NO_MATCH));
        assert_eq!(solution.matched_count(), 0);
    }

    #[test]
    fn changed_filler_keeps_the_rest_matched() {
        let n = nids(4);
        let before = definition(n[0], n[1], n[2]);
        let after = definition(n[0], n[1], n[3]);
        let solution = after.maximal_common_subgraph(&before);

        // root, set, and, parent and role match; the changed filler does not.
        assert_eq!(solution.get(NodeIndex(5)), Some(NodeIndex(5)));
        assert_eq!(solution.get(NodeIndex(4)), Some(NodeIndex(4)));
        assert_eq!(solution.get(NodeIndex(3)), Some(NodeIndex(3)));
        assert_eq!(solution.get(NodeIndex(0)), Some(NodeIndex(0)));
        assert_eq!(solution.get(NodeIndex(2)), Some(NodeIndex(2)));
        assert_eq!(solution.get(NodeIndex(1)), None);
    }

    #[test]
    fn moved_subexpression_is_found() {
        let n = nids(3);
        let necessary = definition(n[0], n[1], n[2]);

        let mut b = ExpressionBuilder::new();
        let p = b.concept(n[0]);
        let f = b.concept(n[2]);
        let s = b.some_role(n[1], f);
        let and = b.and([p, s]);
        let set = b.sufficient_set([and]);
        let sufficient = b.definition([set]).unwrap();

        let solution = necessary.maximal_common_subgraph(&sufficient);
        assert_eq!(solution.get(NodeIndex(5)), Some(NodeIndex(5)));
        assert_eq!(solution.get(NodeIndex(4)), None);
        assert_eq!(solution.get(NodeIndex(3)), Some(NodeIndex(3)));
        assert_eq!(solution.get(NodeIndex(1)), Some(NodeIndex(1)));
    }

    #[test]
    fn reordered_children_match_by_content() {
        let n = nids(2);
        let mut b = ExpressionBuilder::new();
        let x = b.concept(n[0]);
        let y = b.concept(n[1]);
        let and = b.and([x, y]);
        let left = b.definition([and]).unwrap();

        let mut b = ExpressionBuilder::new();
        let y = b.concept(n[1]);
        let x = b.concept(n[0]);
        let and = b.and([y, x]);
        let right = b.definition([and]).unwrap();

        let solution = left.maximal_common_subgraph(&right);
        assert_eq!(solution.get(NodeIndex(0)), Some(NodeIndex(1)));
        assert_eq!(solution.get(NodeIndex(1)), Some(NodeIndex(0)));
    }

    #[test]
    fn ties_prefer_smallest_index_and_are_not_symmetric() {
        let n = nids(1);
        // left: AND(x)
        let mut b = ExpressionBuilder::new();
        let x = b.concept(n[0]);
        let and = b.and([x]);
        let left = b.definition([and]).unwrap();
        // right: AND(x, x)
        let mut b = ExpressionBuilder::new();
        let x1 = b.concept(n[0]);
        let x2 = b.concept(n[0]);
        let and = b.and([x2, x1]);
        let right = b.definition([and]).unwrap();

        let forward = left.maximal_common_subgraph(&right);
        assert_eq!(forward.get(NodeIndex(0)), Some(NodeIndex(0)));
        assert_eq!(forward.len(), 3);

        let backward = right.maximal_common_subgraph(&left);
        assert_eq!(backward.len(), 4);
        // Only one of the two equal siblings finds a partner.
        assert_eq!(
            backward.get(NodeIndex(0)).is_some() as u8 + backward.get(NodeIndex(1)).is_some() as u8,
            1
        );
    }

    #[test]
    fn sentinel_array_round_trips_and_renders() {
        let solution = DiffSolution::from_sentinel_array(&[2, -1, 0]);
        assert_eq!(solution.get(NodeIndex(1)), None);
        assert_eq!(solution.to_sentinel_array(), vec![2, -1, 0]);
        assert_eq!(solution.render_forward(), "(0->2)(2->0)");
        assert_eq!(solution.render_backward(), "(0<-2)(2<-0)");
    }
}
