//! Immutable is-a graph over concept sequences, plus the associative
//! accumulator it is reduced from.

use std::collections::HashSet;

use fixedbitset::FixedBitSet;
use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;

use crate::id::{ConceptSequence, Nid};
use crate::stamp::PremiseType;

/// An is-a edge that could not be placed because its destination does not
/// resolve to a concept sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DroppedEdge {
    pub origin: ConceptSequence,
    pub destination: Nid,
}

/// Partial taxonomy built by one worker.
///
/// `accumulate` folds a single concept's edges in; `combine` merges two
/// partials. Both are order-independent: any partition of the universe and
/// any merge tree yields the same [`TaxonomyGraph`] from [`finish`].
///
/// [`finish`]: GraphAccumulator::finish
#[derive(Debug, Clone, Default)]
pub struct GraphAccumulator {
    edges: HashSet<(ConceptSequence, ConceptSequence)>,
    members: FixedBitSet,
    dropped: HashSet<DroppedEdge>,
}

impl GraphAccumulator {
    /// An empty accumulator sized for `universe` concept sequences.
    pub fn with_capacity(universe: usize) -> Self {
        Self {
            edges: HashSet::new(),
            members: FixedBitSet::with_capacity(universe),
            dropped: HashSet::new(),
        }
    }

    /// Fold one concept and its resolved (or unresolvable) parents in.
    ///
    /// The origin becomes a member even when it has no parents.
    pub fn accumulate(
        &mut self,
        origin: ConceptSequence,
        parents: impl IntoIterator<Item = Result<ConceptSequence, Nid>>,
    ) {
        self.insert_member(origin);
        for parent in parents {
            match parent {
                Ok(parent) => {
                    self.insert_member(parent);
                    self.edges.insert((origin, parent));
                }
                Err(destination) => {
                    tracing::warn!(
                        origin = %origin,
                        destination = %destination,
                        "dropping is-a edge to unresolvable concept"
                    );
                    self.dropped.insert(DroppedEdge {
                        origin,
                        destination,
                    });
                }
            }
        }
    }

    /// Merge two partials.
    pub fn combine(mut self, mut other: Self) -> Self {
        if other.edges.len() > self.edges.len() {
            std::mem::swap(&mut self, &mut other);
        }
        self.edges.extend(other.edges);
        if other.members.len() > self.members.len() {
            self.members.grow(other.members.len());
        }
        self.members.union_with(&other.members);
        self.dropped.extend(other.dropped);
        self
    }

    fn insert_member(&mut self, sequence: ConceptSequence) {
        if sequence.index() >= self.members.len() {
            self.members.grow(sequence.index() + 1);
        }
        self.members.insert(sequence.index());
    }

    /// Freeze into a [`TaxonomyGraph`].
    pub fn finish(self, premise: PremiseType) -> TaxonomyGraph {
        let mut graph = DiGraphMap::with_capacity(self.members.count_ones(..), self.edges.len());
        for member in self.members.ones() {
            graph.add_node(ConceptSequence(member as u32));
        }
        let mut with_parents = FixedBitSet::with_capacity(self.members.len());
        let mut with_children = FixedBitSet::with_capacity(self.members.len());
        for (child, parent) in self.edges {
            with_parents.insert(child.index());
            with_children.insert(parent.index());
            graph.add_edge(child, parent, ());
        }
        let mut dropped: Vec<DroppedEdge> = self.dropped.into_iter().collect();
        dropped.sort();
        TaxonomyGraph {
            premise,
            graph,
            members: self.members,
            with_parents,
            with_children,
            dropped,
        }
    }
}

/// Is-a graph for one premise type. Edges point from child to parent.
///
/// No transitive closure is performed: only the edges the records assert
/// are present.
#[derive(Debug, Clone)]
pub struct TaxonomyGraph {
    premise: PremiseType,
    graph: DiGraphMap<ConceptSequence, ()>,
    members: FixedBitSet,
    with_parents: FixedBitSet,
    with_children: FixedBitSet,
    dropped: Vec<DroppedEdge>,
}

impl TaxonomyGraph {
    pub fn premise(&self) -> PremiseType {
        self.premise
    }

    /// Number of member concepts.
    pub fn concept_count(&self) -> usize {
        self.members.count_ones(..)
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All edges as `(child, parent)`, sorted.
    pub fn edges(&self) -> Vec<(ConceptSequence, ConceptSequence)> {
        let mut edges: Vec<_> = self.graph.all_edges().map(|(c, p, _)| (c, p)).collect();
        edges.sort();
        edges
    }

    pub fn contains_edge(&self, child: ConceptSequence, parent: ConceptSequence) -> bool {
        self.graph.contains_edge(child, parent)
    }

    pub fn is_member(&self, concept: ConceptSequence) -> bool {
        self.members.contains(concept.index())
    }

    pub fn members(&self) -> &FixedBitSet {
        &self.members
    }

    /// Concepts with at least one parent.
    pub fn concepts_with_parents(&self) -> &FixedBitSet {
        &self.with_parents
    }

    /// Concepts with at least one child.
    pub fn concepts_with_children(&self) -> &FixedBitSet {
        &self.with_children
    }

    /// Direct parents, sorted.
    pub fn parents(&self, concept: ConceptSequence) -> Vec<ConceptSequence> {
        self.neighbors(concept, Direction::Outgoing)
    }

    /// Direct children, sorted.
    pub fn children(&self, concept: ConceptSequence) -> Vec<ConceptSequence> {
        self.neighbors(concept, Direction::Incoming)
    }

    /// Members without parents, sorted.
    pub fn roots(&self) -> Vec<ConceptSequence> {
        self.members
            .ones()
            .filter(|i| !self.with_parents.contains(*i))
            .map(|i| ConceptSequence(i as u32))
            .collect()
    }

    /// Transitive parents, excluding `concept` itself unless it lies on a cycle.
    pub fn ancestors(&self, concept: ConceptSequence) -> FixedBitSet {
        self.reach(concept, Direction::Outgoing)
    }

    /// Transitive children, excluding `concept` itself unless it lies on a cycle.
    pub fn descendants(&self, concept: ConceptSequence) -> FixedBitSet {
        self.reach(concept, Direction::Incoming)
    }

    /// Edges dropped during the build because their destination did not resolve.
    pub fn dropped_edges(&self) -> &[DroppedEdge] {
        &self.dropped
    }

    fn neighbors(&self, concept: ConceptSequence, direction: Direction) -> Vec<ConceptSequence> {
        if !self.graph.contains_node(concept) {
            return Vec::new();
        }
        let mut out: Vec<_> = self.graph.neighbors_directed(concept, direction).collect();
        out.sort();
        out
    }

    fn reach(&self, concept: ConceptSequence, direction: Direction) -> FixedBitSet {
        let mut seen = FixedBitSet::with_capacity(self.members.len());
        if !self.graph.contains_node(concept) {
            return seen;
        }
        let mut stack = vec![concept];
        while let Some(current) = stack.pop() {
            for next in self.graph.neighbors_directed(current, direction) {
                if !seen.put(next.index()) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    /// Indented tree from the roots downward, children in sequence order.
    /// A concept reached through several parents is printed under each one.
    pub fn render(&self, label: impl Fn(ConceptSequence) -> String) -> String {
        let mut out = String::new();
        let mut path = FixedBitSet::with_capacity(self.members.len());
        for root in self.roots() {
            self.render_from(root, 0, &label, &mut path, &mut out);
        }
        out
    }

    fn render_from(
        &self,
        concept: ConceptSequence,
        depth: usize,
        label: &impl Fn(ConceptSequence) -> String,
        path: &mut FixedBitSet,
        out: &mut String,
    ) {
        out.push_str(&"    ".repeat(depth));
        out.push_str(&label(concept));
        out.push('\n');
        path.insert(concept.index());
        for child in self.children(concept) {
            if !path.contains(child.index()) {
                self.render_from(child, depth + 1, label, path, out);
            }
        }
        path.set(concept.index(), false);
    }
}

impl PartialEq for TaxonomyGraph {
    fn eq(&self, other: &Self) -> bool {
        self.premise == other.premise
            && self.members.ones().eq(other.members.ones())
            && self.edges() == other.edges()
            && self.dropped == other.dropped
    }
}

impl Eq for TaxonomyGraph {}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: u32) -> ConceptSequence {
        ConceptSequence(n)
    }

    fn chain() -> TaxonomyGraph {
        // 0 is-a 1, 1 is-a 2, 3 is-a 2, 4 isolated
        let mut acc = GraphAccumulator::with_capacity(5);
        acc.accumulate(seq(0), [Ok(seq(1))]);
        acc.accumulate(seq(1), [Ok(seq(2))]);
        acc.accumulate(seq(2), []);
        acc.accumulate(seq(3), [Ok(seq(2))]);
        acc.accumulate(seq(4), []);
        acc.finish(PremiseType::Stated)
    }

    #[test]
    fn accumulate_records_edges_and_members() {
        let graph = chain();
        assert_eq!(graph.edges(), vec![(seq(0), seq(1)), (seq(1), seq(2)), (seq(3), seq(2))]);
        assert_eq!(graph.concept_count(), 5);
        assert!(graph.is_member(seq(4)));
        assert!(!graph.contains_edge(seq(0), seq(2)));
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut acc = GraphAccumulator::with_capacity(2);
        acc.accumulate(seq(0), [Ok(seq(1)), Ok(seq(1))]);
        acc.accumulate(seq(0), [Ok(seq(1))]);
        assert_eq!(acc.finish(PremiseType::Stated).edge_count(), 1);
    }

    #[test]
    fn queries() {
        let graph = chain();
        assert_eq!(graph.parents(seq(0)), vec![seq(1)]);
        assert_eq!(graph.children(seq(2)), vec![seq(1), seq(3)]);
        assert_eq!(graph.roots(), vec![seq(2), seq(4)]);
        assert_eq!(graph.ancestors(seq(0)).ones().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(graph.descendants(seq(2)).ones().collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(graph.concepts_with_parents().ones().collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(graph.concepts_with_children().ones().collect::<Vec<_>>(), vec![1, 2]);
        assert!(graph.parents(seq(99)).is_empty());
    }

    #[test]
    fn unresolvable_destination_is_dropped() {
        let mut acc = GraphAccumulator::with_capacity(1);
        acc.accumulate(seq(0), [Err(Nid(-5)), Ok(seq(1))]);
        let graph = acc.finish(PremiseType::Inferred);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(
            graph.dropped_edges(),
            &[DroppedEdge {
                origin: seq(0),
                destination: Nid(-5)
            }]
        );
    }

    #[test]
    fn combine_grows_membership() {
        let mut small = GraphAccumulator::with_capacity(1);
        small.accumulate(seq(0), []);
        let mut large = GraphAccumulator::with_capacity(1);
        large.accumulate(seq(7), [Ok(seq(8))]);
        let graph = small.combine(large).finish(PremiseType::Stated);
        assert_eq!(graph.members().ones().collect::<Vec<_>>(), vec![0, 7, 8]);
    }

    #[test]
    fn merge_order_and_partition_do_not_matter() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::{Rng, SeedableRng};

        // (origin, parents); parent 99 stands for an unresolvable destination.
        let work: Vec<(u32, Vec<u32>)> = vec![
            (0, vec![1, 2]),
            (1, vec![3]),
            (2, vec![3, 99]),
            (3, vec![]),
            (4, vec![0, 3]),
            (5, vec![4]),
            (6, vec![]),
            (7, vec![5, 1, 1]),
        ];
        let fold = |items: &[(u32, Vec<u32>)]| {
            let mut acc = GraphAccumulator::with_capacity(8);
            for (origin, parents) in items {
                acc.accumulate(
                    seq(*origin),
                    parents.iter().map(|&p| {
                        if p == 99 { Err(Nid(-99)) } else { Ok(seq(p)) }
                    }),
                );
            }
            acc
        };
        let expected = fold(&work).finish(PremiseType::Stated);

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let mut shuffled = work.clone();
            shuffled.shuffle(&mut rng);

            let groups = rng.gen_range(1..=shuffled.len());
            let mut cuts: Vec<usize> = (0..groups - 1)
                .map(|_| rng.gen_range(0..=shuffled.len()))
                .collect();
            cuts.push(0);
            cuts.push(shuffled.len());
            cuts.sort_unstable();

            let mut partials: Vec<GraphAccumulator> =
                cuts.windows(2).map(|w| fold(&shuffled[w[0]..w[1]])).collect();
            while partials.len() > 1 {
                let i = rng.gen_range(0..partials.len());
                let a = partials.swap_remove(i);
                let j = rng.gen_range(0..partials.len());
                let b = partials.swap_remove(j);
                partials.push(if rng.gen_bool(0.5) { a.combine(b) } else { b.combine(a) });
            }
            let merged = partials.pop().unwrap().finish(PremiseType::Stated);
            assert_eq!(merged, expected);
        }
    }

    #[test]
    fn render_indents_children() {
        let graph = chain();
        let text = graph.render(|s| s.to_string());
        assert_eq!(
            text,
            "seq:2\n    seq:1\n        seq:0\n    seq:3\nseq:4\n"
        );
    }
}
