//! Logical expressions: an ordered, rooted, acyclic collection of logic nodes.
//!
//! Expressions are immutable once built. Every child index is smaller than
//! its parent's index, which rules out cycles by construction, and every node
//! is reachable from the root.

use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};

use crate::error::{ExpressionError, LogicResult};
use crate::id::{IdentifierService, Nid, StableId};

use super::node::{ConceptReference, LogicNode, NodeIdentity, NodeIndex};
use super::semantic::ConcreteDomainOperator;

/// Deepest nesting, counted in nodes from root to leaf, that an expression
/// or an encoded graph may have.
pub const MAX_DEPTH: usize = 512;

/// Expression whose concept references are process-local ids.
pub type InternalExpression = LogicalExpression<Nid>;

/// Expression whose concept references are stable ids.
pub type ExternalExpression = LogicalExpression<StableId>;

/// A rooted DAG of [`LogicNode`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawExpression<R>",
    bound(deserialize = "R: ConceptReference + Deserialize<'de>")
)]
pub struct LogicalExpression<R> {
    nodes: Vec<LogicNode<R>>,
    root: NodeIndex,
}

/// Unvalidated serde form; deserialization goes through [`LogicalExpression::new`].
#[derive(Deserialize)]
struct RawExpression<R> {
    nodes: Vec<LogicNode<R>>,
    root: NodeIndex,
}

impl<R: ConceptReference> TryFrom<RawExpression<R>> for LogicalExpression<R> {
    type Error = ExpressionError;

    fn try_from(raw: RawExpression<R>) -> Result<Self, Self::Error> {
        Self::new(raw.nodes, raw.root)
    }
}

/// Outcome of a depth-first traversal.
#[derive(Debug, Clone)]
pub struct TreeVisit {
    /// Nodes in visit (pre-)order.
    pub order: Vec<NodeIndex>,
    /// Distance from the root per node index; `None` for nodes not visited.
    pub distance: Vec<Option<usize>>,
    /// Parent through which each node was first reached.
    pub parent: Vec<Option<NodeIndex>>,
}

impl TreeVisit {
    pub fn distance(&self, index: NodeIndex) -> Option<usize> {
        self.distance.get(index.index()).copied().flatten()
    }

    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.parent.get(index.index()).copied().flatten()
    }
}

impl<R: ConceptReference> LogicalExpression<R> {
    /// Validate and assemble an expression.
    pub fn new(nodes: Vec<LogicNode<R>>, root: NodeIndex) -> Result<Self, ExpressionError> {
        if nodes.is_empty() {
            return Err(ExpressionError::Empty);
        }
        if root.index() >= nodes.len() {
            return Err(ExpressionError::OutOfBounds {
                index: root.0,
                len: nodes.len(),
            });
        }
        for (position, node) in nodes.iter().enumerate() {
            for child in node.children() {
                if child.index() >= nodes.len() {
                    return Err(ExpressionError::OutOfBounds {
                        index: child.0,
                        len: nodes.len(),
                    });
                }
                if child.index() >= position {
                    return Err(ExpressionError::ForwardReference {
                        parent: position as u32,
                        child: child.0,
                    });
                }
            }
        }
        // Children precede parents, so heights fill in one forward pass.
        let mut height = vec![0usize; nodes.len()];
        for (position, node) in nodes.iter().enumerate() {
            height[position] = 1 + node
                .children()
                .iter()
                .map(|c| height[c.index()])
                .max()
                .unwrap_or(0);
        }
        if height[root.index()] > MAX_DEPTH {
            return Err(ExpressionError::TooDeep {
                depth: height[root.index()],
                limit: MAX_DEPTH,
            });
        }

        let expression = Self { nodes, root };
        let visit = expression.depth_first(|_, _, _| {});
        if let Some(orphan) = visit.distance.iter().position(Option::is_none) {
            return Err(ExpressionError::Unreachable {
                index: orphan as u32,
                root: root.0,
            });
        }
        Ok(expression)
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node(&self, index: NodeIndex) -> Option<&LogicNode<R>> {
        self.nodes.get(index.index())
    }

    pub fn nodes(&self) -> &[LogicNode<R>] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Visit every node reachable from the root exactly once, descending
    /// into children in encoding order.
    ///
    /// The visitor receives `(node, index, depth)`. Shared subexpressions are
    /// visited at the depth through which they were first reached.
    pub fn depth_first(
        &self,
        mut visitor: impl FnMut(&LogicNode<R>, NodeIndex, usize),
    ) -> TreeVisit {
        let len = self.nodes.len();
        let mut seen = FixedBitSet::with_capacity(len);
        let mut order = Vec::with_capacity(len);
        let mut distance = vec![None; len];
        let mut parent = vec![None; len];

        let mut stack: Vec<(NodeIndex, usize, Option<NodeIndex>)> = vec![(self.root, 0, None)];
        while let Some((index, depth, from)) = stack.pop() {
            if seen.put(index.index()) {
                continue;
            }
            let node = &self.nodes[index.index()];
            order.push(index);
            distance[index.index()] = Some(depth);
            parent[index.index()] = from;
            visitor(node, index, depth);
            // Reverse so the first child is popped first.
            for child in node.children().iter().rev() {
                if !seen.contains(child.index()) {
                    stack.push((*child, depth + 1, Some(index)));
                }
            }
        }

        TreeVisit {
            order,
            distance,
            parent,
        }
    }

    /// Identity of every node, indexed like [`LogicalExpression::nodes`].
    pub fn identities(&self, ids: &dyn IdentifierService) -> LogicResult<Vec<NodeIdentity>> {
        let mut identities: Vec<NodeIdentity> = Vec::with_capacity(self.nodes.len());
        // Children precede parents, so a single forward pass suffices.
        for node in &self.nodes {
            let identity = node.identity(ids, |child| identities[child.index()])?;
            identities.push(identity);
        }
        Ok(identities)
    }

    /// Identity of the root node: the identity of the whole expression.
    pub fn root_identity(&self, ids: &dyn IdentifierService) -> LogicResult<NodeIdentity> {
        Ok(self.identities(ids)?[self.root.index()])
    }

    /// Re-express every concept reference in another identifier space.
    pub fn convert<T: ConceptReference>(
        &self,
        ids: &dyn IdentifierService,
    ) -> LogicResult<LogicalExpression<T>> {
        let nodes = self
            .nodes
            .iter()
            .map(|node| node.convert::<T>(ids))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LogicalExpression {
            nodes,
            root: self.root,
        })
    }

    /// Whether `other` has the same shape and content as `self`, node for
    /// node, starting at both roots. Indices may differ.
    pub fn is_isomorphic(&self, other: &LogicalExpression<R>) -> bool {
        fn walk<R: ConceptReference>(
            a: &LogicalExpression<R>,
            ai: NodeIndex,
            b: &LogicalExpression<R>,
            bi: NodeIndex,
        ) -> bool {
            let (Some(na), Some(nb)) = (a.node(ai), b.node(bi)) else {
                return false;
            };
            if na.semantic() != nb.semantic() || !na.same_content(nb) {
                return false;
            }
            let (ca, cb) = (na.children(), nb.children());
            ca.len() == cb.len() && ca.iter().zip(cb).all(|(x, y)| walk(a, *x, b, *y))
        }
        self.node_count() == other.node_count() && walk(self, self.root, other, other.root)
    }

    /// Indented rendering: one node per line, four spaces per depth level.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.depth_first(|node, index, depth| {
            for _ in 0..depth {
                out.push_str("    ");
            }
            out.push_str(&node.describe(index));
            out.push('\n');
        });
        out
    }
}

impl<R: ConceptReference> std::fmt::Display for LogicalExpression<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Incrementally assembles an expression bottom-up.
///
/// Each method appends one node and returns its index, so children always
/// precede their parents.
#[derive(Debug, Clone)]
pub struct ExpressionBuilder<R> {
    nodes: Vec<LogicNode<R>>,
}

impl<R: ConceptReference> ExpressionBuilder<R> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn push(&mut self, node: LogicNode<R>) -> NodeIndex {
        self.nodes.push(node);
        NodeIndex(self.nodes.len() as u32 - 1)
    }

    pub fn concept(&mut self, concept: R) -> NodeIndex {
        self.push(LogicNode::Concept { concept })
    }

    pub fn some_role(&mut self, role_type: R, child: NodeIndex) -> NodeIndex {
        self.push(LogicNode::RoleSome { role_type, child })
    }

    pub fn all_role(&mut self, role_type: R, child: NodeIndex) -> NodeIndex {
        self.push(LogicNode::RoleAll { role_type, child })
    }

    pub fn feature(
        &mut self,
        feature_type: R,
        operator: ConcreteDomainOperator,
        units: R,
        child: NodeIndex,
    ) -> NodeIndex {
        self.push(LogicNode::Feature {
            feature_type,
            operator,
            units,
            child,
        })
    }

    pub fn and(&mut self, children: impl Into<Vec<NodeIndex>>) -> NodeIndex {
        self.push(LogicNode::And {
            children: children.into(),
        })
    }

    pub fn or(&mut self, children: impl Into<Vec<NodeIndex>>) -> NodeIndex {
        self.push(LogicNode::Or {
            children: children.into(),
        })
    }

    pub fn necessary_set(&mut self, children: impl Into<Vec<NodeIndex>>) -> NodeIndex {
        self.push(LogicNode::NecessarySet {
            children: children.into(),
        })
    }

    pub fn sufficient_set(&mut self, children: impl Into<Vec<NodeIndex>>) -> NodeIndex {
        self.push(LogicNode::SufficientSet {
            children: children.into(),
        })
    }

    pub fn boolean(&mut self, value: bool) -> NodeIndex {
        self.push(LogicNode::LiteralBoolean(value))
    }

    pub fn float(&mut self, value: f32) -> NodeIndex {
        self.push(LogicNode::LiteralFloat(value))
    }

    pub fn instant(&mut self, millis: i64) -> NodeIndex {
        self.push(LogicNode::LiteralInstant(millis))
    }

    pub fn integer(&mut self, value: i32) -> NodeIndex {
        self.push(LogicNode::LiteralInteger(value))
    }

    pub fn string(&mut self, value: impl Into<String>) -> NodeIndex {
        self.push(LogicNode::LiteralString(value.into()))
    }

    /// Append a DEFINITION_ROOT over `children` and finish the expression.
    pub fn definition(
        mut self,
        children: impl Into<Vec<NodeIndex>>,
    ) -> Result<LogicalExpression<R>, ExpressionError> {
        let root = self.push(LogicNode::DefinitionRoot {
            children: children.into(),
        });
        self.build(root)
    }

    /// Finish the expression with an explicit root.
    pub fn build(self, root: NodeIndex) -> Result<LogicalExpression<R>, ExpressionError> {
        LogicalExpression::new(self.nodes, root)
    }
}

impl<R: ConceptReference> Default for ExpressionBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}
