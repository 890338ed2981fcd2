//! Logic nodes: one vertex of a logical-expression DAG.
//!
//! A node is a tagged variant over [`NodeSemantic`], generic over the concept
//! reference it carries. [`Nid`] references form the internal representation,
//! [`StableId`] references the external one. Conversion between the two goes
//! through an [`IdentifierService`] and is total for resolvable references.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::{IdResult, IdentifierService, Nid, StableId};

use super::semantic::{ConcreteDomainOperator, NodeSemantic};

/// Position of a node within its owning expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content-derived 128-bit identity of a node.
///
/// Equal for structurally equal nodes regardless of index, owning graph or
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeIdentity(pub Uuid);

impl std::fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A reference to a concept in one of the two identifier spaces.
pub trait ConceptReference:
    Copy + Eq + std::hash::Hash + std::fmt::Debug + std::fmt::Display + Send + Sync + 'static
{
    fn to_local(self, ids: &dyn IdentifierService) -> IdResult<Nid>;

    fn to_stable(self, ids: &dyn IdentifierService) -> IdResult<StableId>;

    fn from_local(nid: Nid, ids: &dyn IdentifierService) -> IdResult<Self>;

    fn from_stable(stable: StableId, ids: &dyn IdentifierService) -> IdResult<Self>;
}

impl ConceptReference for Nid {
    fn to_local(self, _ids: &dyn IdentifierService) -> IdResult<Nid> {
        Ok(self)
    }

    fn to_stable(self, ids: &dyn IdentifierService) -> IdResult<StableId> {
        ids.local_to_stable(self)
    }

    fn from_local(nid: Nid, _ids: &dyn IdentifierService) -> IdResult<Self> {
        Ok(nid)
    }

    fn from_stable(stable: StableId, ids: &dyn IdentifierService) -> IdResult<Self> {
        ids.stable_to_local(stable)
    }
}

impl ConceptReference for StableId {
    fn to_local(self, ids: &dyn IdentifierService) -> IdResult<Nid> {
        ids.stable_to_local(self)
    }

    fn to_stable(self, _ids: &dyn IdentifierService) -> IdResult<StableId> {
        Ok(self)
    }

    fn from_local(nid: Nid, ids: &dyn IdentifierService) -> IdResult<Self> {
        ids.local_to_stable(nid)
    }

    fn from_stable(stable: StableId, _ids: &dyn IdentifierService) -> IdResult<Self> {
        Ok(stable)
    }
}

/// One vertex of a logical expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicNode<R> {
    DefinitionRoot { children: Vec<NodeIndex> },
    NecessarySet { children: Vec<NodeIndex> },
    SufficientSet { children: Vec<NodeIndex> },
    And { children: Vec<NodeIndex> },
    Or { children: Vec<NodeIndex> },
    Concept { concept: R },
    RoleSome { role_type: R, child: NodeIndex },
    RoleAll { role_type: R, child: NodeIndex },
    Feature {
        feature_type: R,
        operator: ConcreteDomainOperator,
        units: R,
        child: NodeIndex,
    },
    LiteralBoolean(bool),
    LiteralFloat(f32),
    /// Milliseconds since the UNIX epoch.
    LiteralInstant(i64),
    LiteralInteger(i32),
    LiteralString(String),
}

impl<R: ConceptReference> LogicNode<R> {
    pub fn semantic(&self) -> NodeSemantic {
        match self {
            LogicNode::DefinitionRoot { .. } => NodeSemantic::DefinitionRoot,
            LogicNode::NecessarySet { .. } => NodeSemantic::NecessarySet,
            LogicNode::SufficientSet { .. } => NodeSemantic::SufficientSet,
            LogicNode::And { .. } => NodeSemantic::And,
            LogicNode::Or { .. } => NodeSemantic::Or,
            LogicNode::Concept { .. } => NodeSemantic::Concept,
            LogicNode::RoleSome { .. } => NodeSemantic::RoleSome,
            LogicNode::RoleAll { .. } => NodeSemantic::RoleAll,
            LogicNode::Feature { .. } => NodeSemantic::Feature,
            LogicNode::LiteralBoolean(_) => NodeSemantic::LiteralBoolean,
            LogicNode::LiteralFloat(_) => NodeSemantic::LiteralFloat,
            LogicNode::LiteralInstant(_) => NodeSemantic::LiteralInstant,
            LogicNode::LiteralInteger(_) => NodeSemantic::LiteralInteger,
            LogicNode::LiteralString(_) => NodeSemantic::LiteralString,
        }
    }

    /// Child indices in encoding order.
    pub fn children(&self) -> &[NodeIndex] {
        match self {
            LogicNode::DefinitionRoot { children }
            | LogicNode::NecessarySet { children }
            | LogicNode::SufficientSet { children }
            | LogicNode::And { children }
            | LogicNode::Or { children } => children,
            LogicNode::RoleSome { child, .. }
            | LogicNode::RoleAll { child, .. }
            | LogicNode::Feature { child, .. } => std::slice::from_ref(child),
            _ => &[],
        }
    }

    /// Whether two nodes agree on semantic and on every non-child field.
    ///
    /// This is the equivalence-candidate test of the diff; children are not
    /// compared.
    pub fn same_content(&self, other: &LogicNode<R>) -> bool {
        match (self, other) {
            (LogicNode::Concept { concept: a }, LogicNode::Concept { concept: b }) => a == b,
            (
                LogicNode::RoleSome { role_type: a, .. },
                LogicNode::RoleSome { role_type: b, .. },
            )
            | (LogicNode::RoleAll { role_type: a, .. }, LogicNode::RoleAll { role_type: b, .. }) => {
                a == b
            }
            (
                LogicNode::Feature {
                    feature_type: ta,
                    operator: oa,
                    units: ua,
                    ..
                },
                LogicNode::Feature {
                    feature_type: tb,
                    operator: ob,
                    units: ub,
                    ..
                },
            ) => ta == tb && oa == ob && ua == ub,
            (LogicNode::LiteralBoolean(a), LogicNode::LiteralBoolean(b)) => a == b,
            (LogicNode::LiteralFloat(a), LogicNode::LiteralFloat(b)) => a.to_bits() == b.to_bits(),
            (LogicNode::LiteralInstant(a), LogicNode::LiteralInstant(b)) => a == b,
            (LogicNode::LiteralInteger(a), LogicNode::LiteralInteger(b)) => a == b,
            (LogicNode::LiteralString(a), LogicNode::LiteralString(b)) => a == b,
            _ => self.semantic() == other.semantic() && self.semantic().is_commutative(),
        }
    }

    /// Convert every concept reference into another identifier space,
    /// keeping child indices.
    pub fn convert<T: ConceptReference>(
        &self,
        ids: &dyn IdentifierService,
    ) -> IdResult<LogicNode<T>> {
        let map = |r: R| -> IdResult<T> { T::from_stable(r.to_stable(ids)?, ids) };
        Ok(match self {
            LogicNode::DefinitionRoot { children } => LogicNode::DefinitionRoot {
                children: children.clone(),
            },
            LogicNode::NecessarySet { children } => LogicNode::NecessarySet {
                children: children.clone(),
            },
            LogicNode::SufficientSet { children } => LogicNode::SufficientSet {
                children: children.clone(),
            },
            LogicNode::And { children } => LogicNode::And {
                children: children.clone(),
            },
            LogicNode::Or { children } => LogicNode::Or {
                children: children.clone(),
            },
            LogicNode::Concept { concept } => LogicNode::Concept {
                concept: map(*concept)?,
            },
            LogicNode::RoleSome { role_type, child } => LogicNode::RoleSome {
                role_type: map(*role_type)?,
                child: *child,
            },
            LogicNode::RoleAll { role_type, child } => LogicNode::RoleAll {
                role_type: map(*role_type)?,
                child: *child,
            },
            LogicNode::Feature {
                feature_type,
                operator,
                units,
                child,
            } => LogicNode::Feature {
                feature_type: map(*feature_type)?,
                operator: *operator,
                units: map(*units)?,
                child: *child,
            },
            LogicNode::LiteralBoolean(v) => LogicNode::LiteralBoolean(*v),
            LogicNode::LiteralFloat(v) => LogicNode::LiteralFloat(*v),
            LogicNode::LiteralInstant(v) => LogicNode::LiteralInstant(*v),
            LogicNode::LiteralInteger(v) => LogicNode::LiteralInteger(*v),
            LogicNode::LiteralString(v) => LogicNode::LiteralString(v.clone()),
        })
    }

    /// Derive this node's identity from its content and its children's
    /// identities.
    ///
    /// `child_identity` must return the already-derived identity of a child.
    /// Fails only if a referenced concept has no stable id.
    pub fn identity(
        &self,
        ids: &dyn IdentifierService,
        child_identity: impl Fn(NodeIndex) -> NodeIdentity,
    ) -> IdResult<NodeIdentity> {
        let semantic = self.semantic();
        let mut name = String::new();
        match self {
            LogicNode::Concept { concept } => {
                name.push_str(&concept.to_stable(ids)?.to_string());
            }
            LogicNode::RoleSome { role_type, child } | LogicNode::RoleAll { role_type, child } => {
                name.push_str(&role_type.to_stable(ids)?.to_string());
                name.push_str(&child_identity(*child).to_string());
            }
            LogicNode::Feature {
                feature_type,
                operator,
                units,
                ..
            } => {
                name.push_str(&feature_type.to_stable(ids)?.to_string());
                name.push_str(operator.name());
                name.push_str(&units.to_stable(ids)?.to_string());
            }
            LogicNode::LiteralBoolean(v) => name.push_str(&v.to_string()),
            LogicNode::LiteralFloat(v) => name.push_str(&v.to_string()),
            LogicNode::LiteralInstant(v) => name.push_str(&v.to_string()),
            LogicNode::LiteralInteger(v) => name.push_str(&v.to_string()),
            LogicNode::LiteralString(v) => name.push_str(v),
            _ => {
                // Commutative connectives: sort so reordered sets collide.
                let mut identities: Vec<NodeIdentity> =
                    self.children().iter().map(|c| child_identity(*c)).collect();
                identities.sort_unstable();
                for identity in identities {
                    name.push_str(&identity.to_string());
                }
            }
        }
        Ok(NodeIdentity(Uuid::new_v5(
            &semantic.namespace(),
            name.as_bytes(),
        )))
    }

    /// One-line description used in indented renderings.
    pub fn describe(&self, index: NodeIndex) -> String {
        let semantic = self.semantic();
        match self {
            LogicNode::Concept { concept } => format!("{semantic}[{index}] {concept}"),
            LogicNode::RoleSome { role_type, child } | LogicNode::RoleAll { role_type, child } => {
                format!("{semantic}[{index}] type: {role_type} ->[{child}]")
            }
            LogicNode::Feature {
                feature_type,
                operator,
                units,
                child,
            } => format!(
                "{semantic}[{index}] {operator}, units: {units}, type: {feature_type} ->[{}]",
                child
            ),
            LogicNode::LiteralBoolean(v) => format!("{semantic}[{index}] {v}"),
            LogicNode::LiteralFloat(v) => format!("{semantic}[{index}] {v}"),
            LogicNode::LiteralInstant(v) => format!("{semantic}[{index}] {v}"),
            LogicNode::LiteralInteger(v) => format!("{semantic}[{index}] {v}"),
            LogicNode::LiteralString(v) => format!("{semantic}[{index}] {v:?}"),
            _ => {
                let children: Vec<String> =
                    self.children().iter().map(|c| c.to_string()).collect();
                format!("{semantic}[{index}] ->[{}]", children.join(", "))
            }
        }
    }
}
