//! Closed vocabularies of the node model: node semantics, concrete-domain
//! operators, and encoding targets.

use serde::{Deserialize, Serialize};
use uuid::{Uuid, uuid};

use crate::error::FormatError;

/// What a logic node means. Determines arity, encoding layout and the
/// identity namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeSemantic {
    NecessarySet,
    SufficientSet,
    And,
    Or,
    DefinitionRoot,
    RoleAll,
    RoleSome,
    Concept,
    Feature,
    LiteralBoolean,
    LiteralFloat,
    LiteralInstant,
    LiteralInteger,
    LiteralString,
}

impl NodeSemantic {
    pub const ALL: [NodeSemantic; 14] = [
        NodeSemantic::NecessarySet,
        NodeSemantic::SufficientSet,
        NodeSemantic::And,
        NodeSemantic::Or,
        NodeSemantic::DefinitionRoot,
        NodeSemantic::RoleAll,
        NodeSemantic::RoleSome,
        NodeSemantic::Concept,
        NodeSemantic::Feature,
        NodeSemantic::LiteralBoolean,
        NodeSemantic::LiteralFloat,
        NodeSemantic::LiteralInstant,
        NodeSemantic::LiteralInteger,
        NodeSemantic::LiteralString,
    ];

    /// Leading byte of this semantic's encoding.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Inverse of [`NodeSemantic::tag`].
    pub fn from_tag(tag: u8, offset: usize) -> Result<Self, FormatError> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(FormatError::UnknownSemantic { tag, offset })
    }

    /// Fixed namespace salting identities of nodes with this semantic.
    pub fn namespace(self) -> Uuid {
        match self {
            NodeSemantic::NecessarySet => uuid!("acaa2eba-5b8f-5c5b-9d4e-1f2b6f0e3a11"),
            NodeSemantic::SufficientSet => uuid!("d2a8c7f4-0b1e-5a3c-8e77-4c9b21de5f02"),
            NodeSemantic::And => uuid!("7f6b2a0c-3d94-5e8a-b1c5-90aa4e3d2c13"),
            NodeSemantic::Or => uuid!("1c3e5a7b-9d2f-54b6-8a0e-6f7d8c9b0a24"),
            NodeSemantic::DefinitionRoot => uuid!("e4b0c6d8-2a1f-5937-9c6e-3b5d7f9a1c35"),
            NodeSemantic::RoleAll => uuid!("3a9f1b7d-5c2e-5068-ad4b-8e1f0c2d4b46"),
            NodeSemantic::RoleSome => uuid!("5b2d8e4f-7a1c-5b93-8f6d-0c3e5a7b9d57"),
            NodeSemantic::Concept => uuid!("9e1f3a5c-7b2d-54e8-9a0c-2d4f6b8e0a68"),
            NodeSemantic::Feature => uuid!("2f4a6c8e-0b1d-5f3a-b5c7-9e0a2c4e6b79"),
            NodeSemantic::LiteralBoolean => uuid!("6c8e0a2b-4d6f-5a1c-8b3d-5f7a9c1e3d8a"),
            NodeSemantic::LiteralFloat => uuid!("8d0f2b4c-6e8a-5c2d-9a4e-7b9c1e3f5a9b"),
            NodeSemantic::LiteralInstant => uuid!("0e2a4c6d-8f0b-5d3e-ab5f-9c1e3a5b7cac"),
            NodeSemantic::LiteralInteger => uuid!("4a6c8e0f-2b4d-5f5a-bc7e-1d3f5b7d9ebd"),
            NodeSemantic::LiteralString => uuid!("b7d9f1a3-5c7e-5b6a-8d9f-3e5a7c9e1fce"),
        }
    }

    /// Whether the order of children is irrelevant to meaning (and identity).
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            NodeSemantic::And
                | NodeSemantic::Or
                | NodeSemantic::NecessarySet
                | NodeSemantic::SufficientSet
                | NodeSemantic::DefinitionRoot
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeSemantic::NecessarySet => "NECESSARY_SET",
            NodeSemantic::SufficientSet => "SUFFICIENT_SET",
            NodeSemantic::And => "AND",
            NodeSemantic::Or => "OR",
            NodeSemantic::DefinitionRoot => "DEFINITION_ROOT",
            NodeSemantic::RoleAll => "ROLE_ALL",
            NodeSemantic::RoleSome => "ROLE_SOME",
            NodeSemantic::Concept => "CONCEPT",
            NodeSemantic::Feature => "FEATURE",
            NodeSemantic::LiteralBoolean => "LITERAL_BOOLEAN",
            NodeSemantic::LiteralFloat => "LITERAL_FLOAT",
            NodeSemantic::LiteralInstant => "LITERAL_INSTANT",
            NodeSemantic::LiteralInteger => "LITERAL_INTEGER",
            NodeSemantic::LiteralString => "LITERAL_STRING",
        }
    }
}

impl std::fmt::Display for NodeSemantic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Comparison operator of a FEATURE (concrete-domain) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConcreteDomainOperator {
    Equals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ConcreteDomainOperator {
    pub const ALL: [ConcreteDomainOperator; 5] = [
        ConcreteDomainOperator::Equals,
        ConcreteDomainOperator::LessThan,
        ConcreteDomainOperator::LessThanOrEqual,
        ConcreteDomainOperator::GreaterThan,
        ConcreteDomainOperator::GreaterThanOrEqual,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8, offset: usize) -> Result<Self, FormatError> {
        Self::ALL
            .get(ordinal as usize)
            .copied()
            .ok_or(FormatError::UnknownOperator { ordinal, offset })
    }

    pub fn name(self) -> &'static str {
        match self {
            ConcreteDomainOperator::Equals => "EQUALS",
            ConcreteDomainOperator::LessThan => "LESS_THAN",
            ConcreteDomainOperator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            ConcreteDomainOperator::GreaterThan => "GREATER_THAN",
            ConcreteDomainOperator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
        }
    }
}

impl std::fmt::Display for ConcreteDomainOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which identifier space concept references are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTarget {
    /// 4-byte local ids; only meaningful inside one process.
    Internal,
    /// 16-byte stable ids; portable.
    External,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tags_round_trip() {
        for semantic in NodeSemantic::ALL {
            assert_eq!(NodeSemantic::from_tag(semantic.tag(), 0).unwrap(), semantic);
        }
    }

    #[test]
    fn unknown_tag_is_a_format_error() {
        let err = NodeSemantic::from_tag(200, 17).unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnknownSemantic {
                tag: 200,
                offset: 17
            }
        ));
    }

    #[test]
    fn unknown_operator_is_a_format_error() {
        assert!(ConcreteDomainOperator::from_ordinal(5, 0).is_err());
        assert_eq!(
            ConcreteDomainOperator::from_ordinal(3, 0).unwrap(),
            ConcreteDomainOperator::GreaterThan
        );
    }

    #[test]
    fn namespaces_are_distinct() {
        let namespaces: HashSet<Uuid> = NodeSemantic::ALL.iter().map(|s| s.namespace()).collect();
        assert_eq!(namespaces.len(), NodeSemantic::ALL.len());
    }

    #[test]
    fn commutativity() {
        assert!(NodeSemantic::And.is_commutative());
        assert!(NodeSemantic::Or.is_commutative());
        assert!(!NodeSemantic::RoleSome.is_commutative());
        assert!(!NodeSemantic::Feature.is_commutative());
    }
}
