//! Binary encoding of logical expressions.
//!
//! Layout, per node, big-endian:
//!
//! ```text
//! [semantic tag: u8][fields...][children...]
//! ```
//!
//! | semantic | fields | children |
//! |---|---|---|
//! | CONCEPT | ref | none |
//! | ROLE_SOME, ROLE_ALL | type ref | one subtree inline |
//! | FEATURE | type ref, operator ordinal (u8), units ref | one subtree inline |
//! | AND, OR, sets, DEFINITION_ROOT | child count (u32) | that many subtrees |
//! | LITERAL_* | value (bool u8, f32, i64 millis, i32, u32 length + UTF-8) | none |
//!
//! A reference is a 4-byte local id for [`DataTarget::Internal`] and a
//! 16-byte stable id for [`DataTarget::External`]. The graph is the encoding
//! of its root. Shared subexpressions are written once per occurrence.
//! Nesting deeper than [`MAX_DEPTH`] is rejected in both directions.

use uuid::Uuid;

use crate::error::{FormatError, LogicResult};
use crate::id::{IdentifierService, Nid, StableId};

use super::expression::{LogicalExpression, MAX_DEPTH};
use super::node::{ConceptReference, LogicNode, NodeIndex};
use super::semantic::{ConcreteDomainOperator, DataTarget, NodeSemantic};

impl<R: ConceptReference> LogicalExpression<R> {
    /// Encode with concept references written in `target`'s identifier space.
    ///
    /// The format inlines every child subtree, so a node shared by several
    /// parents is written once per parent. Decoding such a graph yields a
    /// tree with more nodes and the same root identity.
    pub fn encode(&self, target: DataTarget, ids: &dyn IdentifierService) -> LogicResult<Vec<u8>> {
        let mut writer = Writer {
            out: Vec::with_capacity(self.node_count() * 8),
            target,
            ids,
        };
        writer.write_node(self, self.root(), 1)?;
        Ok(writer.out)
    }

    /// Decode bytes whose references are in `source`'s identifier space.
    pub fn decode(
        bytes: &[u8],
        source: DataTarget,
        ids: &dyn IdentifierService,
    ) -> LogicResult<Self> {
        let mut reader = Reader {
            bytes,
            pos: 0,
            source,
            ids,
            nodes: Vec::new(),
        };
        let root = reader.read_node(1)?;
        if reader.pos != bytes.len() {
            return Err(FormatError::TrailingBytes {
                count: bytes.len() - reader.pos,
            }
            .into());
        }
        Ok(LogicalExpression::new(reader.nodes, root)?)
    }
}

struct Writer<'a> {
    out: Vec<u8>,
    target: DataTarget,
    ids: &'a dyn IdentifierService,
}

impl Writer<'_> {
    fn write_ref<R: ConceptReference>(&mut self, reference: R) -> LogicResult<()> {
        match self.target {
            DataTarget::Internal => {
                let nid = reference.to_local(self.ids)?;
                self.out.extend_from_slice(&nid.0.to_be_bytes());
            }
            DataTarget::External => {
                let stable = reference.to_stable(self.ids)?;
                self.out.extend_from_slice(stable.as_uuid().as_bytes());
            }
        }
        Ok(())
    }

    fn write_node<R: ConceptReference>(
        &mut self,
        expression: &LogicalExpression<R>,
        index: NodeIndex,
        depth: usize,
    ) -> LogicResult<()> {
        if depth > MAX_DEPTH {
            return Err(FormatError::TooDeep {
                offset: self.out.len(),
                limit: MAX_DEPTH,
            }
            .into());
        }
        let node = &expression.nodes()[index.index()];
        self.out.push(node.semantic().tag());
        match node {
            LogicNode::Concept { concept } => self.write_ref(*concept)?,
            LogicNode::RoleSome { role_type, child } | LogicNode::RoleAll { role_type, child } => {
                self.write_ref(*role_type)?;
                self.write_node(expression, *child, depth + 1)?;
            }
            LogicNode::Feature {
                feature_type,
                operator,
                units,
                child,
            } => {
                self.write_ref(*feature_type)?;
                self.out.push(operator.ordinal());
                self.write_ref(*units)?;
                self.write_node(expression, *child, depth + 1)?;
            }
            LogicNode::LiteralBoolean(v) => self.out.push(u8::from(*v)),
            LogicNode::LiteralFloat(v) => self.out.extend_from_slice(&v.to_be_bytes()),
            LogicNode::LiteralInstant(v) => self.out.extend_from_slice(&v.to_be_bytes()),
            LogicNode::LiteralInteger(v) => self.out.extend_from_slice(&v.to_be_bytes()),
            LogicNode::LiteralString(v) => {
                self.out
                    .extend_from_slice(&(v.len() as u32).to_be_bytes());
                self.out.extend_from_slice(v.as_bytes());
            }
            LogicNode::DefinitionRoot { children }
            | LogicNode::NecessarySet { children }
            | LogicNode::SufficientSet { children }
            | LogicNode::And { children }
            | LogicNode::Or { children } => {
                self.out
                    .extend_from_slice(&(children.len() as u32).to_be_bytes());
                for child in children {
                    self.write_node(expression, *child, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

struct Reader<'a, R> {
    bytes: &'a [u8],
    pos: usize,
    source: DataTarget,
    ids: &'a dyn IdentifierService,
    nodes: Vec<LogicNode<R>>,
}

impl<R: ConceptReference> Reader<'_, R> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(FormatError::Truncated {
                needed: N,
                offset: self.pos,
            })?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        self.pos = end;
        Ok(buf)
    }

    fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    fn read_ref(&mut self) -> LogicResult<R> {
        Ok(match self.source {
            DataTarget::Internal => {
                let nid = Nid(i32::from_be_bytes(self.take()?));
                R::from_local(nid, self.ids)?
            }
            DataTarget::External => {
                let stable = StableId(Uuid::from_bytes(self.take()?));
                R::from_stable(stable, self.ids)?
            }
        })
    }

    fn read_child_list(&mut self, depth: usize) -> LogicResult<Vec<NodeIndex>> {
        let count = self.read_u32()?;
        // Each child needs at least its tag byte; reject absurd counts early.
        if count as usize > self.bytes.len() - self.pos {
            return Err(FormatError::Truncated {
                needed: count as usize,
                offset: self.pos,
            }
            .into());
        }
        (0..count).map(|_| self.read_node(depth + 1)).collect()
    }

    fn push(&mut self, node: LogicNode<R>) -> NodeIndex {
        self.nodes.push(node);
        NodeIndex(self.nodes.len() as u32 - 1)
    }

    fn read_node(&mut self, depth: usize) -> LogicResult<NodeIndex> {
        let offset = self.pos;
        if depth > MAX_DEPTH {
            return Err(FormatError::TooDeep {
                offset,
                limit: MAX_DEPTH,
            }
            .into());
        }
        let semantic = NodeSemantic::from_tag(self.read_u8()?, offset)?;
        let node = match semantic {
            NodeSemantic::Concept => LogicNode::Concept {
                concept: self.read_ref()?,
            },
            NodeSemantic::RoleSome => {
                let role_type = self.read_ref()?;
                let child = self.read_node(depth + 1)?;
                LogicNode::RoleSome { role_type, child }
            }
            NodeSemantic::RoleAll => {
                let role_type = self.read_ref()?;
                let child = self.read_node(depth + 1)?;
                LogicNode::RoleAll { role_type, child }
            }
            NodeSemantic::Feature => {
                let feature_type = self.read_ref()?;
                let operator_offset = self.pos;
                let operator =
                    ConcreteDomainOperator::from_ordinal(self.read_u8()?, operator_offset)?;
                let units = self.read_ref()?;
                let child = self.read_node(depth + 1)?;
                LogicNode::Feature {
                    feature_type,
                    operator,
                    units,
                    child,
                }
            }
            NodeSemantic::LiteralBoolean => LogicNode::LiteralBoolean(self.read_u8()? != 0),
            NodeSemantic::LiteralFloat => LogicNode::LiteralFloat(f32::from_be_bytes(self.take()?)),
            NodeSemantic::LiteralInstant => {
                LogicNode::LiteralInstant(i64::from_be_bytes(self.take()?))
            }
            NodeSemantic::LiteralInteger => {
                LogicNode::LiteralInteger(i32::from_be_bytes(self.take()?))
            }
            NodeSemantic::LiteralString => {
                let len = self.read_u32()? as usize;
                let start = self.pos;
                let raw = self
                    .bytes
                    .get(start..start + len)
                    .ok_or(FormatError::Truncated {
                        needed: len,
                        offset: start,
                    })?;
                let text = std::str::from_utf8(raw)
                    .map_err(|_| FormatError::InvalidUtf8 { offset: start })?
                    .to_owned();
                self.pos = start + len;
                LogicNode::LiteralString(text)
            }
            NodeSemantic::DefinitionRoot => LogicNode::DefinitionRoot {
                children: self.read_child_list(depth)?,
            },
            NodeSemantic::NecessarySet => LogicNode::NecessarySet {
                children: self.read_child_list(depth)?,
            },
            NodeSemantic::SufficientSet => LogicNode::SufficientSet {
                children: self.read_child_list(depth)?,
            },
            NodeSemantic::And => LogicNode::And {
                children: self.read_child_list(depth)?,
            },
            NodeSemantic::Or => LogicNode::Or {
                children: self.read_child_list(depth)?,
            },
        };
        Ok(self.push(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogicError;
    use crate::id::MemoryIdentifierService;
    use crate::logic::expression::{ExpressionBuilder, ExternalExpression, InternalExpression};

    fn ids_with(n: u128) -> (MemoryIdentifierService, Vec<Nid>) {
        let ids = MemoryIdentifierService::new();
        let nids = (1..=n)
            .map(|i| ids.register_concept(StableId(Uuid::from_u128(i))))
            .collect();
        (ids, nids)
    }

    fn every_semantic(nids: &[Nid]) -> InternalExpression {
        let mut b = ExpressionBuilder::new();
        let parent = b.concept(nids[0]);
        let filler = b.concept(nids[1]);
        let some = b.some_role(nids[2], filler);
        let value = b.float(2.5);
        let feature = b.feature(nids[3], ConcreteDomainOperator::GreaterThan, nids[4], value);
        let flag = b.boolean(true);
        let all = b.all_role(nids[2], flag);
        let when = b.instant(1_420_070_400_000);
        let count = b.integer(-3);
        let label = b.string("héllo");
        let or = b.or([when, count, label]);
        let and = b.and([parent, some, feature, all, or]);
        let necessary = b.necessary_set([and]);
        let other = b.concept(nids[0]);
        let sufficient = b.sufficient_set([other]);
        b.definition([necessary, sufficient]).unwrap()
    }

    #[test]
    fn internal_round_trip_is_exact() {
        let (ids, nids) = ids_with(5);
        let expr = every_semantic(&nids);
        let bytes = expr.encode(DataTarget::Internal, &ids).unwrap();
        let back = InternalExpression::decode(&bytes, DataTarget::Internal, &ids).unwrap();
        // Builder order is children-first depth-first, which is decode order.
        assert_eq!(back, expr);
    }

    #[test]
    fn external_encoding_is_wider_and_round_trips() {
        let (ids, nids) = ids_with(5);
        let expr = every_semantic(&nids);
        let internal = expr.encode(DataTarget::Internal, &ids).unwrap();
        let external = expr.encode(DataTarget::External, &ids).unwrap();
        assert!(external.len() > internal.len());

        let decoded = ExternalExpression::decode(&external, DataTarget::External, &ids).unwrap();
        let back: InternalExpression = decoded.convert(&ids).unwrap();
        assert!(back.is_isomorphic(&expr));
        assert_eq!(back.identities(&ids).unwrap(), expr.identities(&ids).unwrap());
    }

    #[test]
    fn concept_reference_layout() {
        let (ids, nids) = ids_with(1);
        let mut b = ExpressionBuilder::new();
        let c = b.concept(nids[0]);
        let expr = b.build(c).unwrap();

        let internal = expr.encode(DataTarget::Internal, &ids).unwrap();
        assert_eq!(internal.len(), 1 + 4);
        assert_eq!(internal[0], NodeSemantic::Concept.tag());
        assert_eq!(&internal[1..], &nids[0].0.to_be_bytes());

        let external = expr.encode(DataTarget::External, &ids).unwrap();
        assert_eq!(external.len(), 1 + 16);
        assert_eq!(&external[1..], Uuid::from_u128(1).as_bytes());
    }

    #[test]
    fn unknown_tag_fails_with_format_error() {
        let ids = MemoryIdentifierService::new();
        let err = InternalExpression::decode(&[0xEE], DataTarget::Internal, &ids).unwrap_err();
        assert!(matches!(
            err,
            LogicError::Format(FormatError::UnknownSemantic { tag: 0xEE, offset: 0 })
        ));
    }

    #[test]
    fn unknown_operator_fails_with_format_error() {
        let (ids, nids) = ids_with(2);
        let mut bytes = vec![NodeSemantic::Feature.tag()];
        bytes.extend_from_slice(&nids[0].0.to_be_bytes());
        bytes.push(9);
        bytes.extend_from_slice(&nids[1].0.to_be_bytes());
        bytes.push(NodeSemantic::LiteralBoolean.tag());
        bytes.push(1);
        let err = InternalExpression::decode(&bytes, DataTarget::Internal, &ids).unwrap_err();
        assert!(matches!(
            err,
            LogicError::Format(FormatError::UnknownOperator { ordinal: 9, offset: 5 })
        ));
    }

    #[test]
    fn truncated_and_trailing_input_rejected() {
        let (ids, nids) = ids_with(1);
        let mut b = ExpressionBuilder::new();
        let c = b.concept(nids[0]);
        let expr = b.definition([c]).unwrap();
        let bytes = expr.encode(DataTarget::Internal, &ids).unwrap();

        let cut = &bytes[..bytes.len() - 1];
        assert!(matches!(
            InternalExpression::decode(cut, DataTarget::Internal, &ids),
            Err(LogicError::Format(FormatError::Truncated { .. }))
        ));

        let mut extra = bytes.clone();
        extra.push(0);
        assert!(matches!(
            InternalExpression::decode(&extra, DataTarget::Internal, &ids),
            Err(LogicError::Format(FormatError::TrailingBytes { count: 1 }))
        ));
    }

    #[test]
    fn deeply_nested_input_fails_instead_of_overflowing() {
        let (ids, nids) = ids_with(1);
        let levels = 200_000;
        let mut bytes = Vec::with_capacity(levels * 5 + 5);
        for _ in 0..levels {
            bytes.push(NodeSemantic::RoleSome.tag());
            bytes.extend_from_slice(&nids[0].0.to_be_bytes());
        }
        bytes.push(NodeSemantic::Concept.tag());
        bytes.extend_from_slice(&nids[0].0.to_be_bytes());

        let err = InternalExpression::decode(&bytes, DataTarget::Internal, &ids).unwrap_err();
        assert!(matches!(
            err,
            LogicError::Format(FormatError::TooDeep { offset, limit: MAX_DEPTH })
                if offset == MAX_DEPTH * 5
        ));
    }

    #[test]
    fn nesting_at_the_limit_round_trips() {
        let (ids, nids) = ids_with(1);
        let mut b = ExpressionBuilder::new();
        let mut node = b.concept(nids[0]);
        for _ in 1..MAX_DEPTH {
            node = b.some_role(nids[0], node);
        }
        let expr = b.build(node).unwrap();
        let bytes = expr.encode(DataTarget::Internal, &ids).unwrap();
        let back = InternalExpression::decode(&bytes, DataTarget::Internal, &ids).unwrap();
        assert_eq!(back, expr);
    }

    #[test]
    fn shared_subexpressions_are_expanded_on_encode() {
        let (ids, nids) = ids_with(2);
        let mut b = ExpressionBuilder::new();
        let filler = b.concept(nids[1]);
        let shared = b.some_role(nids[0], filler);
        let and = b.and([shared, shared]);
        let expr = b.definition([and]).unwrap();
        assert_eq!(expr.node_count(), 4);

        let bytes = expr.encode(DataTarget::Internal, &ids).unwrap();
        let back = InternalExpression::decode(&bytes, DataTarget::Internal, &ids).unwrap();
        assert_eq!(back.node_count(), 6);
        assert!(!back.is_isomorphic(&expr));
        assert_eq!(
            back.root_identity(&ids).unwrap(),
            expr.root_identity(&ids).unwrap()
        );
    }

    #[test]
    fn external_bytes_with_unknown_concept_fail_resolution() {
        let (ids, nids) = ids_with(1);
        let mut b = ExpressionBuilder::new();
        let c = b.concept(nids[0]);
        let expr = b.build(c).unwrap();
        let mut bytes = expr.encode(DataTarget::External, &ids).unwrap();
        bytes[1] ^= 0xFF;

        assert!(matches!(
            InternalExpression::decode(&bytes, DataTarget::External, &ids),
            Err(LogicError::Resolution(_))
        ));
    }
}
