//! JSON terminology fixtures for the CLI, benchmarks and tests.
//!
//! A fixture names its concepts by label and states is-a records and
//! definition versions in terms of those labels:
//!
//! ```json
//! {
//!   "concepts": [{ "label": "Heart" }, { "label": "Organ" }, { "label": "Part of" }],
//!   "is_a": [{ "child": "Heart", "parent": "Organ", "time": 1 }],
//!   "definitions": [{
//!     "concept": "Heart",
//!     "time": 1,
//!     "necessary": [
//!       { "type": "concept", "concept": "Organ" },
//!       { "type": "some", "role": "Part of", "filler": { "type": "concept", "concept": "Organ" } }
//!     ]
//!   }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::{
    Classifier, ClassifierCoordinates, ClassifierServices, StructuralReasoner,
};
use crate::config::ClassifierConfig;
use crate::error::{ConfigError, LogicResult};
use crate::id::{
    CachingIdentifierService, IdentifierService, MemoryIdentifierService, Nid, StableId,
};
use crate::logic::{ConcreteDomainOperator, ExpressionBuilder, InternalExpression, NodeIndex};
use crate::stamp::{EditCoordinate, LogicCoordinate, PremiseType, Stamp, StampCoordinate, Status};
use crate::taxonomy::{MemoryTaxonomyRecords, TaxonomyRecord};
use crate::tracker::ChangeNotifier;
use crate::version::VersionStore;

/// Namespace for stable ids derived from fixture labels.
pub const FIXTURE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_9b3d_5e7f_8a0b_1c2d_3e4f_5a6b);

const PATH_LABEL: &str = "development path";
const AUTHOR_LABEL: &str = "fixture author";
const MODULE_LABEL: &str = "fixture module";
const STATED_LABEL: &str = "stated definitions";
const INFERRED_LABEL: &str = "inferred definitions";

/// A concept declared by a fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptSpec {
    pub label: String,
    /// Explicit stable id; derived from the label when absent.
    #[serde(default)]
    pub uuid: Option<Uuid>,
}

/// Stamp fields shared by every versioned fixture record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampSpec {
    #[serde(default)]
    pub time: i64,
    #[serde(default = "default_status")]
    pub status: Status,
    /// Module label; the fixture module when absent.
    #[serde(default)]
    pub module: Option<String>,
}

fn default_status() -> Status {
    Status::Active
}

/// One version of an is-a edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsASpec {
    pub child: String,
    pub parent: String,
    #[serde(default = "default_premise")]
    pub premise: PremiseType,
    #[serde(flatten)]
    pub stamp: StampSpec,
}

fn default_premise() -> PremiseType {
    PremiseType::Stated
}

/// A description-logic expression in label form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpressionSpec {
    Concept {
        concept: String,
    },
    Some {
        role: String,
        filler: Box<ExpressionSpec>,
    },
    All {
        role: String,
        filler: Box<ExpressionSpec>,
    },
    Feature {
        feature: String,
        /// Operator name, e.g. `GREATER_THAN`.
        operator: String,
        units: String,
        value: Box<ExpressionSpec>,
    },
    And {
        children: Vec<ExpressionSpec>,
    },
    Or {
        children: Vec<ExpressionSpec>,
    },
    Boolean {
        value: bool,
    },
    Float {
        value: f32,
    },
    Instant {
        millis: i64,
    },
    Integer {
        value: i32,
    },
    String {
        value: String,
    },
}

/// One version of a concept's stated definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionSpec {
    pub concept: String,
    #[serde(flatten)]
    pub stamp: StampSpec,
    /// Conjuncts of the necessary set.
    #[serde(default)]
    pub necessary: Vec<ExpressionSpec>,
    /// Each entry is the conjuncts of one sufficient set.
    #[serde(default)]
    pub sufficient: Vec<Vec<ExpressionSpec>>,
    /// Commit into a new, independent chronology.
    #[serde(default)]
    pub fork: bool,
}

/// A whole fixture file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FixtureSpec {
    #[serde(default)]
    pub concepts: Vec<ConceptSpec>,
    #[serde(default)]
    pub is_a: Vec<IsASpec>,
    #[serde(default)]
    pub definitions: Vec<DefinitionSpec>,
}

impl FixtureSpec {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Fixture {
            message: e.to_string(),
        })
    }
}

/// A fixture loaded into in-memory collaborators.
#[derive(Debug)]
pub struct Terminology {
    pub ids: Arc<MemoryIdentifierService>,
    pub records: Arc<MemoryTaxonomyRecords>,
    pub versions: Arc<VersionStore>,
    pub coordinates: ClassifierCoordinates,
    labels: BTreeMap<String, Nid>,
}

impl Terminology {
    /// Register every concept, then add is-a records and commit definitions
    /// in fixture order.
    pub fn load(spec: &FixtureSpec) -> LogicResult<Self> {
        let ids = Arc::new(MemoryIdentifierService::new());
        let component = |label: &str| ids.register_component(label_stable_id(label));
        let path = component(PATH_LABEL);
        let author = component(AUTHOR_LABEL);
        let default_module = component(MODULE_LABEL);
        let logic = LogicCoordinate {
            stated_assemblage: component(STATED_LABEL),
            inferred_assemblage: component(INFERRED_LABEL),
        };

        let mut labels = BTreeMap::new();
        for concept in &spec.concepts {
            let stable = concept
                .uuid
                .map(StableId)
                .unwrap_or_else(|| label_stable_id(&concept.label));
            labels.insert(concept.label.clone(), ids.register_concept(stable));
        }

        let terminology = Self {
            records: Arc::new(MemoryTaxonomyRecords::new()),
            versions: Arc::new(VersionStore::new(Arc::new(ChangeNotifier::new()))),
            coordinates: ClassifierCoordinates {
                stamp: StampCoordinate::latest_active(path),
                logic,
                edit: EditCoordinate {
                    author,
                    module: default_module,
                    path,
                },
            },
            labels,
            ids,
        };

        for is_a in &spec.is_a {
            let child = terminology.concept(&is_a.child)?;
            let parent = terminology.concept(&is_a.parent)?;
            let origin = terminology.ids.local_to_sequence(child)?;
            let stamp = terminology.stamp(&is_a.stamp);
            terminology.records.add(
                origin,
                TaxonomyRecord {
                    destination: parent,
                    premise: is_a.premise,
                    stamp,
                },
            );
        }

        for definition in &spec.definitions {
            let concept = terminology.concept(&definition.concept)?;
            let expression = terminology.definition(definition)?;
            let stamp = terminology.stamp(&definition.stamp);
            if definition.fork {
                terminology
                    .versions
                    .fork(concept, logic.stated_assemblage, stamp, expression);
            } else {
                terminology
                    .versions
                    .commit(concept, logic.stated_assemblage, stamp, expression);
            }
        }

        tracing::debug!(
            concepts = terminology.labels.len(),
            records = terminology.records.record_count(),
            versions = terminology.versions.version_count(),
            "fixture loaded"
        );
        Ok(terminology)
    }

    /// Local id of a labelled concept.
    pub fn concept(&self, label: &str) -> Result<Nid, ConfigError> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| ConfigError::Fixture {
                message: format!("unknown concept label \"{label}\""),
            })
    }

    /// Label of a concept, or its local id when it has none.
    pub fn label(&self, nid: Nid) -> String {
        self.labels
            .iter()
            .find(|(_, n)| **n == nid)
            .map_or_else(|| nid.to_string(), |(label, _)| label.clone())
    }

    /// A classifier over this terminology using [`StructuralReasoner`], with
    /// identifier lookups memoized.
    pub fn classifier(&self, config: &ClassifierConfig) -> LogicResult<Classifier> {
        let ids: Arc<dyn IdentifierService> =
            Arc::new(CachingIdentifierService::new(self.ids.clone()));
        Classifier::new(
            ClassifierServices {
                ids: Arc::clone(&ids),
                minter: self.ids.clone(),
                records: self.records.clone(),
                versions: Arc::clone(&self.versions),
                reasoner: Arc::new(StructuralReasoner::new(ids)),
            },
            self.coordinates.clone(),
            config,
        )
    }

    fn stamp(&self, spec: &StampSpec) -> Stamp {
        let module = spec.module.as_deref().map_or(self.coordinates.edit.module, |m| {
            self.ids.register_component(label_stable_id(m))
        });
        Stamp {
            status: spec.status,
            time: spec.time,
            author: self.coordinates.edit.author,
            module,
            path: self.coordinates.edit.path,
        }
    }

    /// Build the definition expression of one definition version.
    pub fn definition(&self, spec: &DefinitionSpec) -> LogicResult<InternalExpression> {
        let mut builder = ExpressionBuilder::new();
        let mut sets = Vec::new();
        if !spec.necessary.is_empty() {
            let and = self.conjunction(&mut builder, &spec.necessary)?;
            sets.push(builder.necessary_set(vec![and]));
        }
        for sufficient in &spec.sufficient {
            let and = self.conjunction(&mut builder, sufficient)?;
            sets.push(builder.sufficient_set(vec![and]));
        }
        Ok(builder.definition(sets)?)
    }

    fn conjunction(
        &self,
        builder: &mut ExpressionBuilder<Nid>,
        conjuncts: &[ExpressionSpec],
    ) -> LogicResult<NodeIndex> {
        let children = conjuncts
            .iter()
            .map(|c| self.node(builder, c))
            .collect::<LogicResult<Vec<_>>>()?;
        Ok(builder.and(children))
    }

    fn node(
        &self,
        builder: &mut ExpressionBuilder<Nid>,
        spec: &ExpressionSpec,
    ) -> LogicResult<NodeIndex> {
        let index = match spec {
            ExpressionSpec::Concept { concept } => builder.concept(self.concept(concept)?),
            ExpressionSpec::Some { role, filler } => {
                let child = self.node(builder, filler)?;
                builder.some_role(self.concept(role)?, child)
            }
            ExpressionSpec::All { role, filler } => {
                let child = self.node(builder, filler)?;
                builder.all_role(self.concept(role)?, child)
            }
            ExpressionSpec::Feature {
                feature,
                operator,
                units,
                value,
            } => {
                let operator = ConcreteDomainOperator::ALL
                    .into_iter()
                    .find(|op| op.name() == operator.as_str())
                    .ok_or_else(|| ConfigError::Fixture {
                        message: format!("unknown operator \"{operator}\""),
                    })?;
                let child = self.node(builder, value)?;
                builder.feature(self.concept(feature)?, operator, self.concept(units)?, child)
            }
            ExpressionSpec::And { children } => {
                let children = children
                    .iter()
                    .map(|c| self.node(builder, c))
                    .collect::<LogicResult<Vec<_>>>()?;
                builder.and(children)
            }
            ExpressionSpec::Or { children } => {
                let children = children
                    .iter()
                    .map(|c| self.node(builder, c))
                    .collect::<LogicResult<Vec<_>>>()?;
                builder.or(children)
            }
            ExpressionSpec::Boolean { value } => builder.boolean(*value),
            ExpressionSpec::Float { value } => builder.float(*value),
            ExpressionSpec::Instant { millis } => builder.instant(*millis),
            ExpressionSpec::Integer { value } => builder.integer(*value),
            ExpressionSpec::String { value } => builder.string(value.clone()),
        };
        Ok(index)
    }
}

/// Stable id derived from a fixture label.
pub fn label_stable_id(label: &str) -> StableId {
    StableId(Uuid::new_v5(&FIXTURE_NAMESPACE, label.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{LogicNode, NodeSemantic};

    const HEART: &str = r#"{
      "concepts": [
        { "label": "Heart" }, { "label": "Organ" }, { "label": "Part of" },
        { "label": "Body" }, { "label": "Weight" }, { "label": "Gram" }
      ],
      "is_a": [
        { "child": "Heart", "parent": "Organ", "time": 1 },
        { "child": "Organ", "parent": "Body", "time": 1, "premise": "Inferred" }
      ],
      "definitions": [{
        "concept": "Heart",
        "time": 2,
        "necessary": [
          { "type": "concept", "concept": "Organ" },
          { "type": "some", "role": "Part of", "filler": { "type": "concept", "concept": "Body" } },
          { "type": "feature", "feature": "Weight", "operator": "GREATER_THAN", "units": "Gram",
            "value": { "type": "float", "value": 250.0 } }
        ]
      }]
    }"#;

    #[test]
    fn loads_concepts_records_and_definitions() {
        let spec = FixtureSpec::from_json(HEART).unwrap();
        let t = Terminology::load(&spec).unwrap();
        let heart = t.concept("Heart").unwrap();
        assert_eq!(t.label(heart), "Heart");
        assert_eq!(t.records.record_count(), 2);

        let stated = t.coordinates.logic.stated_assemblage;
        let latest = t
            .versions
            .latest(heart, stated, &t.coordinates.stamp)
            .unwrap()
            .unwrap();
        let definition = latest.value();
        assert_eq!(
            definition.node(definition.root()).unwrap().semantic(),
            NodeSemantic::DefinitionRoot
        );
        assert!(definition.nodes().iter().any(|n| matches!(
            n,
            LogicNode::Feature {
                operator: ConcreteDomainOperator::GreaterThan,
                ..
            }
        )));
    }

    #[test]
    fn labels_derive_stable_ids() {
        assert_eq!(label_stable_id("Heart"), label_stable_id("Heart"));
        assert_ne!(label_stable_id("Heart"), label_stable_id("Lung"));
    }

    #[test]
    fn unknown_labels_and_operators_are_rejected() {
        let spec = FixtureSpec::from_json(
            r#"{ "concepts": [{ "label": "A" }], "is_a": [{ "child": "A", "parent": "B" }] }"#,
        )
        .unwrap();
        let err = Terminology::load(&spec).unwrap_err();
        assert!(err.to_string().contains("\"B\""));

        let spec = FixtureSpec::from_json(
            r#"{ "concepts": [{ "label": "A" }], "definitions": [{ "concept": "A",
                 "necessary": [{ "type": "feature", "feature": "A", "operator": "ABOUT",
                 "units": "A", "value": { "type": "integer", "value": 1 } }] }] }"#,
        )
        .unwrap();
        assert!(Terminology::load(&spec).is_err());

        assert!(FixtureSpec::from_json("{ not json").is_err());
    }
}
