//! Validated technique catalog.
//!
//! The catalog is a value: an ordered list of [`Technique`] records checked
//! once at construction, then shared read-only across campaigns. Queries
//! preserve insertion order so rankings downstream stay deterministic.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

use super::technique::{
    is_atlas_ref, is_technique_id, AttackDomain, Goal, Prerequisite, Surface, Technique,
    ToolSupport,
};

/// A single catalog validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogViolation {
    #[error("duplicate technique id: {0}")]
    DuplicateId(String),

    #[error("malformed technique id: {0}")]
    MalformedId(String),

    #[error("{id}: prerequisite references unknown technique {prerequisite}")]
    DanglingPrerequisite { id: String, prerequisite: String },

    #[error("{id}: malformed ATLAS reference {reference}")]
    MalformedAtlasRef { id: String, reference: String },

    #[error("{id}: {field} = {value} is outside [0,1]")]
    ValueOutOfRange {
        id: String,
        field: &'static str,
        value: f64,
    },

    #[error("{0}: goal set is empty")]
    EmptyGoals(String),

    #[error("{0}: family identifier is empty")]
    EmptyFamily(String),
}

/// Catalog load/validation failure. Fatal at initialization.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog could not be read: {0}")]
    Io(String),

    #[error("catalog document is malformed: {0}")]
    Parse(String),

    #[error("catalog validation failed with {} violation(s): {}", .0.len(), format_violations(.0))]
    Validation(Vec<CatalogViolation>),
}

fn format_violations(violations: &[CatalogViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Immutable, validated technique catalog.
#[derive(Debug, Clone)]
pub struct TechniqueCatalog {
    techniques: Vec<Technique>,
    index: HashMap<String, usize>,
    families: BTreeMap<String, Vec<String>>,
    version_hash: String,
}

impl TechniqueCatalog {
    /// Validate a record list and build the catalog.
    ///
    /// Every violation across all records is collected before failing, so a
    /// broken catalog file reports its problems in one pass.
    pub fn try_new(techniques: Vec<Technique>) -> Result<Self, CatalogError> {
        let mut violations = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let ids: HashSet<&str> = techniques.iter().map(|t| t.id.as_str()).collect();

        for technique in &techniques {
            if !is_technique_id(&technique.id) {
                violations.push(CatalogViolation::MalformedId(technique.id.clone()));
            }
            if !seen.insert(&technique.id) {
                violations.push(CatalogViolation::DuplicateId(technique.id.clone()));
            }
            if technique.goals.is_empty() {
                violations.push(CatalogViolation::EmptyGoals(technique.id.clone()));
            }
            if technique.family.trim().is_empty() {
                violations.push(CatalogViolation::EmptyFamily(technique.id.clone()));
            }
            if !(0.0..=1.0).contains(&technique.signal_value) {
                violations.push(CatalogViolation::ValueOutOfRange {
                    id: technique.id.clone(),
                    field: "signal_value",
                    value: technique.signal_value,
                });
            }
            if !(0.0..=1.0).contains(&technique.detection_risk) {
                violations.push(CatalogViolation::ValueOutOfRange {
                    id: technique.id.clone(),
                    field: "detection_risk",
                    value: technique.detection_risk,
                });
            }
            for reference in &technique.atlas_refs {
                if !is_atlas_ref(reference) {
                    violations.push(CatalogViolation::MalformedAtlasRef {
                        id: technique.id.clone(),
                        reference: reference.clone(),
                    });
                }
            }
            for prerequisite in technique.classified_prerequisites() {
                if let Prerequisite::Technique(referenced) = prerequisite {
                    if !ids.contains(referenced.as_str()) {
                        violations.push(CatalogViolation::DanglingPrerequisite {
                            id: technique.id.clone(),
                            prerequisite: referenced,
                        });
                    }
                }
            }
        }

        if !violations.is_empty() {
            return Err(CatalogError::Validation(violations));
        }

        let index = techniques
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();

        let mut families: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for technique in &techniques {
            families
                .entry(technique.family.clone())
                .or_default()
                .push(technique.id.clone());
        }

        let version_hash = hash_records(&techniques);

        Ok(Self {
            techniques,
            index,
            families,
            version_hash,
        })
    }

    /// All techniques in insertion order.
    pub fn all(&self) -> &[Technique] {
        &self.techniques
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    /// Look up a technique by id.
    pub fn by_id(&self, id: &str) -> Option<&Technique> {
        self.index.get(id).map(|&i| &self.techniques[i])
    }

    pub fn by_domain(&self, domain: AttackDomain) -> Vec<&Technique> {
        self.techniques.iter().filter(|t| t.domain == domain).collect()
    }

    pub fn by_surface(&self, surface: Surface) -> Vec<&Technique> {
        self.techniques.iter().filter(|t| t.surface == surface).collect()
    }

    pub fn by_goal(&self, goal: Goal) -> Vec<&Technique> {
        self.techniques
            .iter()
            .filter(|t| t.goals.contains(&goal))
            .collect()
    }

    pub fn by_tool(&self, tool: ToolSupport) -> Vec<&Technique> {
        self.techniques
            .iter()
            .filter(|t| t.tools.contains(&tool))
            .collect()
    }

    /// Family identifier → ordered member ids.
    pub fn families(&self) -> &BTreeMap<String, Vec<String>> {
        &self.families
    }

    /// Ordered member ids of one family.
    pub fn family_members(&self, family: &str) -> &[String] {
        self.families.get(family).map_or(&[], Vec::as_slice)
    }

    /// Ids of the other techniques sharing a technique's family.
    pub fn family_siblings(&self, technique_id: &str) -> Vec<&str> {
        let Some(technique) = self.by_id(technique_id) else {
            return Vec::new();
        };
        self.family_members(&technique.family)
            .iter()
            .map(String::as_str)
            .filter(|id| *id != technique_id)
            .collect()
    }

    /// SHA-256 over the canonical serialized records. Stable across loads
    /// of the same catalog content; part of every campaign audit token.
    pub fn version_hash(&self) -> &str {
        &self.version_hash
    }
}

fn hash_records(techniques: &[Technique]) -> String {
    let canonical = serde_json::to_vec(techniques).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}
