//! Hard admissibility filter.
//!
//! Decides whether a technique applies to a target at all. Pure,
//! order-independent, idempotent; scoring happens elsewhere.

use crate::domain::models::target::TargetProfile;
use crate::domain::models::technique::{AttackDomain, TargetKind, Technique};
use crate::domain::models::TechniqueCatalog;

/// Whether a technique's attack domain makes sense for a target kind.
fn domain_consistent(domain: AttackDomain, kind: TargetKind) -> bool {
    match domain {
        AttackDomain::Llm => matches!(
            kind,
            TargetKind::Chatbot | TargetKind::Rag | TargetKind::Agent | TargetKind::CodeAssistant
        ),
        AttackDomain::Agent => matches!(kind, TargetKind::Agent | TargetKind::CodeAssistant),
        AttackDomain::Aml => matches!(kind, TargetKind::Classifier | TargetKind::GenericModel),
    }
}

/// Admissibility predicate: kind, access, goal overlap, domain consistency.
pub fn is_admissible(target: &TargetProfile, technique: &Technique) -> bool {
    let kind_matches =
        technique.applies_to_any_kind() || technique.target_kinds.contains(&target.kind);
    if !kind_matches {
        return false;
    }

    if !target.access.satisfies(technique.min_access) {
        return false;
    }

    if !technique.goals.iter().any(|g| target.goals.contains(g)) {
        return false;
    }

    domain_consistent(technique.domain, target.kind)
}

/// Catalog techniques admissible for a target, in catalog order.
pub fn admissible<'a>(catalog: &'a TechniqueCatalog, target: &TargetProfile) -> Vec<&'a Technique> {
    catalog
        .all()
        .iter()
        .filter(|t| is_admissible(target, t))
        .collect()
}
