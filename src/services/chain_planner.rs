//! Multi-stage chain planning via beam search.
//!
//! Searches the technique prerequisite DAG for attack sequences. A chain's
//! joint probability is the product of its step probabilities; a step
//! sharing a family with an earlier step gets a `(1+κ)` conditional bonus,
//! clamped to 1. Named-condition prerequisites are assumed available.

use std::collections::HashSet;

use crate::domain::models::config::ChainConfig;
use crate::domain::models::plan::{AttackChain, ChainStep};
use crate::domain::models::posterior::{BetaPosterior, PosteriorStore};
use crate::domain::models::target::TargetProfile;
use crate::domain::models::technique::{Prerequisite, Technique};
use crate::domain::models::TechniqueCatalog;

use super::admissibility;
use super::prior_library::PriorLibrary;

/// A partial chain under expansion.
#[derive(Debug, Clone)]
struct PartialChain<'a> {
    steps: Vec<(&'a Technique, f64)>,
    ids: HashSet<&'a str>,
    families: HashSet<&'a str>,
    joint: f64,
}

impl<'a> PartialChain<'a> {
    fn seed(technique: &'a Technique, probability: f64) -> Self {
        Self {
            steps: vec![(technique, probability)],
            ids: [technique.id.as_str()].into_iter().collect(),
            families: [technique.family.as_str()].into_iter().collect(),
            joint: probability,
        }
    }

    fn extended(&self, technique: &'a Technique, probability: f64) -> Self {
        let mut next = self.clone();
        next.steps.push((technique, probability));
        next.ids.insert(technique.id.as_str());
        next.families.insert(technique.family.as_str());
        next.joint *= probability;
        next
    }

    fn id_sequence(&self) -> Vec<&str> {
        self.steps.iter().map(|(t, _)| t.id.as_str()).collect()
    }
}

/// Plan attack chains for a target against the current posterior state.
pub fn plan_chains(
    catalog: &TechniqueCatalog,
    priors: &PriorLibrary,
    config: &ChainConfig,
    target: &TargetProfile,
    posteriors: &PosteriorStore,
) -> Vec<AttackChain> {
    let admissible = admissibility::admissible(catalog, target);

    let step_probability = |id: &str| -> f64 {
        posteriors
            .get(id)
            .map(BetaPosterior::mean)
            .unwrap_or_else(|| priors.prior_for_id(catalog, id).mean())
    };

    // Initial frontier: admissible techniques whose prerequisites contain
    // no technique references (named conditions are assumed available).
    let mut beam: Vec<PartialChain> = admissible
        .iter()
        .filter(|t| technique_prerequisites(t).is_empty())
        .map(|t| PartialChain::seed(t, step_probability(&t.id)))
        .collect();
    sort_and_prune(&mut beam, config.beam_width);

    let mut finished: Vec<PartialChain> = Vec::new();

    for _depth in 1..config.max_depth {
        let mut next_beam: Vec<PartialChain> = Vec::new();

        for chain in &beam {
            let mut extended_any = false;
            for technique in &admissible {
                if chain.ids.contains(technique.id.as_str()) {
                    continue;
                }
                let satisfied = technique_prerequisites(technique)
                    .iter()
                    .all(|prerequisite| chain.ids.contains(prerequisite.as_str()));
                if !satisfied {
                    continue;
                }

                let mut probability = step_probability(&technique.id);
                if chain.families.contains(technique.family.as_str()) {
                    probability = (probability * (1.0 + config.family_bonus)).min(1.0);
                }

                next_beam.push(chain.extended(technique, probability));
                extended_any = true;
            }

            if !extended_any {
                finished.push(chain.clone());
            }
        }

        sort_and_prune(&mut next_beam, config.beam_width);
        if next_beam.is_empty() {
            beam.clear();
            break;
        }
        beam = next_beam;
    }

    // Whatever survived to max depth is terminal.
    finished.extend(beam);

    sort_and_prune(&mut finished, config.top_k);
    finished.iter().map(assemble).collect()
}

/// Technique-reference prerequisites only; named conditions are assumed.
fn technique_prerequisites(technique: &Technique) -> Vec<String> {
    technique
        .classified_prerequisites()
        .into_iter()
        .filter_map(|p| match p {
            Prerequisite::Technique(id) => Some(id),
            Prerequisite::Condition(_) => None,
        })
        .collect()
}

fn sort_and_prune(chains: &mut Vec<PartialChain>, width: usize) {
    chains.sort_by(|a, b| {
        b.joint
            .partial_cmp(&a.joint)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id_sequence().cmp(&b.id_sequence()))
    });
    chains.truncate(width);
}

fn assemble(chain: &PartialChain) -> AttackChain {
    let steps: Vec<ChainStep> = chain
        .steps
        .iter()
        .map(|(technique, probability)| ChainStep {
            technique_id: technique.id.clone(),
            probability: *probability,
            family: technique.family.clone(),
        })
        .collect();

    AttackChain {
        narrative: narrative(chain),
        joint_probability: chain.joint,
        steps,
    }
}

fn narrative(chain: &PartialChain) -> String {
    let mut seen_families: HashSet<&str> = HashSet::new();
    let mut sentences: Vec<String> = Vec::new();

    for (index, (technique, _)) in chain.steps.iter().enumerate() {
        let fragment = technique.narrative_fragment();
        let conditional = !seen_families.insert(technique.family.as_str());

        let sentence = if index == 0 {
            format!("Open: {fragment}.")
        } else if conditional {
            format!("Then: {fragment} (conditional on earlier {} work).", technique.family)
        } else {
            format!("Then: {fragment}.")
        };
        sentences.push(sentence);
    }

    sentences.push(format!(
        "Estimated joint success: {:.1}%.",
        chain.joint * 100.0
    ));
    sentences.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::technique::{
        AccessLevel, AttackDomain, Cost, Goal, StealthProfile, Surface, TargetKind,
    };

    fn technique(id: &str, family: &str, prerequisites: Vec<&str>) -> Technique {
        Technique {
            id: id.to_string(),
            name: id.to_string(),
            domain: AttackDomain::Agent,
            surface: Surface::Tool,
            target_kinds: vec![TargetKind::Agent],
            min_access: AccessLevel::BlackBox,
            goals: vec![Goal::Hijacking],
            cost: Cost::Medium,
            stealth: StealthProfile::Moderate,
            bypasses_defenses: vec![],
            signal_value: 0.5,
            detection_risk: 0.4,
            tools: vec![],
            atlas_refs: vec![],
            compliance: Default::default(),
            family: family.to_string(),
            prerequisites: prerequisites.into_iter().map(String::from).collect(),
            prior_key: None,
            narrative: None,
        }
    }

    fn target() -> TargetProfile {
        TargetProfile::new(
            "agent",
            TargetKind::Agent,
            AccessLevel::BlackBox,
            [Goal::Hijacking],
        )
    }

    fn catalog() -> TechniqueCatalog {
        TechniqueCatalog::try_new(vec![
            technique("AP-TX-AGENT-RECON-ENUM", "recon", vec![]),
            technique(
                "AP-TX-AGENT-ABUSE-TOOL",
                "abuse",
                vec!["AP-TX-AGENT-RECON-ENUM"],
            ),
            technique(
                "AP-TX-AGENT-PRIV-DEPUTY",
                "privilege",
                vec!["AP-TX-AGENT-ABUSE-TOOL"],
            ),
            technique("AP-TX-AGENT-COND-ONLY", "conditional", vec!["session-established"]),
        ])
        .unwrap()
    }

    /// Catalog without the condition-gated technique: the three-step chain
    /// exhausts it and is therefore terminal and emitted.
    fn linear_catalog() -> TechniqueCatalog {
        TechniqueCatalog::try_new(vec![
            technique("AP-TX-AGENT-RECON-ENUM", "recon", vec![]),
            technique(
                "AP-TX-AGENT-ABUSE-TOOL",
                "abuse",
                vec!["AP-TX-AGENT-RECON-ENUM"],
            ),
            technique(
                "AP-TX-AGENT-PRIV-DEPUTY",
                "privilege",
                vec!["AP-TX-AGENT-ABUSE-TOOL"],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_joint_probability_is_step_product() {
        let catalog = linear_catalog();
        let priors = PriorLibrary::builtin();
        let mut posteriors = PosteriorStore::new();
        posteriors.seed_posterior("AP-TX-AGENT-RECON-ENUM", 18.0, 7.0); // 0.72
        posteriors.seed_posterior("AP-TX-AGENT-ABUSE-TOOL", 14.5, 10.5); // 0.58
        posteriors.seed_posterior("AP-TX-AGENT-PRIV-DEPUTY", 8.5, 16.5); // 0.34

        let chains = plan_chains(
            &catalog,
            &priors,
            &ChainConfig::default(),
            &target(),
            &posteriors,
        );

        let chain = chains
            .iter()
            .find(|c| {
                c.technique_ids()
                    == vec![
                        "AP-TX-AGENT-RECON-ENUM",
                        "AP-TX-AGENT-ABUSE-TOOL",
                        "AP-TX-AGENT-PRIV-DEPUTY",
                    ]
            })
            .expect("three-step chain emitted");

        let product: f64 = chain.steps.iter().map(|s| s.probability).product();
        assert!((chain.joint_probability - product).abs() < 1e-9);
        assert!((chain.joint_probability - 0.72 * 0.58 * 0.34).abs() < 1e-9);
    }

    #[test]
    fn test_condition_only_prerequisites_join_initial_frontier() {
        let catalog = catalog();
        let priors = PriorLibrary::builtin();
        let chains = plan_chains(
            &catalog,
            &priors,
            &ChainConfig::default(),
            &target(),
            &PosteriorStore::new(),
        );

        assert!(chains
            .iter()
            .any(|c| c.steps[0].technique_id == "AP-TX-AGENT-COND-ONLY"));
    }

    #[test]
    fn test_family_bonus_applies_on_repeat_family() {
        let catalog = TechniqueCatalog::try_new(vec![
            technique("AP-TX-AGENT-RECON-AAA", "shared", vec![]),
            technique(
                "AP-TX-AGENT-RECON-BBB",
                "shared",
                vec!["AP-TX-AGENT-RECON-AAA"],
            ),
        ])
        .unwrap();
        let priors = PriorLibrary::builtin();
        let mut posteriors = PosteriorStore::new();
        posteriors.seed_posterior("AP-TX-AGENT-RECON-AAA", 3.0, 2.0); // 0.6
        posteriors.seed_posterior("AP-TX-AGENT-RECON-BBB", 3.0, 2.0); // 0.6

        let config = ChainConfig {
            family_bonus: 0.1,
            ..ChainConfig::default()
        };
        let chains = plan_chains(&catalog, &priors, &config, &target(), &posteriors);

        let chain = chains
            .iter()
            .find(|c| c.steps.len() == 2)
            .expect("two-step chain");
        assert!((chain.steps[1].probability - 0.6 * 1.1).abs() < 1e-9);
        assert!((chain.joint_probability - 0.6 * 0.66).abs() < 1e-9);
    }

    #[test]
    fn test_depth_limit_bounds_chains() {
        let mut techniques = vec![technique("AP-TX-AGENT-RECON-T0", "f0", vec![])];
        for i in 1..8 {
            techniques.push(technique(
                &format!("AP-TX-AGENT-RECON-T{i}"),
                &format!("f{i}"),
                vec![&format!("AP-TX-AGENT-RECON-T{}", i - 1)],
            ));
        }
        let catalog = TechniqueCatalog::try_new(techniques).unwrap();
        let priors = PriorLibrary::builtin();

        let config = ChainConfig {
            max_depth: 3,
            ..ChainConfig::default()
        };
        let chains = plan_chains(&catalog, &priors, &config, &target(), &PosteriorStore::new());

        assert!(chains.iter().all(|c| c.steps.len() <= 3));
        assert!(chains.iter().any(|c| c.steps.len() == 3));
    }

    #[test]
    fn test_narrative_mentions_joint_probability() {
        let catalog = catalog();
        let priors = PriorLibrary::builtin();
        let chains = plan_chains(
            &catalog,
            &priors,
            &ChainConfig::default(),
            &target(),
            &PosteriorStore::new(),
        );

        assert!(!chains.is_empty());
        assert!(chains[0].narrative.contains("Estimated joint success"));
    }

    #[test]
    fn test_planner_is_deterministic() {
        let catalog = catalog();
        let priors = PriorLibrary::builtin();
        let a = plan_chains(
            &catalog,
            &priors,
            &ChainConfig::default(),
            &target(),
            &PosteriorStore::new(),
        );
        let b = plan_chains(
            &catalog,
            &priors,
            &ChainConfig::default(),
            &target(),
            &PosteriorStore::new(),
        );
        assert_eq!(a, b);
    }
}
