//! Thompson sampling and combined ranking.
//!
//! Blends the scorer's base fit with one posterior draw per admissible
//! technique. The probe phase leans on the base score (exploration
//! breadth); the exploit phase leans on the sampler (chasing discovered
//! peaks). Given the same (target, campaign state, seed) the produced
//! batch is bit-for-bit reproducible: the RNG is derived from the campaign
//! seed and the batch sequence alone, and techniques are drawn in id order.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::domain::models::campaign::{Campaign, Phase};
use crate::domain::models::config::PlannerConfig;
use crate::domain::models::plan::{ExecutionHook, Recommendation, RecommendationBatch};
use crate::domain::models::technique::{Technique, ToolSupport};
use crate::domain::models::TechniqueCatalog;

use super::admissibility;
use super::import::{garak_probes_for, promptfoo_labels_for};
use super::prior_library::PriorLibrary;
use super::scorer::TechniqueScorer;

/// Produce the next recommendation batch for a campaign.
///
/// Materializes posteriors lazily (first Thompson draw) but performs no
/// other campaign mutation; appending the batch to the campaign log is the
/// campaign manager's job.
pub fn recommend(
    catalog: &TechniqueCatalog,
    priors: &PriorLibrary,
    config: &PlannerConfig,
    campaign: &mut Campaign,
) -> RecommendationBatch {
    let sequence = campaign.next_batch_sequence();
    let after_attempts = campaign.next_attempt_sequence();
    let admissible = admissibility::admissible(catalog, &campaign.target);

    let scorer = TechniqueScorer::new(config.scoring.clone());
    let scored = scorer.rank(&campaign.target, &admissible);

    let (min_score, max_score) = scored
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.total), hi.max(s.total))
        });
    let span = max_score - min_score;

    // One draw per admissible technique, in id order, from a batch-scoped
    // RNG. Sampling order is part of the reproducibility contract.
    let mut rng = batch_rng(campaign.seed, sequence);
    let mut ids: Vec<&str> = admissible.iter().map(|t| t.id.as_str()).collect();
    ids.sort_unstable();
    let mut draws: BTreeMap<&str, f64> = BTreeMap::new();
    for id in &ids {
        let prior = priors.prior_for_id(catalog, id).as_pair();
        let draw = campaign.posteriors.sample(id, prior, &mut rng);
        draws.insert(id, draw);
    }

    let score_weight = match campaign.phase {
        Phase::Probe => config.sampler.probe_score_weight,
        Phase::Exploit | Phase::Terminated => config.sampler.exploit_score_weight,
    };

    let mut entries: Vec<Recommendation> = scored
        .into_iter()
        .map(|scored_technique| {
            let id = scored_technique.technique_id.as_str();
            // Admissible by construction, so both lookups resolve.
            let technique = catalog.by_id(id).expect("scored technique in catalog");
            let draw = draws.get(id).copied().unwrap_or(0.5);

            let normalized_base = if span > f64::EPSILON {
                (scored_technique.total - min_score) / span
            } else {
                1.0
            };
            let final_score = score_weight * normalized_base + (1.0 - score_weight) * draw;

            let (posterior_mean, wilson_lower, wilson_upper) = campaign
                .posteriors
                .moments(id)
                .unwrap_or((0.5, 0.0, 1.0));

            let prior = priors.prior_for(technique);
            let z_score = if prior.std_dev() > f64::EPSILON {
                (posterior_mean - prior.mean()) / prior.std_dev()
            } else {
                0.0
            };

            Recommendation {
                technique_id: technique.id.clone(),
                name: technique.name.clone(),
                final_score,
                base_score: scored_technique.total,
                thompson_sample: draw,
                breakdown: scored_technique.breakdown,
                posterior_mean,
                wilson_lower,
                wilson_upper,
                z_score,
                hooks: execution_hooks(technique),
                rationale: scored_technique.rationale,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.base_score
                    .partial_cmp(&a.base_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.technique_id.cmp(&b.technique_id))
    });
    entries.truncate(config.sampler.top_k);

    RecommendationBatch {
        sequence,
        after_attempts,
        generated_at: Utc::now(),
        entries,
    }
}

/// Invocation stubs for the tools that can execute a technique.
pub fn execution_hooks(technique: &Technique) -> Vec<ExecutionHook> {
    let mut hooks = Vec::new();
    for tool in &technique.tools {
        match tool {
            ToolSupport::Garak => {
                let probes: Vec<String> = garak_probes_for(&technique.id)
                    .iter()
                    .map(|p| p.trim_start_matches("probes.").to_string())
                    .collect();
                if !probes.is_empty() {
                    hooks.push(ExecutionHook {
                        tool: ToolSupport::Garak,
                        command: format!("garak --probes {}", probes.join(",")),
                    });
                }
            }
            ToolSupport::Promptfoo => {
                let labels = promptfoo_labels_for(&technique.id);
                if !labels.is_empty() {
                    hooks.push(ExecutionHook {
                        tool: ToolSupport::Promptfoo,
                        command: format!(
                            "promptfoo redteam run --plugins {}",
                            labels.join(",")
                        ),
                    });
                }
            }
            ToolSupport::Pyrit => hooks.push(ExecutionHook {
                tool: ToolSupport::Pyrit,
                command: format!("pyrit run --scenario {}", technique.id.to_lowercase()),
            }),
            ToolSupport::Manual => {}
        }
    }
    hooks
}

/// Batch-scoped RNG: campaign seed mixed with the batch sequence through
/// splitmix64 so consecutive batches get decorrelated streams.
fn batch_rng(seed: u64, sequence: u32) -> StdRng {
    StdRng::seed_from_u64(seed ^ splitmix64(u64::from(sequence).wrapping_add(1)))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
