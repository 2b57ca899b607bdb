//! Benchmarks for the scoring and ranking paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use redpilot::domain::models::campaign::Campaign;
use redpilot::domain::models::target::TargetProfile;
use redpilot::domain::models::technique::{AccessLevel, Goal, TargetKind};
use redpilot::domain::models::PlannerConfig;
use redpilot::infrastructure::catalog::CatalogLoader;
use redpilot::services::prior_library::PriorLibrary;
use redpilot::services::scorer::TechniqueScorer;
use redpilot::services::{admissibility, sampler};

fn target() -> TargetProfile {
    TargetProfile::new(
        "support-bot",
        TargetKind::Chatbot,
        AccessLevel::BlackBox,
        [Goal::Jailbreak, Goal::Extraction],
    )
    .with_defense("has_moderation", true)
    .with_defense("has_input_filtering", true)
}

fn bench_scoring(c: &mut Criterion) {
    let catalog = CatalogLoader::builtin().unwrap();
    let target = target();
    let admissible = admissibility::admissible(&catalog, &target);
    let scorer = TechniqueScorer::default();

    c.bench_function("scorer_rank", |b| {
        b.iter(|| scorer.rank(black_box(&target), black_box(&admissible)));
    });

    c.bench_function("scorer_sensitivity", |b| {
        b.iter(|| scorer.sensitivity(black_box(&target), black_box(&admissible)));
    });
}

fn bench_recommendation(c: &mut Criterion) {
    let catalog = CatalogLoader::builtin().unwrap();
    let priors = PriorLibrary::builtin();
    let config = PlannerConfig::default();
    let campaign = Campaign::new(target(), 42, catalog.version_hash(), 50);

    c.bench_function("recommend_batch", |b| {
        b.iter(|| {
            let mut scratch = campaign.clone();
            sampler::recommend(
                black_box(&catalog),
                black_box(&priors),
                black_box(&config),
                &mut scratch,
            )
        });
    });
}

criterion_group!(benches, bench_scoring, bench_recommendation);
criterion_main!(benches);
