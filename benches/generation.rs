//! Parsing and generation benchmarks using criterion.
//!
//! Run with: cargo bench --bench generation

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use randomizer_gen::{Registry, parse};

const STORY_SOURCE: &str = r"STORY
| {INTRO} A {HERO} left {PLACE} at {TIME}.
| {OBSTACLE} The {1<HERO} pressed on{ELLIPSIS}

INTRO
- Listen.
+ And then?

HERO
- wanderer
- cartographer
- smuggler

PLACE
- Dunwich
- Port Sorrow
- the Low Quarter

TIME
+ dawn
+ noon
+ dusk
+ midnight

OBSTACLE
3- Rain fell for days.
2- The bridge was out.
1- Wolves shadowed the road.

ELLIPSIS
3*.
";

/// Benchmark parsing source text into a document
fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_story_source", |b| {
        b.iter(|| black_box(parse(black_box(STORY_SOURCE)).unwrap()));
    });
}

/// Benchmark registry construction, including reference resolution and
/// the reachability analysis
fn bench_build(c: &mut Criterion) {
    let document = parse(STORY_SOURCE).unwrap();
    c.bench_function("build_registry", |b| {
        b.iter(|| black_box(Registry::build(black_box(document.clone())).unwrap()));
    });
}

/// Benchmark evaluating the story with a seeded generator
fn bench_evaluate(c: &mut Criterion) {
    let mut registry = Registry::from_source(STORY_SOURCE).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("evaluate_story", |b| {
        b.iter(|| black_box(registry.evaluate("STORY", &mut rng).unwrap()));
    });
}

criterion_group!(benches, bench_parse, bench_build, bench_evaluate);
criterion_main!(benches);
