//! Micro-operation benchmarks for the caches and the coordinator.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Measures per-operation latency for add/remove, paging, resort and
//! search-filtered paging over identically shuffled rosters.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rosterkit::cache::{GroupCache, PrimaryCache, StaticGroups};
use rosterkit::config::{ListFilter, TrackerConfig};
use rosterkit::entity::{EntityId, GroupKind, Player};
use rosterkit::order::{EntityOrder, player_order};
use rosterkit::search::SearchType;
use rosterkit::service::PlayerCacheService;
use rosterkit::traits::{BasicEntityCache, EntityCache, GroupedEntityCache};
use rustc_hash::FxHashMap;

const ROSTER: u32 = 4_096;
const OPS: u64 = 10_000;
const SEED: u64 = 0x5eed;

fn roster(rng: &mut StdRng) -> Vec<Arc<Player>> {
    let mut ids: Vec<EntityId> = (0..ROSTER).collect();
    ids.shuffle(rng);
    ids.into_iter()
        .map(|id| {
            let name = format!("player{:05}", rng.gen_range(0..100_000));
            let fc = if id % 3 == 0 { "Moonfire" } else { "" };
            Arc::new(
                Player::new(id, name, id % 8)
                    .with_free_company(fc)
                    .with_categories([1 + id % 4])
                    .with_tags([10 + id % 2]),
            )
        })
        .collect()
}

fn name_order() -> EntityOrder<Player> {
    player_order(&FxHashMap::default(), 0)
}

fn groups() -> Arc<StaticGroups> {
    Arc::new(
        StaticGroups::new()
            .with_category(1, 0)
            .with_category(2, 1)
            .with_category(3, 2)
            .with_category(4, 3)
            .with_tag(10)
            .with_tag(11),
    )
}

// ============================================================================
// Add / Remove Latency (ns/op)
// ============================================================================

fn bench_add_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_remove_ns");
    group.throughput(Throughput::Elements(OPS));
    let players = roster(&mut StdRng::seed_from_u64(SEED));

    group.bench_function("primary", |b| {
        b.iter_custom(|iters| {
            let cache = PrimaryCache::new(name_order());
            for p in &players {
                cache.add(p);
            }
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    let p = &players[(i % ROSTER as u64) as usize];
                    black_box(cache.remove(p));
                    black_box(cache.add(p));
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("group_fan_out", |b| {
        b.iter_custom(|iters| {
            let cache = GroupCache::new(GroupKind::Category, name_order(), groups());
            for p in &players {
                cache.add(p);
            }
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    let p = &players[(i % ROSTER as u64) as usize];
                    black_box(cache.remove(p));
                    black_box(cache.add(p));
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Paging
// ============================================================================

fn bench_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_ns");
    group.throughput(Throughput::Elements(OPS));
    let mut rng = StdRng::seed_from_u64(SEED);
    let players = roster(&mut rng);
    let cache = PrimaryCache::new(name_order());
    for p in &players {
        cache.add(p);
    }
    let starts: Vec<usize> = (0..OPS)
        .map(|_| rng.gen_range(0..ROSTER as usize))
        .collect();

    group.bench_function("page_50", |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for &s in &starts {
                    black_box(cache.page(s, 50));
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("group_page_50", |b| {
        let tags = GroupCache::new(GroupKind::Tag, name_order(), groups());
        for p in &players {
            tags.add(p);
        }
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for &s in &starts {
                    black_box(tags.page_in(10, s / 2, 50));
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Resort
// ============================================================================

fn bench_resort(c: &mut Criterion) {
    let mut group = c.benchmark_group("resort");
    group.throughput(Throughput::Elements(ROSTER as u64));
    let players = roster(&mut StdRng::seed_from_u64(SEED));
    let cache = PrimaryCache::new(name_order());
    for p in &players {
        cache.add(p);
    }

    group.bench_function("primary_flip", |b| {
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let order = if flip {
                name_order().reversed()
            } else {
                name_order()
            };
            cache.resort(black_box(order));
        })
    });

    group.bench_function("service_all_views", |b| {
        let svc = PlayerCacheService::new(TrackerConfig::default(), groups());
        svc.load_players(players.iter().map(|p| Player::clone(p)));
        b.iter(|| svc.resort_all())
    });

    group.finish();
}

// ============================================================================
// Search-Filtered Paging
// ============================================================================

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let players = roster(&mut StdRng::seed_from_u64(SEED));
    let svc = PlayerCacheService::new(TrackerConfig::default(), groups());
    svc.load_players(players.iter().map(|p| Player::clone(p)));

    for (label, query) in [
        ("name_contains", "player1"),
        ("fc_prefix", "fc:moon*"),
        ("fc_empty_negated", "!fc:! player"),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| {
                black_box(svc.page_view(
                    ListFilter::AllPlayers,
                    0,
                    black_box(query),
                    SearchType::Contains,
                    0,
                    50,
                ))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_add_remove,
    bench_page,
    bench_resort,
    bench_search
);
criterion_main!(benches);
