//! Benchmarks for permission decoding and authorization checks.
//!
//! Both run once per guild on every listing, so they sit on the hot path of
//! `fetch_guilds` for users in many guilds.

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use guildsync::models::{PlatformGuild, RegisteredGuild, flags};
use guildsync::security::check_operation;
use guildsync::services::{IconUrls, partition};
use guildsync::{CapabilitySet, GuildConfig, GuildId, Operation};

const INPUTS: &[(&str, &str)] = &[
    ("zero", "0"),
    ("admin", "8"),
    ("typical", "1099511627775"),
    ("padded", "  2147483647\n"),
    ("garbage", "not-a-number"),
    ("overflow", "999999999999999999999999999999999999999999"),
];

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("capability_decode");
    for (name, input) in INPUTS {
        group.bench_function(*name, |b| {
            b.iter(|| CapabilitySet::decode(black_box(input)));
        });
    }
    group.finish();
}

fn bench_check(c: &mut Criterion) {
    let config = GuildConfig {
        guild_id: GuildId::new("1"),
        restricted: true,
    };
    let caps = CapabilitySet::from_bits(flags::MANAGE_EVENTS);

    c.bench_function("check_operation_restricted_denied", |b| {
        b.iter(|| check_operation(black_box(Operation::Update), &config, black_box(&caps)));
    });
}

fn bench_partition(c: &mut Criterion) {
    let platform: Vec<PlatformGuild> = (0..200u32)
        .map(|i| PlatformGuild {
            id: GuildId::new(i.to_string()),
            name: format!("guild {i}"),
            icon: (i % 3 == 0).then(|| format!("hash{i}")),
            owner: i % 10 == 0,
            permissions: if i % 2 == 0 { "8" } else { "0" }.to_string(),
            features: Vec::new(),
        })
        .collect();
    let registered: Vec<RegisteredGuild> = (0..200u32)
        .step_by(4)
        .map(|i| RegisteredGuild {
            id: i64::from(i),
            guild_id: GuildId::new(i.to_string()),
            name: format!("guild {i}"),
            avatar_url: None,
            locale: "en-US".to_string(),
        })
        .collect();
    let icons = IconUrls::default();

    c.bench_function("partition_200_guilds", |b| {
        b.iter(|| partition(black_box(platform.clone()), black_box(registered.clone()), &icons));
    });
}

criterion_group!(benches, bench_decode, bench_check, bench_partition);
criterion_main!(benches);
