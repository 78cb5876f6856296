use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use league_form::features::{FeatureSelection, Target, build_features, sampling_rng};
use league_form::form::{FormConfig, compute_form};
use league_form::match_record::MatchRecord;
use league_form::scoring::ak_score;
use league_form::standings::compute_standings;
use league_form::team_view::{Scope, expand_all};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init();
}

/// `leagues` double round robins of 18 teams, 34 match days each.
fn synthetic_history(leagues: i64) -> Vec<MatchRecord> {
    const TEAMS: i64 = 18;
    let rounds = TEAMS - 1;
    let mut out = Vec::new();
    let mut match_id = 1;
    for league_id in 1..=leagues {
        for leg in 0..2 {
            for round in 0..rounds {
                let day = leg * rounds + round + 1;
                for i in 0..TEAMS / 2 {
                    let a = if i == 0 { 0 } else { (round + i) % rounds + 1 };
                    let b = (round + rounds - i) % rounds + 1;
                    let (home, away) = if leg == 0 { (a, b) } else { (b, a) };
                    let home = league_id * 1000 + home;
                    let away = league_id * 1000 + away;
                    out.push(MatchRecord::new(
                        match_id,
                        league_id,
                        day,
                        home,
                        away,
                        (home * 7 + day) % 4,
                        (away * 3 + day * 5) % 3,
                    ));
                    match_id += 1;
                }
            }
        }
    }
    out
}

fn bench_standings(c: &mut Criterion) {
    init_tracing();
    let rows = expand_all(&synthetic_history(20), Scope::Overall);
    c.bench_function("standings_20_leagues", |b| {
        b.iter(|| {
            let standings = compute_standings(black_box(&rows));
            black_box(standings.len());
        })
    });
}

fn bench_form(c: &mut Criterion) {
    init_tracing();
    let rows = expand_all(&synthetic_history(20), Scope::Overall);
    let config = FormConfig::default();
    c.bench_function("form_20_leagues", |b| {
        b.iter(|| {
            let form = compute_form(black_box(&rows), &config);
            black_box(form.len());
        })
    });
}

fn bench_features(c: &mut Criterion) {
    init_tracing();
    let matches = synthetic_history(20);
    let rows = expand_all(&matches, Scope::Overall);
    let standings = compute_standings(&rows);
    let form = compute_form(&rows, &FormConfig::default());
    let selection = FeatureSelection::all();
    c.bench_function("features_result_class_20_leagues", |b| {
        b.iter(|| {
            let mut rng = sampling_rng(Some(7));
            let features = build_features(
                black_box(&matches),
                &standings,
                &form,
                &selection,
                Target::ResultClass,
                &mut rng,
            );
            black_box(features.len());
        })
    });
}

fn bench_ak_score(c: &mut Criterion) {
    let truth: Vec<[i64; 2]> = (0..10_000).map(|i| [i % 4, (i / 4) % 3]).collect();
    let pred: Vec<[i64; 2]> = (0..10_000).map(|i| [(i / 7) % 3, i % 2]).collect();
    c.bench_function("ak_score_10k", |b| {
        b.iter(|| {
            let scores = ak_score(black_box(&truth), black_box(&pred)).unwrap();
            black_box(scores.len());
        })
    });
}

criterion_group!(
    benches,
    bench_standings,
    bench_form,
    bench_features,
    bench_ak_score
);
criterion_main!(benches);
