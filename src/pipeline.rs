//! Batch jobs: read the full match history, recompute a table, publish it.
//!
//! Every job recomputes from scratch. Standings and form feeding the feature
//! table are recomputed in memory from the same input rather than read back,
//! so one run never mixes tables from different inputs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::entity_map::EntityMapper;
use crate::features::{FeatureSelection, build_features, sampling_rng};
use crate::form::{FormRow, compute_form};
use crate::match_record::{MatchRecord, clean, filter_qualifying};
use crate::openligadb::{RawMatch, fetch_many_seasons};
use crate::standings::{StandingsRow, compute_standings};
use crate::table::{
    Table, features_table, form_table, matches_table, read_matches, standings_table,
    write_parquet,
};
use crate::team_view::{Scope, expand_all};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub table: &'static str,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_written: usize,
    pub output: PathBuf,
    /// RFC 3339, UTC.
    pub generated_at: String,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub run: RunSummary,
    pub unfinished: usize,
    pub not_final: usize,
    pub incomplete: usize,
    pub unmapped: BTreeSet<(String, String)>,
    pub skipped_seasons: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AllSummary {
    pub standings: RunSummary,
    pub form: RunSummary,
    pub features: RunSummary,
    pub skipped_feature_sets: Vec<String>,
}

/// Qualifying, validated matches of the configured input.
pub fn load_matches(cfg: &PipelineConfig) -> Result<(usize, Vec<MatchRecord>)> {
    let path = &cfg.match_results_path;
    let all = read_matches(path).with_context(|| format!("read matches {}", path.display()))?;
    let read = all.len();
    let kept = filter_qualifying(all, &cfg.final_result_marker)
        .with_context(|| format!("validate matches {}", path.display()))?;
    info!(path = %path.display(), read, kept = kept.len(), "matches loaded");
    Ok((read, kept))
}

pub fn standings_from(matches: &[MatchRecord], scope: Scope) -> Vec<StandingsRow> {
    compute_standings(&expand_all(matches, scope))
}

pub fn run_standings(cfg: &PipelineConfig) -> Result<RunSummary> {
    let (read, matches) = load_matches(cfg)?;
    let rows = standings_from(&matches, cfg.standings_scope);
    publish(
        "standings",
        &standings_table(&rows),
        &cfg.standings_path,
        read,
        matches.len(),
    )
}

pub fn form_from(matches: &[MatchRecord], cfg: &PipelineConfig) -> Result<Vec<FormRow>> {
    let form_cfg = cfg.form_config()?;
    Ok(compute_form(&expand_all(matches, Scope::Overall), &form_cfg))
}

pub fn run_form(cfg: &PipelineConfig) -> Result<RunSummary> {
    let (read, matches) = load_matches(cfg)?;
    let rows = form_from(&matches, cfg)?;
    publish(
        "form",
        &form_table(&rows, &form_windows(cfg)?),
        &cfg.form_path,
        read,
        matches.len(),
    )
}

pub fn run_features(cfg: &PipelineConfig) -> Result<RunSummary> {
    let (read, matches) = load_matches(cfg)?;
    let standings = standings_from(&matches, cfg.standings_scope);
    let form = form_from(&matches, cfg)?;
    let (summary, _) = publish_features(cfg, &matches, &standings, &form, read)?;
    Ok(summary)
}

/// Standings, form and features from a single read of the input.
pub fn run_all(cfg: &PipelineConfig) -> Result<AllSummary> {
    let (read, matches) = load_matches(cfg)?;
    let standings = standings_from(&matches, cfg.standings_scope);
    let form = form_from(&matches, cfg)?;

    let standings_summary = publish(
        "standings",
        &standings_table(&standings),
        &cfg.standings_path,
        read,
        matches.len(),
    )?;
    let form_summary = publish(
        "form",
        &form_table(&form, &form_windows(cfg)?),
        &cfg.form_path,
        read,
        matches.len(),
    )?;
    let (features_summary, skipped) = publish_features(cfg, &matches, &standings, &form, read)?;

    Ok(AllSummary {
        standings: standings_summary,
        form: form_summary,
        features: features_summary,
        skipped_feature_sets: skipped,
    })
}

fn publish_features(
    cfg: &PipelineConfig,
    matches: &[MatchRecord],
    standings: &[StandingsRow],
    form: &[FormRow],
    read: usize,
) -> Result<(RunSummary, Vec<String>)> {
    let selection = FeatureSelection::resolve(&cfg.feature_sets);
    if selection.sets.is_empty() {
        return Err(anyhow!(
            "none of the requested feature sets {:?} is known",
            cfg.feature_sets
        ));
    }
    let mut rng = sampling_rng(cfg.seed);
    let rows = build_features(matches, standings, form, &selection, cfg.target, &mut rng);
    let table = features_table(&rows, cfg.target, &selection, &form_windows(cfg)?);
    let summary = publish("features", &table, &cfg.features_path, read, matches.len())?;
    Ok((summary, selection.skipped))
}

/// Provider rows to a published match-results table.
pub fn ingest_raw(
    cfg: &PipelineConfig,
    raw: &[RawMatch],
    mapper: &EntityMapper,
) -> Result<IngestSummary> {
    let report = clean(raw, mapper, &cfg.final_result_marker).context("clean provider rows")?;
    for (kind, name) in &report.unmapped {
        warn!(kind = kind.as_str(), name = name.as_str(), "unmapped entity");
    }
    let run = publish(
        "match_results",
        &matches_table(&report.records),
        &cfg.match_results_path,
        raw.len(),
        report.records.len(),
    )?;
    Ok(IngestSummary {
        run,
        unfinished: report.unfinished,
        not_final: report.not_final,
        incomplete: report.incomplete,
        unmapped: report.unmapped,
        skipped_seasons: Vec::new(),
        errors: Vec::new(),
    })
}

/// Fetch league-seasons from the provider and publish them as match results.
pub fn run_ingest(
    cfg: &PipelineConfig,
    leagues: &[&str],
    seasons: &[i64],
) -> Result<IngestSummary> {
    let (Some(league_path), Some(team_path)) = (&cfg.league_mapper_path, &cfg.team_mapper_path)
    else {
        return Err(anyhow!("league and team mapper paths are required for ingest"));
    };
    let mapper = EntityMapper::from_csv_paths(league_path, team_path, cfg.unmapped_policy)
        .with_context(|| {
            format!(
                "load mappers {} and {}",
                league_path.display(),
                team_path.display()
            )
        })?;

    let fetched = fetch_many_seasons(leagues, seasons)?;
    let mut summary = ingest_raw(cfg, &fetched.rows, &mapper)?;
    summary.skipped_seasons = fetched
        .skipped
        .iter()
        .map(|ls| format!("{} {}", ls.shortcut, ls.season))
        .collect();
    summary.errors = fetched.errors;
    Ok(summary)
}

fn publish(
    table_name: &'static str,
    table: &Table,
    path: &Path,
    rows_read: usize,
    rows_kept: usize,
) -> Result<RunSummary> {
    write_parquet(table, path).with_context(|| format!("write {table_name} {}", path.display()))?;
    let rows_written = table.num_rows();
    info!(
        table = table_name,
        path = %path.display(),
        rows = rows_written,
        "table written"
    );
    Ok(RunSummary {
        table: table_name,
        rows_read,
        rows_kept,
        rows_written,
        output: path.to_path_buf(),
        generated_at: Utc::now().to_rfc3339(),
    })
}

fn form_windows(cfg: &PipelineConfig) -> Result<Vec<usize>> {
    Ok(cfg.form_config()?.windows().to_vec())
}
