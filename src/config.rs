use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::entity_map::UnmappedPolicy;
use crate::error::{EngineError, Result};
use crate::features::Target;
use crate::form::{DEFAULT_WINDOWS, FormClass, FormConfig, FormGrouping};
use crate::match_record::FINAL_RESULT_MARKER;
use crate::team_view::Scope;

const ENV_PREFIX: &str = "LEAGUE_FORM_";

/// Inputs, outputs and selectors of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub match_results_path: PathBuf,
    pub standings_path: PathBuf,
    pub form_path: PathBuf,
    pub features_path: PathBuf,
    pub league_mapper_path: Option<PathBuf>,
    pub team_mapper_path: Option<PathBuf>,
    pub standings_scope: Scope,
    pub form_grouping: FormGrouping,
    pub form_class: FormClass,
    pub form_windows: Vec<usize>,
    pub target: Target,
    pub feature_sets: Vec<String>,
    pub seed: Option<u64>,
    pub unmapped_policy: UnmappedPolicy,
    pub final_result_marker: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            match_results_path: PathBuf::from("data/match_results.parquet"),
            standings_path: PathBuf::from("data/standings.parquet"),
            form_path: PathBuf::from("data/form.parquet"),
            features_path: PathBuf::from("data/features.parquet"),
            league_mapper_path: None,
            team_mapper_path: None,
            standings_scope: Scope::Overall,
            form_grouping: FormGrouping::Overall,
            form_class: FormClass::Overall,
            form_windows: DEFAULT_WINDOWS.to_vec(),
            target: Target::Goals,
            feature_sets: vec![
                "overall_standings".to_string(),
                "overall_performance".to_string(),
            ],
            seed: None,
            unmapped_policy: UnmappedPolicy::Soft,
            final_result_marker: FINAL_RESULT_MARKER.to_string(),
        }
    }
}

impl PipelineConfig {
    /// `.env.local`, then `.env`, then the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve `LEAGUE_FORM_*` keys through `lookup`; unset keys keep defaults,
    /// set ones must parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Self::default();

        if let Some(v) = get("MATCH_RESULTS") {
            cfg.match_results_path = PathBuf::from(v);
        }
        if let Some(v) = get("STANDINGS_OUT") {
            cfg.standings_path = PathBuf::from(v);
        }
        if let Some(v) = get("FORM_OUT") {
            cfg.form_path = PathBuf::from(v);
        }
        if let Some(v) = get("FEATURES_OUT") {
            cfg.features_path = PathBuf::from(v);
        }
        cfg.league_mapper_path = get("LEAGUE_MAPPER").map(PathBuf::from);
        cfg.team_mapper_path = get("TEAM_MAPPER").map(PathBuf::from);

        parse_into(&get, "STANDINGS_SCOPE", &mut cfg.standings_scope)?;
        parse_into(&get, "FORM_GROUPING", &mut cfg.form_grouping)?;
        parse_into(&get, "FORM_CLASS", &mut cfg.form_class)?;
        parse_into(&get, "TARGET", &mut cfg.target)?;
        parse_into(&get, "UNMAPPED_POLICY", &mut cfg.unmapped_policy)?;

        if let Some(v) = get("FORM_WINDOWS") {
            cfg.form_windows = v
                .split(',')
                .map(|w| {
                    let w = w.trim();
                    w.parse::<usize>()
                        .map_err(|_| EngineError::invalid(w, &["comma separated window sizes"]))
                })
                .collect::<Result<_>>()?;
        }
        if let Some(v) = get("FEATURE_SETS") {
            cfg.feature_sets = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = get("SEED") {
            let seed = v
                .parse::<u64>()
                .map_err(|_| EngineError::invalid(v.as_str(), &["unsigned 64-bit integer"]))?;
            cfg.seed = Some(seed);
        }
        if let Some(v) = get("FINAL_RESULT_MARKER") {
            cfg.final_result_marker = v;
        }

        // Fail on bad windows now rather than mid-run.
        cfg.form_config()?;
        Ok(cfg)
    }

    pub fn form_config(&self) -> Result<FormConfig> {
        FormConfig::new(self.form_grouping, self.form_class, &self.form_windows)
    }
}

fn parse_into<T>(get: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut T) -> Result<()>
where
    T: FromStr<Err = EngineError>,
{
    if let Some(v) = get(name) {
        *slot = v.parse()?;
    }
    Ok(())
}
