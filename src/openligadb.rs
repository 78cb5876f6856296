use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{info, warn};

use crate::http_cache::fetch_json_cached;
use crate::http_client::http_client;

const OPENLIGADB_API: &str = "https://api.openligadb.de";

/// One flattened provider row: match metadata plus one entry of its result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub match_id: i64,
    pub league_id: i64,
    pub league_name: String,
    pub match_day: Option<i64>,
    pub match_day_name: String,
    pub team_name_1: String,
    pub team_name_2: String,
    pub finished: bool,
    pub result_name: Option<String>,
    pub goals_1: Option<i64>,
    pub goals_2: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeagueSeason {
    pub shortcut: String,
    pub season: i64,
}

#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    pub fetched: Vec<(LeagueSeason, usize)>,
    pub skipped: Vec<LeagueSeason>,
    pub errors: Vec<String>,
    pub rows: Vec<RawMatch>,
}

pub fn available_league_seasons() -> Result<Vec<LeagueSeason>> {
    let client = http_client()?;
    let url = format!("{OPENLIGADB_API}/getavailableleagues");
    let body = fetch_json_cached(client, &url).context("fetch available leagues failed")?;
    parse_available_leagues_json(&body)
}

pub fn season_available(available: &[LeagueSeason], shortcut: &str, season: i64) -> bool {
    available
        .iter()
        .any(|ls| ls.season == season && ls.shortcut.eq_ignore_ascii_case(shortcut))
}

pub fn fetch_season_json(shortcut: &str, season: i64) -> Result<String> {
    let client = http_client()?;
    let url = format!("{OPENLIGADB_API}/getmatchdata/{shortcut}/{season}");
    fetch_json_cached(client, &url)
        .with_context(|| format!("fetch match data failed for {shortcut} {season}"))
}

pub fn fetch_season_matches(shortcut: &str, season: i64) -> Result<Vec<RawMatch>> {
    let body = fetch_season_json(shortcut, season)?;
    parse_season_json(&body)
}

/// Fetch every requested league-season the provider lists; unlisted pairs are
/// skipped, failed ones recorded in `errors`.
pub fn fetch_many_seasons(shortcuts: &[&str], seasons: &[i64]) -> Result<FetchSummary> {
    if shortcuts.is_empty() || seasons.is_empty() {
        return Err(anyhow!("no league shortcuts or seasons passed to fetch"));
    }
    let available = available_league_seasons()?;
    let mut summary = FetchSummary::default();

    for shortcut in shortcuts {
        for season in seasons {
            let pair = LeagueSeason {
                shortcut: shortcut.to_string(),
                season: *season,
            };
            if !season_available(&available, shortcut, *season) {
                info!(league = *shortcut, season, "not available, skipped");
                summary.skipped.push(pair);
                continue;
            }
            match fetch_season_matches(shortcut, *season) {
                Ok(rows) => {
                    info!(league = *shortcut, season, rows = rows.len(), "season loaded");
                    summary.fetched.push((pair, rows.len()));
                    summary.rows.extend(rows);
                }
                Err(err) => {
                    warn!(league = *shortcut, season, "season failed: {err:#}");
                    summary.errors.push(format!("{shortcut} {season}: {err:#}"));
                }
            }
        }
    }
    Ok(summary)
}

pub fn parse_available_leagues_json(raw: &str) -> Result<Vec<LeagueSeason>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(trimmed).context("invalid available leagues json")?;
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("available leagues payload is not an array"))?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let Some(shortcut) = item.get("leagueShortcut").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(season) = item.get("leagueSeason").and_then(as_i64_any) else {
            continue;
        };
        let pair = LeagueSeason {
            shortcut: shortcut.trim().to_string(),
            season,
        };
        if seen.insert(pair.clone()) {
            out.push(pair);
        }
    }
    Ok(out)
}

/// Flatten one season payload. Every match yields one row per result entry,
/// or a single row without result fields when the list is empty.
pub fn parse_season_json(raw: &str) -> Result<Vec<RawMatch>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(trimmed).context("invalid match data json")?;
    let matches = value
        .as_array()
        .ok_or_else(|| anyhow!("match data payload is not an array"))?;

    let mut out = Vec::with_capacity(matches.len() * 2);
    for m in matches {
        let Some(base) = parse_match_meta(m) else {
            continue;
        };
        let results = m
            .get("matchResults")
            .and_then(|v| v.as_array())
            .map(|arr| arr.as_slice())
            .unwrap_or_default();
        if results.is_empty() {
            out.push(base);
            continue;
        }
        for result in results {
            let mut row = base.clone();
            row.result_name = result
                .get("resultName")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            row.goals_1 = result.get("pointsTeam1").and_then(as_i64_any);
            row.goals_2 = result.get("pointsTeam2").and_then(as_i64_any);
            out.push(row);
        }
    }
    Ok(out)
}

fn parse_match_meta(v: &Value) -> Option<RawMatch> {
    let match_id = as_i64_any(v.get("matchID")?)?;
    let league_id = v.get("leagueId").and_then(as_i64_any).unwrap_or_default();
    let league_name = str_field(v, "leagueName").unwrap_or_default();

    let group = v.get("group");
    let match_day = group.and_then(|g| g.get("groupOrderID")).and_then(as_i64_any);
    let match_day_name = group
        .and_then(|g| str_field(g, "groupName"))
        .unwrap_or_default();

    let team1 = v.get("team1")?;
    let team2 = v.get("team2")?;
    let team_name_1 = str_field(team1, "teamName")?;
    let team_name_2 = str_field(team2, "teamName")?;
    if team_name_1.is_empty() || team_name_2.is_empty() {
        return None;
    }

    Some(RawMatch {
        match_id,
        league_id,
        league_name,
        match_day,
        match_day_name,
        team_name_1,
        team_name_2,
        finished: v
            .get("matchIsFinished")
            .and_then(|x| x.as_bool())
            .unwrap_or(false),
        result_name: None,
        goals_1: None,
        goals_2: None,
    })
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|x| x.as_str())
        .map(|s| s.trim().to_string())
}

fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}
