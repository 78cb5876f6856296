//! Supervised-learning feature tables.
//!
//! A base view turns every match into one or two labelled rows; the statistics
//! of both teams as they stood after the previous match day are then
//! left-joined onto it. Lookups go strictly backwards (`match_day - 1`), so a
//! row never sees the match it describes or anything after it.

use std::collections::HashMap;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::form::FormRow;
use crate::match_record::{MatchRecord, ResultClass};
use crate::standings::StandingsRow;

/// Distance in match days between a predicted match and the statistics joined onto it.
pub const LAG_MATCH_DAYS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Goals,
    ResultClass,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Target::Goals => "goals",
            Target::ResultClass => "result_class",
        }
    }
}

impl FromStr for Target {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "goals" => Ok(Target::Goals),
            "result_class" => Ok(Target::ResultClass),
            _ => Err(EngineError::invalid(s, &["goals", "result_class"])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureSet {
    OverallStandings,
    OverallForm,
}

const FEATURE_SETS: &[(&str, FeatureSet)] = &[
    ("overall_standings", FeatureSet::OverallStandings),
    ("overall_performance", FeatureSet::OverallForm),
    ("overall_form", FeatureSet::OverallForm),
];

impl FeatureSet {
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        FEATURE_SETS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, set)| *set)
    }

    pub fn known_names() -> Vec<&'static str> {
        FEATURE_SETS.iter().map(|(name, _)| *name).collect()
    }
}

/// Feature sets requested by name; names without a builder land in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSelection {
    pub sets: Vec<FeatureSet>,
    pub skipped: Vec<String>,
}

impl FeatureSelection {
    pub fn resolve<S: AsRef<str>>(names: &[S]) -> Self {
        let mut out = Self::default();
        for name in names {
            let name = name.as_ref();
            match FeatureSet::from_name(name) {
                Some(set) if !out.sets.contains(&set) => out.sets.push(set),
                Some(_) => {}
                None => out.skipped.push(name.to_string()),
            }
        }
        if !out.skipped.is_empty() {
            warn!(
                skipped = ?out.skipped,
                known = ?FeatureSet::known_names(),
                "no feature builder for requested names"
            );
        }
        out
    }

    pub fn all() -> Self {
        Self {
            sets: vec![FeatureSet::OverallStandings, FeatureSet::OverallForm],
            skipped: Vec::new(),
        }
    }

    pub fn contains(&self, set: FeatureSet) -> bool {
        self.sets.contains(&set)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// Goals scored by the subject team (`team_id_1`).
    Goals(i64),
    Result {
        goals_1: i64,
        goals_2: i64,
        goals_diff: i64,
        result_class: ResultClass,
    },
}

/// A labelled matchup, `team_id_1` being the subject side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRow {
    pub match_id: i64,
    pub league_id: i64,
    pub match_day: i64,
    pub team_id_1: i64,
    pub team_name_1: String,
    pub team_id_2: i64,
    pub team_name_2: String,
    pub home_flag: bool,
    pub label: Label,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub base: BaseRow,
    pub standings_1: Option<StandingsRow>,
    pub standings_2: Option<StandingsRow>,
    pub form_1: Option<FormRow>,
    pub form_2: Option<FormRow>,
}

/// Seeded when a seed is given, fresh entropy otherwise.
pub fn sampling_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Two rows per match: the home side as subject labelled with its goals, then
/// the away side as subject labelled with its goals. All home rows come first.
pub fn goals_view(matches: &[MatchRecord]) -> Vec<BaseRow> {
    let mut out = Vec::with_capacity(matches.len() * 2);
    out.extend(matches.iter().map(|m| BaseRow {
        match_id: m.match_id,
        league_id: m.league_id,
        match_day: m.match_day,
        team_id_1: m.team_id_1,
        team_name_1: m.team_name_1.clone(),
        team_id_2: m.team_id_2,
        team_name_2: m.team_name_2.clone(),
        home_flag: true,
        label: Label::Goals(m.goals_1),
    }));
    out.extend(matches.iter().map(|m| BaseRow {
        match_id: m.match_id,
        league_id: m.league_id,
        match_day: m.match_day,
        team_id_1: m.team_id_2,
        team_name_1: m.team_name_2.clone(),
        team_id_2: m.team_id_1,
        team_name_2: m.team_name_1.clone(),
        home_flag: false,
        label: Label::Goals(m.goals_2),
    }));
    out
}

/// One row per match. Half of the matches (rounded down, drawn without
/// replacement from `rng`) are turned around: teams swapped, goal difference
/// and result negated, `home_flag` cleared.
pub fn result_class_view<R: Rng + ?Sized>(matches: &[MatchRecord], rng: &mut R) -> Vec<BaseRow> {
    let n_reversed = matches.len() / 2;
    let mut reversed = vec![false; matches.len()];
    for idx in rand::seq::index::sample(rng, matches.len(), n_reversed) {
        reversed[idx] = true;
    }

    matches
        .iter()
        .zip(reversed)
        .map(|(m, flip)| {
            if flip {
                BaseRow {
                    match_id: m.match_id,
                    league_id: m.league_id,
                    match_day: m.match_day,
                    team_id_1: m.team_id_2,
                    team_name_1: m.team_name_2.clone(),
                    team_id_2: m.team_id_1,
                    team_name_2: m.team_name_1.clone(),
                    home_flag: false,
                    label: Label::Result {
                        goals_1: m.goals_2,
                        goals_2: m.goals_1,
                        goals_diff: -m.goals_diff(),
                        result_class: m.result_class.reversed(),
                    },
                }
            } else {
                BaseRow {
                    match_id: m.match_id,
                    league_id: m.league_id,
                    match_day: m.match_day,
                    team_id_1: m.team_id_1,
                    team_name_1: m.team_name_1.clone(),
                    team_id_2: m.team_id_2,
                    team_name_2: m.team_name_2.clone(),
                    home_flag: true,
                    label: Label::Result {
                        goals_1: m.goals_1,
                        goals_2: m.goals_2,
                        goals_diff: m.goals_diff(),
                        result_class: m.result_class,
                    },
                }
            }
        })
        .collect()
}

pub fn base_view<R: Rng + ?Sized>(
    matches: &[MatchRecord],
    target: Target,
    rng: &mut R,
) -> Vec<BaseRow> {
    match target {
        Target::Goals => goals_view(matches),
        Target::ResultClass => result_class_view(matches, rng),
    }
}

type TeamDayKey = (i64, i64, i64);

struct LagIndex<'a, T> {
    rows: HashMap<TeamDayKey, &'a T>,
}

impl<'a, T> LagIndex<'a, T> {
    /// On a key collision the row with the most games played wins, so a team
    /// with two matches on one day is seen after both.
    fn new(rows: &'a [T], key: impl Fn(&T) -> TeamDayKey, games: impl Fn(&T) -> i64) -> Self {
        let mut index: HashMap<TeamDayKey, &'a T> = HashMap::with_capacity(rows.len());
        for row in rows {
            index
                .entry(key(row))
                .and_modify(|held| {
                    if games(row) >= games(*held) {
                        *held = row;
                    }
                })
                .or_insert(row);
        }
        Self { rows: index }
    }

    /// The row of `team_id` after the match day preceding `match_day`.
    fn prior(&self, league_id: i64, team_id: i64, match_day: i64) -> Option<&'a T> {
        self.rows
            .get(&(league_id, team_id, match_day - LAG_MATCH_DAYS))
            .copied()
    }
}

/// Left-join each team's previous-match-day standings and form onto `base`.
/// Missing history leaves the columns empty.
pub fn assemble(
    base: Vec<BaseRow>,
    standings: &[StandingsRow],
    form: &[FormRow],
    selection: &FeatureSelection,
) -> Vec<FeatureRow> {
    let standings_index = LagIndex::new(
        standings,
        |r| (r.league_id, r.team_id, r.match_day),
        |r| r.tally.games,
    );
    let form_index = LagIndex::new(form, |r| (r.league_id, r.team_id, r.match_day), |r| r.games);
    let with_standings = selection.contains(FeatureSet::OverallStandings);
    let with_form = selection.contains(FeatureSet::OverallForm);

    base.into_iter()
        .map(|b| {
            let lookup_standings = |team_id| {
                with_standings
                    .then(|| standings_index.prior(b.league_id, team_id, b.match_day))
                    .flatten()
                    .cloned()
            };
            let lookup_form = |team_id| {
                with_form
                    .then(|| form_index.prior(b.league_id, team_id, b.match_day))
                    .flatten()
                    .cloned()
            };
            FeatureRow {
                standings_1: lookup_standings(b.team_id_1),
                standings_2: lookup_standings(b.team_id_2),
                form_1: lookup_form(b.team_id_1),
                form_2: lookup_form(b.team_id_2),
                base: b,
            }
        })
        .collect()
}

pub fn build_features<R: Rng + ?Sized>(
    matches: &[MatchRecord],
    standings: &[StandingsRow],
    form: &[FormRow],
    selection: &FeatureSelection,
    target: Target,
    rng: &mut R,
) -> Vec<FeatureRow> {
    assemble(base_view(matches, target, rng), standings, form, selection)
}
