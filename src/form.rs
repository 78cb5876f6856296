//! Recent-form indicators: trailing-window sums over the last `W` played
//! matches and running per-game averages.
//!
//! A window sum is `None` until the group holds at least `W` played matches;
//! partial windows are never summed. Excluded perspective rows are not
//! matches played and are skipped.

use std::collections::HashMap;
use std::str::FromStr;

use rayon::prelude::*;

use crate::error::{EngineError, Result};
use crate::team_view::{Metric, TeamMatchRow};

pub const DEFAULT_WINDOWS: [usize; 2] = [3, 5];

const FORM_METRICS: usize = Metric::FORM.len();

/// Whether home and away matches form separate histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormGrouping {
    #[default]
    Overall,
    HomeAway,
}

impl FromStr for FormGrouping {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overall" => Ok(FormGrouping::Overall),
            "home_away" => Ok(FormGrouping::HomeAway),
            _ => Err(EngineError::invalid(s, &["overall", "home_away"])),
        }
    }
}

/// Which matches are considered at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormClass {
    #[default]
    Overall,
    Home,
    Away,
}

impl FormClass {
    fn admits(self, row: &TeamMatchRow) -> bool {
        match self {
            FormClass::Overall => true,
            FormClass::Home => row.home_flag,
            FormClass::Away => !row.home_flag,
        }
    }
}

impl FromStr for FormClass {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overall" => Ok(FormClass::Overall),
            "home" => Ok(FormClass::Home),
            "away" => Ok(FormClass::Away),
            _ => Err(EngineError::invalid(s, &["home", "away", "overall"])),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormConfig {
    pub grouping: FormGrouping,
    pub class: FormClass,
    windows: Vec<usize>,
}

impl FormConfig {
    pub fn new(grouping: FormGrouping, class: FormClass, windows: &[usize]) -> Result<Self> {
        if let Some(bad) = windows.iter().find(|w| **w == 0) {
            return Err(EngineError::invalid(bad.to_string(), &["window size >= 1"]));
        }
        if windows.is_empty() {
            return Err(EngineError::invalid("[]", &["at least one window size"]));
        }
        let mut windows = windows.to_vec();
        windows.sort_unstable();
        windows.dedup();
        Ok(Self {
            grouping,
            class,
            windows,
        })
    }

    pub fn windows(&self) -> &[usize] {
        &self.windows
    }
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            grouping: FormGrouping::Overall,
            class: FormClass::Overall,
            windows: DEFAULT_WINDOWS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSums {
    pub size: usize,
    /// Indexed like [`Metric::FORM`].
    pub values: [Option<i64>; FORM_METRICS],
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormRow {
    pub match_id: i64,
    pub league_id: i64,
    pub match_day: i64,
    pub team_id: i64,
    pub team_name: String,
    pub home_flag: bool,
    /// Played matches in the group up to and including this one.
    pub games: i64,
    pub windows: Vec<WindowSums>,
    /// Indexed like [`Metric::FORM`].
    pub averages: [Option<f64>; FORM_METRICS],
}

impl FormRow {
    pub fn last(&self, metric: Metric, size: usize) -> Option<i64> {
        let idx = form_index(metric)?;
        self.windows
            .iter()
            .find(|w| w.size == size)
            .and_then(|w| w.values[idx])
    }

    pub fn avg(&self, metric: Metric) -> Option<f64> {
        form_index(metric).and_then(|idx| self.averages[idx])
    }
}

fn form_index(metric: Metric) -> Option<usize> {
    Metric::FORM.iter().position(|m| *m == metric)
}

type GroupKey = (i64, i64, Option<bool>);

pub fn compute_form(rows: &[TeamMatchRow], config: &FormConfig) -> Vec<FormRow> {
    let mut groups: HashMap<GroupKey, Vec<&TeamMatchRow>> = HashMap::new();
    for row in rows {
        if !row.is_included() || !config.class.admits(row) {
            continue;
        }
        let split = match config.grouping {
            FormGrouping::Overall => None,
            FormGrouping::HomeAway => Some(row.home_flag),
        };
        groups
            .entry((row.league_id, row.team_id, split))
            .or_default()
            .push(row);
    }

    let mut out: Vec<FormRow> = groups
        .into_values()
        .collect::<Vec<_>>()
        .into_par_iter()
        .flat_map_iter(|group| form_for_group(group, config.windows()))
        .collect();
    out.sort_by(|a, b| {
        (a.league_id, a.team_id, a.match_day, a.home_flag).cmp(&(
            b.league_id,
            b.team_id,
            b.match_day,
            b.home_flag,
        ))
    });
    out
}

fn form_for_group(mut rows: Vec<&TeamMatchRow>, windows: &[usize]) -> Vec<FormRow> {
    rows.sort_by_key(|row| row.match_day);

    // prefix[i][m] = sum of metric m over the first i matches.
    let mut prefix: Vec<[i64; FORM_METRICS]> = Vec::with_capacity(rows.len() + 1);
    prefix.push([0; FORM_METRICS]);
    let mut games_prefix = vec![0_i64];
    for row in &rows {
        let mut next = *prefix.last().unwrap_or(&[0; FORM_METRICS]);
        for (slot, metric) in next.iter_mut().zip(Metric::FORM) {
            *slot += row.tally.get(metric);
        }
        prefix.push(next);
        games_prefix.push(games_prefix.last().copied().unwrap_or_default() + row.tally.games);
    }

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let end = i + 1;
            let window_sums = windows
                .iter()
                .map(|&size| {
                    let mut values = [None; FORM_METRICS];
                    if end >= size {
                        for (m, value) in values.iter_mut().enumerate() {
                            *value = Some(prefix[end][m] - prefix[end - size][m]);
                        }
                    }
                    WindowSums { size, values }
                })
                .collect();

            let games = games_prefix[end];
            let mut averages = [None; FORM_METRICS];
            if games > 0 {
                for (m, avg) in averages.iter_mut().enumerate() {
                    *avg = Some(prefix[end][m] as f64 / games as f64);
                }
            }

            FormRow {
                match_id: row.match_id,
                league_id: row.league_id,
                match_day: row.match_day,
                team_id: row.team_id,
                team_name: row.team_name.clone(),
                home_flag: row.home_flag,
                games,
                windows: window_sums,
                averages,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_record::MatchRecord;
    use crate::team_view::{Scope, expand_all};

    fn team_rows(rows: &[FormRow], team_id: i64) -> Vec<&FormRow> {
        rows.iter().filter(|r| r.team_id == team_id).collect()
    }

    #[test]
    fn window_is_none_until_full() {
        // Team 10 wins every match.
        let matches: Vec<_> = (1..=4)
            .map(|day| MatchRecord::new(day, 1, day, 10, 20 + day, 1, 0))
            .collect();
        let form = compute_form(&expand_all(&matches, Scope::Overall), &FormConfig::default());
        let rows = team_rows(&form, 10);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].last(Metric::Wins, 3), None);
        assert_eq!(rows[1].last(Metric::Wins, 3), None);
        assert_eq!(rows[2].last(Metric::Wins, 3), Some(3));
        assert_eq!(rows[3].last(Metric::Wins, 3), Some(3));
        assert_eq!(rows[3].last(Metric::Points, 3), Some(9));
        assert_eq!(rows[3].last(Metric::Wins, 5), None);
    }

    #[test]
    fn window_slides_over_latest_matches() {
        let matches = vec![
            MatchRecord::new(1, 1, 1, 10, 20, 3, 0),
            MatchRecord::new(2, 1, 2, 10, 21, 0, 1),
            MatchRecord::new(3, 1, 3, 10, 22, 1, 1),
            MatchRecord::new(4, 1, 4, 10, 23, 0, 2),
        ];
        let form = compute_form(&expand_all(&matches, Scope::Overall), &FormConfig::default());
        let rows = team_rows(&form, 10);
        let last = rows[3];
        assert_eq!(last.last(Metric::Wins, 3), Some(0));
        assert_eq!(last.last(Metric::Draws, 3), Some(1));
        assert_eq!(last.last(Metric::Losses, 3), Some(2));
        assert_eq!(last.last(Metric::GoalsScored, 3), Some(1));
        assert_eq!(last.last(Metric::GoalsConceded, 3), Some(4));
        assert_eq!(last.last(Metric::GoalsDiff, 3), Some(-3));
        assert_eq!(last.games, 4);
        let avg_points = last.avg(Metric::Points).unwrap();
        assert!((avg_points - 1.0).abs() < 1e-9);
        let avg_goals = last.avg(Metric::GoalsScored).unwrap();
        assert!((avg_goals - 1.0).abs() < 1e-9);
    }

    #[test]
    fn home_away_grouping_splits_histories() {
        let matches = vec![
            MatchRecord::new(1, 1, 1, 10, 20, 1, 0),
            MatchRecord::new(2, 1, 2, 20, 10, 2, 0),
            MatchRecord::new(3, 1, 3, 10, 20, 1, 1),
        ];
        let config = FormConfig::new(FormGrouping::HomeAway, FormClass::Overall, &[2]).unwrap();
        let form = compute_form(&expand_all(&matches, Scope::Overall), &config);
        let rows = team_rows(&form, 10);
        let day3 = rows.iter().find(|r| r.match_day == 3).unwrap();
        assert!(day3.home_flag);
        assert_eq!(day3.games, 2);
        assert_eq!(day3.last(Metric::Points, 2), Some(4));
        let day2 = rows.iter().find(|r| r.match_day == 2).unwrap();
        assert_eq!(day2.games, 1);
        assert_eq!(day2.last(Metric::Points, 2), None);
    }

    #[test]
    fn away_class_drops_home_matches() {
        let matches = vec![
            MatchRecord::new(1, 1, 1, 10, 20, 1, 0),
            MatchRecord::new(2, 1, 2, 20, 10, 2, 0),
        ];
        let config = FormConfig::new(FormGrouping::Overall, FormClass::Away, &[3]).unwrap();
        let form = compute_form(&expand_all(&matches, Scope::Overall), &config);
        assert!(form.iter().all(|r| !r.home_flag));
        assert_eq!(form.len(), 2);
    }

    #[test]
    fn excluded_rows_are_not_matches_played() {
        let matches = vec![
            MatchRecord::new(1, 1, 1, 10, 20, 1, 0),
            MatchRecord::new(2, 1, 2, 20, 10, 2, 0),
        ];
        let form = compute_form(&expand_all(&matches, Scope::Home), &FormConfig::default());
        assert_eq!(form.len(), 2);
        assert!(form.iter().all(|r| r.home_flag && r.games == 1));
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(FormConfig::new(FormGrouping::Overall, FormClass::Overall, &[0, 3]).is_err());
        assert!(FormConfig::new(FormGrouping::Overall, FormClass::Overall, &[]).is_err());
        assert!("home-away".parse::<FormGrouping>().is_err());
    }
}
