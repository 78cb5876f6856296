use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entity_map::{EntityMapper, Resolved};
use crate::error::{EngineError, EntityKind, Result};
use crate::openligadb::RawMatch;

/// Provider marker of the final score among the per-match result entries.
pub const FINAL_RESULT_MARKER: &str = "Endergebnis";

const RELEGATION_NEEDLE: &str = "relegation";

/// Outcome of a match from team 1's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ResultClass {
    Loss,
    Draw,
    Win,
}

impl ResultClass {
    pub fn from_goals(goals_1: i64, goals_2: i64) -> Self {
        match goals_1.cmp(&goals_2) {
            std::cmp::Ordering::Greater => ResultClass::Win,
            std::cmp::Ordering::Equal => ResultClass::Draw,
            std::cmp::Ordering::Less => ResultClass::Loss,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            ResultClass::Loss => -1,
            ResultClass::Draw => 0,
            ResultClass::Win => 1,
        }
    }

    /// Same match seen from the other side.
    pub fn reversed(self) -> Self {
        match self {
            ResultClass::Loss => ResultClass::Win,
            ResultClass::Draw => ResultClass::Draw,
            ResultClass::Win => ResultClass::Loss,
        }
    }

    /// Standard 3/1/0 points for (team 1, team 2).
    pub fn points(self) -> (i64, i64) {
        match self {
            ResultClass::Win => (3, 0),
            ResultClass::Draw => (1, 1),
            ResultClass::Loss => (0, 3),
        }
    }
}

impl TryFrom<i64> for ResultClass {
    type Error = EngineError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(ResultClass::Loss),
            0 => Ok(ResultClass::Draw),
            1 => Ok(ResultClass::Win),
            other => Err(EngineError::invalid(other.to_string(), &["-1", "0", "1"])),
        }
    }
}

impl From<ResultClass> for i64 {
    fn from(value: ResultClass) -> Self {
        value.as_i64()
    }
}

/// One played match, keyed by canonical league and team ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: i64,
    pub league_id: i64,
    pub league_name: String,
    pub season_name: String,
    pub match_day: i64,
    pub match_day_name: String,
    pub team_id_1: i64,
    pub team_id_2: i64,
    pub team_name_1: String,
    pub team_name_2: String,
    pub goals_1: i64,
    pub goals_2: i64,
    pub result_class: ResultClass,
    pub points_1: i64,
    pub points_2: i64,
    pub result_name: String,
}

impl MatchRecord {
    /// Final result with derived class and points; names are placeholders.
    pub fn new(
        match_id: i64,
        league_id: i64,
        match_day: i64,
        team_id_1: i64,
        team_id_2: i64,
        goals_1: i64,
        goals_2: i64,
    ) -> Self {
        let result_class = ResultClass::from_goals(goals_1, goals_2);
        let (points_1, points_2) = result_class.points();
        Self {
            match_id,
            league_id,
            league_name: format!("League {league_id}"),
            season_name: String::new(),
            match_day,
            match_day_name: format!("{match_day}. Spieltag"),
            team_id_1,
            team_id_2,
            team_name_1: format!("Team {team_id_1}"),
            team_name_2: format!("Team {team_id_2}"),
            goals_1,
            goals_2,
            result_class,
            points_1,
            points_2,
            result_name: FINAL_RESULT_MARKER.to_string(),
        }
    }

    pub fn goals_diff(&self) -> i64 {
        self.goals_1 - self.goals_2
    }

    pub fn is_decisive(&self) -> bool {
        self.result_class != ResultClass::Draw
    }

    /// Final results only, relegation playoffs excluded.
    pub fn is_qualifying(&self, final_marker: &str) -> bool {
        self.result_name == final_marker
            && !self
                .match_day_name
                .to_lowercase()
                .contains(RELEGATION_NEEDLE)
    }

    pub fn validate(&self) -> Result<()> {
        let inconsistent = |reason: String| EngineError::InconsistentRecord {
            match_id: self.match_id,
            reason,
        };
        if self.goals_1 < 0 || self.goals_2 < 0 {
            return Err(inconsistent(format!(
                "negative goals {}:{}",
                self.goals_1, self.goals_2
            )));
        }
        if self.team_id_1 == self.team_id_2 {
            return Err(inconsistent(format!(
                "team {} plays itself",
                self.team_id_1
            )));
        }
        let expected = ResultClass::from_goals(self.goals_1, self.goals_2);
        if self.result_class != expected {
            return Err(inconsistent(format!(
                "result_class {} does not match score {}:{}",
                self.result_class.as_i64(),
                self.goals_1,
                self.goals_2
            )));
        }
        if (self.points_1, self.points_2) != expected.points() {
            return Err(inconsistent(format!(
                "points {}/{} do not match score {}:{}",
                self.points_1, self.points_2, self.goals_1, self.goals_2
            )));
        }
        Ok(())
    }
}

/// Keep qualifying matches, validating each one that is kept.
pub fn filter_qualifying(
    records: Vec<MatchRecord>,
    final_marker: &str,
) -> Result<Vec<MatchRecord>> {
    let total = records.len();
    let mut out = Vec::with_capacity(total);
    for record in records {
        if !record.is_qualifying(final_marker) {
            continue;
        }
        record.validate()?;
        out.push(record);
    }
    debug!(total, kept = out.len(), "filtered qualifying matches");
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub records: Vec<MatchRecord>,
    /// Matches the provider has not marked finished, whatever results they carry.
    pub unfinished: usize,
    pub not_final: usize,
    pub incomplete: usize,
    pub unmapped: BTreeSet<(String, String)>,
}

/// Turn provider rows into match records: final results of finished matches
/// only, canonical ids resolved through the mapper, derived score columns
/// filled in.
pub fn clean(
    raw: &[RawMatch],
    mapper: &EntityMapper,
    final_marker: &str,
) -> Result<CleanReport> {
    let mut report = CleanReport::default();

    for row in raw {
        if !row.finished {
            report.unfinished += 1;
            continue;
        }
        if row.result_name.as_deref() != Some(final_marker) {
            report.not_final += 1;
            continue;
        }
        let (Some(match_day), Some(goals_1), Some(goals_2)) =
            (row.match_day, row.goals_1, row.goals_2)
        else {
            report.incomplete += 1;
            continue;
        };

        let (league_name_raw, season_name) = split_league_name(&row.league_name);
        let league_name = match mapper.league(&league_name_raw)? {
            Resolved::Found(name) => name,
            Resolved::Missing => {
                report
                    .unmapped
                    .insert((EntityKind::League.to_string(), league_name_raw.clone()));
                league_name_raw.clone()
            }
        };

        let team_id_1 = mapper.team(&row.team_name_1)?;
        let team_id_2 = mapper.team(&row.team_name_2)?;
        let (Resolved::Found(team_id_1), Resolved::Found(team_id_2)) = (team_id_1, team_id_2) else {
            for name in [&row.team_name_1, &row.team_name_2] {
                if !mapper.has_team(name) {
                    report
                        .unmapped
                        .insert((EntityKind::Team.to_string(), name.clone()));
                }
            }
            continue;
        };

        let result_class = ResultClass::from_goals(goals_1, goals_2);
        let (points_1, points_2) = result_class.points();
        report.records.push(MatchRecord {
            match_id: row.match_id,
            league_id: row.league_id,
            league_name,
            season_name,
            match_day,
            match_day_name: row.match_day_name.clone(),
            team_id_1,
            team_id_2,
            team_name_1: row.team_name_1.clone(),
            team_name_2: row.team_name_2.clone(),
            goals_1,
            goals_2,
            result_class,
            points_1,
            points_2,
            result_name: final_marker.to_string(),
        });
    }

    if !report.unmapped.is_empty() {
        warn!(
            unmapped = report.unmapped.len(),
            "entities without canonical mapping"
        );
    }
    Ok(report)
}

/// Split "1. Fußball-Bundesliga 2023/2024" into the league part and the season.
pub fn split_league_name(raw: &str) -> (String, String) {
    let raw = raw.trim();
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() < 10 {
        return (raw.to_string(), String::new());
    }
    let season: String = chars[chars.len() - 9..].iter().collect();
    if !looks_like_season(&season) {
        return (raw.to_string(), String::new());
    }
    let league: String = chars[..chars.len() - 10].iter().collect();
    (league.trim_end().to_string(), season)
}

fn looks_like_season(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 9
        && bytes[4] == b'/'
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[5..].iter().all(u8::is_ascii_digit)
}
