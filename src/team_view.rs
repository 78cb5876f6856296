//! Team-centric perspectives of match rows.
//!
//! Every match is seen once from team 1 (home) and once from team 2 (away).
//! A scope that leaves a side out still emits its row, tagged
//! [`Participation::Excluded`] with a zero tally, so downstream tables keep one
//! row per (match, team).

use std::ops::AddAssign;
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::match_record::{MatchRecord, ResultClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Team1,
    Team2,
}

impl Role {
    pub const BOTH: [Role; 2] = [Role::Team1, Role::Team2];

    pub fn is_home(self) -> bool {
        self == Role::Team1
    }
}

impl TryFrom<i64> for Role {
    type Error = EngineError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(Role::Team1),
            2 => Ok(Role::Team2),
            other => Err(EngineError::invalid(other.to_string(), &["1", "2"])),
        }
    }
}

impl FromStr for Role {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" => Ok(Role::Team1),
            "2" => Ok(Role::Team2),
            _ => Err(EngineError::invalid(s, &["1", "2"])),
        }
    }
}

/// Which sides of a match count towards a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    Home,
    Away,
    #[default]
    Overall,
}

impl Scope {
    pub fn includes(self, role: Role) -> bool {
        match self {
            Scope::Home => role == Role::Team1,
            Scope::Away => role == Role::Team2,
            Scope::Overall => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Home => "home",
            Scope::Away => "away",
            Scope::Overall => "overall",
        }
    }
}

impl FromStr for Scope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" => Ok(Scope::Home),
            "away" => Ok(Scope::Away),
            "overall" => Ok(Scope::Overall),
            _ => Err(EngineError::invalid(s, &["home", "away", "overall"])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Participation {
    Included,
    Excluded,
}

/// Countable per-match statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Games,
    Wins,
    Draws,
    Losses,
    GoalsScored,
    GoalsConceded,
    GoalsDiff,
    Points,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Games,
        Metric::Wins,
        Metric::Draws,
        Metric::Losses,
        Metric::GoalsScored,
        Metric::GoalsConceded,
        Metric::GoalsDiff,
        Metric::Points,
    ];

    /// Everything except `games`, which is the denominator of form averages.
    pub const FORM: [Metric; 7] = [
        Metric::Wins,
        Metric::Draws,
        Metric::Losses,
        Metric::Points,
        Metric::GoalsScored,
        Metric::GoalsConceded,
        Metric::GoalsDiff,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Games => "games",
            Metric::Wins => "wins",
            Metric::Draws => "draws",
            Metric::Losses => "losses",
            Metric::GoalsScored => "goals_scored",
            Metric::GoalsConceded => "goals_conceded",
            Metric::GoalsDiff => "goals_diff",
            Metric::Points => "points",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tally {
    pub games: i64,
    pub wins: i64,
    pub draws: i64,
    pub losses: i64,
    pub goals_scored: i64,
    pub goals_conceded: i64,
    pub goals_diff: i64,
    pub points: i64,
}

impl Tally {
    pub const ZERO: Tally = Tally {
        games: 0,
        wins: 0,
        draws: 0,
        losses: 0,
        goals_scored: 0,
        goals_conceded: 0,
        goals_diff: 0,
        points: 0,
    };

    /// One played match from the perspective of a side with `scored`/`conceded` goals.
    pub fn from_score(scored: i64, conceded: i64) -> Self {
        let outcome = ResultClass::from_goals(scored, conceded);
        let (points, _) = outcome.points();
        Tally {
            games: 1,
            wins: i64::from(outcome == ResultClass::Win),
            draws: i64::from(outcome == ResultClass::Draw),
            losses: i64::from(outcome == ResultClass::Loss),
            goals_scored: scored,
            goals_conceded: conceded,
            goals_diff: scored - conceded,
            points,
        }
    }

    pub fn get(&self, metric: Metric) -> i64 {
        match metric {
            Metric::Games => self.games,
            Metric::Wins => self.wins,
            Metric::Draws => self.draws,
            Metric::Losses => self.losses,
            Metric::GoalsScored => self.goals_scored,
            Metric::GoalsConceded => self.goals_conceded,
            Metric::GoalsDiff => self.goals_diff,
            Metric::Points => self.points,
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Tally) {
        self.games += rhs.games;
        self.wins += rhs.wins;
        self.draws += rhs.draws;
        self.losses += rhs.losses;
        self.goals_scored += rhs.goals_scored;
        self.goals_conceded += rhs.goals_conceded;
        self.goals_diff += rhs.goals_diff;
        self.points += rhs.points;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMatchRow {
    pub match_id: i64,
    pub league_id: i64,
    pub league_name: String,
    pub season_name: String,
    pub match_day: i64,
    pub team_id: i64,
    pub team_name: String,
    pub home_flag: bool,
    pub participation: Participation,
    pub tally: Tally,
}

impl TeamMatchRow {
    pub fn is_included(&self) -> bool {
        self.participation == Participation::Included
    }
}

/// The row of one side of `record`; zero tally and `Excluded` when `scope`
/// leaves that side out.
pub fn expand(record: &MatchRecord, role: Role, scope: Scope) -> TeamMatchRow {
    let (team_id, team_name, scored, conceded) = match role {
        Role::Team1 => (
            record.team_id_1,
            &record.team_name_1,
            record.goals_1,
            record.goals_2,
        ),
        Role::Team2 => (
            record.team_id_2,
            &record.team_name_2,
            record.goals_2,
            record.goals_1,
        ),
    };
    let (participation, tally) = if scope.includes(role) {
        let mut tally = Tally::from_score(scored, conceded);
        tally.points = match role {
            Role::Team1 => record.points_1,
            Role::Team2 => record.points_2,
        };
        (Participation::Included, tally)
    } else {
        (Participation::Excluded, Tally::ZERO)
    };

    TeamMatchRow {
        match_id: record.match_id,
        league_id: record.league_id,
        league_name: record.league_name.clone(),
        season_name: record.season_name.clone(),
        match_day: record.match_day,
        team_id,
        team_name: team_name.clone(),
        home_flag: role.is_home(),
        participation,
        tally,
    }
}

/// All team-1 rows followed by all team-2 rows.
pub fn expand_all(records: &[MatchRecord], scope: Scope) -> Vec<TeamMatchRow> {
    let mut out = Vec::with_capacity(records.len() * 2);
    for role in Role::BOTH {
        out.extend(records.iter().map(|record| expand(record, role, scope)));
    }
    out
}
