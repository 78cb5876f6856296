use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{EngineError, EntityKind, Result};

const LEAGUE_COLUMNS: &[&str] = &["league_name_raw", "league_name"];
const TEAM_COLUMNS: &[&str] = &["team_name", "team_id"];

/// What to do with a raw name that has no canonical mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappedPolicy {
    /// Report the name and carry on without it.
    #[default]
    Soft,
    /// Fail on the first unmapped name.
    Strict,
}

impl FromStr for UnmappedPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(UnmappedPolicy::Soft),
            "strict" => Ok(UnmappedPolicy::Strict),
            _ => Err(EngineError::invalid(s, &["soft", "strict"])),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    Found(T),
    Missing,
}

#[derive(Debug, Deserialize)]
struct LeagueMapping {
    league_name_raw: String,
    league_name: String,
}

#[derive(Debug, Deserialize)]
struct TeamMapping {
    team_name: String,
    team_id: i64,
}

/// Read-only raw-name to canonical-key lookups for leagues and teams.
#[derive(Debug, Clone, Default)]
pub struct EntityMapper {
    leagues: HashMap<String, String>,
    teams: HashMap<String, i64>,
    policy: UnmappedPolicy,
}

impl EntityMapper {
    pub fn new(policy: UnmappedPolicy) -> Self {
        Self {
            leagues: HashMap::new(),
            teams: HashMap::new(),
            policy,
        }
    }

    pub fn from_csv_paths(
        league_path: &Path,
        team_path: &Path,
        policy: UnmappedPolicy,
    ) -> Result<Self> {
        let leagues = File::open(league_path)?;
        let teams = File::open(team_path)?;
        Self::from_readers(leagues, teams, policy)
    }

    pub fn from_readers<L: Read, T: Read>(
        leagues: L,
        teams: T,
        policy: UnmappedPolicy,
    ) -> Result<Self> {
        let mut mapper = Self::new(policy);

        let mut reader = csv::Reader::from_reader(leagues);
        require_headers(&mut reader, LEAGUE_COLUMNS, "league mapper")?;
        for row in reader.deserialize::<LeagueMapping>() {
            let row = row?;
            mapper.insert_league(&row.league_name_raw, &row.league_name);
        }

        let mut reader = csv::Reader::from_reader(teams);
        require_headers(&mut reader, TEAM_COLUMNS, "team mapper")?;
        for row in reader.deserialize::<TeamMapping>() {
            let row = row?;
            mapper.insert_team(&row.team_name, row.team_id);
        }

        Ok(mapper)
    }

    pub fn insert_league(&mut self, raw: &str, canonical: &str) {
        self.leagues
            .insert(raw.trim().to_string(), canonical.trim().to_string());
    }

    pub fn insert_team(&mut self, raw: &str, team_id: i64) {
        self.teams.insert(raw.trim().to_string(), team_id);
    }

    pub fn policy(&self) -> UnmappedPolicy {
        self.policy
    }

    pub fn has_team(&self, raw: &str) -> bool {
        self.teams.contains_key(raw.trim())
    }

    pub fn league(&self, raw: &str) -> Result<Resolved<String>> {
        match self.leagues.get(raw.trim()) {
            Some(name) => Ok(Resolved::Found(name.clone())),
            None => self.missing(EntityKind::League, raw),
        }
    }

    pub fn team(&self, raw: &str) -> Result<Resolved<i64>> {
        match self.teams.get(raw.trim()) {
            Some(id) => Ok(Resolved::Found(*id)),
            None => self.missing(EntityKind::Team, raw),
        }
    }

    fn missing<T>(&self, kind: EntityKind, raw: &str) -> Result<Resolved<T>> {
        match self.policy {
            UnmappedPolicy::Soft => Ok(Resolved::Missing),
            UnmappedPolicy::Strict => Err(EngineError::UnmappedEntity {
                kind,
                raw: raw.to_string(),
            }),
        }
    }
}

fn require_headers<R: Read>(
    reader: &mut csv::Reader<R>,
    required: &[&str],
    table: &str,
) -> Result<()> {
    let headers = reader.headers()?;
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h.trim() == *col))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::SchemaViolation(format!(
            "{table} is missing columns {missing:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAGUES: &str = "league_name_raw,league_name\n\
        1. Fußball-Bundesliga,1. Bundesliga\n\
        1. Bundesliga,1. Bundesliga\n";
    const TEAMS: &str = "team_name,team_id\n\
        FC Bayern,40\n\
        FC Bayern München,40\n\
        Werder Bremen,134\n";

    #[test]
    fn aliases_resolve_to_one_id() {
        let mapper =
            EntityMapper::from_readers(LEAGUES.as_bytes(), TEAMS.as_bytes(), UnmappedPolicy::Soft)
                .unwrap();
        assert_eq!(mapper.team("FC Bayern").unwrap(), Resolved::Found(40));
        assert_eq!(mapper.team("FC Bayern München").unwrap(), Resolved::Found(40));
        assert_eq!(
            mapper.league("1. Fußball-Bundesliga").unwrap(),
            Resolved::Found("1. Bundesliga".to_string())
        );
        assert_eq!(mapper.team("Hertha").unwrap(), Resolved::Missing);
    }

    #[test]
    fn strict_policy_fails_on_unknown_team() {
        let mapper =
            EntityMapper::from_readers(LEAGUES.as_bytes(), TEAMS.as_bytes(), UnmappedPolicy::Strict)
                .unwrap();
        let err = mapper.team("Hertha").unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnmappedEntity {
                kind: EntityKind::Team,
                ..
            }
        ));
    }

    #[test]
    fn missing_column_is_schema_violation() {
        let bad = "name,id\nFC Bayern,40\n";
        let err =
            EntityMapper::from_readers(LEAGUES.as_bytes(), bad.as_bytes(), UnmappedPolicy::Soft)
                .unwrap_err();
        assert!(matches!(err, EngineError::SchemaViolation(_)));
    }

    #[test]
    fn policy_parses_or_names_valid_set() {
        assert_eq!("STRICT".parse::<UnmappedPolicy>().unwrap(), UnmappedPolicy::Strict);
        let err = "lenient".parse::<UnmappedPolicy>().unwrap_err();
        assert!(err.to_string().contains("[soft, strict]"));
    }
}
