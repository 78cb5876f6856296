use std::collections::HashMap;

use rayon::prelude::*;

use crate::team_view::{Tally, TeamMatchRow};

/// Cumulative table position of one team after one match day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingsRow {
    pub league_id: i64,
    pub league_name: String,
    pub season_name: String,
    pub match_day: i64,
    pub team_id: i64,
    pub team_name: String,
    pub tally: Tally,
    pub rank: i64,
}

impl StandingsRow {
    fn sort_key(&self) -> (i64, i64, i64) {
        (self.tally.points, self.tally.goals_diff, self.tally.goals_scored)
    }
}

/// Full standings history: running totals per (league, team) ordered by match
/// day, ranked per (league, match day) by points, goal difference and goals
/// scored. Equal keys share the lowest rank and the next key skips ahead
/// (1, 1, 3).
pub fn compute_standings(rows: &[TeamMatchRow]) -> Vec<StandingsRow> {
    let mut partitions: HashMap<(i64, i64), Vec<&TeamMatchRow>> = HashMap::new();
    for row in rows {
        partitions
            .entry((row.league_id, row.team_id))
            .or_default()
            .push(row);
    }

    let mut out: Vec<StandingsRow> = partitions
        .into_values()
        .collect::<Vec<_>>()
        .into_par_iter()
        .flat_map_iter(accumulate_partition)
        .collect();

    assign_ranks(&mut out);
    out.sort_by_key(|r| (r.league_id, r.match_day, r.rank, r.team_id));
    out
}

/// One row per match day. Several matches on the same day fold into a single
/// row holding the total after the last of them.
fn accumulate_partition(mut rows: Vec<&TeamMatchRow>) -> Vec<StandingsRow> {
    // Stable: same-day rows keep their input order.
    rows.sort_by_key(|row| row.match_day);
    let mut running = Tally::ZERO;
    let mut out: Vec<StandingsRow> = Vec::with_capacity(rows.len());
    for row in rows {
        running += row.tally;
        if let Some(last) = out.last_mut()
            && last.match_day == row.match_day
        {
            last.tally = running;
            continue;
        }
        out.push(StandingsRow {
            league_id: row.league_id,
            league_name: row.league_name.clone(),
            season_name: row.season_name.clone(),
            match_day: row.match_day,
            team_id: row.team_id,
            team_name: row.team_name.clone(),
            tally: running,
            rank: 0,
        });
    }
    out
}

fn assign_ranks(rows: &mut [StandingsRow]) {
    let mut snapshots: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        snapshots
            .entry((row.league_id, row.match_day))
            .or_default()
            .push(idx);
    }

    for mut members in snapshots.into_values() {
        members.sort_by(|a, b| rows[*b].sort_key().cmp(&rows[*a].sort_key()));
        let mut rank = 0;
        let mut previous = None;
        for (position, idx) in members.into_iter().enumerate() {
            let key = rows[idx].sort_key();
            if previous != Some(key) {
                rank = position as i64 + 1;
                previous = Some(key);
            }
            rows[idx].rank = rank;
        }
    }
}
