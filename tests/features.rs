use league_form::features::{
    FeatureSelection, Label, LAG_MATCH_DAYS, Target, build_features, sampling_rng,
};
use league_form::form::{FormConfig, compute_form};
use league_form::match_record::MatchRecord;
use league_form::standings::compute_standings;
use league_form::team_view::{Metric, Scope, expand_all};

/// Four teams, every pairing once, three match days.
fn season() -> Vec<MatchRecord> {
    vec![
        MatchRecord::new(1, 1, 1, 10, 20, 2, 0),
        MatchRecord::new(2, 1, 1, 30, 40, 1, 1),
        MatchRecord::new(3, 1, 2, 20, 30, 0, 3),
        MatchRecord::new(4, 1, 2, 40, 10, 1, 2),
        MatchRecord::new(5, 1, 3, 10, 30, 1, 0),
        MatchRecord::new(6, 1, 3, 20, 40, 2, 2),
    ]
}

fn assemble(target: Target, seed: u64) -> Vec<league_form::features::FeatureRow> {
    let matches = season();
    let rows = expand_all(&matches, Scope::Overall);
    let standings = compute_standings(&rows);
    let form = compute_form(&rows, &FormConfig::default());
    build_features(
        &matches,
        &standings,
        &form,
        &FeatureSelection::all(),
        target,
        &mut sampling_rng(Some(seed)),
    )
}

#[test]
fn joined_history_never_reaches_the_predicted_match_day() {
    for target in [Target::Goals, Target::ResultClass] {
        for row in assemble(target, 3) {
            let day = row.base.match_day;
            for s in [&row.standings_1, &row.standings_2].into_iter().flatten() {
                assert!(s.match_day < day);
                assert_eq!(s.match_day, day - LAG_MATCH_DAYS);
            }
            for f in [&row.form_1, &row.form_2].into_iter().flatten() {
                assert!(f.match_day < day);
            }
        }
    }
}

#[test]
fn first_match_day_has_no_history() {
    let rows = assemble(Target::Goals, 0);
    assert_eq!(rows.len(), 12);
    for row in rows.iter().filter(|r| r.base.match_day == 1) {
        assert!(row.standings_1.is_none());
        assert!(row.standings_2.is_none());
        assert!(row.form_1.is_none());
        assert!(row.form_2.is_none());
    }
}

#[test]
fn both_teams_get_their_own_prior_standings() {
    let rows = assemble(Target::Goals, 0);
    // Match 5 on day 3: team 10 (won day 1 and day 2) hosts team 30 (draw, win).
    let row = rows
        .iter()
        .find(|r| r.base.match_id == 5 && r.base.home_flag)
        .expect("home row of match 5");
    assert_eq!(row.base.label, Label::Goals(1));

    let home = row.standings_1.as_ref().expect("team 10 history");
    assert_eq!(home.team_id, 10);
    assert_eq!(home.match_day, 2);
    assert_eq!(home.tally.points, 6);
    assert_eq!(home.rank, 1);

    let away = row.standings_2.as_ref().expect("team 30 history");
    assert_eq!(away.team_id, 30);
    assert_eq!(away.tally.points, 4);
    assert_eq!(away.tally.goals_diff, 3);

    let form = row.form_1.as_ref().expect("team 10 form");
    assert_eq!(form.games, 2);
    assert_eq!(form.last(Metric::Wins, 3), None);
    assert_eq!(form.avg(Metric::Points), Some(3.0));
}

#[test]
fn away_subject_rows_swap_the_teams() {
    let rows = assemble(Target::Goals, 0);
    let row = rows
        .iter()
        .find(|r| r.base.match_id == 5 && !r.base.home_flag)
        .expect("away row of match 5");
    assert_eq!(row.base.team_id_1, 30);
    assert_eq!(row.base.team_id_2, 10);
    assert_eq!(row.base.label, Label::Goals(0));
    assert_eq!(row.standings_1.as_ref().map(|s| s.team_id), Some(30));
}

#[test]
fn seeded_result_view_is_reproducible() {
    let a = assemble(Target::ResultClass, 11);
    let b = assemble(Target::ResultClass, 11);
    assert_eq!(a, b);
    assert_eq!(a.len(), 6);
    assert_eq!(a.iter().filter(|r| !r.base.home_flag).count(), 3);
}

#[test]
fn reversed_rows_carry_negated_labels() {
    let matches = season();
    for row in assemble(Target::ResultClass, 5) {
        let original = matches
            .iter()
            .find(|m| m.match_id == row.base.match_id)
            .unwrap();
        let Label::Result {
            goals_1,
            goals_2,
            goals_diff,
            result_class,
        } = row.base.label
        else {
            panic!("result view rows carry result labels");
        };
        if row.base.home_flag {
            assert_eq!((goals_1, goals_2), (original.goals_1, original.goals_2));
            assert_eq!(result_class, original.result_class);
        } else {
            assert_eq!(row.base.team_id_1, original.team_id_2);
            assert_eq!((goals_1, goals_2), (original.goals_2, original.goals_1));
            assert_eq!(goals_diff, -original.goals_diff());
            assert_eq!(result_class, original.result_class.reversed());
        }
    }
}

#[test]
fn unselected_sets_stay_empty() {
    let matches = season();
    let rows = expand_all(&matches, Scope::Overall);
    let standings = compute_standings(&rows);
    let form = compute_form(&rows, &FormConfig::default());
    let selection = FeatureSelection::resolve(&["overall_form", "elo"]);
    assert_eq!(selection.skipped, vec!["elo".to_string()]);

    let features = build_features(
        &matches,
        &standings,
        &form,
        &selection,
        Target::Goals,
        &mut sampling_rng(None),
    );
    assert!(features.iter().all(|r| r.standings_1.is_none()));
    assert!(features.iter().any(|r| r.form_1.is_some()));
}

#[test]
fn double_match_day_lags_to_the_later_match() {
    // Team 10 plays twice on day 1, then hosts team 20 on day 2.
    let matches = vec![
        MatchRecord::new(1, 1, 1, 10, 20, 1, 0),
        MatchRecord::new(2, 1, 1, 10, 30, 1, 0),
        MatchRecord::new(3, 1, 2, 10, 20, 0, 0),
    ];
    let rows = expand_all(&matches, Scope::Overall);
    let standings = compute_standings(&rows);
    let form = compute_form(&rows, &FormConfig::default());
    let features = build_features(
        &matches,
        &standings,
        &form,
        &FeatureSelection::all(),
        Target::Goals,
        &mut sampling_rng(Some(1)),
    );

    let row = features
        .iter()
        .find(|r| r.base.match_id == 3 && r.base.home_flag)
        .expect("home row of match 3");
    let standings_1 = row.standings_1.as_ref().expect("team 10 standings");
    let form_1 = row.form_1.as_ref().expect("team 10 form");
    assert_eq!(standings_1.tally.games, 2);
    assert_eq!(standings_1.tally.points, 6);
    assert_eq!(standings_1.rank, 1);
    assert_eq!(form_1.games, standings_1.tally.games);
    assert_eq!(form_1.avg(Metric::Points), Some(3.0));
    assert_eq!(row.standings_2.as_ref().map(|s| s.rank), Some(2));
}
