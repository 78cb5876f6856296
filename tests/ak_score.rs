use league_form::EngineError;
use league_form::scoring::{ak_score, mean_ak_score};

#[test]
fn ak_score_tiers() {
    let truth = [
        [1, 0], // exact, team 1 wins
        [1, 1], // exact draw
        [0, 1], // exact, team 2 wins
        [2, 1], // goal difference, team 1 wins
        [2, 2], // draw with the same difference only scores tendency
        [1, 2], // goal difference, team 2 wins
        [2, 1], // tendency, team 1 wins
        [1, 2], // tendency, team 2 wins
        [1, 0], // wrong winner
        [0, 0], // wrong draw
    ];
    let pred = [
        [1, 0],
        [1, 1],
        [0, 1],
        [1, 0],
        [0, 0],
        [0, 1],
        [5, 1],
        [1, 5],
        [0, 1],
        [1, 0],
    ];
    let scores = ak_score(&truth, &pred).expect("equal shapes");
    assert_eq!(scores, vec![7, 5, 7, 4, 2, 4, 2, 2, 0, 0]);
}

#[test]
fn mean_ak_score_averages_matches() {
    let truth = [[1, 0], [1, 1], [0, 0], [3, 0]];
    let pred = [[1, 0], [1, 1], [1, 0], [2, 1]];
    let mean = mean_ak_score(&truth, &pred).unwrap();
    assert!((mean - (7.0 + 5.0 + 0.0 + 2.0) / 4.0).abs() < 1e-12);
}

#[test]
fn ak_score_rejects_unequal_lengths() {
    let err = ak_score(&[[1, 0], [0, 0]], &[[1, 0]]).unwrap_err();
    assert!(matches!(err, EngineError::ShapeMismatch { .. }));
    assert!(mean_ak_score(&[[1, 0]], &[]).is_err());
}
