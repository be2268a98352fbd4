//! Integration tests for the cost matrix engine and the full pipeline.

mod common;

use std::fs;

use common::{freight_config, road, scratch_copy};
use tradecost_lib::{
    compose_from_features, compute_cost_matrix, match_settlements, prepare_graph,
    run_cost_matrix, BorderCost, BorderCosts, BorderInput, BorderSource, CostMatrix,
    CostMatrixRequest, CostMode, Network, NetworkMatcher, Settlement, SettlementTable, Tariffs,
    TieBreak, UNREACHABLE_SENTINEL,
};

fn approx(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("reachable pair");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn border_network() -> Network {
    let roads = vec![
        road([0.0, 0.0], [1.0, 0.0], "AAA", 1, 1000.0),
        road([1.0, 0.0], [2.0, 0.0], "AAA", 1, 1000.0),
        road([2.0, 0.0], [3.0, 0.0], "BBB", 1, 1000.0),
        road([7.0, 7.0], [8.0, 7.0], "CCC", 1, 1000.0),
    ];
    compose_from_features(&roads, &[]).expect("compose").network
}

fn matched_settlements(network: &Network) -> Vec<Settlement> {
    let mut settlements = vec![
        Settlement::new("a", 0.0, 0.0, "AAA"),
        Settlement::new("b", 1.0, 0.0, "AAA"),
        Settlement::new("c", 3.0, 0.0, "BBB"),
        Settlement::new("d", 7.0, 7.0, "CCC"),
    ];
    let matcher = NetworkMatcher::new(network, 0.05, TieBreak::InputOrder);
    match_settlements(&mut settlements, &matcher, false).expect("match");
    settlements
}

fn border_table() -> BorderCosts {
    let mut table = BorderCosts::default();
    for region in ["AAA", "BBB", "CCC"] {
        table.insert_exporter(region, BorderCost { fee: 4.0, time: 1.0 });
    }
    table
}

fn matrix_with_tariffs(tariffs: Tariffs) -> CostMatrix {
    let network = border_network();
    let settlements = matched_settlements(&network);
    let config = freight_config(border_table(), tariffs);
    let (graph, _) = prepare_graph(&network, &[], &BorderInput::Auto, &config).expect("prepare");
    compute_cost_matrix(&graph, &settlements, &config).expect("matrix")
}

fn uniform_tariffs(rate: f64) -> Tariffs {
    Tariffs::from_pairs([("AAA", rate), ("BBB", rate), ("CCC", rate)])
}

#[test]
fn diagonal_is_zero_and_unreachable_pairs_are_marked() {
    let matrix = matrix_with_tariffs(uniform_tariffs(0.0));

    for i in 0..matrix.len() {
        assert_eq!(matrix.get(i, i), Some(0.0));
    }
    assert_eq!(matrix.get_by_id("a", "d"), Some(None));
    assert_eq!(matrix.get_by_id("d", "c"), Some(None));
    assert_eq!(matrix.unreachable_count(), 6);

    let mut out = Vec::new();
    matrix.write_to(&mut out).expect("write");
    let text = String::from_utf8(out).expect("utf8");
    let last_row = text.lines().last().expect("rows");
    assert_eq!(last_row, format!("d,{0},{0},{0},0", UNREACHABLE_SENTINEL));
}

#[test]
fn tariffs_apply_only_across_regions() {
    let low = matrix_with_tariffs(uniform_tariffs(0.1));
    let high = matrix_with_tariffs(uniform_tariffs(0.9));

    // Intra-region cost is unchanged by the tariff.
    approx(low.get_by_id("a", "b").flatten(), 1.0);
    approx(high.get_by_id("a", "b").flatten(), 1.0);

    // a -> c: 2 km in AAA, border fee 4, 1 km in BBB, plus BBB's tariff.
    approx(low.get_by_id("a", "c").flatten(), 7.1);
    approx(high.get_by_id("a", "c").flatten(), 7.9);
}

#[test]
fn missing_tariff_is_fatal_in_freight_mode() {
    let network = border_network();
    let settlements = matched_settlements(&network);
    let config = freight_config(border_table(), Tariffs::from_pairs([("AAA", 0.1)]));
    let (graph, _) = prepare_graph(&network, &[], &BorderInput::Auto, &config).expect("prepare");

    let err = compute_cost_matrix(&graph, &settlements, &config).unwrap_err();
    assert!(err.to_string().contains("unknown key"));
}

#[test]
fn unmatched_settlements_are_rejected() {
    let network = border_network();
    let config = freight_config(border_table(), uniform_tariffs(0.0));
    let (graph, _) = prepare_graph(&network, &[], &BorderInput::Auto, &config).expect("prepare");

    let settlements = vec![Settlement::new("lonely", 0.0, 0.0, "AAA")];
    assert!(compute_cost_matrix(&graph, &settlements, &config).is_err());
}

#[test]
fn fixture_pipeline_writes_matrix_and_persists_matches() {
    let (_dir, paths) = scratch_copy();
    let request = CostMatrixRequest::new(paths.clone());

    let report = run_cost_matrix(&request).expect("pipeline");
    assert_eq!(report.settlements, 4);
    assert_eq!(report.matched, 4);
    assert_eq!(report.transfers.port_transfers, 2);
    assert_eq!(report.transfers.border_crossings, 1);
    assert_eq!(report.unreachable_pairs, 6);

    let matrix = CostMatrix::load(&paths.cost_matrix).expect("matrix written");
    assert_eq!(matrix.ids(), ["1", "2", "3", "4"]);
    // 111 km of class-1 road at 0.5 per km over a shipment value of 1000.
    approx(matrix.get_by_id("1", "2").flatten(), 0.0555);
    // The sea route (two port fees plus 444 km at 0.1) beats the border,
    // then BBB's 10% tariff applies.
    approx(matrix.get_by_id("1", "3").flatten(), 0.0644 + 0.1);
    approx(matrix.get_by_id("3", "1").flatten(), 0.0644 + 0.05);
    approx(matrix.get_by_id("2", "3").flatten(), 0.1199 + 0.1);
    assert_eq!(matrix.get_by_id("1", "4"), Some(None));

    let cities = fs::read_to_string(&paths.cities).expect("cities rewritten");
    assert!(cities.contains("nearest_any"));
    assert!(cities.contains("(0.0, 0.0, AAA)"));

    // Persisted matches are reused on the next run.
    let rerun = run_cost_matrix(&request).expect("rerun");
    assert_eq!(rerun.matched, 0);
    let table = SettlementTable::from_path(&paths.cities).expect("cities");
    assert!(table.has_matches());
}

#[test]
fn time_mode_uses_speeds_and_skips_tariffs() {
    let (_dir, paths) = scratch_copy();
    let mut request = CostMatrixRequest::new(paths.clone());
    request.mode = CostMode::Time;

    run_cost_matrix(&request).expect("pipeline");
    let matrix = CostMatrix::load(&paths.cost_matrix).expect("matrix");

    // 111 km at 50 km/h.
    approx(matrix.get_by_id("1", "2").flatten(), 2.22);
    // Road to the border, 2 h to leave AAA, then 222 km at 80 km/h.
    approx(matrix.get_by_id("1", "3").flatten(), 4.44 + 2.0 + 2.775);
}

#[test]
fn explicit_border_points_skip_single_node_hits() {
    let (_dir, paths) = scratch_copy();
    let mut request = CostMatrixRequest::new(paths);
    request.border_source = BorderSource::Points;

    let report = run_cost_matrix(&request).expect("pipeline");
    assert_eq!(report.transfers.border_crossings, 1);
    assert_eq!(report.transfers.border_points_skipped, 1);
}
