//! Loads a scenario JSON fixture end to end (parse -> build tree -> parse
//! ranges -> dump strategy) and checks the dump against a golden fixture,
//! the way a GUI consumer of `dump_strategy`'s output would be checked.
//! The fixture is a pure flop-to-river checkdown (no bet ever offered), so
//! its strategy is exactly 100% CHECK at every node independent of
//! training, which lets the golden file be hand-verified rather than
//! captured from a live solve.

use std::path::Path;

use serde_json::Value;

use holdem_solver::card::{mask_of, parse_card};
use holdem_solver::range_manager::RangeManager;
use holdem_solver::scenario::{dump_strategy, load_scenario};
use holdem_solver::tree::{self, HandCounts};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn approx_eq(a: &Value, b: &Value, eps: f64) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => (x.as_f64().unwrap() - y.as_f64().unwrap()).abs() < eps,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| approx_eq(a, b, eps))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| approx_eq(v, w, eps)))
        }
        _ => a == b,
    }
}

#[test]
fn simple_flop_scenario_dump_matches_golden_output() {
    let loaded = load_scenario(&fixture("simple_flop_scenario.json")).unwrap();
    let board_mask = mask_of(&loaded.initial_board);
    let hand_counts = HandCounts { ip: loaded.ip_range.len(), oop: loaded.oop_range.len() };
    let range_manager = RangeManager::new(loaded.ip_range, loaded.oop_range, board_mask);
    let tree = tree::build(&loaded.rule, &hand_counts).unwrap();

    let board_path = ["Ts", "Jc"].iter().map(|s| parse_card(s).unwrap()).collect::<Vec<_>>();
    let dumped = dump_strategy(&tree, &range_manager, board_mask, &board_path, None).unwrap();

    let golden_text = std::fs::read_to_string(fixture("simple_flop_scenario_expected_output.json")).unwrap();
    let golden: Value = serde_json::from_str(&golden_text).unwrap();

    assert!(approx_eq(&dumped, &golden, 1e-4), "dumped strategy diverged from golden fixture:\n{dumped:#}\nvs\n{golden:#}");
}
