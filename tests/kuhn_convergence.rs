//! Regression test: DCFR trained on 3-card Kuhn poker should converge to a
//! low-exploitability equilibrium. Kuhn has no board and a single private
//! card per player, neither of which the postflop tree builder models
//! directly, so the three ranks are represented as three disjoint two-card
//! "identities" sharing a single mask between both players (so holding one
//! identity blocks the opponent from holding the same one, exactly as a
//! single missing card would) and a hand-rank dictionary that orders them
//! low/mid/high. Ported from `kuhn_poker_setup.cpp`'s `KuhnPokerSmoke`
//! intent, not its toy fixed-action tree.

use holdem_solver::best_response::BestResponseCalculator;
use holdem_solver::card::{mask_of, parse_board};
use holdem_solver::hand_eval::HandEvaluator;
use holdem_solver::private_cards::{PrivateCards, Range};
use holdem_solver::range_manager::RangeManager;
use holdem_solver::river_cache::RiverCache;
use holdem_solver::rule::{GameTreeBuildingSettings, Round, Rule, StreetSetting};
use holdem_solver::solver::DcfrSolver;
use holdem_solver::tree::{self, HandCounts};

fn identity(cards: &str) -> PrivateCards {
    let cs = parse_board(cards).unwrap();
    PrivateCards::new(cs[0], cs[1], 1.0)
}

/// A dictionary with exactly one winning 5-card line per identity, built
/// from the identity's own two cards plus a fixed 3-card slice of the
/// board. Every other 5-card subset of hole+board is simply absent, so
/// `HandEvaluator::rank` (a minimum over all subsets) resolves to that one
/// entry; low < mid < high in rank number means low beats nothing, high
/// beats everything, matching Kuhn's strict card-rank ordering.
fn kuhn_dictionary() -> HandEvaluator {
    let lines = ["2c-3d-9c-Th-Qd,300", "4c-5d-9c-Th-Qd,200", "6c-7d-9c-Th-Qd,100"];
    HandEvaluator::from_text(&lines.join("\n")).unwrap()
}

fn kuhn_rule() -> Rule {
    let empty = StreetSetting::default();
    let river_bet = StreetSetting::new(vec![50.0], vec![], vec![], false);
    let settings = GameTreeBuildingSettings::new(
        empty.clone(),
        empty.clone(),
        river_bet.clone(),
        empty.clone(),
        empty,
        river_bet,
    );
    // Ante 1.0 each side, one bet size (pot-sized at the 2-ante pot), and a
    // raise limit of 1 so the single bet can be called or folded but never
    // re-raised, matching Kuhn's betting rules exactly.
    let board = parse_board("9cThQdKsAc").unwrap();
    Rule::new(1.0, 1.0, Round::River, board, 1, 1.0, 1.0, 10.0, settings, 0.98).unwrap()
}

#[test]
fn kuhn_poker_dcfr_converges_to_low_exploitability() {
    let rule = kuhn_rule();
    let board_mask = mask_of(&rule.initial_board_cards.clone());
    let evaluator = kuhn_dictionary();

    let ranges = || Range::new(vec![identity("2c3d"), identity("4c5d"), identity("6c7d")]);
    let range_manager = RangeManager::new(ranges(), ranges(), board_mask);
    let river_cache = RiverCache::new(&evaluator);
    let tree = tree::build(&rule, &HandCounts { ip: 3, oop: 3 }).unwrap();

    let solver = DcfrSolver::new(&tree, &range_manager, &river_cache, 1e-9, false);
    let mut last_tick = 0u64;
    solver.train(2000, board_mask, |t| last_tick = t).unwrap();
    assert_eq!(last_tick, 2000);

    let br = BestResponseCalculator::new(&tree, &range_manager, &river_cache);
    let exploitability = br.exploitability(board_mask).unwrap();
    // Loose bar, as in the original: just prove the loop converges a bit.
    // The known Kuhn equilibrium has zero exploitability; half an ante of
    // slack after 2000 iterations rules out a solver that never learns.
    assert!(exploitability < 0.25, "exploitability {exploitability} did not converge");
    assert!(exploitability > -1e-6, "exploitability {exploitability} should not be negative");
}
