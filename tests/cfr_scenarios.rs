//! End-to-end CFR scenario checks that exercise the library purely through
//! its public API: build a tree from a `Rule`, wire up ranges/evaluator/
//! river cache, and read back best-response values.

use holdem_solver::best_response::BestResponseCalculator;
use holdem_solver::card::{mask_of, parse_board};
use holdem_solver::hand_eval::HandEvaluator;
use holdem_solver::private_cards::{PrivateCards, Range};
use holdem_solver::range_manager::RangeManager;
use holdem_solver::river_cache::RiverCache;
use holdem_solver::rule::{GameTreeBuildingSettings, Round, Rule, StreetSetting};
use holdem_solver::tree::{self, HandCounts};

fn combo(cards: &str) -> PrivateCards {
    let cs = parse_board(cards).unwrap();
    PrivateCards::new(cs[0], cs[1], 1.0)
}

/// `HandEvaluator::rank` takes the minimum rank over every 5-card subset of
/// hole+board. Keying each line on a hand's own two cards plus the three
/// flop cards alone (ignoring turn and river) means that subset is present
/// in every possible 7-card hand built on this flop, no matter which turn
/// or river actually lands: AA always resolves to the entry below and KK
/// always resolves to the weaker one, for any of the 49*48 turn/river deals.
fn flop_anchored_dictionary() -> HandEvaluator {
    let lines = ["Ac-Ad-2h-5c-7d,1", "Kc-Kd-2h-5c-7d,50"];
    HandEvaluator::from_text(&lines.join("\n")).unwrap()
}

/// A pure checkdown from the flop: no bet is ever offered on any street, so
/// the only path through the tree is check-check/chance/check-check/chance/
/// check-check-showdown. `raise_limit_per_street: 0` suffices on its own to
/// rule out betting everywhere, independent of the (default, empty) bet
/// size lists.
fn checkdown_from_flop_rule() -> Rule {
    let settings = GameTreeBuildingSettings::default();
    let board = parse_board("2h5c7d").unwrap();
    Rule::new(5.0, 5.0, Round::Flop, board, 0, 1.0, 2.0, 100.0, settings, 0.98).unwrap()
}

/// Flop-to-river checkdown with AA against KK: the showdown always goes to
/// AA, but averaged across every turn/river deal some of those deals pair
/// one of AA's own blockers (Ac, Ad) or KK's (Kc, Kd) with the board,
/// killing that player's sole combo for the branch and zeroing its
/// contribution. Both best-response values are the 5-unit pot share scaled
/// by the chance of neither blocker landing: 5 * (45/49)*(44/48) = 825/196.
#[test]
fn flop_checkdown_best_response_accounts_for_blocker_collisions() {
    let rule = checkdown_from_flop_rule();
    let board_mask = mask_of(&rule.initial_board_cards.clone());
    let evaluator = flop_anchored_dictionary();

    let ip_range = Range::new(vec![combo("KcKd")]);
    let oop_range = Range::new(vec![combo("AcAd")]);
    let range_manager = RangeManager::new(ip_range, oop_range, board_mask);
    let river_cache = RiverCache::new(&evaluator);
    let tree = tree::build(&rule, &HandCounts { ip: 1, oop: 1 }).unwrap();

    let br = BestResponseCalculator::new(&tree, &range_manager, &river_cache);
    let br_ip = br.best_response_ev(0, board_mask).unwrap();
    let br_oop = br.best_response_ev(1, board_mask).unwrap();
    let exploitability = br.exploitability(board_mask).unwrap();

    let expected = 5.0 * (45.0 / 49.0) * (44.0 / 48.0);
    assert!((br_oop - expected).abs() < 1e-6, "oop best response was {br_oop}, expected {expected}");
    assert!((br_ip + expected).abs() < 1e-6, "ip best response was {br_ip}, expected {}", -expected);
    // Every node is a forced check, so there is no deviation to find: best
    // response equals the only available strategy and exploitability is 0.
    assert!(exploitability.abs() < 1e-6, "exploitability {exploitability} should be ~0");
}
