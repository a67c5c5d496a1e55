//! Per-player ranges, blocker-aware initial reach probabilities, and
//! cross-player hand-index mapping by content.

use crate::private_cards::{cross_index, Range};

pub struct RangeManager {
    ranges: [Range; 2],
    initial_board: u64,
    reach_probs: [Vec<f64>; 2],
}

impl RangeManager {
    /// Builds the manager and eagerly computes both players' initial reach
    /// vectors against `initial_board`. Player 0 is IP, player 1 is OOP,
    /// matching the convention used throughout the tree builder.
    pub fn new(range_ip: Range, range_oop: Range, initial_board: u64) -> Self {
        let ranges = [range_ip, range_oop];
        let reach_probs = [
            compute_reach(&ranges[0], &ranges[1], initial_board),
            compute_reach(&ranges[1], &ranges[0], initial_board),
        ];
        Self { ranges, initial_board, reach_probs }
    }

    /// `p == 0` is IP, `p == 1` is OOP, matching the action-node convention.
    pub fn range(&self, p: usize) -> &Range {
        &self.ranges[p]
    }

    pub fn initial_board(&self) -> u64 {
        self.initial_board
    }

    pub fn initial_reach_probs(&self, p: usize) -> &[f64] {
        &self.reach_probs[p]
    }

    /// Maps `from_player`'s combo at `from_index` to the index of the
    /// identical (by content) combo in `to_player`'s range.
    pub fn opponent_hand_index(&self, from_player: usize, to_player: usize, from_index: usize) -> Option<usize> {
        cross_index(&self.ranges[from_player], from_index, &self.ranges[to_player])
    }
}

/// Relative weight of `h` is `weight(h) * Σ weight(h')` over opponent combos
/// that conflict with neither the board nor `h`; zero if `h` itself
/// conflicts with the board. The resulting vector is normalized to 1.0.
fn compute_reach(own: &Range, opponent: &Range, board_mask: u64) -> Vec<f64> {
    let mut relative = vec![0.0; own.len()];

    for (i, h) in own.combos().iter().enumerate() {
        if h.conflicts_with(board_mask) {
            continue;
        }
        let opp_sum: f64 = opponent
            .combos()
            .iter()
            .filter(|o| !o.conflicts_with(board_mask) && !o.conflicts_with(h.mask()))
            .map(|o| o.weight)
            .sum();
        relative[i] = h.weight * opp_sum;
    }

    let total: f64 = relative.iter().sum();
    if total > 0.0 {
        for v in relative.iter_mut() {
            *v /= total;
        }
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{mask_of, parse_board};
    use crate::private_cards::PrivateCards;

    fn combo(cards: &str, weight: f64) -> PrivateCards {
        let cs = parse_board(cards).unwrap();
        PrivateCards::new(cs[0], cs[1], weight)
    }

    #[test]
    fn sums_to_one_when_unblocked() {
        let oop = Range::new(vec![combo("AcAd", 1.0), combo("KcKd", 1.0)]);
        let ip = Range::new(vec![combo("QcQd", 1.0), combo("JcJd", 1.0)]);
        let manager = RangeManager::new(ip, oop, 0);
        let probs = manager.initial_reach_probs(0);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn board_blocked_combo_has_zero_probability() {
        let board = mask_of(&parse_board("AcTh2d").unwrap());
        let ip = Range::new(vec![combo("AcAd", 1.0), combo("KcKd", 1.0)]);
        let oop = Range::new(vec![combo("QcQd", 1.0)]);
        let manager = RangeManager::new(ip, oop, board);
        let probs = manager.initial_reach_probs(0);
        assert_eq!(probs[0], 0.0);
        assert!(probs[1] > 0.0);
    }

    #[test]
    fn ratio_invariant_holds() {
        let oop = Range::new(vec![combo("AcAd", 1.0), combo("KcKd", 0.5)]);
        let ip = Range::new(vec![combo("QcQd", 1.0), combo("JcJd", 1.0)]);
        let manager = RangeManager::new(ip, oop, 0);
        let probs = manager.initial_reach_probs(0);
        // both combos face the same unblocked opponent weight, so the ratio
        // of probabilities should equal the ratio of the combos' own weights.
        assert!((probs[0] / probs[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn opponent_hand_index_matches_by_content() {
        let oop = Range::new(vec![combo("AcAd", 1.0)]);
        let ip = Range::new(vec![combo("AdAc", 1.0), combo("KcKd", 1.0)]);
        let manager = RangeManager::new(ip, oop, 0);
        assert_eq!(manager.opponent_hand_index(0, 1, 0), Some(0));
    }
}
