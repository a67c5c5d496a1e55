//! Best-response exploitability: for each player, the maximum EV achievable
//! against the opponent's fixed average strategy, and the resulting
//! exploitability measure.
//!
//! Mirrors the solver's recursion shape (dispatch on [`NodeKind`], reach
//! vectors threaded down, board mask carried as traversal state) but
//! replaces regret-matching with a per-hand best action and uses the
//! average strategy rather than the current one at opponent nodes. Showdown
//! and Terminal utility use a per-card blocker sweep instead of the
//! solver's `O(range^2)` double loop, since best response is evaluated once
//! per report rather than every training iteration.

use rayon::prelude::*;

use crate::card::{remaining_cards, card_mask, Card, CardMask, NUM_CARDS};
use crate::error::SolverResult;
use crate::private_cards::{cross_index, Range};
use crate::range_manager::RangeManager;
use crate::river_cache::{RiverCache, RiverCombo};
use crate::solver::{zero_and_renormalize, CHANCE_PARALLEL_THRESHOLD};
use crate::tree::{ActionNode, GameTree, NodeIndex, NodeKind, ShowdownPayoffs};

pub struct BestResponseCalculator<'a> {
    tree: &'a GameTree,
    range_manager: &'a RangeManager,
    river_cache: &'a RiverCache<'a>,
}

impl<'a> BestResponseCalculator<'a> {
    pub fn new(tree: &'a GameTree, range_manager: &'a RangeManager, river_cache: &'a RiverCache<'a>) -> Self {
        Self { tree, range_manager, river_cache }
    }

    /// Per-hand best-response utility for `br_player` against the
    /// opponent's average strategy, starting from the root.
    pub fn best_response_utility(&self, br_player: usize, board_mask: CardMask) -> SolverResult<Vec<f64>> {
        let reach = [
            self.range_manager.initial_reach_probs(0).to_vec(),
            self.range_manager.initial_reach_probs(1).to_vec(),
        ];
        self.recurse(self.tree.root(), reach, br_player, board_mask, 1.0)
    }

    /// `Σ_h reach[h] * utility[h]`, the scalar EV of `br_player`'s best
    /// response to the opponent's average strategy.
    pub fn best_response_ev(&self, br_player: usize, board_mask: CardMask) -> SolverResult<f64> {
        let utility = self.best_response_utility(br_player, board_mask)?;
        let reach = self.range_manager.initial_reach_probs(br_player);
        Ok(reach.iter().zip(utility.iter()).map(|(r, u)| r * u).sum())
    }

    /// Average of both players' best-response EVs against each other's
    /// average strategy. Zero at an exact equilibrium; positive otherwise.
    pub fn exploitability(&self, board_mask: CardMask) -> SolverResult<f64> {
        let br0 = self.best_response_ev(0, board_mask)?;
        let br1 = self.best_response_ev(1, board_mask)?;
        Ok((br0 + br1) / 2.0)
    }

    fn recurse(
        &self,
        node_idx: NodeIndex,
        reach: [Vec<f64>; 2],
        br_player: usize,
        board_mask: CardMask,
        chance_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let opponent = 1 - br_player;
        let node = self.tree.node(node_idx);

        match &node.kind {
            NodeKind::Terminal { payoffs } => self.terminal_utility(br_player, opponent, &reach, board_mask, chance_reach, payoffs[br_player]),
            NodeKind::Showdown { payoffs } => self.showdown_utility(br_player, opponent, &reach, board_mask, chance_reach, payoffs),
            NodeKind::Chance { child, .. } => self.chance_utility(*child, reach, br_player, board_mask, chance_reach),
            NodeKind::Action(action) => {
                if action.acting_player == br_player {
                    self.br_action(action, reach, br_player, board_mask, chance_reach)
                } else {
                    self.opponent_action(action, reach, br_player, board_mask, chance_reach)
                }
            }
        }
    }

    /// Fold/terminal EV, blocker-adjusted against each of `br_player`'s own
    /// hole cards rather than a single opponent-reach scalar.
    fn terminal_utility(
        &self,
        br_player: usize,
        opponent: usize,
        reach: &[Vec<f64>; 2],
        board_mask: CardMask,
        chance_reach: f64,
        payoff: f64,
    ) -> SolverResult<Vec<f64>> {
        let range = self.range_manager.range(br_player);
        let opponent_range = self.range_manager.range(opponent);
        let table = BlockerTable::build(opponent_range, &reach[opponent], board_mask);
        let scale = chance_reach * payoff;

        let mut utility = vec![0.0; range.len()];
        for (i, combo) in range.combos().iter().enumerate() {
            if combo.conflicts_with(board_mask) {
                continue;
            }
            let identical = cross_index(range, i, opponent_range)
                .map(|j| if opponent_range.get(j).conflicts_with(board_mask) { 0.0 } else { reach[opponent][j] })
                .unwrap_or(0.0);
            let adjusted = table.adjusted(combo.card1() as usize, combo.card2() as usize, identical);
            utility[i] = scale * adjusted;
        }
        Ok(utility)
    }

    /// Showdown EV via a rank-ordered sweep: strictly-worse and
    /// strictly-better opponent reach are accumulated incrementally as the
    /// traverser's own combos are visited in rank order, with per-card
    /// running totals giving each hand's blocker-adjusted reach in O(1);
    /// exact ties are resolved by a direct scan within the (small) tied
    /// group.
    fn showdown_utility(
        &self,
        traverser: usize,
        opponent: usize,
        reach: &[Vec<f64>; 2],
        board_mask: CardMask,
        chance_reach: f64,
        payoffs: &ShowdownPayoffs,
    ) -> SolverResult<Vec<f64>> {
        let traverser_range = self.range_manager.range(traverser);
        let opponent_range = self.range_manager.range(opponent);
        let t_ranks = self.river_cache.get(traverser, traverser_range, board_mask)?;
        let o_ranks = self.river_cache.get(opponent, opponent_range, board_mask)?;

        let win_payoff = if traverser == 0 { payoffs.player0_wins[0] } else { payoffs.player1_wins[1] };
        let lose_payoff = if traverser == 0 { payoffs.player1_wins[0] } else { payoffs.player0_wins[1] };
        let tie_payoff = payoffs.tie[traverser];

        let win = sweep_strict(&t_ranks, &o_ranks, traverser_range, opponent_range, &reach[opponent], false);
        let lose = sweep_strict(&t_ranks, &o_ranks, traverser_range, opponent_range, &reach[opponent], true);
        let tie = tie_contrib(&t_ranks, &o_ranks, traverser_range, opponent_range, &reach[opponent]);

        let mut utility = vec![0.0; traverser_range.len()];
        for ((combo_index, w), (_, l)) in win.iter().zip(lose.iter()) {
            utility[*combo_index] += win_payoff * w + lose_payoff * l;
        }
        for (combo_index, t) in tie {
            utility[combo_index] += tie_payoff * t;
        }
        for v in utility.iter_mut() {
            *v *= chance_reach;
        }
        Ok(utility)
    }

    fn chance_utility(
        &self,
        child: NodeIndex,
        reach: [Vec<f64>; 2],
        br_player: usize,
        board_mask: CardMask,
        chance_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let outcomes = remaining_cards(board_mask);
        let n = outcomes.len();
        if n == 0 {
            return Ok(vec![0.0; reach[br_player].len()]);
        }
        let child_subtree_size = self.tree.node(child).subtree_size;
        let parallel = n * child_subtree_size > CHANCE_PARALLEL_THRESHOLD;

        let branch = |&card: &Card| -> SolverResult<Vec<f64>> {
            let new_board = board_mask | card_mask(card);
            let new_reach = [
                zero_and_renormalize(&reach[0], self.range_manager.range(0), new_board),
                zero_and_renormalize(&reach[1], self.range_manager.range(1), new_board),
            ];
            self.recurse(child, new_reach, br_player, new_board, chance_reach / n as f64)
        };

        let results: Vec<Vec<f64>> = if parallel {
            outcomes.par_iter().map(branch).collect::<SolverResult<Vec<_>>>()?
        } else {
            outcomes.iter().map(branch).collect::<SolverResult<Vec<_>>>()?
        };

        let len = reach[br_player].len();
        let mut total = vec![0.0; len];
        for r in results {
            for (acc, v) in total.iter_mut().zip(r.iter()) {
                *acc += v;
            }
        }
        Ok(total)
    }

    /// The best-response player's own action node: reach is left
    /// untouched (no averaging over its own choices) and each hand takes
    /// the maximum utility over the legal actions.
    fn br_action(
        &self,
        action: &ActionNode,
        reach: [Vec<f64>; 2],
        br_player: usize,
        board_mask: CardMask,
        chance_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let num_hands = action.num_hands;
        let mut best = vec![f64::NEG_INFINITY; num_hands];
        for &child_idx in &action.children {
            let utility = self.recurse(child_idx, reach.clone(), br_player, board_mask, chance_reach)?;
            for h in 0..num_hands {
                if utility[h] > best[h] {
                    best[h] = utility[h];
                }
            }
        }
        Ok(best)
    }

    /// The opponent's action node: reach is updated by its average
    /// strategy (the fixed, already-trained policy being exploited) and
    /// children are summed, exactly as in the solver's non-traverser arm.
    fn opponent_action(
        &self,
        action: &ActionNode,
        reach: [Vec<f64>; 2],
        br_player: usize,
        board_mask: CardMask,
        chance_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let opponent = action.acting_player;
        let trainable = action.trainable_for(board_mask, false);
        let num_hands = action.num_hands;
        let sigma = { trainable.lock().unwrap().average_strategy().to_vec() };

        let mut total = vec![0.0; reach[br_player].len()];
        for (a, &child_idx) in action.children.iter().enumerate() {
            let mut child_reach = reach.clone();
            for h in 0..num_hands {
                child_reach[opponent][h] *= sigma[a * num_hands + h];
            }
            let u = self.recurse(child_idx, child_reach, br_player, board_mask, chance_reach)?;
            for (acc, v) in total.iter_mut().zip(u.iter()) {
                *acc += v;
            }
        }
        Ok(total)
    }
}

/// A one-shot blocker-adjustment table over a single player's live reach
/// vector on a fixed board: the grand total and a per-card running sum, so
/// the reach "seen by" an arbitrary two-card hand is an O(1)
/// inclusion-exclusion rather than an O(range) scan.
struct BlockerTable {
    total: f64,
    per_card: [f64; NUM_CARDS],
}

impl BlockerTable {
    fn build(range: &Range, reach: &[f64], board_mask: CardMask) -> Self {
        let mut total = 0.0;
        let mut per_card = [0.0; NUM_CARDS];
        for (idx, combo) in range.combos().iter().enumerate() {
            if combo.conflicts_with(board_mask) {
                continue;
            }
            let w = reach[idx];
            total += w;
            per_card[combo.card1() as usize] += w;
            per_card[combo.card2() as usize] += w;
        }
        Self { total, per_card }
    }

    /// Reach with combos sharing either of `(c1, c2)` excluded; `identical`
    /// is the reach of an opponent combo identical to `(c1, c2)`, which was
    /// subtracted twice above and must be added back once.
    fn adjusted(&self, c1: usize, c2: usize, identical: f64) -> f64 {
        (self.total - self.per_card[c1] - self.per_card[c2] + identical).max(0.0)
    }
}

/// For each traverser combo (visited in `t_ranks`' stored order, weakest to
/// strongest), the blocker-adjusted sum of opponent reach over combos
/// strictly worse (`reverse = false`) or strictly better (`reverse =
/// true`). A single pointer sweep over `o_ranks`: as traverser strength
/// only moves in one direction, the set of opponents on the correct side
/// of the threshold only grows, so running per-card totals never need to
/// be rebuilt. Returns `(combo_index, adjusted_reach)` pairs in the same
/// order as `t_ranks`.
fn sweep_strict(
    t_ranks: &[RiverCombo],
    o_ranks: &[RiverCombo],
    traverser_range: &Range,
    opponent_range: &Range,
    opponent_reach: &[f64],
    reverse: bool,
) -> Vec<(usize, f64)> {
    let n = o_ranks.len();
    let mut total = 0.0f64;
    let mut per_card = [0.0f64; NUM_CARDS];
    let mut included = vec![0.0f64; opponent_range.len()];
    let mut results = Vec::with_capacity(t_ranks.len());

    if !reverse {
        let mut j = 0usize;
        for tc in t_ranks {
            while j < n && o_ranks[j].rank > tc.rank {
                include_combo(&o_ranks[j], opponent_range, opponent_reach, &mut total, &mut per_card, &mut included);
                j += 1;
            }
            results.push(contribution(tc, traverser_range, opponent_range, total, &per_card, &included));
        }
    } else {
        let mut j = n;
        for tc in t_ranks.iter().rev() {
            while j > 0 && o_ranks[j - 1].rank < tc.rank {
                j -= 1;
                include_combo(&o_ranks[j], opponent_range, opponent_reach, &mut total, &mut per_card, &mut included);
            }
            results.push(contribution(tc, traverser_range, opponent_range, total, &per_card, &included));
        }
        results.reverse();
    }
    results
}

fn include_combo(
    oc: &RiverCombo,
    opponent_range: &Range,
    opponent_reach: &[f64],
    total: &mut f64,
    per_card: &mut [f64; NUM_CARDS],
    included: &mut [f64],
) {
    if oc.rank == i32::MAX {
        return;
    }
    let w = opponent_reach[oc.combo_index];
    *total += w;
    let combo = opponent_range.get(oc.combo_index);
    per_card[combo.card1() as usize] += w;
    per_card[combo.card2() as usize] += w;
    included[oc.combo_index] = w;
}

fn contribution(
    tc: &RiverCombo,
    traverser_range: &Range,
    opponent_range: &Range,
    total: f64,
    per_card: &[f64; NUM_CARDS],
    included: &[f64],
) -> (usize, f64) {
    if tc.rank == i32::MAX {
        return (tc.combo_index, 0.0);
    }
    let combo = traverser_range.get(tc.combo_index);
    let identical = cross_index(traverser_range, tc.combo_index, opponent_range).map_or(0.0, |j| included[j]);
    let c1 = combo.card1() as usize;
    let c2 = combo.card2() as usize;
    let adjusted = (total - per_card[c1] - per_card[c2] + identical).max(0.0);
    (tc.combo_index, adjusted)
}

/// Exact-tie contribution: opponent combos with rank equal to a traverser
/// combo's rank are summed directly, excluding board and hand blockers.
/// Tied groups are small in practice, so this skips the running-total
/// machinery used for the strict sweeps.
fn tie_contrib(
    t_ranks: &[RiverCombo],
    o_ranks: &[RiverCombo],
    traverser_range: &Range,
    opponent_range: &Range,
    opponent_reach: &[f64],
) -> Vec<(usize, f64)> {
    t_ranks
        .iter()
        .map(|tc| {
            if tc.rank == i32::MAX {
                return (tc.combo_index, 0.0);
            }
            let combo = traverser_range.get(tc.combo_index);
            let sum: f64 = o_ranks
                .iter()
                .filter(|oc| oc.rank == tc.rank)
                .filter_map(|oc| {
                    let opp_combo = opponent_range.get(oc.combo_index);
                    if opp_combo.conflicts_with(combo.mask()) {
                        None
                    } else {
                        Some(opponent_reach[oc.combo_index])
                    }
                })
                .sum();
            (tc.combo_index, sum)
        })
        .collect()
}
