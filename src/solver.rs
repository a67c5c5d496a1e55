//! DCFR iterative solver: the recursive dual-traverser CFR pass that drives
//! every action node's [`Trainable`] toward the discounted regret-matching
//! equilibrium, with iteration-level parallelism at large chance nodes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::card::{remaining_cards, CardMask};
use crate::error::SolverResult;
use crate::range_manager::RangeManager;
use crate::river_cache::RiverCache;
use crate::tree::{GameTree, NodeIndex, NodeKind};

/// Minimum (outcome_count × child_subtree_size) before a chance node's
/// outcomes are traversed with rayon instead of sequentially.
pub(crate) const CHANCE_PARALLEL_THRESHOLD: usize = 20_000;

pub struct DcfrSolver<'a> {
    tree: &'a GameTree,
    range_manager: &'a RangeManager,
    river_cache: &'a RiverCache<'a>,
    epsilon: f64,
    track_ev: bool,
    stop_flag: Arc<AtomicBool>,
    iteration: AtomicU64,
}

impl<'a> DcfrSolver<'a> {
    pub fn new(tree: &'a GameTree, range_manager: &'a RangeManager, river_cache: &'a RiverCache<'a>, epsilon: f64, track_ev: bool) -> Self {
        Self {
            tree,
            range_manager,
            river_cache,
            epsilon,
            track_ev,
            stop_flag: Arc::new(AtomicBool::new(false)),
            iteration: AtomicU64::new(0),
        }
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    pub fn current_iteration(&self) -> u64 {
        self.iteration.load(Ordering::SeqCst)
    }

    /// Runs up to `iterations` further training iterations, calling
    /// `on_milestone` after each completed iteration. Returns early,
    /// cleanly, if `stop()` was called.
    pub fn train(&self, iterations: u64, initial_board_mask: CardMask, mut on_milestone: impl FnMut(u64)) -> SolverResult<()> {
        for _ in 0..iterations {
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }
            let t = self.iteration.fetch_add(1, Ordering::SeqCst) + 1;
            for traverser in [0usize, 1usize] {
                let reach = [
                    self.range_manager.initial_reach_probs(0).to_vec(),
                    self.range_manager.initial_reach_probs(1).to_vec(),
                ];
                self.cfr(self.tree.root(), reach, traverser, t, initial_board_mask, 1.0)?;
            }
            on_milestone(t);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn cfr(
        &self,
        node_idx: NodeIndex,
        reach: [Vec<f64>; 2],
        traverser: usize,
        t: u64,
        board_mask: CardMask,
        chance_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let opponent = 1 - traverser;
        let traverser_reach_sum: f64 = reach[traverser].iter().sum();
        let node = self.tree.node(node_idx);

        if !matches!(node.kind, NodeKind::Terminal { .. } | NodeKind::Showdown { .. })
            && traverser_reach_sum < self.epsilon
        {
            return Ok(vec![0.0; reach[traverser].len()]);
        }

        match &node.kind {
            NodeKind::Terminal { payoffs } => {
                let opponent_reach_sum: f64 = reach[opponent].iter().sum();
                let scale = chance_reach * opponent_reach_sum * payoffs[traverser];
                let range = self.range_manager.range(traverser);
                Ok(range.combos().iter().map(|c| if c.conflicts_with(board_mask) { 0.0 } else { scale }).collect())
            }
            NodeKind::Showdown { payoffs } => {
                self.showdown_utility(traverser, opponent, &reach, board_mask, chance_reach, payoffs)
            }
            NodeKind::Chance { child, .. } => self.chance_utility(*child, reach, traverser, t, board_mask, chance_reach),
            NodeKind::Action(action) => {
                if action.acting_player == traverser {
                    self.traverser_action(action, node_idx, reach, traverser, t, board_mask, chance_reach)
                } else {
                    self.opponent_action(action, reach, traverser, t, board_mask, chance_reach)
                }
            }
        }
    }

    fn showdown_utility(
        &self,
        traverser: usize,
        opponent: usize,
        reach: &[Vec<f64>; 2],
        board_mask: CardMask,
        chance_reach: f64,
        payoffs: &crate::tree::ShowdownPayoffs,
    ) -> SolverResult<Vec<f64>> {
        let traverser_range = self.range_manager.range(traverser);
        let opponent_range = self.range_manager.range(opponent);
        let traverser_ranks = self.river_cache.get(traverser, traverser_range, board_mask)?;
        let opponent_ranks = self.river_cache.get(opponent, opponent_range, board_mask)?;

        let mut rank_by_index_t = vec![i32::MAX; traverser_range.len()];
        for rc in traverser_ranks.iter() {
            rank_by_index_t[rc.combo_index] = rc.rank;
        }
        let mut rank_by_index_o = vec![i32::MAX; opponent_range.len()];
        for rc in opponent_ranks.iter() {
            rank_by_index_o[rc.combo_index] = rc.rank;
        }

        // Payoff to `traverser` when traverser's hand is strictly better
        // ("player0_wins"/"player1_wins" name the winning player, not the
        // traverser, so pick the traverser's own slot of the matching
        // vector) versus strictly worse, versus a tie.
        let win_payoff = if traverser == 0 { payoffs.player0_wins[0] } else { payoffs.player1_wins[1] };
        let lose_payoff = if traverser == 0 { payoffs.player1_wins[0] } else { payoffs.player0_wins[1] };
        let tie_payoff = payoffs.tie[traverser];

        let mut utility = vec![0.0; traverser_range.len()];
        for (i, hi) in traverser_range.combos().iter().enumerate() {
            if hi.conflicts_with(board_mask) || rank_by_index_t[i] == i32::MAX {
                continue;
            }
            let mut acc = 0.0;
            for (j, hj) in opponent_range.combos().iter().enumerate() {
                if hj.conflicts_with(board_mask) || hj.conflicts_with(hi.mask()) || rank_by_index_o[j] == i32::MAX {
                    continue;
                }
                let realized = match rank_by_index_t[i].cmp(&rank_by_index_o[j]) {
                    std::cmp::Ordering::Less => win_payoff,
                    std::cmp::Ordering::Greater => lose_payoff,
                    std::cmp::Ordering::Equal => tie_payoff,
                };
                acc += reach[opponent][j] * realized;
            }
            utility[i] = chance_reach * acc;
        }
        Ok(utility)
    }

    fn chance_utility(
        &self,
        child: NodeIndex,
        reach: [Vec<f64>; 2],
        traverser: usize,
        t: u64,
        board_mask: CardMask,
        chance_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let outcomes = remaining_cards(board_mask);
        let n = outcomes.len();
        if n == 0 {
            return Ok(vec![0.0; reach[traverser].len()]);
        }
        let child_subtree_size = self.tree.node(child).subtree_size;
        let parallel = n * child_subtree_size > CHANCE_PARALLEL_THRESHOLD;

        let branch = |&card: &crate::card::Card| -> SolverResult<Vec<f64>> {
            let new_board = board_mask | crate::card::card_mask(card);
            let new_reach = [
                zero_and_renormalize(&reach[0], self.range_manager.range(0), new_board),
                zero_and_renormalize(&reach[1], self.range_manager.range(1), new_board),
            ];
            self.cfr(child, new_reach, traverser, t, new_board, chance_reach / n as f64)
        };

        let results: Vec<Vec<f64>> = if parallel {
            outcomes.par_iter().map(branch).collect::<SolverResult<Vec<_>>>()?
        } else {
            outcomes.iter().map(branch).collect::<SolverResult<Vec<_>>>()?
        };

        let len = reach[traverser].len();
        let mut total = vec![0.0; len];
        for r in results {
            for (acc, v) in total.iter_mut().zip(r.iter()) {
                *acc += v;
            }
        }
        Ok(total)
    }

    #[allow(clippy::too_many_arguments)]
    fn traverser_action(
        &self,
        action: &crate::tree::ActionNode,
        _node_idx: NodeIndex,
        reach: [Vec<f64>; 2],
        traverser: usize,
        t: u64,
        board_mask: CardMask,
        chance_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let opponent = 1 - traverser;
        let trainable = action.trainable_for(board_mask, self.track_ev);
        let num_actions = action.actions.len();
        let num_hands = action.num_hands;

        let sigma = { trainable.lock().unwrap().current_strategy().to_vec() };

        let mut child_utilities = Vec::with_capacity(num_actions);
        for (a, &child_idx) in action.children.iter().enumerate() {
            let mut child_reach = reach.clone();
            for h in 0..num_hands {
                child_reach[traverser][h] *= sigma[a * num_hands + h];
            }
            child_utilities.push(self.cfr(child_idx, child_reach, traverser, t, board_mask, chance_reach)?);
        }

        let mut node_utility = vec![0.0; num_hands];
        for h in 0..num_hands {
            for a in 0..num_actions {
                node_utility[h] += sigma[a * num_hands + h] * child_utilities[a][h];
            }
        }

        let opponent_reach_sum: f64 = reach[opponent].iter().sum();
        let w = opponent_reach_sum * chance_reach;
        let mut rho = vec![0.0; num_actions * num_hands];
        for a in 0..num_actions {
            for h in 0..num_hands {
                rho[a * num_hands + h] = w * (child_utilities[a][h] - node_utility[h]);
            }
        }

        {
            let mut guard = trainable.lock().unwrap();
            guard.update_regrets(t, &rho);
            let refreshed_sigma = guard.current_strategy().to_vec();
            guard.accumulate_strategy(t, &refreshed_sigma, &reach[traverser]);
            if self.track_ev {
                for a in 0..num_actions {
                    guard.accumulate_ev(a, &child_utilities[a]);
                }
            }
        }

        Ok(node_utility)
    }

    fn opponent_action(
        &self,
        action: &crate::tree::ActionNode,
        reach: [Vec<f64>; 2],
        traverser: usize,
        t: u64,
        board_mask: CardMask,
        chance_reach: f64,
    ) -> SolverResult<Vec<f64>> {
        let opponent = action.acting_player;
        let trainable = action.trainable_for(board_mask, self.track_ev);
        let num_actions = action.actions.len();
        let num_hands = action.num_hands;
        let sigma = { trainable.lock().unwrap().current_strategy().to_vec() };

        let mut total = vec![0.0; reach[traverser].len()];
        for (a, &child_idx) in action.children.iter().enumerate() {
            let mut child_reach = reach.clone();
            for h in 0..num_hands {
                child_reach[opponent][h] *= sigma[a * num_hands + h];
            }
            let u = self.cfr(child_idx, child_reach, traverser, t, board_mask, chance_reach)?;
            for (acc, v) in total.iter_mut().zip(u.iter()) {
                *acc += v;
            }
        }
        Ok(total)
    }
}

pub(crate) fn zero_and_renormalize(reach: &[f64], range: &crate::private_cards::Range, board_mask: CardMask) -> Vec<f64> {
    let mut out: Vec<f64> = reach
        .iter()
        .zip(range.combos().iter())
        .map(|(&p, c)| if c.conflicts_with(board_mask) { 0.0 } else { p })
        .collect();
    let total: f64 = out.iter().sum();
    if total > 0.0 {
        for v in out.iter_mut() {
            *v /= total;
        }
    }
    out
}
