//! Per-action-node DCFR storage: cumulative regret, cumulative strategy
//! sum, and lazily recomputed current/average strategy caches.

pub const ALPHA: f64 = 1.5;
pub const BETA: f64 = 0.5;
pub const GAMMA: f64 = 2.0;

/// Regret and strategy-sum tables for one action node, flattened as
/// `[action * num_hands + hand]`.
#[derive(Debug, Clone)]
pub struct Trainable {
    num_actions: usize,
    num_hands: usize,
    regrets: Vec<f64>,
    strategy_sums: Vec<f64>,
    ev_sums: Option<Vec<f64>>,
    current_strategy_cache: Vec<f64>,
    current_strategy_valid: bool,
    average_strategy_cache: Vec<f64>,
    average_strategy_valid: bool,
}

impl Trainable {
    pub fn new(num_actions: usize, num_hands: usize, track_ev: bool) -> Self {
        let len = num_actions * num_hands;
        Self {
            num_actions,
            num_hands,
            regrets: vec![0.0; len],
            strategy_sums: vec![0.0; len],
            ev_sums: track_ev.then(|| vec![0.0; len]),
            current_strategy_cache: vec![0.0; len],
            current_strategy_valid: false,
            average_strategy_cache: vec![0.0; len],
            average_strategy_valid: false,
        }
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn num_hands(&self) -> usize {
        self.num_hands
    }

    fn index(&self, action: usize, hand: usize) -> usize {
        action * self.num_hands + hand
    }

    /// Current strategy via regret-matching+: proportional to positive
    /// regret per hand, uniform when all regrets are non-positive.
    pub fn current_strategy(&mut self) -> &[f64] {
        if !self.current_strategy_valid {
            for h in 0..self.num_hands {
                let mut positive_sum = 0.0;
                for a in 0..self.num_actions {
                    positive_sum += self.regrets[self.index(a, h)].max(0.0);
                }
                for a in 0..self.num_actions {
                    let idx = self.index(a, h);
                    self.current_strategy_cache[idx] = if positive_sum > 0.0 {
                        self.regrets[idx].max(0.0) / positive_sum
                    } else {
                        1.0 / self.num_actions as f64
                    };
                }
            }
            self.current_strategy_valid = true;
        }
        &self.current_strategy_cache
    }

    /// Updates cumulative regret at iteration `t` from pre-weighted
    /// per-action-per-hand immediate regret `rho`; the sign of the prior
    /// regret selects the `alpha`/`beta` discount.
    pub fn update_regrets(&mut self, t: u64, rho: &[f64]) {
        debug_assert_eq!(rho.len(), self.regrets.len());
        let t = t as f64;
        let pos_discount = t.powf(ALPHA) / (t.powf(ALPHA) + 1.0);
        let neg_discount = t.powf(BETA) / (t.powf(BETA) + 1.0);
        for (r, &delta) in self.regrets.iter_mut().zip(rho.iter()) {
            let discount = if *r > 0.0 { pos_discount } else { neg_discount };
            *r = *r * discount + delta;
        }
        self.current_strategy_valid = false;
    }

    /// Accumulates the strategy sum from the just-recomputed current
    /// strategy `sigma` and the acting player's reach vector `reach`, with
    /// the `gamma` discount applied at iteration `t`.
    pub fn accumulate_strategy(&mut self, t: u64, sigma: &[f64], reach: &[f64]) {
        debug_assert_eq!(sigma.len(), self.strategy_sums.len());
        debug_assert_eq!(reach.len(), self.num_hands);
        let discount = (t as f64 / (t as f64 + 1.0)).powf(GAMMA);
        for a in 0..self.num_actions {
            for h in 0..self.num_hands {
                let idx = self.index(a, h);
                self.strategy_sums[idx] += sigma[idx] * reach[h] * discount;
            }
        }
        self.average_strategy_valid = false;
    }

    pub fn accumulate_ev(&mut self, action: usize, ev_per_hand: &[f64]) {
        if let Some(ev_sums) = &mut self.ev_sums {
            for (h, &v) in ev_per_hand.iter().enumerate() {
                ev_sums[self.index(action, h)] = v;
            }
        }
    }

    pub fn evs(&self) -> Option<&[f64]> {
        self.ev_sums.as_deref()
    }

    /// Normalized cumulative strategy sum per hand; uniform when the sum
    /// for a hand is zero.
    pub fn average_strategy(&mut self) -> &[f64] {
        if !self.average_strategy_valid {
            for h in 0..self.num_hands {
                let mut total = 0.0;
                for a in 0..self.num_actions {
                    total += self.strategy_sums[self.index(a, h)];
                }
                for a in 0..self.num_actions {
                    let idx = self.index(a, h);
                    self.average_strategy_cache[idx] = if total > 0.0 {
                        self.strategy_sums[idx] / total
                    } else {
                        1.0 / self.num_actions as f64
                    };
                }
            }
            self.average_strategy_valid = true;
        }
        &self.average_strategy_cache
    }

    /// Copies all four tables from `other`; legal only when the action and
    /// hand counts match.
    pub fn copy_state_from(&mut self, other: &Trainable) -> Result<(), crate::error::SolverError> {
        if self.num_actions != other.num_actions || self.num_hands != other.num_hands {
            return Err(crate::error::SolverError::Invariant(
                "Trainable copy requires matching action/hand counts".to_string(),
            ));
        }
        self.regrets.copy_from_slice(&other.regrets);
        self.strategy_sums.copy_from_slice(&other.strategy_sums);
        if let (Some(dst), Some(src)) = (&mut self.ev_sums, &other.ev_sums) {
            dst.copy_from_slice(src);
        }
        self.current_strategy_valid = false;
        self.average_strategy_valid = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_with_no_regret() {
        let mut t = Trainable::new(3, 1, false);
        let strat = t.current_strategy().to_vec();
        for a in 0..3 {
            assert!((strat[a * 1] - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn regret_matching_proportional() {
        let mut t = Trainable::new(2, 1, false);
        t.update_regrets(1, &[3.0, 1.0]);
        let strat = t.current_strategy();
        assert!((strat[0] - 0.75).abs() < 1e-9);
        assert!((strat[1] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn negative_regret_never_drives_strategy_negative() {
        let mut t = Trainable::new(2, 1, false);
        t.update_regrets(1, &[-5.0, 3.0]);
        let strat = t.current_strategy();
        assert_eq!(strat[0], 0.0);
        assert_eq!(strat[1], 1.0);
    }

    #[test]
    fn average_strategy_uniform_when_never_accumulated() {
        let mut t = Trainable::new(2, 1, false);
        let avg = t.average_strategy();
        assert!((avg[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn average_strategy_normalizes_accumulated_sums() {
        let mut t = Trainable::new(2, 1, false);
        t.update_regrets(1, &[1.0, 0.0]);
        let sigma = t.current_strategy().to_vec();
        t.accumulate_strategy(1, &sigma, &[1.0]);
        let avg = t.average_strategy();
        assert!((avg[0] - 1.0).abs() < 1e-9);
        assert!((avg[1] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn copy_state_requires_matching_shape() {
        let src = Trainable::new(2, 1, false);
        let mut dst = Trainable::new(3, 1, false);
        assert!(dst.copy_state_from(&src).is_err());
    }

    #[test]
    fn copy_state_transfers_tables() {
        let mut src = Trainable::new(2, 1, false);
        src.update_regrets(1, &[4.0, -2.0]);
        let mut dst = Trainable::new(2, 1, false);
        dst.copy_state_from(&src).unwrap();
        assert_eq!(dst.current_strategy(), src.clone().current_strategy());
    }
}
