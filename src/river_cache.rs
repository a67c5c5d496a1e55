//! Per-(player, river board) cache of ranked, sorted surviving combos.
//!
//! Mirrors the double-checked-locking shape used for the teacher's shared
//! caches: the lock is held only to check for a hit or to insert, never
//! while computing, so concurrent misses on the same key race and the
//! first insert wins; every caller still ends up with a reference to the
//! surviving entry, and the loser's work is simply discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::card::CardMask;
use crate::error::{SolverError, SolverResult};
use crate::hand_eval::HandEvaluator;
use crate::private_cards::Range;

#[derive(Debug, Clone, Copy)]
pub struct RiverCombo {
    pub combo_index: usize,
    pub mask: CardMask,
    pub rank: i32,
}

type CacheKey = CardMask;
type CacheEntry = Arc<Vec<RiverCombo>>;

pub struct RiverCache<'a> {
    evaluator: &'a HandEvaluator,
    tables: [Mutex<HashMap<CacheKey, CacheEntry>>; 2],
}

impl<'a> RiverCache<'a> {
    pub fn new(evaluator: &'a HandEvaluator) -> Self {
        Self { evaluator, tables: [Mutex::new(HashMap::new()), Mutex::new(HashMap::new())] }
    }

    /// Returns the sorted (worst rank first) surviving combos for `player`
    /// on `board_mask`, computing and inserting on first lookup.
    pub fn get(&self, player: usize, range: &Range, board_mask: CardMask) -> SolverResult<CacheEntry> {
        if board_mask.count_ones() != 5 {
            return Err(SolverError::Invariant(format!(
                "river board mask has popcount {}, expected 5",
                board_mask.count_ones()
            )));
        }

        {
            let table = self.tables[player].lock().unwrap();
            if let Some(entry) = table.get(&board_mask) {
                return Ok(Arc::clone(entry));
            }
        }

        let computed = Arc::new(self.compute(range, board_mask));

        let mut table = self.tables[player].lock().unwrap();
        let entry = table.entry(board_mask).or_insert_with(|| computed);
        Ok(Arc::clone(entry))
    }

    fn compute(&self, range: &Range, board_mask: CardMask) -> Vec<RiverCombo> {
        let mut combos: Vec<RiverCombo> = range
            .live_against(board_mask)
            .map(|(index, combo)| RiverCombo {
                combo_index: index,
                mask: combo.mask(),
                rank: self.evaluator.rank(combo.mask(), board_mask),
            })
            .collect();
        // worst hand first: invalid ranks (i32::MAX) naturally sort last
        // under descending order, so flip to ascending-by-(-rank).
        combos.sort_by(|a, b| b.rank.cmp(&a.rank));
        combos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::parse_board;
    use crate::private_cards::PrivateCards;

    fn dict() -> HandEvaluator {
        let lines = [
            "Ac-Ad-Ah-As-Kc,10",
            "Kc-Kd-Kh-Ks-Ac,20",
            "Qc-Qd-Qh-Ac-Kd,30",
        ];
        HandEvaluator::from_text(&lines.join("\n")).unwrap()
    }

    fn combo(cards: &str) -> PrivateCards {
        let cs = parse_board(cards).unwrap();
        PrivateCards::new(cs[0], cs[1], 1.0)
    }

    #[test]
    fn rejects_non_five_card_board() {
        let ev = dict();
        let cache = RiverCache::new(&ev);
        let range = Range::new(vec![combo("AhKh")]);
        let bad_board = crate::card::mask_of(&parse_board("AcKd").unwrap());
        assert!(cache.get(0, &range, bad_board).is_err());
    }

    #[test]
    fn sorted_descending_by_rank_worst_first() {
        let ev = dict();
        let cache = RiverCache::new(&ev);
        let range = Range::new(vec![combo("AhAs"), combo("KhKs"), combo("QhQs")]);
        let board = crate::card::mask_of(&parse_board("Ac2h3d4s5c").unwrap());
        let result = cache.get(0, &range, board).unwrap();
        assert_eq!(result.len(), 3);
        for w in result.windows(2) {
            assert!(w[0].rank >= w[1].rank);
        }
    }

    #[test]
    fn cardinality_excludes_blocked_combos() {
        let ev = dict();
        let cache = RiverCache::new(&ev);
        let range = Range::new(vec![combo("AhAs"), combo("AcKd")]);
        let board = crate::card::mask_of(&parse_board("AcTh2d3s4h").unwrap());
        let result = cache.get(0, &range, board).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn repeated_lookup_returns_same_entry() {
        let ev = dict();
        let cache = RiverCache::new(&ev);
        let range = Range::new(vec![combo("AhAs")]);
        let board = crate::card::mask_of(&parse_board("Kc2h3d4s5c").unwrap());
        let first = cache.get(0, &range, board).unwrap();
        let second = cache.get(0, &range, board).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
