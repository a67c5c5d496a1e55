//! Parses range strings such as `"AKs,QQ:0.5,AcKc"` into a `Range`.
//!
//! A component is a pair (`QQ`), a suited hand (`AKs`), an offsuit hand
//! (`AKo`), or a specific four-character combo (`AcKc`), each optionally
//! suffixed with `:<weight>`. Default weight is `1.0`; a component whose
//! weight is `<= 0.005` is dropped entirely. Board-blocked combos are
//! dropped silently; a combo produced by two different components is an
//! input error.

use std::collections::HashSet;

use crate::card::{overlaps, parse_card, Card, CardMask, NUM_RANKS, NUM_SUITS};
use crate::error::{SolverError, SolverResult};
use crate::private_cards::{PrivateCards, Range};

const RANK_CHARS: [char; NUM_RANKS] = [
    '2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K', 'A',
];

const WEIGHT_EPSILON: f64 = 0.005;

fn rank_index(c: char) -> SolverResult<usize> {
    RANK_CHARS
        .iter()
        .position(|&r| r == c.to_ascii_uppercase())
        .ok_or_else(|| SolverError::InputFormat(format!("invalid rank '{c}'")))
}

/// Parses a full range string into a `Range`, dropping board-blocked combos
/// and rejecting components whose resolved combos collide with a combo
/// already produced earlier in the string.
pub fn parse_range(range_str: &str, board_mask: CardMask) -> SolverResult<Range> {
    let mut seen: HashSet<(Card, Card)> = HashSet::new();
    let mut combos = Vec::new();

    for raw_component in range_str.split(',') {
        let component = raw_component.trim();
        if component.is_empty() {
            continue;
        }
        let (notation, weight) = split_weight(component)?;
        if weight <= WEIGHT_EPSILON {
            continue;
        }
        let generated = expand_component(notation)?;
        for (a, b) in generated {
            let mask = (1u64 << a) | (1u64 << b);
            if overlaps(mask, board_mask) {
                continue;
            }
            let key = if a < b { (a, b) } else { (b, a) };
            if !seen.insert(key) {
                return Err(SolverError::InputFormat(format!(
                    "duplicate combo '{}{}' produced by range string '{}'",
                    crate::card::card_to_string(key.0),
                    crate::card::card_to_string(key.1),
                    range_str
                )));
            }
            combos.push(PrivateCards::new(a, b, weight));
        }
    }

    Ok(Range::new(combos))
}

fn split_weight(component: &str) -> SolverResult<(&str, f64)> {
    match component.split_once(':') {
        None => Ok((component, 1.0)),
        Some((notation, weight_str)) => {
            let weight: f64 = weight_str.trim().parse().map_err(|_| {
                SolverError::InputFormat(format!("invalid weight in component '{component}'"))
            })?;
            Ok((notation.trim(), weight))
        }
    }
}

/// Expands one notation (without its weight suffix) into concrete
/// `(card1, card2)` pairs, before board filtering.
fn expand_component(notation: &str) -> SolverResult<Vec<(Card, Card)>> {
    let chars: Vec<char> = notation.chars().collect();
    match chars.len() {
        2 => {
            if chars[0].to_ascii_uppercase() != chars[1].to_ascii_uppercase() {
                return Err(SolverError::InputFormat(format!(
                    "2-character component '{notation}' must be a pair"
                )));
            }
            Ok(pair_combos(rank_index(chars[0])?))
        }
        3 => {
            let r1 = rank_index(chars[0])?;
            let r2 = rank_index(chars[1])?;
            if r1 == r2 {
                return Err(SolverError::InputFormat(format!(
                    "suited/offsuit suffix invalid for a pair: '{notation}'"
                )));
            }
            match chars[2].to_ascii_lowercase() {
                's' => Ok(suited_combos(r1, r2)),
                'o' => Ok(offsuit_combos(r1, r2)),
                _ => Err(SolverError::InputFormat(format!(
                    "expected 's' or 'o' suffix in '{notation}'"
                ))),
            }
        }
        4 => {
            let c1 = parse_card(&notation[0..2])?;
            let c2 = parse_card(&notation[2..4])?;
            if c1 == c2 {
                return Err(SolverError::InputFormat(format!(
                    "specific combo '{notation}' repeats the same card"
                )));
            }
            Ok(vec![(c1, c2)])
        }
        _ => Err(SolverError::InputFormat(format!("unrecognized range component '{notation}'"))),
    }
}

fn pair_combos(rank: usize) -> Vec<(Card, Card)> {
    let base = (rank * NUM_SUITS) as Card;
    let mut out = Vec::with_capacity(6);
    for s1 in 0..NUM_SUITS as Card {
        for s2 in (s1 + 1)..NUM_SUITS as Card {
            out.push((base + s1, base + s2));
        }
    }
    out
}

fn suited_combos(r1: usize, r2: usize) -> Vec<(Card, Card)> {
    (0..NUM_SUITS as Card)
        .map(|s| ((r1 * NUM_SUITS) as Card + s, (r2 * NUM_SUITS) as Card + s))
        .collect()
}

fn offsuit_combos(r1: usize, r2: usize) -> Vec<(Card, Card)> {
    let mut out = Vec::with_capacity(12);
    for s1 in 0..NUM_SUITS as Card {
        for s2 in 0..NUM_SUITS as Card {
            if s1 != s2 {
                out.push(((r1 * NUM_SUITS) as Card + s1, (r2 * NUM_SUITS) as Card + s2));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::mask_of;

    #[test]
    fn aks_and_half_weight_qq_on_empty_board() {
        let range = parse_range("AKs,QQ:0.5", 0).unwrap();
        assert_eq!(range.len(), 10);
        let aks_weight = range
            .combos()
            .iter()
            .filter(|c| {
                let r1 = crate::card::rank_of(c.card1());
                let r2 = crate::card::rank_of(c.card2());
                (r1 == 12 && r2 == 11) || (r1 == 11 && r2 == 12)
            })
            .count();
        assert_eq!(aks_weight, 4);
        for c in range.combos() {
            let r1 = crate::card::rank_of(c.card1());
            let r2 = crate::card::rank_of(c.card2());
            if r1 == 10 && r2 == 10 {
                assert!((c.weight - 0.5).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn board_blocking_reduces_combo_count() {
        let board = crate::card::parse_board("AcQd").unwrap();
        let range = parse_range("AKs,QQ", mask_of(&board)).unwrap();
        // AKs: 4 combos minus AcKc = 3; QQ: 6 combos minus the 3 containing Qd = 3.
        assert_eq!(range.len(), 6);
    }

    #[test]
    fn duplicate_combo_is_rejected() {
        let err = parse_range("AcKc,AKs", 0).unwrap_err();
        assert!(matches!(err, SolverError::InputFormat(_)));
    }

    #[test]
    fn near_zero_weight_drops_component() {
        let range = parse_range("QQ:0.005,AKs", 0).unwrap();
        assert_eq!(range.len(), 4);
    }
}
