//! Card and board encoding.
//!
//! Encoding: `card = rank * 4 + suit`
//!   rank: 0=Two, 1=Three, ..., 11=King, 12=Ace
//!   suit: 0=Clubs, 1=Diamonds, 2=Hearts, 3=Spades
//!
//! A card's bitmask form is `1u64 << card`; board masks are the union of
//! their constituent cards' bitmasks, so overlap between any two card sets
//! is a plain `&` test and popcount gives the number of cards in a mask.

use crate::error::SolverError;

pub const NUM_RANKS: usize = 13;
pub const NUM_SUITS: usize = 4;
pub const NUM_CARDS: usize = 52;

const RANK_CHARS: [char; NUM_RANKS] = [
    '2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K', 'A',
];
const SUIT_CHARS: [char; NUM_SUITS] = ['c', 'd', 'h', 's'];

/// A card as an integer in `0..52`.
pub type Card = u8;

/// A set of cards as a 64-bit bitmask (`1 << card` per member).
pub type CardMask = u64;

#[inline]
pub fn card_mask(card: Card) -> CardMask {
    1u64 << card
}

#[inline]
pub fn mask_of(cards: &[Card]) -> CardMask {
    cards.iter().fold(0u64, |m, &c| m | card_mask(c))
}

#[inline]
pub fn overlaps(a: CardMask, b: CardMask) -> bool {
    a & b != 0
}

#[inline]
pub fn rank_of(card: Card) -> u8 {
    card / 4
}

#[inline]
pub fn suit_of(card: Card) -> u8 {
    card % 4
}

/// Parse a single two-character card string such as `"Ah"` or `"Td"`.
/// Accepts the `10x` alias for `Tx` for compatibility with legacy rank
/// dictionaries (internal representation always uses `T`).
pub fn parse_card(s: &str) -> Result<Card, SolverError> {
    let s = s.trim();
    let (rank_str, suit_str) = if let Some(stripped) = s.strip_prefix("10") {
        ("T", stripped)
    } else if s.len() == 2 {
        s.split_at(1)
    } else {
        return Err(SolverError::InputFormat(format!("invalid card string '{s}'")));
    };
    let rank_char = rank_str.chars().next().unwrap().to_ascii_uppercase();
    let suit_char = suit_str
        .chars()
        .next()
        .ok_or_else(|| SolverError::InputFormat(format!("invalid card string '{s}'")))?
        .to_ascii_lowercase();

    let rank = RANK_CHARS
        .iter()
        .position(|&c| c == rank_char)
        .ok_or_else(|| SolverError::InputFormat(format!("invalid rank in card '{s}'")))?;
    let suit = SUIT_CHARS
        .iter()
        .position(|&c| c == suit_char)
        .ok_or_else(|| SolverError::InputFormat(format!("invalid suit in card '{s}'")))?;

    Ok((rank * NUM_SUITS + suit) as Card)
}

/// Parse a board string with no separators, e.g. `"AcKd5h"`, two characters
/// per card (the `10x` alias is accepted per card, matching `parse_card`).
pub fn parse_board(s: &str) -> Result<Vec<Card>, SolverError> {
    let chars: Vec<char> = s.chars().collect();
    let mut cards = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i..].starts_with(&['1', '0']) {
            let token: String = chars[i..i + 3].iter().collect();
            cards.push(parse_card(&token)?);
            i += 3;
        } else {
            if i + 2 > chars.len() {
                return Err(SolverError::InputFormat(format!("trailing partial card in '{s}'")));
            }
            let token: String = chars[i..i + 2].iter().collect();
            cards.push(parse_card(&token)?);
            i += 2;
        }
    }
    Ok(cards)
}

pub fn card_to_string(card: Card) -> String {
    format!("{}{}", RANK_CHARS[rank_of(card) as usize], SUIT_CHARS[suit_of(card) as usize])
}

pub fn cards_to_string(cards: &[Card]) -> String {
    cards.iter().map(|&c| card_to_string(c)).collect()
}

/// The full 52-card deck as a bitmask.
#[inline]
pub fn full_deck_mask() -> CardMask {
    if NUM_CARDS == 64 {
        u64::MAX
    } else {
        (1u64 << NUM_CARDS) - 1
    }
}

/// Cards remaining in the deck after removing `dead`.
pub fn remaining_cards(dead: CardMask) -> Vec<Card> {
    (0..NUM_CARDS as Card).filter(|&c| !overlaps(card_mask(c), dead)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_cards() {
        for c in 0..NUM_CARDS as Card {
            let s = card_to_string(c);
            assert_eq!(parse_card(&s).unwrap(), c);
        }
    }

    #[test]
    fn known_cards() {
        assert_eq!(parse_card("2c").unwrap(), 0);
        assert_eq!(parse_card("As").unwrap(), 51);
        assert_eq!(parse_card("Ac").unwrap(), 48);
    }

    #[test]
    fn ten_alias_accepted() {
        assert_eq!(parse_card("10h").unwrap(), parse_card("Th").unwrap());
    }

    #[test]
    fn board_popcount_and_overlap() {
        let board = parse_board("AcKd5h").unwrap();
        let mask = mask_of(&board);
        assert_eq!(mask.count_ones(), 3);
        assert!(overlaps(mask, card_mask(parse_card("Ac").unwrap())));
        assert!(!overlaps(mask, card_mask(parse_card("2s").unwrap())));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_card("Zz").is_err());
        assert!(parse_card("A").is_err());
    }

    #[test]
    fn remaining_cards_excludes_dead() {
        let dead = mask_of(&parse_board("AcKd").unwrap());
        let rem = remaining_cards(dead);
        assert_eq!(rem.len(), 50);
        assert!(!rem.contains(&parse_card("Ac").unwrap()));
    }
}
