//! 7-card hand evaluator with an on-disk binary cache.
//!
//! Two hash maps hold precomputed 5-card hand ranks: `flush_ranks`, keyed by
//! the exact 5-card mask when all five cards share a suit, and
//! `non_flush_ranks`, keyed by a suit-erased rank-multiset hash. A lower
//! rank number means a stronger hand; a rank for an invalid (overlapping or
//! unknown) 5-card combination is [`HandEvaluator::INVALID_RANK`].
//!
//! The dictionary is loaded from a text file of `<card>-<card>-...,<rank>`
//! lines. After a successful text load the maps are serialized next to it
//! as a `.bin` sidecar; later runs prefer that cache and fall back to the
//! text file (rewriting the cache) on any read error.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::card::{card_mask, parse_card, Card, CardMask, NUM_SUITS};
use crate::error::{SolverError, SolverResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Player1Wins,
    Player2Wins,
    Tie,
}

pub struct HandEvaluator {
    flush_ranks: HashMap<u64, i32>,
    non_flush_ranks: HashMap<u64, i32>,
}

impl HandEvaluator {
    pub const INVALID_RANK: i32 = i32::MAX;

    /// Loads the dictionary, preferring the binary sidecar (`<path>.bin`)
    /// and rebuilding it from the text file on any read failure.
    pub fn load(text_path: impl AsRef<Path>) -> SolverResult<Self> {
        let text_path = text_path.as_ref();
        let cache_path = sidecar_path(text_path);

        if let Ok(bytes) = fs::read(&cache_path) {
            if let Ok(evaluator) = Self::from_cache_bytes(&bytes) {
                return Ok(evaluator);
            }
        }

        let text = fs::read_to_string(text_path)
            .map_err(|e| SolverError::Resource(format!("cannot read '{}': {e}", text_path.display())))?;
        let evaluator = Self::from_text(&text)?;
        let _ = evaluator.write_cache(&cache_path);
        Ok(evaluator)
    }

    /// Parses the text dictionary directly, skipping malformed lines.
    /// Duplicate non-flush keys overwrite earlier entries.
    pub fn from_text(text: &str) -> SolverResult<Self> {
        let mut flush_ranks = HashMap::new();
        let mut non_flush_ranks = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((cards_part, rank_part)) = line.rsplit_once(',') {
                if let Some(entry) = parse_line(cards_part, rank_part) {
                    let (mask, rank) = entry;
                    if let Some(_suit) = flush_suit(mask) {
                        flush_ranks.insert(mask, rank);
                    } else {
                        non_flush_ranks.insert(rank_hash(mask), rank);
                    }
                }
            }
        }

        if flush_ranks.is_empty() && non_flush_ranks.is_empty() {
            return Err(SolverError::Resource("hand-rank dictionary is empty".to_string()));
        }

        Ok(Self { flush_ranks, non_flush_ranks })
    }

    fn from_cache_bytes(bytes: &[u8]) -> io::Result<Self> {
        let mut cursor = bytes;
        let flush_ranks = read_table(&mut cursor)?;
        let non_flush_ranks = read_table(&mut cursor)?;
        Ok(Self { flush_ranks, non_flush_ranks })
    }

    fn write_cache(&self, path: &Path) -> io::Result<()> {
        let tmp_path = path.with_extension("bin.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            write_table(&mut file, &self.flush_ranks)?;
            write_table(&mut file, &self.non_flush_ranks)?;
        }
        fs::rename(tmp_path, path)
    }

    /// Ranks a single 5-card mask, or [`Self::INVALID_RANK`] if unknown or
    /// the mask does not contain exactly 5 cards.
    pub fn rank5(&self, mask: CardMask) -> i32 {
        if mask.count_ones() != 5 {
            return Self::INVALID_RANK;
        }
        if flush_suit(mask).is_some() {
            *self.flush_ranks.get(&mask).unwrap_or(&Self::INVALID_RANK)
        } else {
            *self.non_flush_ranks.get(&rank_hash(mask)).unwrap_or(&Self::INVALID_RANK)
        }
    }

    /// Ranks the best 5-card hand out of `hole_mask | board_mask`'s cards
    /// (5, 6, or 7 total), by minimum over all C(n,5) subsets.
    pub fn rank(&self, hole_mask: CardMask, board_mask: CardMask) -> i32 {
        if hole_mask & board_mask != 0 {
            return Self::INVALID_RANK;
        }
        let combined = hole_mask | board_mask;
        let cards: Vec<Card> = (0..64).filter(|&c| combined & (1u64 << c) != 0).collect();
        if cards.len() < 5 {
            return Self::INVALID_RANK;
        }
        cards
            .into_iter()
            .combinations(5)
            .map(|subset| self.rank5(subset.iter().fold(0u64, |m, &c| m | card_mask(c))))
            .min()
            .unwrap_or(Self::INVALID_RANK)
    }

    pub fn compare(&self, hole1: CardMask, hole2: CardMask, board: CardMask) -> Comparison {
        let r1 = self.rank(hole1, board);
        let r2 = self.rank(hole2, board);
        match r1.cmp(&r2) {
            std::cmp::Ordering::Less => Comparison::Player1Wins,
            std::cmp::Ordering::Greater => Comparison::Player2Wins,
            std::cmp::Ordering::Equal => Comparison::Tie,
        }
    }
}

fn sidecar_path(text_path: &Path) -> PathBuf {
    text_path.with_extension("bin")
}

fn parse_line(cards_part: &str, rank_part: &str) -> Option<(CardMask, i32)> {
    let rank: i32 = rank_part.trim().parse().ok()?;
    let mut mask: CardMask = 0;
    let mut count = 0;
    for token in cards_part.split('-') {
        let card = parse_card(token).ok()?;
        mask |= card_mask(card);
        count += 1;
    }
    if count != 5 || mask.count_ones() != 5 {
        return None;
    }
    Some((mask, rank))
}

/// True (with the suit) iff every set bit in `mask` shares one suit.
fn flush_suit(mask: CardMask) -> Option<u8> {
    for suit in 0..NUM_SUITS as u8 {
        let suit_mask = suit_full_mask(suit);
        if mask & !suit_mask == 0 {
            return Some(suit);
        }
    }
    None
}

fn suit_full_mask(suit: u8) -> CardMask {
    let mut mask = 0u64;
    let mut rank = 0u8;
    while (rank as usize) < crate::card::NUM_RANKS {
        mask |= 1u64 << (rank * NUM_SUITS as u8 + suit);
        rank += 1;
    }
    mask
}

/// Collapses suit information via two passes of pairwise bit-folding,
/// leaving a 4-bit per-rank count of how many suits of that rank are
/// present, a canonical key for the rank-only (suit-erased) multiset.
fn rank_hash(mask: CardMask) -> u64 {
    let m1 = (mask & 0x5555_5555_5555_5555) + ((mask >> 1) & 0x5555_5555_5555_5555);
    (m1 & 0x3333_3333_3333_3333) + ((m1 >> 2) & 0x3333_3333_3333_3333)
}

fn write_table(w: &mut impl Write, table: &HashMap<u64, i32>) -> io::Result<()> {
    w.write_all(&(table.len() as u64).to_le_bytes())?;
    for (&key, &rank) in table {
        w.write_all(&key.to_le_bytes())?;
        w.write_all(&rank.to_le_bytes())?;
    }
    Ok(())
}

fn read_table(cursor: &mut &[u8]) -> io::Result<HashMap<u64, i32>> {
    let size = read_u64(cursor)? as usize;
    let mut table = HashMap::with_capacity(size);
    for _ in 0..size {
        let key = read_u64(cursor)?;
        let rank = read_i32(cursor)?;
        table.insert(key, rank);
    }
    Ok(table)
}

fn read_u64(cursor: &mut &[u8]) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    cursor.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_i32(cursor: &mut &[u8]) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}
