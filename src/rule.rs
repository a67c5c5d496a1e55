//! Immutable scenario configuration: streets, betting abstraction, blinds,
//! stacks, and the initial board/commitments the tree builder starts from.

use crate::card::Card;
use crate::error::{SolverError, SolverResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Round {
    Preflop,
    Flop,
    Turn,
    River,
}

impl Round {
    pub fn next(self) -> Option<Round> {
        match self {
            Round::Preflop => Some(Round::Flop),
            Round::Flop => Some(Round::Turn),
            Round::Turn => Some(Round::River),
            Round::River => None,
        }
    }

    /// Number of community cards a chance node must deal to reach this
    /// round from its predecessor.
    pub fn cards_to_deal(self) -> usize {
        match self {
            Round::Preflop => 0,
            Round::Flop => 3,
            Round::Turn => 1,
            Round::River => 1,
        }
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Round::Preflop => "Preflop",
            Round::Flop => "Flop",
            Round::Turn => "Turn",
            Round::River => "River",
        };
        write!(f, "{s}")
    }
}

/// Allowed betting configuration for one player position on one street.
/// Sizes are percentages of the pot (e.g. `50.0` for a half-pot bet).
#[derive(Debug, Clone, Default)]
pub struct StreetSetting {
    pub bet_sizes_percent: Vec<f64>,
    pub raise_sizes_percent: Vec<f64>,
    pub donk_sizes_percent: Vec<f64>,
    pub allow_all_in: bool,
}

impl StreetSetting {
    pub fn new(
        bet_sizes_percent: Vec<f64>,
        raise_sizes_percent: Vec<f64>,
        donk_sizes_percent: Vec<f64>,
        allow_all_in: bool,
    ) -> Self {
        Self { bet_sizes_percent, raise_sizes_percent, donk_sizes_percent, allow_all_in }
    }
}

/// Aggregates a [`StreetSetting`] per (street, position) for Flop/Turn/River.
#[derive(Debug, Clone, Default)]
pub struct GameTreeBuildingSettings {
    pub flop_ip: StreetSetting,
    pub turn_ip: StreetSetting,
    pub river_ip: StreetSetting,
    pub flop_oop: StreetSetting,
    pub turn_oop: StreetSetting,
    pub river_oop: StreetSetting,
}

impl GameTreeBuildingSettings {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flop_ip: StreetSetting,
        turn_ip: StreetSetting,
        river_ip: StreetSetting,
        flop_oop: StreetSetting,
        turn_oop: StreetSetting,
        river_oop: StreetSetting,
    ) -> Self {
        Self { flop_ip, turn_ip, river_ip, flop_oop, turn_oop, river_oop }
    }

    /// `player_index`: 0 = IP, 1 = OOP. Falls back street-by-street toward
    /// the river setting for a later street whose own entry is empty, so a
    /// scenario that only configures `river_*` still produces legal bets on
    /// the flop and turn.
    pub fn get(&self, player_index: usize, round: Round) -> SolverResult<&StreetSetting> {
        let (flop, turn, river) = match player_index {
            0 => (&self.flop_ip, &self.turn_ip, &self.river_ip),
            1 => (&self.flop_oop, &self.turn_oop, &self.river_oop),
            _ => {
                return Err(SolverError::Invariant(format!(
                    "invalid player index {player_index} in GameTreeBuildingSettings::get"
                )))
            }
        };
        match round {
            Round::Preflop => Err(SolverError::Invariant(
                "GameTreeBuildingSettings are for postflop rounds only".to_string(),
            )),
            Round::Flop => Ok(fallback(flop, turn, river)),
            Round::Turn => Ok(fallback(turn, river, flop)),
            Round::River => Ok(fallback(river, flop, turn)),
        }
    }
}

fn fallback<'a>(primary: &'a StreetSetting, b: &'a StreetSetting, c: &'a StreetSetting) -> &'a StreetSetting {
    if !is_empty(primary) {
        primary
    } else if !is_empty(b) {
        b
    } else {
        c
    }
}

fn is_empty(s: &StreetSetting) -> bool {
    s.bet_sizes_percent.is_empty() && s.raise_sizes_percent.is_empty() && s.donk_sizes_percent.is_empty()
}

/// Immutable scenario configuration consumed by the tree builder.
#[derive(Debug, Clone)]
pub struct Rule {
    pub initial_oop_commit: f64,
    pub initial_ip_commit: f64,
    pub starting_round: Round,
    pub initial_board_cards: Vec<Card>,
    pub raise_limit_per_street: u32,
    pub small_blind: f64,
    pub big_blind: f64,
    pub initial_effective_stack: f64,
    pub build_settings: GameTreeBuildingSettings,
    pub all_in_threshold_ratio: f64,
}

impl Rule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        initial_oop_commit: f64,
        initial_ip_commit: f64,
        starting_round: Round,
        initial_board_cards: Vec<Card>,
        raise_limit_per_street: u32,
        small_blind: f64,
        big_blind: f64,
        initial_effective_stack: f64,
        build_settings: GameTreeBuildingSettings,
        all_in_threshold_ratio: f64,
    ) -> SolverResult<Self> {
        if initial_oop_commit < 0.0 || initial_ip_commit < 0.0 || small_blind < 0.0 || big_blind < 0.0 {
            return Err(SolverError::InputFormat(
                "monetary values in Rule cannot be negative".to_string(),
            ));
        }
        if initial_effective_stack <= 0.0 {
            return Err(SolverError::InputFormat("initial effective stack must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&all_in_threshold_ratio) {
            return Err(SolverError::InputFormat(
                "all-in threshold ratio must be between 0.0 and 1.0".to_string(),
            ));
        }
        if starting_round == Round::Preflop {
            return Err(SolverError::Invariant(
                "dynamic bet enumeration does not support starting_round == Preflop".to_string(),
            ));
        }
        Ok(Self {
            initial_oop_commit,
            initial_ip_commit,
            starting_round,
            initial_board_cards,
            raise_limit_per_street,
            small_blind,
            big_blind,
            initial_effective_stack,
            build_settings,
            all_in_threshold_ratio,
        })
    }

    pub fn initial_pot(&self) -> f64 {
        self.initial_oop_commit + self.initial_ip_commit
    }

    /// `player_index`: 0 = IP, 1 = OOP.
    pub fn initial_commitment(&self, player_index: usize) -> SolverResult<f64> {
        match player_index {
            0 => Ok(self.initial_ip_commit),
            1 => Ok(self.initial_oop_commit),
            _ => Err(SolverError::Invariant(format!("invalid player index {player_index}"))),
        }
    }

    pub fn all_in_threshold(&self) -> f64 {
        self.initial_effective_stack * self.all_in_threshold_ratio
    }
}
