//! Scenario JSON I/O (§6): deserializing a solver run's configuration from
//! the external schema, and dumping a trained tree's strategy as a JSON
//! node tree for the GUI to render.
//!
//! Because the tree is built with lumped chance nodes (one node per street
//! transition, card-agnostic), dumping concrete `dealt_cards` requires a
//! caller-supplied board path: the sequence of additional cards to walk
//! through each Chance node encountered, in order. A scenario starting on
//! the river has no such nodes and an empty path suffices; one starting on
//! the flop needs the turn and river cards of the single line being
//! rendered.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::card::{card_mask, card_to_string, mask_of, parse_card, Card, CardMask};
use crate::error::{SolverError, SolverResult};
use crate::private_cards::Range;
use crate::range_manager::RangeManager;
use crate::range_parser::parse_range;
use crate::rule::{GameTreeBuildingSettings, Round, Rule, StreetSetting};
use crate::tree::{GameTree, NodeIndex, NodeKind};

#[derive(Debug, Deserialize)]
pub struct ScenarioFile {
    pub test_case_name: String,
    pub description: String,
    pub solver_config: SolverConfig,
    pub game_rule: GameRuleConfig,
    pub player_ranges: PlayerRanges,
    pub expected_output_file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SolverConfig {
    pub iterations: u64,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_threads() -> usize {
    1
}

#[derive(Debug, Deserialize)]
pub struct GameRuleConfig {
    pub starting_round: String,
    #[serde(default)]
    pub initial_board: Vec<String>,
    pub initial_commitments: Commitments,
    pub blinds: Blinds,
    pub effective_stack: f64,
    pub raise_limit_per_street: u32,
    pub all_in_threshold_ratio: f64,
    #[serde(default)]
    pub building_settings: BTreeMap<String, StreetSettingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Commitments {
    pub ip: f64,
    pub oop: f64,
}

#[derive(Debug, Deserialize)]
pub struct Blinds {
    pub sb: f64,
    pub bb: f64,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct StreetSettingConfig {
    #[serde(default)]
    pub bet_sizes_percent: Vec<f64>,
    #[serde(default)]
    pub raise_sizes_percent: Vec<f64>,
    #[serde(default)]
    pub donk_sizes_percent: Vec<f64>,
    #[serde(default)]
    pub allow_all_in: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlayerRanges {
    pub ip: String,
    pub oop: String,
}

/// A scenario resolved into the library's own types, ready to hand to
/// [`crate::tree::build`] and [`crate::solver::DcfrSolver`].
pub struct LoadedScenario {
    pub name: String,
    pub description: String,
    pub iterations: u64,
    pub threads: usize,
    pub rule: Rule,
    pub ip_range: Range,
    pub oop_range: Range,
    pub initial_board: Vec<Card>,
    pub expected_output_file: Option<String>,
}

pub fn load_scenario(path: &Path) -> SolverResult<LoadedScenario> {
    let text = fs::read_to_string(path)
        .map_err(|e| SolverError::Resource(format!("cannot read scenario '{}': {e}", path.display())))?;
    let file: ScenarioFile = serde_json::from_str(&text)
        .map_err(|e| SolverError::InputFormat(format!("malformed scenario JSON: {e}")))?;
    parse_scenario(file)
}

fn street_setting(config: &BTreeMap<String, StreetSettingConfig>, key: &str) -> StreetSetting {
    let c = config.get(key).cloned().unwrap_or_default();
    StreetSetting::new(c.bet_sizes_percent, c.raise_sizes_percent, c.donk_sizes_percent, c.allow_all_in)
}

fn expected_card_count(round: Round) -> usize {
    match round {
        Round::Preflop => 0,
        Round::Flop => 3,
        Round::Turn => 4,
        Round::River => 5,
    }
}

fn parse_scenario(file: ScenarioFile) -> SolverResult<LoadedScenario> {
    let starting_round = match file.game_rule.starting_round.as_str() {
        "Preflop" => Round::Preflop,
        "Flop" => Round::Flop,
        "Turn" => Round::Turn,
        "River" => Round::River,
        other => return Err(SolverError::InputFormat(format!("unknown starting_round '{other}'"))),
    };

    let initial_board: Vec<Card> =
        file.game_rule.initial_board.iter().map(|s| parse_card(s)).collect::<SolverResult<_>>()?;
    let expected = expected_card_count(starting_round);
    if initial_board.len() != expected {
        return Err(SolverError::InputFormat(format!(
            "starting round {starting_round} expects {expected} board cards, got {}",
            initial_board.len()
        )));
    }
    let board_mask = mask_of(&initial_board);

    let settings = &file.game_rule.building_settings;
    let build_settings = GameTreeBuildingSettings::new(
        street_setting(settings, "flop_ip"),
        street_setting(settings, "turn_ip"),
        street_setting(settings, "river_ip"),
        street_setting(settings, "flop_oop"),
        street_setting(settings, "turn_oop"),
        street_setting(settings, "river_oop"),
    );

    let rule = Rule::new(
        file.game_rule.initial_commitments.oop,
        file.game_rule.initial_commitments.ip,
        starting_round,
        initial_board.clone(),
        file.game_rule.raise_limit_per_street,
        file.game_rule.blinds.sb,
        file.game_rule.blinds.bb,
        file.game_rule.effective_stack,
        build_settings,
        file.game_rule.all_in_threshold_ratio,
    )?;

    let ip_range = parse_range(&file.player_ranges.ip, board_mask)?;
    let oop_range = parse_range(&file.player_ranges.oop, board_mask)?;
    if ip_range.is_empty() || oop_range.is_empty() {
        return Err(SolverError::InputFormat("player range resolved to zero combos".to_string()));
    }

    Ok(LoadedScenario {
        name: file.test_case_name,
        description: file.description,
        iterations: file.solver_config.iterations,
        threads: file.solver_config.threads,
        rule,
        ip_range,
        oop_range,
        initial_board,
        expected_output_file: file.expected_output_file,
    })
}

/// Dumps `tree`'s strategy as a JSON node tree, following `board_path` to
/// pick a concrete dealt card at each Chance node and pruning recursion
/// (but not the node itself) past `max_depth`.
pub fn dump_strategy(
    tree: &GameTree,
    range_manager: &RangeManager,
    initial_board_mask: CardMask,
    board_path: &[Card],
    max_depth: Option<usize>,
) -> SolverResult<Value> {
    let mut path = board_path.iter().copied();
    dump_node(tree, tree.root(), range_manager, initial_board_mask, &mut path, 0, max_depth)
}

fn dump_node(
    tree: &GameTree,
    idx: NodeIndex,
    range_manager: &RangeManager,
    board_mask: CardMask,
    path: &mut impl Iterator<Item = Card>,
    depth: usize,
    max_depth: Option<usize>,
) -> SolverResult<Value> {
    let node = tree.node(idx);
    let descend = max_depth.map_or(true, |m| depth < m);

    match &node.kind {
        NodeKind::Terminal { payoffs } => Ok(json!({
            "node_type": "Terminal",
            "round": node.round.to_string(),
            "pot": node.pot,
            "depth": depth,
            "payoffs": payoffs,
        })),
        NodeKind::Showdown { payoffs } => Ok(json!({
            "node_type": "Showdown",
            "round": node.round.to_string(),
            "pot": node.pot,
            "depth": depth,
            "payoffs": {
                "player0_wins": payoffs.player0_wins,
                "player1_wins": payoffs.player1_wins,
                "tie": payoffs.tie,
            },
        })),
        NodeKind::Chance { child, donk_opportunity } => {
            let dealt = path.next().ok_or_else(|| {
                SolverError::Invariant("board_path exhausted before a Chance node in the strategy dump".to_string())
            })?;
            let new_board = board_mask | card_mask(dealt);
            let child_value = if descend {
                dump_node(tree, *child, range_manager, new_board, path, depth + 1, max_depth)?
            } else {
                Value::Null
            };
            Ok(json!({
                "node_type": "Chance",
                "round": node.round.to_string(),
                "pot": node.pot,
                "depth": depth,
                "dealt_cards": [card_to_string(dealt)],
                "donk_opportunity": donk_opportunity,
                "child": child_value,
            }))
        }
        NodeKind::Action(action) => {
            let range = range_manager.range(action.acting_player);
            let trainable = action.trainable_for(board_mask, false);
            let (avg, evs) = {
                let mut guard = trainable.lock().unwrap();
                let avg = guard.average_strategy().to_vec();
                let evs = guard.evs().map(|e| e.to_vec());
                (avg, evs)
            };
            let num_actions = action.actions.len();
            let num_hands = action.num_hands;

            let mut strategy_map = Map::new();
            let mut evs_map = Map::new();
            for h in 0..num_hands {
                let hand_key = range.get(h).to_string();
                let probs: Vec<f64> = (0..num_actions).map(|a| avg[a * num_hands + h]).collect();
                strategy_map.insert(hand_key.clone(), Value::from(probs));
                if let Some(ev) = &evs {
                    let per_action: Vec<f64> = (0..num_actions).map(|a| ev[a * num_hands + h]).collect();
                    evs_map.insert(hand_key, Value::from(per_action));
                }
            }

            let mut children_map = Map::new();
            if descend {
                for (a, &child_idx) in action.children.iter().enumerate() {
                    let child_value = dump_node(tree, child_idx, range_manager, board_mask, path, depth + 1, max_depth)?;
                    children_map.insert(action.actions[a].label(), child_value);
                }
            }

            let mut strategy_data = json!({
                "actions": action.actions.iter().map(|a| a.label()).collect::<Vec<_>>(),
                "strategy": strategy_map,
            });
            if !evs_map.is_empty() {
                strategy_data["evs"] = Value::Object(evs_map);
            }

            Ok(json!({
                "node_type": "Action",
                "round": node.round.to_string(),
                "pot": node.pot,
                "depth": depth,
                "player": action.acting_player,
                "strategy_data": strategy_data,
                "children": children_map,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{self, HandCounts};

    fn river_only_checks() -> Rule {
        let empty = StreetSetting::default();
        let settings =
            GameTreeBuildingSettings::new(empty.clone(), empty.clone(), empty.clone(), empty.clone(), empty.clone(), empty);
        Rule::new(5.0, 5.0, Round::River, vec![], 0, 0.5, 1.0, 100.0, settings, 0.98).unwrap()
    }

    #[test]
    fn loads_minimal_scenario_json() {
        let json_text = r#"{
            "test_case_name": "river_check_check",
            "description": "trivial",
            "solver_config": { "iterations": 10, "threads": 1 },
            "game_rule": {
                "starting_round": "River",
                "initial_board": ["2h", "5c", "7d", "Ts", "Jc"],
                "initial_commitments": { "ip": 5.0, "oop": 5.0 },
                "blinds": { "sb": 0.5, "bb": 1.0 },
                "effective_stack": 100.0,
                "raise_limit_per_street": 0,
                "all_in_threshold_ratio": 0.98,
                "building_settings": {}
            },
            "player_ranges": { "ip": "KK", "oop": "AA" }
        }"#;
        let file: ScenarioFile = serde_json::from_str(json_text).unwrap();
        let loaded = parse_scenario(file).unwrap();
        assert_eq!(loaded.name, "river_check_check");
        assert_eq!(loaded.ip_range.len(), 6);
        assert_eq!(loaded.oop_range.len(), 6);
        assert_eq!(loaded.iterations, 10);
    }

    #[test]
    fn rejects_board_card_count_mismatch() {
        let json_text = r#"{
            "test_case_name": "bad",
            "description": "",
            "solver_config": { "iterations": 1, "threads": 1 },
            "game_rule": {
                "starting_round": "River",
                "initial_board": ["2h", "5c"],
                "initial_commitments": { "ip": 5.0, "oop": 5.0 },
                "blinds": { "sb": 0.5, "bb": 1.0 },
                "effective_stack": 100.0,
                "raise_limit_per_street": 0,
                "all_in_threshold_ratio": 0.98,
                "building_settings": {}
            },
            "player_ranges": { "ip": "KK", "oop": "AA" }
        }"#;
        let file: ScenarioFile = serde_json::from_str(json_text).unwrap();
        assert!(parse_scenario(file).is_err());
    }

    #[test]
    fn dump_strategy_renders_showdown_leaf_for_check_check() {
        let rule = river_only_checks();
        let board = mask_of(&crate::card::parse_board("2h5c7dTsJc").unwrap());
        let tree = tree::build(&rule, &HandCounts { ip: 1, oop: 1 }).unwrap();

        let ip_range = parse_range("KcKd", 0).unwrap();
        let oop_range = parse_range("AcAd", 0).unwrap();
        let range_manager = RangeManager::new(ip_range, oop_range, board);

        let dumped = dump_strategy(&tree, &range_manager, board, &[], None).unwrap();
        assert_eq!(dumped["node_type"], "Action");
        assert_eq!(dumped["player"], 1);
        let check_child = &dumped["children"]["CHECK"];
        assert_eq!(check_child["node_type"], "Action");
        let showdown = &check_child["children"]["CHECK"];
        assert_eq!(showdown["node_type"], "Showdown");
    }

    #[test]
    fn dump_strategy_respects_max_depth() {
        let rule = river_only_checks();
        let board = mask_of(&crate::card::parse_board("2h5c7dTsJc").unwrap());
        let tree = tree::build(&rule, &HandCounts { ip: 1, oop: 1 }).unwrap();
        let ip_range = parse_range("KcKd", 0).unwrap();
        let oop_range = parse_range("AcAd", 0).unwrap();
        let range_manager = RangeManager::new(ip_range, oop_range, board);

        let dumped = dump_strategy(&tree, &range_manager, board, &[], Some(0)).unwrap();
        assert_eq!(dumped["node_type"], "Action");
        assert!(dumped["children"].as_object().unwrap().is_empty());
    }
}
