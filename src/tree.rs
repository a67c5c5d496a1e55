//! Postflop game tree: a tagged-variant node arena built from a [`Rule`].
//!
//! Nodes live in a flat `Vec<Node>` addressed by index rather than an owned
//! parent/child pointer graph, so a child always outlives the index its
//! parent stored and a weak back-reference is just an integer.
//!
//! Chance nodes are built in "lumped" form (one of the two forms the design
//! notes call out as acceptable): a single node per street transition whose
//! child subtree is card-agnostic, since bet sizing depends only on pot and
//! stack. The concrete board mask realized along a given traversal is
//! carried as solver/best-response recursion state rather than baked into
//! the tree, and each Action node keeps one Trainable per board realization
//! ("deal-abstraction slot") that reaches it, materialized lazily.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::card::{Card, CardMask};
use crate::error::{SolverError, SolverResult};
use crate::rule::{Round, Rule, StreetSetting};
use crate::trainable::Trainable;

pub type NodeIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionLabel {
    Check,
    Call(f64),
    Fold,
    Bet(f64),
    Raise(f64),
}

impl ActionLabel {
    /// Renders the dump-format action string, e.g. `"BET 12.5"`.
    pub fn label(&self) -> String {
        match self {
            ActionLabel::Check => "CHECK".to_string(),
            ActionLabel::Call(_) => "CALL".to_string(),
            ActionLabel::Fold => "FOLD".to_string(),
            ActionLabel::Bet(amt) => format!("BET {amt}"),
            ActionLabel::Raise(amt) => format!("RAISE {amt}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShowdownPayoffs {
    pub player0_wins: [f64; 2],
    pub player1_wins: [f64; 2],
    pub tie: [f64; 2],
}

pub struct ActionNode {
    pub acting_player: usize,
    pub actions: Vec<ActionLabel>,
    pub children: Vec<NodeIndex>,
    pub num_hands: usize,
    slots: Mutex<HashMap<CardMask, Arc<Mutex<Trainable>>>>,
}

impl ActionNode {
    /// Returns this node's Trainable for the deal-abstraction slot keyed by
    /// `board_mask`, materializing it on first access. Double-checked
    /// insert under the slot map's own mutex: never held while a Trainable
    /// mutates, so concurrent traversers hitting distinct boards don't
    /// serialize on each other.
    pub fn trainable_for(&self, board_mask: CardMask, track_ev: bool) -> Arc<Mutex<Trainable>> {
        let mut slots = self.slots.lock().unwrap();
        Arc::clone(
            slots
                .entry(board_mask)
                .or_insert_with(|| Arc::new(Mutex::new(Trainable::new(self.actions.len(), self.num_hands, track_ev)))),
        )
    }
}

pub enum NodeKind {
    Action(ActionNode),
    Chance { child: NodeIndex, donk_opportunity: bool },
    Showdown { payoffs: ShowdownPayoffs },
    Terminal { payoffs: [f64; 2] },
}

pub struct Node {
    pub kind: NodeKind,
    pub round: Round,
    pub pot: f64,
    pub parent: Option<NodeIndex>,
    pub depth: usize,
    pub subtree_size: usize,
}

pub struct GameTree {
    nodes: Vec<Node>,
    root: NodeIndex,
}

impl GameTree {
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `Σ over action nodes of (num_actions × range_size_of_acting_player ×
    /// bytes_per_entry)`, where `bytes_per_entry` covers the regret,
    /// strategy-sum, and EV scalars (`f64` each). Counts a single
    /// deal-abstraction slot per action node, since slot count is a runtime
    /// quantity that grows as the solve visits distinct boards.
    pub fn estimated_memory_bytes(&self) -> u64 {
        const BYTES_PER_ENTRY: u64 = 3 * 8;
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Action(a) => Some(a.actions.len() as u64 * a.num_hands as u64 * BYTES_PER_ENTRY),
                _ => None,
            })
            .sum()
    }
}

/// Per-player hand count, used to size each action node's Trainable slots.
pub struct HandCounts {
    pub ip: usize,
    pub oop: usize,
}

impl HandCounts {
    fn of(&self, player: usize) -> usize {
        if player == 0 {
            self.ip
        } else {
            self.oop
        }
    }
}

struct BuildCtx<'a> {
    rule: &'a Rule,
    hand_counts: &'a HandCounts,
    nodes: Vec<Node>,
}

/// Per-street running state threaded through the recursion. Card-agnostic:
/// no card identity is tracked, only counts and commitments.
#[derive(Clone, Copy)]
struct StreetState {
    round: Round,
    commit: [f64; 2],
    raises_this_street: u32,
    /// True for the first action node of a street reached because the
    /// previous street closed on a call rather than a check-through, and
    /// that call was made by OOP (so OOP leads again into IP, who was the
    /// aggressor last street). This is the donk condition.
    is_donk_spot: bool,
}

pub fn build(rule: &Rule, hand_counts: &HandCounts) -> SolverResult<GameTree> {
    let mut ctx = BuildCtx { rule, hand_counts, nodes: Vec::new() };
    let state = StreetState {
        round: rule.starting_round,
        commit: [rule.initial_ip_commit, rule.initial_oop_commit],
        raises_this_street: 0,
        is_donk_spot: false,
    };
    // OOP (player 1) acts first postflop, by convention.
    let root = build_action_node(&mut ctx, None, 1, rule.initial_pot(), state)?;
    let mut tree = GameTree { nodes: ctx.nodes, root };
    compute_metadata(&mut tree);
    Ok(tree)
}

fn push_node(ctx: &mut BuildCtx, kind: NodeKind, round: Round, pot: f64, parent: Option<NodeIndex>) -> NodeIndex {
    ctx.nodes.push(Node { kind, round, pot, parent, depth: 0, subtree_size: 1 });
    ctx.nodes.len() - 1
}

fn build_action_node(
    ctx: &mut BuildCtx,
    parent: Option<NodeIndex>,
    acting_player: usize,
    pot: f64,
    state: StreetState,
) -> SolverResult<NodeIndex> {
    let opponent = 1 - acting_player;
    let commit_p = state.commit[acting_player];
    let commit_o = state.commit[opponent];
    let remain = ctx.rule.initial_effective_stack - commit_p;
    let opponent_remain = ctx.rule.initial_effective_stack - commit_o;

    // Reserve this node's slot first so children can record it as parent;
    // its real content is filled in once every child has been built.
    let reserved = push_node(ctx, NodeKind::Terminal { payoffs: [0.0, 0.0] }, state.round, pot, parent);

    let mut actions = Vec::new();
    let mut children = Vec::new();

    if commit_p == commit_o {
        actions.push(ActionLabel::Check);
        // The street closes on the second consecutive check; by convention
        // OOP (player 1) opens a street, so IP's (player 0) check closes it.
        let closes_round = acting_player == 0;
        let child = if closes_round {
            build_chance_or_showdown(ctx, Some(reserved), pot, state, false)?
        } else {
            let next_state = StreetState { is_donk_spot: false, ..state };
            build_action_node(ctx, Some(reserved), opponent, pot, next_state)?
        };
        children.push(child);
    } else {
        actions.push(ActionLabel::Fold);
        let fold_payoffs = fold_payoffs(acting_player, commit_p);
        children.push(push_node(ctx, NodeKind::Terminal { payoffs: fold_payoffs }, state.round, pot, Some(reserved)));

        let call_amount = (commit_o - commit_p).min(remain);
        let mut call_commit = state.commit;
        call_commit[acting_player] = (commit_p + call_amount).min(ctx.rule.initial_effective_stack);
        let call_pot = pot + call_amount;
        actions.push(ActionLabel::Call(call_amount));

        let caller_now_allin = call_commit[acting_player] >= ctx.rule.initial_effective_stack - 1e-9;
        let opp_allin = commit_o >= ctx.rule.initial_effective_stack - 1e-9;
        let call_child = if caller_now_allin || opp_allin || state.round == Round::River {
            Ok(build_showdown(ctx, Some(reserved), call_pot, call_commit))
        } else {
            let next_state = StreetState { commit: call_commit, raises_this_street: 0, ..state };
            // OOP leads the new street; flag a donk spot iff OOP was the
            // one who just called (meaning IP had been the aggressor).
            build_chance_or_showdown(ctx, Some(reserved), call_pot, next_state, acting_player == 1)
        };
        children.push(call_child?);
    }

    let bet_raise_legal = opponent_remain > 1e-9
        && remain > ctx.rule.big_blind
        && state.raises_this_street < ctx.rule.raise_limit_per_street;
    if bet_raise_legal {
        let setting = ctx.rule.build_settings.get(acting_player, state.round)?;
        let facing_bet = commit_o > commit_p;
        let sizes = if facing_bet {
            compute_raise_sizes(ctx.rule, setting, pot, commit_o - commit_p, remain)
        } else if state.is_donk_spot && !setting.donk_sizes_percent.is_empty() {
            compute_bet_sizes(ctx.rule, &setting.donk_sizes_percent, pot, remain)
        } else {
            compute_bet_sizes(ctx.rule, &setting.bet_sizes_percent, pot, remain)
        };

        for amount in sizes {
            let mut new_commit = state.commit;
            new_commit[acting_player] = (commit_p + amount).min(ctx.rule.initial_effective_stack);
            let new_pot = pot + amount;
            let label = if facing_bet { ActionLabel::Raise(amount) } else { ActionLabel::Bet(amount) };
            actions.push(label);

            let next_state = StreetState {
                commit: new_commit,
                raises_this_street: state.raises_this_street + 1,
                is_donk_spot: false,
                ..state
            };
            children.push(build_action_node(ctx, Some(reserved), opponent, new_pot, next_state)?);
        }
    }

    if children.is_empty() {
        return Err(SolverError::Invariant(format!(
            "action node for player {acting_player} at {:?} produced zero children",
            state.round
        )));
    }

    let num_hands = ctx.hand_counts.of(acting_player);
    ctx.nodes[reserved].kind = NodeKind::Action(ActionNode {
        acting_player,
        actions,
        children,
        num_hands,
        slots: Mutex::new(HashMap::new()),
    });
    Ok(reserved)
}

fn fold_payoffs(folder: usize, folder_commit: f64) -> [f64; 2] {
    let mut payoffs = [0.0, 0.0];
    payoffs[folder] = -folder_commit;
    payoffs[1 - folder] = folder_commit;
    payoffs
}

fn build_showdown(ctx: &mut BuildCtx, parent: Option<NodeIndex>, pot: f64, commit: [f64; 2]) -> NodeIndex {
    let payoffs = ShowdownPayoffs {
        player0_wins: [commit[1], -commit[1]],
        player1_wins: [-commit[0], commit[0]],
        tie: [0.0, 0.0],
    };
    push_node(ctx, NodeKind::Showdown { payoffs }, Round::River, pot, parent)
}

fn build_chance_or_showdown(
    ctx: &mut BuildCtx,
    parent: Option<NodeIndex>,
    pot: f64,
    state: StreetState,
    donk_opportunity: bool,
) -> SolverResult<NodeIndex> {
    if state.round == Round::River {
        return Ok(build_showdown(ctx, parent, pot, state.commit));
    }
    let next_round = state.round.next().ok_or_else(|| {
        SolverError::Invariant("chance transition requested past the river".to_string())
    })?;
    let reserved = push_node(ctx, NodeKind::Terminal { payoffs: [0.0, 0.0] }, next_round, pot, parent);
    let next_state = StreetState { round: next_round, raises_this_street: 0, is_donk_spot: donk_opportunity, ..state };
    let child = build_action_node(ctx, Some(reserved), 1, pot, next_state)?;
    ctx.nodes[reserved].kind = NodeKind::Chance { child, donk_opportunity };
    Ok(reserved)
}

fn round_to_small_blind(rule: &Rule, amount: f64) -> f64 {
    let sb = rule.small_blind.max(1e-9);
    (amount / sb).round() * sb
}

fn compute_bet_sizes(rule: &Rule, percents: &[f64], pot: f64, remain: f64) -> Vec<f64> {
    let mut sizes: Vec<f64> = percents
        .iter()
        .map(|&r| round_to_small_blind(rule, r / 100.0 * pot).max(rule.big_blind))
        .map(|amt| amt.min(remain))
        .filter(|&amt| amt > 1e-9)
        .collect();
    dedup_sorted(&mut sizes);
    sizes
}

fn compute_raise_sizes(rule: &Rule, setting: &StreetSetting, pot_before: f64, call_amount: f64, remain: f64) -> Vec<f64> {
    let pot_after_call = pot_before + call_amount;
    let mut sizes: Vec<f64> = setting
        .raise_sizes_percent
        .iter()
        .map(|&r| {
            let top_up = round_to_small_blind(rule, r / 100.0 * pot_after_call).max(rule.big_blind.max(call_amount));
            call_amount + top_up
        })
        .map(|amt| amt.min(remain))
        .filter(|&amt| amt > 1e-9)
        .collect();
    dedup_sorted(&mut sizes);
    if setting.allow_all_in && !sizes.iter().any(|&s| (s - remain).abs() < 1e-9) {
        sizes.push(remain);
    }
    sizes
}

fn dedup_sorted(sizes: &mut Vec<f64>) {
    sizes.sort_by(|a, b| a.partial_cmp(b).unwrap());
    sizes.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
}

fn compute_metadata(tree: &mut GameTree) {
    fn visit(tree: &mut GameTree, idx: NodeIndex, depth: usize) -> usize {
        tree.nodes[idx].depth = depth;
        let children: Vec<NodeIndex> = match &tree.nodes[idx].kind {
            NodeKind::Action(a) => a.children.clone(),
            NodeKind::Chance { child, .. } => vec![*child],
            NodeKind::Showdown { .. } | NodeKind::Terminal { .. } => vec![],
        };
        let mut subtree_size = 1;
        for c in children {
            subtree_size += visit(tree, c, depth + 1);
        }
        tree.nodes[idx].subtree_size = subtree_size;
        subtree_size
    }
    let root = tree.root;
    visit(tree, root, 0);
}

/// A realized river board's `CardMask`, used to key Trainable slots and to
/// look up river strengths. Exposed for the solver/best-response modules.
pub fn initial_board_mask(initial_board: &[Card]) -> CardMask {
    crate::card::mask_of(initial_board)
}
