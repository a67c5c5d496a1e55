//! Command-line entry point: load a scenario, build the tree, train to
//! the requested iteration count, report exploitability, and optionally
//! dump the strategy JSON, as a thin shell around the library's own
//! `build`/`train`/`exploitability`/`dump_strategy` entry points, in the
//! teacher's colored-`println!` idiom rather than a logging crate.

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::best_response::BestResponseCalculator;
use crate::card::{mask_of, parse_card, Card};
use crate::error::{SolverError, SolverResult};
use crate::hand_eval::HandEvaluator;
use crate::range_manager::RangeManager;
use crate::river_cache::RiverCache;
use crate::scenario::{dump_strategy, load_scenario, LoadedScenario};
use crate::solver::DcfrSolver;
use crate::tree::{self, GameTree, HandCounts, NodeKind};

#[derive(Parser, Debug)]
#[command(name = "solver-cli", about = "Heads-up postflop subgame DCFR solver")]
pub struct Cli {
    /// Path to the scenario JSON file (§6 schema).
    pub scenario: PathBuf,

    /// Path to the hand-rank dictionary text file (an adjacent `.bin`
    /// sidecar is preferred automatically once one has been written).
    #[arg(long)]
    pub hand_ranks: PathBuf,

    /// Print a milestone line every N completed iterations.
    #[arg(long, default_value_t = 100)]
    pub milestone_every: u64,

    /// Write the strategy-dump JSON here instead of printing a summary only.
    #[arg(long)]
    pub dump_strategy: Option<PathBuf>,

    /// Concrete cards dealt at each Chance node along the line being
    /// dumped, in order (e.g. the turn card then the river card for a
    /// flop-start tree). Comma-separated, e.g. `--dump-board-path Ad,Ks`.
    #[arg(long, value_delimiter = ',')]
    pub dump_board_path: Vec<String>,

    /// Prune the strategy dump's recursion past this depth.
    #[arg(long)]
    pub dump_max_depth: Option<usize>,
}

pub fn run() {
    let cli = Cli::parse();
    if let Err(err) = run_cli(&cli) {
        eprintln!("{}", err.log_line().red());
        std::process::exit(1);
    }
}

fn run_cli(cli: &Cli) -> SolverResult<()> {
    println!("{}", "Heads-Up Postflop Subgame Solver".bold());

    let LoadedScenario { name, iterations, threads, rule, ip_range, oop_range, initial_board, .. } =
        load_scenario(&cli.scenario)?;
    println!("  scenario: {} ({iterations} iterations, {threads} threads)", name.bold());

    let evaluator = HandEvaluator::load(&cli.hand_ranks)?;
    let board_mask = mask_of(&initial_board);
    let hand_counts = HandCounts { ip: ip_range.len(), oop: oop_range.len() };
    let range_manager = RangeManager::new(ip_range, oop_range, board_mask);
    let river_cache = RiverCache::new(&evaluator);

    let game_tree = tree::build(&rule, &hand_counts)?;
    println!(
        "  tree built: {} nodes, {:.2} MiB estimated",
        game_tree.len(),
        game_tree.estimated_memory_bytes() as f64 / (1024.0 * 1024.0),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| SolverError::Runtime(format!("failed to build thread pool: {e}")))?;

    let solver = DcfrSolver::new(&game_tree, &range_manager, &river_cache, 1e-9, false);
    let milestone_every = cli.milestone_every.max(1);
    pool.install(|| {
        solver.train(iterations, board_mask, |t| {
            if t % milestone_every == 0 || t == iterations {
                println!("  iteration {} / {iterations}", t.to_string().green());
            }
        })
    })?;

    let br = BestResponseCalculator::new(&game_tree, &range_manager, &river_cache);
    let exploitability = br.exploitability(board_mask)?;
    println!(
        "  {} {:.4} bb/hand",
        "exploitability:".bold(),
        exploitability / rule.big_blind,
    );

    print_root_strategy_table(&game_tree, &range_manager, board_mask);

    if let Some(dump_path) = &cli.dump_strategy {
        let board_path: Vec<Card> =
            cli.dump_board_path.iter().map(|s| parse_card(s)).collect::<SolverResult<_>>()?;
        let json = dump_strategy(&game_tree, &range_manager, board_mask, &board_path, cli.dump_max_depth)?;
        let text = serde_json::to_string_pretty(&json)
            .map_err(|e| SolverError::Logic(format!("strategy dump failed to serialize: {e}")))?;
        std::fs::write(dump_path, text)
            .map_err(|e| SolverError::Resource(format!("cannot write '{}': {e}", dump_path.display())))?;
        println!("  strategy dumped to {}", dump_path.display().to_string().bold());
    }

    Ok(())
}

/// Prints the root node's average strategy, one row per combo, up to the
/// first 20 hands. Mirrors the teacher's `RiverSolution::display` combo
/// table, swapped from a hand-rolled column layout to `comfy_table`.
fn print_root_strategy_table(tree: &GameTree, range_manager: &RangeManager, board_mask: u64) {
    let NodeKind::Action(root) = &tree.node(tree.root()).kind else {
        return;
    };
    let range = range_manager.range(root.acting_player);
    let trainable = root.trainable_for(board_mask, false);
    let avg = { trainable.lock().unwrap().average_strategy().to_vec() };
    let num_hands = root.num_hands;

    let player_label = if root.acting_player == 0 { "IP" } else { "OOP" };
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    let mut header = vec!["Hand".to_string()];
    header.extend(root.actions.iter().map(|a| a.label()));
    table.set_header(header);

    for h in 0..num_hands.min(20) {
        let mut row = vec![range.get(h).to_string()];
        for a in 0..root.actions.len() {
            row.push(format!("{:.1}%", avg[a * num_hands + h] * 100.0));
        }
        table.add_row(row);
    }

    println!();
    println!("  {} to act at the root:", player_label.bold());
    println!("{table}");
}
