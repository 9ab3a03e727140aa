use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use lemke::{
    BimatrixGame, Equilibrium, GameError, LemkeHowson,
    game::TOLERANCE,
};
use log::{error, info};
use ndarray::{Array, Array1};
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use rand::{SeedableRng, rngs::StdRng};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Computes one equilibrium of a game read from disk.
    Solve {
        /// JSON file with the payoff matrices under `player1` and `player2`.
        #[arg(required_unless_present = "csv")]
        game: Option<PathBuf>,

        /// Header-less CSV files with the payoff matrices of player 1 and player 2.
        #[arg(long, num_args = 2, value_names = ["PLAYER1", "PLAYER2"], conflicts_with = "game")]
        csv: Option<Vec<PathBuf>>,

        #[command(flatten)]
        solver: SolverArgs,
    },
    /// Solves a batch of random games and checks every result.
    Random {
        /// Number of strategies of player 1.
        n: usize,

        /// Number of strategies of player 2.
        m: usize,

        /// Number of games to solve.
        #[arg(short, long, default_value_t = 100)]
        games: usize,

        /// Seed of the payoff generator.
        #[arg(long, default_value_t = 0)]
        game_seed: u64,

        #[command(flatten)]
        solver: SolverArgs,
    },
}

#[derive(clap::Args, Debug)]
struct SolverArgs {
    /// JSON solver configuration. The options below override its fields.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Label of player 1 pivoted in first. Defaults to 0.
    #[arg(short, long, conflicts_with = "seed")]
    label: Option<usize>,

    /// Draws the starting label from a generator with this seed.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Maximum number of pivots after the warm start. Defaults to 1000.
    #[arg(long)]
    max_iterations: Option<usize>,
}

impl SolverArgs {
    fn solver(&self) -> Result<LemkeHowson, GameError> {
        let mut solver = match &self.config {
            Some(path) => LemkeHowson::from_file(path)?,
            None => LemkeHowson::new(),
        };
        if let Some(max_iterations) = self.max_iterations {
            solver = solver.with_max_iterations(max_iterations);
        }
        if let Some(seed) = self.seed {
            solver = solver.with_seed(seed);
        } else if let Some(label) = self.label {
            solver = solver.with_label(label);
        }
        Ok(solver)
    }
}

fn format_strategy(s: &Array1<f64>) -> String {
    s.iter().map(|p| format!("{p:.6}")).join(" ")
}

fn solve(game: &BimatrixGame, solver: &LemkeHowson) -> Result<(), GameError> {
    let (n, m) = game.num_strategies();
    info!("solving {n}x{m} game");

    let Equilibrium {
        strategy,
        starting_label,
        iterations,
    } = solver.solve(game)?;

    println!("Starting label: {starting_label} ({iterations} pivots)");
    println!("Equilibrium strategies");
    println!("Player 1: {}", format_strategy(&strategy.0));
    println!("Player 2: {}", format_strategy(&strategy.1));

    let payoff = game.strategy_payoff(&strategy);
    let regret = game.regret(&strategy);
    println!("Equilibrium payoff");
    println!("Player 1: {:.6}, Player 2: {:.6}", payoff.0, payoff.1);
    println!("Regret");
    println!("Player 1: {:.3e}, Player 2: {:.3e}", regret.0, regret.1);
    Ok(())
}

#[derive(Debug, Default)]
struct BatchReport {
    verified: usize,
    not_equilibrium: usize,
    degenerate: usize,
    non_convergent: usize,
    pivots: usize,
}

fn random_games(
    n: usize,
    m: usize,
    games: usize,
    game_seed: u64,
    solver: &LemkeHowson,
) -> Result<BatchReport, GameError> {
    let mut rng = StdRng::seed_from_u64(game_seed);
    let pb = ProgressBar::new(games as u64);
    pb.set_style(
        ProgressStyle::with_template("{wide_bar:40.cyan/blue} {human_pos}/{human_len} {msg} ")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );

    let mut report = BatchReport::default();
    for i in 0..games {
        let a = Array::random_using((n, m), Uniform::new(0., 10.), &mut rng);
        let b = Array::random_using((n, m), Uniform::new(0., 10.), &mut rng);
        let game = BimatrixGame::new(a, b)?;

        match solver.solve(&game) {
            Ok(eq) => {
                report.pivots += eq.iterations;
                if game.is_ne(&eq.strategy, TOLERANCE) {
                    report.verified += 1;
                } else {
                    report.not_equilibrium += 1;
                }
            }
            Err(GameError::DegeneratePivot { .. }) => report.degenerate += 1,
            Err(GameError::NonConvergence { .. }) => report.non_convergent += 1,
            Err(err) => return Err(err),
        }
        pb.inc(1);
        if i % 100 == 0 {
            pb.set_message(format!("Verified: {}/{}", report.verified, i + 1));
        }
    }
    pb.finish_and_clear();
    Ok(report)
}

fn run(args: Args) -> Result<(), GameError> {
    match args.command {
        Command::Solve { game, csv, solver } => {
            let game = match (game, csv) {
                (_, Some(paths)) => BimatrixGame::from_csv(&paths[0], &paths[1])?,
                (Some(path), None) => BimatrixGame::from_file(path)?,
                (None, None) => {
                    return Err(GameError::InvalidInput(
                        "a game file or two CSV files are required".to_owned(),
                    ));
                }
            };
            solve(&game, &solver.solver()?)
        }
        Command::Random {
            n,
            m,
            games,
            game_seed,
            solver,
        } => {
            use std::time::Instant;

            let now = Instant::now();
            let report = random_games(n, m, games, game_seed, &solver.solver()?)?;
            let elapsed = now.elapsed();

            println!("Games: {games} ({n}x{m})");
            println!("Verified equilibria: {}", report.verified);
            println!("Not an equilibrium: {}", report.not_equilibrium);
            println!("Degenerate pivots: {}", report.degenerate);
            println!("Not converged: {}", report.non_convergent);
            let solved = report.verified + report.not_equilibrium;
            if solved > 0 {
                println!(
                    "Average pivots: {:.2}",
                    report.pivots as f64 / solved as f64
                );
            }
            println!("Elapsed: {:.2?}", elapsed);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
