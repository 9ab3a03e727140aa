use std::{fs, path::Path};

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use super::GameError;

/// Tolerance used when comparing strategies and checking equilibria.
pub const TOLERANCE: f64 = 1e-9;

/// Two-player game in normal form. Rows are the pure strategies of player 1 and columns the
/// pure strategies of player 2; both payoff matrices share the same shape.
#[derive(Debug, Clone)]
pub struct BimatrixGame {
    payoff: (Array2<f64>, Array2<f64>),
}

/// Mixed strategy profile: player 1's distribution over rows and player 2's over columns.
#[derive(Debug, Clone)]
pub struct Strategy(pub Array1<f64>, pub Array1<f64>);

impl PartialEq for Strategy {
    fn eq(&self, other: &Strategy) -> bool {
        self.0.shape() == other.0.shape()
            && self.1.shape() == other.1.shape()
            && self.0.abs_diff_eq(&other.0, TOLERANCE)
            && self.1.abs_diff_eq(&other.1, TOLERANCE)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GameFile {
    player1: Vec<Vec<f64>>,
    player2: Vec<Vec<f64>>,
}

impl BimatrixGame {
    pub fn new(p1: Array2<f64>, p2: Array2<f64>) -> Result<Self, GameError> {
        if p1.shape() != p2.shape() {
            return Err(GameError::InvalidInput(format!(
                "payoff matrices must have the same size ({:?} vs {:?})",
                p1.shape(),
                p2.shape()
            )));
        }
        if p1.is_empty() {
            return Err(GameError::InvalidInput(format!(
                "every player needs at least one strategy ({:?})",
                p1.shape()
            )));
        }
        if let Some(((row, col), v)) = p1
            .indexed_iter()
            .chain(p2.indexed_iter())
            .find(|(_, v)| !v.is_finite())
        {
            return Err(GameError::InvalidInput(format!(
                "payoff at ({row}, {col}) is not finite: {v}"
            )));
        }
        Ok(BimatrixGame { payoff: (p1, p2) })
    }

    /// Loads a game from a JSON file with `player1` and `player2` payoff rows.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|err| {
            GameError::InvalidGamePath(err, path.as_ref().display().to_string())
        })?;
        let game_file: GameFile = serde_json::from_str(&contents)?;
        Self::new(
            rows_to_matrix(game_file.player1)?,
            rows_to_matrix(game_file.player2)?,
        )
    }

    /// Loads a game from two header-less CSV files, one payoff matrix each.
    pub fn from_csv(p1: impl AsRef<Path>, p2: impl AsRef<Path>) -> Result<Self, GameError> {
        Self::new(read_csv_matrix(p1.as_ref())?, read_csv_matrix(p2.as_ref())?)
    }

    pub fn num_strategies(&self) -> (usize, usize) {
        (self.payoff.0.shape()[0], self.payoff.0.shape()[1])
    }

    pub fn num_strategies_player(&self, player: usize) -> usize {
        self.payoff.0.shape()[player]
    }

    pub fn total_strategies(&self) -> usize {
        self.payoff.0.shape()[0] + self.payoff.0.shape()[1]
    }

    pub fn payoff_matrix(&self, player: usize) -> &Array2<f64> {
        if player == 0 {
            &self.payoff.0
        } else {
            &self.payoff.1
        }
    }

    fn payoffs(&self) -> impl Iterator<Item = f64> + '_ {
        self.payoff.0.iter().chain(self.payoff.1.iter()).copied()
    }

    /// Largest payoff magnitude of the game.
    pub fn payoff_scale(&self) -> f64 {
        self.payoffs().map(f64::abs).fold(0., f64::max)
    }

    /// Payoff matrices mapped by one common increasing affine map into `[1, 2]`. A constant game
    /// maps to all ones. Equilibria are invariant under this map.
    pub fn normalized_payoffs(&self) -> (Array2<f64>, Array2<f64>) {
        let (min, max) = self
            .payoffs()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), u| {
                (min.min(u), max.max(u))
            });
        // Halved so that the span stays finite for payoffs near f64::MAX.
        let (min, span) = (min * 0.5, max * 0.5 - min * 0.5);
        if span == 0. {
            return (
                Array2::ones(self.payoff.0.raw_dim()),
                Array2::ones(self.payoff.1.raw_dim()),
            );
        }
        let normalize = |u: f64| (u * 0.5 - min) / span + 1.;
        (self.payoff.0.mapv(normalize), self.payoff.1.mapv(normalize))
    }

    /// Expected payoff of every pure strategy of `player` against the opponent's mixed strategy.
    pub fn pure_payoffs(&self, player: usize, strategy: &Strategy) -> Array1<f64> {
        if player == 0 {
            self.payoff.0.dot(&strategy.1)
        } else {
            strategy.0.dot(&self.payoff.1)
        }
    }

    pub fn strategy_payoff(&self, strategy: &Strategy) -> (f64, f64) {
        let payoff0 = self.payoff.0.dot(&strategy.1).dot(&strategy.0);
        let payoff1 = self.payoff.1.dot(&strategy.1).dot(&strategy.0);

        (payoff0, payoff1)
    }

    pub fn regret(&self, strategy: &Strategy) -> (f64, f64) {
        let strategy_payoff = self.strategy_payoff(strategy);
        let max_payoff0 = max(&self.pure_payoffs(0, strategy));
        let max_payoff1 = max(&self.pure_payoffs(1, strategy));
        (
            max_payoff0 - strategy_payoff.0,
            max_payoff1 - strategy_payoff.1,
        )
    }

    /// Every pure strategy played with probability above `tolerance` must be a best response to
    /// the opponent's strategy, for both players. Payoffs are compared with `tolerance` relative
    /// to [`BimatrixGame::payoff_scale`].
    pub fn is_ne(&self, strategy: &Strategy, tolerance: f64) -> bool {
        let payoff_tolerance = tolerance * self.payoff_scale();
        [(0, &strategy.0), (1, &strategy.1)]
            .into_iter()
            .all(|(player, own)| {
                let payoffs = self.pure_payoffs(player, strategy);
                let best = max(&payoffs);
                own.iter()
                    .zip(payoffs.iter())
                    .all(|(p, u)| *p <= tolerance || *u >= best - payoff_tolerance)
            })
    }
}

fn max(a: &Array1<f64>) -> f64 {
    a.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn rows_to_matrix(rows: Vec<Vec<f64>>) -> Result<Array2<f64>, GameError> {
    let num_rows = rows.len();
    let num_cols = rows.first().map_or(0, |r| r.len());
    if let Some(i) = rows.iter().position(|r| r.len() != num_cols) {
        return Err(GameError::InvalidInput(format!(
            "row {i} has {} entries, expected {num_cols}",
            rows[i].len()
        )));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((num_rows, num_cols), flat)
        .map_err(|err| GameError::InvalidInput(err.to_string()))
}

fn read_csv_matrix(path: &Path) -> Result<Array2<f64>, GameError> {
    let path_str = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| GameError::ParseGameCsv(err, path_str.clone()))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| GameError::ParseGameCsv(err, path_str.clone()))?;
        let row = record
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|_| {
                    GameError::InvalidInput(format!("{path_str}: {field} is not a number"))
                })
            })
            .collect::<Result<Vec<f64>, GameError>>()?;
        rows.push(row);
    }
    rows_to_matrix(rows)
}
