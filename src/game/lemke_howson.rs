use std::{fs, path::Path};

use log::{debug, info, warn};
use ndarray::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::{BimatrixGame, GameError, Strategy, Tableau, extract_strategy};

pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// How the first pivot of the path is chosen. The starting label decides which equilibrium
/// the path ends at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarmStart {
    /// Player 1 label `0..n` entering player 2's tableau.
    Label(usize),
    /// Label drawn uniformly from `0..n` with a generator seeded from this value.
    Seed(u64),
}

impl Default for WarmStart {
    fn default() -> Self {
        WarmStart::Label(0)
    }
}

/// Configuration of a Lemke-Howson solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LemkeHowson {
    pub warm_start: WarmStart,
    pub max_iterations: usize,
}

impl Default for LemkeHowson {
    fn default() -> Self {
        Self {
            warm_start: WarmStart::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Equilibrium {
    pub strategy: Strategy,
    pub starting_label: usize,
    /// Pivots performed after the warm start.
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Player1,
    Player2,
}

impl Side {
    fn other(self) -> Self {
        match self {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }
}

/// Tableau over `[I_n | U1]` with player 1's labels basic, and tableau over `[U2^t | I_m]`
/// with player 2's labels basic.
#[derive(Debug, Clone)]
struct Tableaux(Tableau, Tableau);

impl Tableaux {
    fn new(game: &BimatrixGame) -> Result<Tableaux, GameError> {
        let (n, m) = game.num_strategies();
        let (u1, u2) = game.normalized_payoffs();

        let mut coefficients0 = Array2::<f64>::zeros((n, n + m));
        coefficients0
            .slice_mut(s![.., ..n])
            .assign(&Array2::<f64>::eye(n));
        coefficients0.slice_mut(s![.., n..]).assign(&u1);

        let mut coefficients1 = Array2::<f64>::zeros((m, n + m));
        coefficients1.slice_mut(s![.., ..n]).assign(&u2.t());
        coefficients1
            .slice_mut(s![.., n..])
            .assign(&Array2::<f64>::eye(m));

        Ok(Tableaux(
            Tableau::new(coefficients0, (0..n).collect())?,
            Tableau::new(coefficients1, (n..n + m).collect())?,
        ))
    }

    fn tableau_mut(&mut self, side: Side) -> &mut Tableau {
        match side {
            Side::Player1 => &mut self.0,
            Side::Player2 => &mut self.1,
        }
    }

    /// Labels basic in neither tableau, in increasing order.
    fn gap(&self) -> Vec<usize> {
        (0..self.0.num_labels())
            .filter(|label| !self.0.is_basic(*label) && !self.1.is_basic(*label))
            .collect()
    }

    /// Pivots the smallest missing label into the tableau of `side`. Returns `None` when the
    /// bases are already complementary.
    fn advance(&mut self, side: Side) -> Result<Option<usize>, GameError> {
        let gap = self.gap();
        let Some(&entering) = gap.first() else {
            return Ok(None);
        };
        if gap.len() > 1 {
            debug!("degenerate gap {gap:?}, label {entering} enters");
        }
        self.tableau_mut(side).pivot(entering)?;
        Ok(Some(entering))
    }

    fn strategy(&self) -> Strategy {
        let n = self.0.basis().len();
        let labels = self.0.num_labels();
        Strategy(
            extract_strategy(&self.1.values(), 0..n),
            extract_strategy(&self.0.values(), n..labels),
        )
    }
}

impl LemkeHowson {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: usize) -> Self {
        self.warm_start = WarmStart::Label(label);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.warm_start = WarmStart::Seed(seed);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), GameError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents).map_err(|err| {
            GameError::InvalidConfigPath(err, path.as_ref().display().to_string())
        })?;
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|err| {
            GameError::InvalidConfigPath(err, path.as_ref().display().to_string())
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Resolves the warm start to a label of player 1 for a game with `n` rows.
    pub fn starting_label(&self, n: usize) -> Result<usize, GameError> {
        match self.warm_start {
            WarmStart::Label(label) if label < n => Ok(label),
            WarmStart::Label(label) => Err(GameError::InvalidInput(format!(
                "starting label {label} out of range 0..{n}"
            ))),
            WarmStart::Seed(_) if n == 0 => Err(GameError::InvalidInput(
                "cannot draw a starting label without strategies".to_owned(),
            )),
            WarmStart::Seed(seed) => Ok(StdRng::seed_from_u64(seed).gen_range(0..n)),
        }
    }

    pub fn solve(&self, game: &BimatrixGame) -> Result<Equilibrium, GameError> {
        let starting_label = self.starting_label(game.num_strategies_player(0))?;
        let mut tableaux = Tableaux::new(game)?;

        tableaux
            .1
            .pivot(starting_label)
            .inspect_err(|err| warn!("warm start failed: {err}"))?;

        let mut side = Side::Player1;
        for iteration in 0..self.max_iterations {
            let entering = tableaux
                .advance(side)
                .inspect_err(|err| warn!("pivot failed at iteration {iteration}: {err}"))?;
            if entering.is_none() {
                info!(
                    "complementary basis reached after {iteration} pivots from label {starting_label}"
                );
                return Ok(Equilibrium {
                    strategy: tableaux.strategy(),
                    starting_label,
                    iterations: iteration,
                });
            }
            side = side.other();
        }

        warn!(
            "no complementary basis after {} pivots from label {starting_label}",
            self.max_iterations
        );
        Err(GameError::NonConvergence {
            iterations: self.max_iterations,
        })
    }
}

/// Equilibrium reached from label 0 with the default iteration bound.
pub fn lemke_howson(game: &BimatrixGame) -> Result<Strategy, GameError> {
    LemkeHowson::default()
        .solve(game)
        .map(|equilibrium| equilibrium.strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::TOLERANCE;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::RandomExt;
    use ndarray_rand::rand_distr::Uniform;

    fn test_game() -> BimatrixGame {
        let a = array![[1., 3., 0.], [0., 0., 2.], [2., 1., 1.]];
        let b = array![[2., 1., 0.], [1., 3., 1.], [0., 0., 3.]];
        BimatrixGame::new(a, b).unwrap()
    }

    fn matching_pennies() -> BimatrixGame {
        BimatrixGame::new(array![[1., -1.], [-1., 1.]], array![[-1., 1.], [1., -1.]]).unwrap()
    }

    fn assert_distribution(s: &Array1<f64>) {
        assert!(s.iter().all(|p| *p >= 0.));
        assert_abs_diff_eq!(s.sum(), 1., epsilon = TOLERANCE);
    }

    #[test]
    fn tableau_content() {
        let a = array![[1., 2., 3.], [4., 5., 6.]];
        let b = array![[7., 8., 9.], [10., 11., 12.]];
        let game = BimatrixGame::new(a, b).unwrap();
        let tableaux = Tableaux::new(&game).unwrap();
        let f = |u: f64| (u - 1.) / 11. + 1.;

        assert_eq!(tableaux.0.basis(), &[0, 1]);
        assert_abs_diff_eq!(
            tableaux.0.coefficients(),
            &array![
                [1., 0., f(1.), f(2.), f(3.)],
                [0., 1., f(4.), f(5.), f(6.)]
            ],
            epsilon = 1e-12
        );
        assert_eq!(tableaux.0.basic_values(), &array![1., 1.]);

        assert_eq!(tableaux.1.basis(), &[2, 3, 4]);
        assert_abs_diff_eq!(
            tableaux.1.coefficients(),
            &array![
                [f(7.), f(10.), 1., 0., 0.],
                [f(8.), f(11.), 0., 1., 0.],
                [f(9.), f(12.), 0., 0., 1.]
            ],
            epsilon = 1e-12
        );
        assert_eq!(tableaux.1.basic_values(), &array![1., 1., 1.]);
        assert!(tableaux.gap().is_empty());
    }

    #[test]
    fn tableau_uses_normalized_payoffs() {
        let tableaux = Tableaux::new(&matching_pennies()).unwrap();

        assert_eq!(
            tableaux.0.coefficients(),
            &array![[1., 0., 2., 1.], [0., 1., 1., 2.]]
        );
        assert_eq!(
            tableaux.1.coefficients(),
            &array![[1., 2., 1., 0.], [2., 1., 0., 1.]]
        );
    }

    #[test]
    fn empty_support_extracts_uniform() {
        let game = BimatrixGame::new(Array2::ones((2, 3)), Array2::ones((2, 3))).unwrap();
        // Only slack labels are basic, so neither player has positive weight anywhere.
        let tableaux = Tableaux::new(&game).unwrap();

        assert_eq!(
            tableaux.strategy(),
            Strategy(array![0.5, 0.5], array![1. / 3., 1. / 3., 1. / 3.])
        );
    }

    #[test]
    fn warm_start_opens_gap() {
        let mut tableaux = Tableaux::new(&test_game()).unwrap();
        let leaving = tableaux.1.pivot(0).unwrap();

        assert_eq!(tableaux.gap(), vec![leaving]);
        assert!(leaving >= 3);
    }

    #[test]
    fn smallest_gap_label_enters() {
        let mut tableaux = Tableaux(
            Tableau::new(array![[1., 1., 0., 1.], [0., 2., 1., 1.]], vec![0, 2]).unwrap(),
            Tableau::new(array![[1., 0., 0., 1.], [0., 0., 1., 1.]], vec![0, 2]).unwrap(),
        );
        assert_eq!(tableaux.gap(), vec![1, 3]);

        let entering = tableaux.advance(Side::Player1).unwrap();

        assert_eq!(entering, Some(1));
        assert_eq!(tableaux.0.basis(), &[0, 1]);
        assert_eq!(tableaux.gap(), vec![3]);
    }

    #[test]
    fn complementary_bases_do_not_pivot() {
        let mut tableaux = Tableaux::new(&test_game()).unwrap();
        let before = tableaux.0.clone();

        assert_eq!(tableaux.advance(Side::Player1).unwrap(), None);
        assert_eq!(tableaux.0, before);
    }

    #[test]
    fn test_lemke_howson() {
        let game = test_game();

        let s = lemke_howson(&game).unwrap();

        assert_eq!(
            s,
            Strategy(
                array![6. / 13., 3. / 13., 4. / 13.],
                array![1. / 9., 1. / 3., 5. / 9.]
            )
        );
        assert!(game.is_ne(&s, TOLERANCE));
    }

    #[test]
    fn every_starting_label_reaches_equilibrium() {
        let game = test_game();

        for label in 0..3 {
            let eq = LemkeHowson::new().with_label(label).solve(&game).unwrap();
            assert_eq!(eq.starting_label, label);
            assert!(game.is_ne(&eq.strategy, TOLERANCE));
        }
    }

    #[test]
    fn matching_pennies_is_uniform() {
        let game = matching_pennies();
        let uniform = Strategy(array![0.5, 0.5], array![0.5, 0.5]);

        for label in 0..2 {
            let eq = LemkeHowson::new().with_label(label).solve(&game).unwrap();
            assert_eq!(eq.strategy, uniform);
        }
        for seed in 0..10 {
            let eq = LemkeHowson::new().with_seed(seed).solve(&game).unwrap();
            assert_eq!(eq.strategy, uniform);
        }
    }

    #[test]
    fn dominant_strategies() {
        let a = array![[3., 2.], [1., 0.]];
        let b = array![[3., 1.], [2., 0.]];
        let game = BimatrixGame::new(a, b).unwrap();

        for label in 0..2 {
            let s = LemkeHowson::new().with_label(label).solve(&game).unwrap().strategy;
            assert!(s.0[0] >= 1. - TOLERANCE);
            assert!(s.1[0] >= 1. - TOLERANCE);
        }
    }

    #[test]
    fn single_strategy_games() {
        let game = BimatrixGame::new(array![[5.]], array![[2.]]).unwrap();
        let s = lemke_howson(&game).unwrap();
        assert_eq!(s, Strategy(array![1.], array![1.]));

        let game = BimatrixGame::new(array![[1., 2., 3.]], array![[3., 1., 2.]]).unwrap();
        let s = lemke_howson(&game).unwrap();
        assert_eq!(s, Strategy(array![1.], array![1., 0., 0.]));

        let game = BimatrixGame::new(array![[1.], [2.], [3.]], array![[3.], [1.], [2.]]).unwrap();
        let s = LemkeHowson::new().with_label(1).solve(&game).unwrap().strategy;
        assert_eq!(s, Strategy(array![0., 0., 1.], array![1.]));
    }

    #[test]
    fn iteration_bound() {
        let game = test_game();

        assert!(matches!(
            LemkeHowson::new().with_max_iterations(2).solve(&game),
            Err(GameError::NonConvergence { iterations: 2 })
        ));
        assert!(matches!(
            LemkeHowson::new().with_max_iterations(0).solve(&game),
            Err(GameError::NonConvergence { iterations: 0 })
        ));
    }

    #[test]
    fn invalid_starting_label() {
        assert!(matches!(
            LemkeHowson::new().with_label(3).solve(&test_game()),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[test]
    fn seeded_label_in_range() {
        for seed in 0..20 {
            let label = LemkeHowson::new().with_seed(seed).starting_label(4).unwrap();
            assert!(label < 4);
        }
        assert_eq!(
            LemkeHowson::new().with_label(2).starting_label(4).unwrap(),
            2
        );
    }

    #[test]
    fn deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Array::random_using((6, 5), Uniform::new(0., 10.), &mut rng);
        let b = Array::random_using((6, 5), Uniform::new(0., 10.), &mut rng);
        let game = BimatrixGame::new(a, b).unwrap();
        let solver = LemkeHowson::new().with_seed(42);

        let first = solver.solve(&game).unwrap();
        let second = solver.solve(&game).unwrap();

        assert_eq!(first.starting_label, second.starting_label);
        assert_eq!(first.iterations, second.iterations);
        assert_eq!(first.strategy.0, second.strategy.0);
        assert_eq!(first.strategy.1, second.strategy.1);
    }

    #[test]
    fn random_games() {
        let mut rng = StdRng::seed_from_u64(1);
        for n in 1..7 {
            for m in 1..7 {
                for _ in 0..5 {
                    let a = Array::random_using((n, m), Uniform::new(-5., 5.), &mut rng);
                    let b = Array::random_using((n, m), Uniform::new(-5., 5.), &mut rng);
                    let game = BimatrixGame::new(a, b).unwrap();
                    for label in 0..n {
                        let s = LemkeHowson::new().with_label(label).solve(&game).unwrap().strategy;
                        assert_eq!(s.0.len(), n);
                        assert_eq!(s.1.len(), m);
                        assert_distribution(&s.0);
                        assert_distribution(&s.1);
                        assert!(game.is_ne(&s, TOLERANCE));
                    }
                }
            }
        }
    }

    #[test]
    fn path_stays_feasible() {
        let game = test_game();
        let mut tableaux = Tableaux::new(&game).unwrap();
        tableaux.1.pivot(1).unwrap();
        assert!(tableaux.1.is_feasible());

        let mut side = Side::Player1;
        while tableaux.advance(side).unwrap().is_some() {
            assert!(tableaux.0.is_feasible());
            assert!(tableaux.1.is_feasible());
            side = side.other();
        }
        assert!(game.is_ne(&tableaux.strategy(), TOLERANCE));
    }

    #[test]
    fn tiny_payoffs() {
        let a = array![[2e-13, 1e-13], [1e-13, 2e-13]];
        let b = array![[1e-13, 2e-13], [2e-13, 1e-13]];
        let game = BimatrixGame::new(a, b).unwrap();

        let s = lemke_howson(&game).unwrap();
        assert_eq!(s, Strategy(array![0.5, 0.5], array![0.5, 0.5]));
    }

    #[test]
    fn extreme_payoffs() {
        let a = array![[f64::MAX, -f64::MAX], [-f64::MAX, f64::MAX]];
        let b = array![[-f64::MAX, f64::MAX], [f64::MAX, -f64::MAX]];
        let game = BimatrixGame::new(a, b).unwrap();

        let s = lemke_howson(&game).unwrap();
        assert_eq!(s, Strategy(array![0.5, 0.5], array![0.5, 0.5]));
    }

    #[test]
    fn payoff_scale_does_not_matter() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let a = Array::random_using((4, 4), Uniform::new(0.1, 10.), &mut rng);
            let b = Array::random_using((4, 4), Uniform::new(0.1, 10.), &mut rng);
            let reference = LemkeHowson::new()
                .solve(&BimatrixGame::new(a.clone(), b.clone()).unwrap())
                .unwrap();
            for scale in [1e-14, 1., 1e13] {
                let game = BimatrixGame::new(&a * scale, &b * scale).unwrap();
                let eq = LemkeHowson::new().solve(&game).unwrap();
                assert!(game.is_ne(&eq.strategy, TOLERANCE));
                assert_eq!(eq.strategy, reference.strategy);
            }
        }
    }

    #[test]
    fn config_file() {
        let path = std::env::temp_dir().join(format!("lemke-config-{}.json", std::process::id()));
        let solver = LemkeHowson::new().with_seed(42).with_max_iterations(50);

        solver.to_file(&path).unwrap();
        assert_eq!(LemkeHowson::from_file(&path).unwrap(), solver);
        std::fs::remove_file(&path).unwrap();

        let parsed: LemkeHowson =
            serde_json::from_str(r#"{"warm_start": {"Label": 2}, "max_iterations": 10}"#).unwrap();
        assert_eq!(parsed, LemkeHowson::new().with_label(2).with_max_iterations(10));

        assert!(matches!(
            LemkeHowson::from_file(&path),
            Err(GameError::InvalidConfigPath(_, _))
        ));
    }
}
