use lemke::{BimatrixGame, LemkeHowson};
use ndarray::Array;
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::Uniform;

fn help() {
    println!("Use: random_game <num strategies player 1> <num strategies player 2> [seed]");
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if !(3..=4).contains(&args.len()) {
        help();
        return;
    }
    let num_strategies0: usize = match args[1].parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("First argument is not an integer.");
            help();
            return;
        }
    };
    let num_strategies1: usize = match args[2].parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("Second argument is not an integer.");
            help();
            return;
        }
    };
    let solver = match args.get(3).map(|s| s.parse::<u64>()) {
        Some(Ok(seed)) => LemkeHowson::new().with_seed(seed),
        Some(Err(_)) => {
            eprintln!("Seed is not an integer.");
            help();
            return;
        }
        None => LemkeHowson::new(),
    };

    let a = Array::random((num_strategies0, num_strategies1), Uniform::new(0., 10.));
    let b = Array::random((num_strategies0, num_strategies1), Uniform::new(0., 10.));

    println!("Payoff for player 1:");
    println!("{a:.3}");
    println!("Payoff for player 2:");
    println!("{b:.3}");

    let game = match BimatrixGame::new(a, b) {
        Ok(game) => game,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    let eq = match solver.solve(&game) {
        Ok(eq) => eq,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    println!("Equilibrium strategies (starting label {})", eq.starting_label);
    println!("Player 1: {:.4}", eq.strategy.0);
    println!("Player 2: {:.4}", eq.strategy.1);

    let eq_payoff = game.strategy_payoff(&eq.strategy);
    println!("Equilibrium payoff");
    println!("Player 1: {}, Player 2: {}", eq_payoff.0, eq_payoff.1);
}
