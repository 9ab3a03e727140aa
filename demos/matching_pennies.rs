use lemke::{BimatrixGame, lemke_howson};
use ndarray::array;

fn main() {
    let game = BimatrixGame::new(array![[1., -1.], [-1., 1.]], array![[-1., 1.], [1., -1.]])
        .expect("matching pennies is a valid game");

    let s = lemke_howson(&game).expect("matching pennies has an equilibrium");
    println!("Strategy player 1: {}", s.0);
    println!("Strategy player 2: {}", s.1);
    println!("Regret: {:?}", game.regret(&s));
}
