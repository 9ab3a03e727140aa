pub mod game;

pub use game::{
    BimatrixGame, Equilibrium, GameError, LemkeHowson, Strategy, WarmStart, lemke_howson,
};
