//! Nash equilibria of bimatrix games by complementary pivoting.
mod bimatrix_game;
pub use self::bimatrix_game::*;

mod tableau;
pub use self::tableau::*;

mod extractor;
pub use self::extractor::*;

mod lemke_howson;
pub use self::lemke_howson::*;

mod game_error;
pub use game_error::GameError;
