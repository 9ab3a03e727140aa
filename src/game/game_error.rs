use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No row can leave the basis when label {entering} enters.")]
    DegeneratePivot { entering: usize },

    #[error("No complementary basis reached after {iterations} iterations.")]
    NonConvergence { iterations: usize },

    #[error("Invalid game path: {1}")]
    InvalidGamePath(#[source] std::io::Error, String),

    #[error("Invalid solver configuration path: {1}")]
    InvalidConfigPath(#[source] std::io::Error, String),

    #[error("Cannot parse JSON file.")]
    ParseJson(#[from] serde_json::Error),

    #[error("Cannot parse payoff matrix: {1}")]
    ParseGameCsv(#[source] csv::Error, String),
}
