use thiserror::Error;

pub type Result<T> = std::result::Result<T, BalanceError>;

// Every variant is raised before any state is mutated for the failing operation
#[derive(Error, Debug)]
pub enum BalanceError {
    #[error("invalid soil profile: {0}")]
    InvalidProfile(String),

    #[error("invalid daily input: {0}")]
    InvalidInput(String),

    #[error("insufficient forcing: {requested} days requested but only {available} daily records available")]
    InsufficientForcing { requested: usize, available: usize },

    #[error("day {day} is out of range for a {days}-day simulation")]
    OutOfRange { day: usize, days: usize },

    #[error("invalid model input: {0}")]
    Config(String),

    #[error("daily data line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
