use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid merge target: {0}")]
    InvalidMergeTarget(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Could not save ({message}); {}", persistence_outcome(.retained_in_memory))]
    Persistence {
        message: String,
        retained_in_memory: bool,
    },

    #[error("Nothing recognized. Try again or enter the transaction manually.")]
    NothingRecognized,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

fn persistence_outcome(retained_in_memory: &bool) -> &'static str {
    if *retained_in_memory {
        "changes are kept for this session only"
    } else {
        "nothing was changed"
    }
}

impl LedgerError {
    pub fn persistence(err: impl std::fmt::Display, retained_in_memory: bool) -> Self {
        Self::Persistence {
            message: err.to_string(),
            retained_in_memory,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
