use thiserror::Error;

#[derive(Error, Debug)]
pub enum WbrError {
    #[error("a record series holds exactly {expected} weeks, got {actual}")]
    WindowSize { expected: usize, actual: usize },

    #[error("week index {0} is outside the 8-week window")]
    WeekOutOfRange(usize),

    #[error("unknown channel label: {0}")]
    UnknownChannelLabel(String),

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("fingerprint unavailable: {0}")]
    Fingerprint(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WbrError>;
