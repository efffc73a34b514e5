use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration mismatch: {what} expected {expected}, found {found}")]
    ConfigMismatch {
        what: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("Field '{field}' has {distinct} distinct values ({bits} bits), more than 8 bits")]
    CodecCapacity {
        field: &'static str,
        distinct: usize,
        bits: u8,
    },

    #[error("Format error: {0}")]
    Format(String),

    #[error("Parameter out of range: {0}")]
    OutOfRange(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
