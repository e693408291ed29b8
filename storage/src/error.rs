use std::io;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("deployment key not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt storage contents: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
