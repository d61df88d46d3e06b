//! Error types for the runtime model

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown {system} code: {code}")]
    UnknownCode { system: &'static str, code: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Local id #{0} is already used in this contained set")]
    DuplicateLocalId(String),
}

pub type Result<T> = std::result::Result<T, Error>;
