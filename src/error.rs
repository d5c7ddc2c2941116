use std::{io, path::PathBuf};
use thiserror::Error;

use crate::registry::ParentRowIndex;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(
        "Address {address} is already registered under parent {registered_under}, cannot add it under parent {requested}"
    )]
    InvariantViolation {
        address: String,
        registered_under: ParentRowIndex,
        requested: ParentRowIndex,
    },

    #[error("Row id space exhausted after {last}")]
    RowIdExhausted { last: u64 },

    #[error("Parent lookup out of sync for address {address}")]
    InconsistentLookup { address: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid script header: {0}")]
    ScriptHeader(String),

    #[error("Invalid script row {row}: {message}")]
    ScriptRow { row: usize, message: String },

    #[error("Failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create file {path}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    EnvVar(#[from] std::env::VarError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
