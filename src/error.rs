use std::path::PathBuf;
use thiserror::Error;

use crate::devices::PartName;

pub type Result<T> = std::result::Result<T, FirmwareError>;

#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing input: no source file given for mandatory part {0}")]
    MissingInput(PartName),

    #[error("validation failed for {part}: {reason}")]
    Validation { part: String, reason: String },

    #[error("checksum mismatch for {part}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { part: String, stored: u32, computed: u32 },

    #[error("signature marker (55 AA ........ 55 AA) not found in the first 128 bytes")]
    SignatureNotFound,

    #[error("identity tuple matches more than one device: {}", candidates.join(", "))]
    AmbiguousDevice { candidates: Vec<String> },

    #[error("unknown device '{0}', run `nasfw devices` for the list")]
    UnknownDevice(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("binary encoding error: {0}")]
    Binary(#[from] binrw::Error),
}

/// Attaches the offending path to an io error.
pub trait IoContext<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| FirmwareError::Io { path: path.into(), source })
    }
}
