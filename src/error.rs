use std::{io, path::PathBuf};

use thiserror::Error;

/// The broad category of a [`MassLynxError`], retrievable from a
/// [`MassLynxReader`](crate::MassLynxReader) after a failed operation via
/// [`last_error`](crate::MassLynxReader::last_error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MassLynxErrorKind {
    /// The supplied path does not resolve to a readable directory
    InvalidDirectory,
    /// `_HEADER.TXT` existed but could not be read
    HeaderRead,
    /// A function descriptor or scan index file was missing, mis-sized,
    /// or failed to decode
    DirectoryRead,
}

/// Errors that arise while reading a MassLynx raw data directory
#[derive(Debug, Error)]
pub enum MassLynxError {
    #[error("{path:?} is not a MassLynx data directory")]
    InvalidDirectory { path: PathBuf },
    #[error("An error occurred while reading _HEADER.TXT: {source}")]
    HeaderRead {
        #[source]
        source: io::Error,
    },
    #[error("An error occurred while reading {path:?}: {reason}")]
    DirectoryRead { path: PathBuf, reason: String },
}

impl MassLynxError {
    pub fn kind(&self) -> MassLynxErrorKind {
        match self {
            Self::InvalidDirectory { .. } => MassLynxErrorKind::InvalidDirectory,
            Self::HeaderRead { .. } => MassLynxErrorKind::HeaderRead,
            Self::DirectoryRead { .. } => MassLynxErrorKind::DirectoryRead,
        }
    }

    pub(crate) fn directory_read<P: Into<PathBuf>, S: ToString>(path: P, reason: S) -> Self {
        Self::DirectoryRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<MassLynxError> for io::Error {
    fn from(value: MassLynxError) -> Self {
        match value {
            MassLynxError::HeaderRead { source } => source,
            e => Self::new(io::ErrorKind::Other, e),
        }
    }
}
