//! Error taxonomy shared by enumeration, tailing and multiplexing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Not a plain file name: {name:?}")]
    InvalidName { name: String },
    #[error("Failed to list directory {}: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("File disappeared while tailing: {}", path.display())]
    FileGone { path: PathBuf },
    #[error("Failed reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Returns `true` if the error happened before any line was produced,
    /// i.e. the file could not be resolved or opened in the first place.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, Error::FileOpen { .. } | Error::InvalidName { .. })
    }
}

/// Read errors that only mean "no data right now" and warrant another poll.
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
