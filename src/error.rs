//! Error type shared by the feed builder and the SU3 signer.
//!
//! Every variant names the operation that failed and, where one exists, the
//! offending path or field. [`FeedError::kind`] maps a failure onto the policy
//! the drivers apply: skip the tuple, abort the invocation, or report the file.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = FeedError> = std::result::Result<T, E>;

/// How a driver should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required input file does not exist. Log and skip the tuple.
    InputAbsent,
    /// An input exists but cannot be used. Abort the tuple, continue the walk.
    InputMalformed,
    /// The output tree cannot be written. Fatal to the invocation.
    OutputFatal,
    /// Signing cannot proceed for one file. Report and continue the walk.
    SignerConfig,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{operation} '{}': {source}", path.display())]
    Read {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{operation} '{}': {source}", path.display())]
    Write {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("decoding release JSON: {0}")]
    Release(String),

    #[error("validating blocklist: {0}")]
    Blocklist(String),

    #[error("rendering feed: {0}")]
    Render(String),

    #[error("unsupported signing key: {0}")]
    UnsupportedKey(String),

    #[error("refusing to sign '{}': source must end in .atom.xml", .0.display())]
    NotAtomFile(PathBuf),

    #[error("signing: {0}")]
    Signature(String),

    #[error("malformed SU3 file: {0}")]
    Su3Format(String),

    #[error("SU3 signature verification failed: {0}")]
    Verification(String),
}

impl FeedError {
    pub(crate) fn read(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Write {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Read { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                ErrorKind::InputAbsent
            }
            Self::Read { .. } | Self::Release(_) | Self::Blocklist(_) | Self::Render(_) => {
                ErrorKind::InputMalformed
            }
            Self::Write { .. } => ErrorKind::OutputFatal,
            Self::UnsupportedKey(_)
            | Self::NotAtomFile(_)
            | Self::Signature(_)
            | Self::Su3Format(_)
            | Self::Verification(_) => ErrorKind::SignerConfig,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::OutputFatal
    }
}
