use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures a single chapter (or a listing) can run into.
///
/// Every variant is caught at the chapter boundary by the pipeline; only a
/// failed listing fetch ends a whole run.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("content not found (selector `{selector}`)")]
    Locate { selector: String },

    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("unparsable listing entry: {0}")]
    Parse(String),

    #[error("{action} {}: {source}", path.display())]
    FileSystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no more accounts available for token refresh")]
    CredentialExhausted,
}

pub type Result<T> = std::result::Result<T, ReaderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Locate,
    Parse,
    FileSystem,
    CredentialExhausted,
}

impl ReaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Locate { .. } | Self::InvalidSelector { .. } => ErrorKind::Locate,
            Self::Parse(_) => ErrorKind::Parse,
            Self::FileSystem { .. } => ErrorKind::FileSystem,
            Self::CredentialExhausted => ErrorKind::CredentialExhausted,
        }
    }

    pub(crate) fn fetch(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn fs(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            action,
            path: path.into(),
            source,
        }
    }
}
