// Error taxonomy shared by every module of the library. The binary wraps
// these with `anyhow` at the command boundary, so each variant only needs a
// readable message and, where there is one, the underlying cause.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("server URL is required")]
    MissingServer,

    #[error("invalid server URL {url:?}: {reason}")]
    InvalidServer { url: String, reason: String },

    #[error("username and password are required")]
    EmptyCredentials,

    #[error("failed to send authentication request")]
    Network(#[source] reqwest::Error),

    #[error("authentication failed: {message}")]
    AuthRejected { status: u16, message: String },

    #[error("authentication failed with status code: {status}")]
    AuthFailed { status: u16 },

    #[error("received empty token from server")]
    EmptyToken,

    #[error("failed to decode authentication response")]
    InvalidResponse(#[source] serde_json::Error),

    #[error("failed to parse kubeconfig {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize kubeconfig")]
    ConfigSerialize(#[source] serde_yaml::Error),

    #[error("context {0:?} does not exist")]
    ContextNotFound(String),

    #[error("no contexts are defined in {}", path.display())]
    NoContexts { path: PathBuf },

    #[error("interrupted by user")]
    Interrupted,

    #[error("failed to read input")]
    Input(#[source] io::Error),

    #[error("failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to determine the home directory")]
    HomeDirUnavailable,
}

impl Error {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
