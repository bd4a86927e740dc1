use std::path::PathBuf;

/// Reasons a configuration file is rejected. Any of these invalidates the
/// whole parameter set.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file {} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("error reading configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected key=value, got {content:?}")]
    Syntax { line: usize, content: String },

    #[error("missing required key {0:?}")]
    MissingKey(&'static str),

    #[error("invalid ftp_port {0:?}")]
    InvalidPort(String),

    #[error("invalid schedule {value:?}: {reason}")]
    InvalidSchedule { value: String, reason: String },

    #[error("invalid {key} {value:?}: not an existing directory")]
    InvalidDirectory { key: &'static str, value: String },
}

/// Failure reported by the remote FTP collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RemoteError(pub String);

impl From<ftp::types::FtpError> for RemoteError {
    fn from(err: ftp::types::FtpError) -> Self {
        RemoteError(err.to_string())
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        RemoteError(err.to_string())
    }
}

/// Batch-level and per-file failures of a transfer run.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("connection to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: RemoteError,
    },

    #[error("login as {user} failed: {source}")]
    Login {
        user: String,
        #[source]
        source: RemoteError,
    },

    #[error("the folder {directory:?} is not valid: {source}")]
    Listing {
        directory: String,
        #[source]
        source: RemoteError,
    },

    #[error("download of {file} failed: {source}")]
    Download {
        file: String,
        #[source]
        source: RemoteError,
    },

    #[error("remote entry {0:?} has no usable file name")]
    InvalidEntry(String),

    #[error("{action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    pub(crate) fn fs(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| TransferError::Filesystem { action, path, source }
    }
}
