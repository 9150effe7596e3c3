use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use wangr_apply_patch::ApplyDiffError;

pub type Result<T> = std::result::Result<T, WangrErr>;

/// A path that cannot be confined to the workspace root.
#[derive(Error, Debug)]
pub enum SandboxErr {
    #[error("Absolute paths are not allowed: {0}")]
    AbsolutePath(String),

    #[error("Path escapes the workspace root: {0}")]
    EscapesRoot(String),

    /// The workspace root itself could not be canonicalized.
    #[error("workspace root {} is unavailable: {source}", root.display())]
    RootUnavailable {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure local to a single proposed operation. Always recovered into a failed
/// [`wangr_protocol::protocol::ToolOutput`]; never aborts sibling operations.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("{0}")]
    InvalidOperation(String),

    #[error("Unsupported operation type: {0}")]
    UnsupportedOperation(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("File too large ({size} bytes, limit {limit}): {path}")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error(transparent)]
    Diff(#[from] ApplyDiffError),

    #[error(transparent)]
    Sandbox(#[from] SandboxErr),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors that abort a whole resolution or agent exchange.
#[derive(Error, Debug)]
pub enum WangrErr {
    /// The agent issued a pending batch without an id, so it cannot be resumed.
    #[error("Missing pending operation id.")]
    MissingPendingId,

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxErr),

    /// Unexpected HTTP status code.
    #[error("unexpected status {0}: {1}")]
    UnexpectedStatus(StatusCode, String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The NDJSON stream broke off after the HTTP handshake succeeded.
    #[error("stream disconnected before completion: {0}")]
    Stream(String),

    // -----------------------------------------------------------------
    // Automatic conversions for common external error types
    // -----------------------------------------------------------------
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub fn get_error_message_ui(e: &WangrErr) -> String {
    match e {
        WangrErr::Sandbox(err) => format!("Rejected unsafe path. {err}"),
        WangrErr::Reqwest(err) if err.is_timeout() => "error: agent request timed out".to_string(),
        WangrErr::Reqwest(err) if err.is_connect() => {
            "error: could not reach the agent backend".to_string()
        }
        _ => e.to_string(),
    }
}
