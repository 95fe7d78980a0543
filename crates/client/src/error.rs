use std::time::Duration;

use swapdeck_core::error::CoreError;
use uuid::Uuid;

/// Message shown when an action needs an upstream key and none is stored.
pub const NOT_AUTHORIZED: &str = "PLEASE AUTHORIZE YOUR API KEY FIRST";

/// Message shown when "process all remaining" finds nothing to do.
pub const NOTHING_READY: &str = "NO ROWS READY TO PROCESS";

/// Errors from talking to the SwapDeck server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure (connect, TLS, body decode).
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No response within the client timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Login or registration refused.
    #[error("{0}")]
    Unauthorized(String),

    /// The server's admission controller is full.
    #[error("{message}")]
    Capacity {
        message: String,
        active_requests: usize,
        max_concurrent: usize,
    },

    /// Any other non-2xx reply. `message` is the server's `error` field, or
    /// `HTTP <status>` when it sent none.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Local file access (face reference, targets, downloads).
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Queue actions refused before any network call.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("{}", NOT_AUTHORIZED)]
    NotAuthorized,

    #[error("Select a face reference first")]
    NoFaceReference,

    #[error("Add at least one target image first")]
    NoTargets,

    #[error("{}", NOTHING_READY)]
    NothingReady,

    #[error("No queue item with id {0}")]
    ItemNotFound(Uuid),

    /// The item is not in a state that allows the action.
    #[error("Item {id} is {status}")]
    InvalidState { id: Uuid, status: &'static str },

    #[error("No pending target at position {0}")]
    TargetIndex(usize),

    /// Domain validation (face reference size, variation count, dimensions).
    #[error(transparent)]
    Core(#[from] CoreError),
}
