//! Error types for the TCP channel.

use oftlink_protocol::Cookie;

/// Errors produced outside a running session: connection setup, task
/// bookkeeping. Failures inside a session are reported as its outcome.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("a transfer with cookie {0} is already running")]
    DuplicateCookie(Cookie),

    #[error("no transfer with cookie {0}")]
    UnknownCookie(Cookie),

    #[error("transfer task failed: {0}")]
    Task(String),
}
