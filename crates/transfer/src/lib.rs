//! Resumable, checksum-verified OFT file transfer engine.
//!
//! The engine runs one [`TransferSession`] per negotiated exchange over an
//! already-connected, ordered byte stream. It is single-threaded and
//! event-driven: the host calls [`TransferSession::on_readable`] when bytes
//! arrive and [`TransferSession::pump`] when the stream can take more output.
//! Nothing blocks; the outbound side never issues a write while the stream
//! still reports pending bytes.

mod checksum;
pub mod config;
mod events;
mod machine;
mod progress;
mod sequencer;
mod store;
mod stream;
mod validation;

pub use checksum::{OftChecksum, checksum_bytes, checksum_file, checksum_reader};
pub use config::{ChecksumPolicy, TransferConfig};
pub use events::{EventSink, FailureReason, TransferEvent};
pub use machine::{Role, SessionOutcome, TransferSession, TransferState};
pub use progress::{ProgressSnapshot, ProgressTracker, SpeedCalculator};
pub use sequencer::{OutgoingFile, SequenceStep, SessionSequencer};
pub use store::{FileStore, FsStore, OpenMode};
pub use stream::ByteStream;
pub use validation::validate_file_name;

pub use oftlink_protocol::constants::CHECKSUM_SEED;

use oftlink_protocol::{DecodeError, MessageType};

/// Default payload chunk size in bytes.
///
/// The sending side never writes more than this per pump iteration.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Errors produced by the transfer engine.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] DecodeError),

    #[error("malformed descriptor: {0}")]
    Malformed(String),

    #[error("unsupported action: {message_type} while {state}")]
    UnsupportedAction {
        message_type: MessageType,
        state: TransferState,
    },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("invalid file name: {0}")]
    InvalidPath(String),

    #[error("too many files for one session: {0}")]
    TooManyFiles(usize),

    #[error("no files to transfer")]
    NoFiles,

    #[error("cancelled")]
    Cancelled,
}

impl TransferError {
    /// Reason code reported upward with `TransferFailed`.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Io(_) | Self::TooManyFiles(_) => FailureReason::IoError,
            Self::Protocol(_) | Self::Malformed(_) | Self::InvalidPath(_) => {
                FailureReason::ProtocolError
            }
            Self::UnsupportedAction { .. } => FailureReason::UnsupportedAction,
            Self::ChecksumMismatch { .. } => FailureReason::ChecksumMismatch,
            Self::ConnectionLost(_) => FailureReason::ConnectionLost,
            Self::NoFiles | Self::Cancelled => FailureReason::Cancelled,
        }
    }
}
