use serde::Serialize;

/// Why a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Truncated or garbled descriptor, bad file name, foreign cookie.
    ProtocolError,
    /// Unknown message type, or one the current state cannot accept.
    UnsupportedAction,
    /// Whole-file checksum disagreed at completion under the strict policy.
    ChecksumMismatch,
    /// A local file could not be opened, read or written.
    IoError,
    /// The stream failed or the peer closed it early.
    ConnectionLost,
    /// Cancelled locally, or nothing to transfer.
    Cancelled,
}

/// Notifications emitted by a session.
///
/// Progress for a file is always reported before its completion, and a
/// session emits exactly one of `TransferCompleted` / `TransferFailed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransferEvent {
    FileIncoming { name: String, size: u64 },
    FileOutgoing { name: String, size: u64 },
    FileProcessed { bytes_transferred: u64, file_size: u64 },
    FileReceived { name: String, bytes_transferred: u64 },
    FileSent { name: String, bytes_transferred: u64 },
    TransferCompleted,
    TransferFailed { reason: FailureReason, message: String },
}

impl TransferEvent {
    /// Returns `true` for `TransferCompleted` and `TransferFailed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TransferCompleted | Self::TransferFailed { .. })
    }
}

/// Receives session events.
pub trait EventSink {
    fn emit(&mut self, event: TransferEvent);
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn emit(&mut self, event: TransferEvent) {
        (**self).emit(event);
    }
}

impl EventSink for Vec<TransferEvent> {
    fn emit(&mut self, event: TransferEvent) {
        self.push(event);
    }
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<TransferEvent> {
    fn emit(&mut self, event: TransferEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.send(event);
    }
}
