//! Async host loop for a [`TransferSession`] on a TCP socket.

use oftlink_transfer::{
    ByteStream, EventSink, FailureReason, FileStore, SessionOutcome, TransferSession,
};
use tokio::io::Interest;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::stream::TcpByteStream;

enum Wake {
    Cancelled,
    Ready(std::io::Result<tokio::io::Ready>),
}

/// Runs `session` until it has an outcome and its stream is drained.
///
/// The loop waits for socket readiness: readable input goes to
/// `on_readable`, writability flushes the adapter and pumps the session.
/// Cancelling `cancel` cancels the session and drops the socket.
pub async fn drive<F, E>(
    session: &mut TransferSession<TcpByteStream, F, E>,
    cancel: &CancellationToken,
) -> SessionOutcome
where
    F: FileStore,
    E: EventSink,
{
    session.start();

    loop {
        if let Err(e) = session.stream_mut().flush_pending() {
            session.on_stream_error(e);
        }
        if session.is_finished()
            && !session.wants_write()
            && session.stream().pending_write_bytes() == 0
        {
            break;
        }

        let finished = session.is_finished();
        let mut interest = if finished {
            Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        if !finished && (session.wants_write() || session.stream().pending_write_bytes() > 0) {
            interest = interest.add(Interest::WRITABLE);
        }

        if session.stream().is_closed() {
            session.on_stream_closed();
            break;
        }
        let wake = {
            let Some(socket) = session.stream().socket() else {
                break;
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                ready = socket.ready(interest) => Wake::Ready(ready),
            }
        };

        match wake {
            Wake::Cancelled => {
                debug!("session cancelled by host");
                session.cancel();
                session.stream_mut().abort();
                break;
            }
            Wake::Ready(Err(e)) => {
                session.on_stream_error(e);
                session.stream_mut().abort();
            }
            Wake::Ready(Ok(ready)) => {
                if ready.is_writable() {
                    if let Err(e) = session.stream_mut().flush_pending() {
                        session.on_stream_error(e);
                    }
                    session.pump();
                }
                if ready.is_readable() || ready.is_read_closed() {
                    session.on_readable();
                }
            }
        }
    }

    // Completed sessions close their stream once drained; make sure
    // nothing is left open either way.
    session.stream_mut().abort();

    match session.outcome() {
        Some(outcome) => outcome.clone(),
        None => SessionOutcome::Failed {
            reason: FailureReason::ConnectionLost,
            message: "stream ended without an outcome".into(),
        },
    }
}
