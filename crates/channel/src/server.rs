//! Receiving side: accepts one peer and stores what it sends.

use std::net::SocketAddr;
use std::path::PathBuf;

use oftlink_protocol::Cookie;
use oftlink_transfer::{EventSink, FsStore, SessionOutcome, TransferConfig, TransferSession};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ChannelError;
use crate::stream::TcpByteStream;
use crate::{ACCEPT_TIMEOUT, drive};

/// Binds a listener. Port 0 picks an ephemeral port; the bound address is
/// returned alongside.
pub async fn listen(addr: SocketAddr) -> Result<(TcpListener, SocketAddr), ChannelError> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(%local, "listening");
    Ok((listener, local))
}

/// Waits for a single connection.
pub async fn accept_one(
    listener: &TcpListener,
    cancel: &CancellationToken,
) -> Result<TcpStream, ChannelError> {
    let stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(ChannelError::Cancelled);
        }
        result = tokio::time::timeout(ACCEPT_TIMEOUT, listener.accept()) => {
            match result {
                Ok(Ok((stream, addr))) => {
                    info!(%addr, "connection accepted");
                    stream
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ChannelError::Timeout),
            }
        }
    };
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Accepts one peer and runs a receiving session into `dest_dir`.
///
/// With `expected` set, descriptors carrying any other cookie fail the
/// session.
pub async fn receive_files<E: EventSink>(
    listener: &TcpListener,
    dest_dir: PathBuf,
    expected: Option<Cookie>,
    config: TransferConfig,
    sink: E,
    cancel: &CancellationToken,
) -> Result<SessionOutcome, ChannelError> {
    let socket = accept_one(listener, cancel).await?;
    let mut session = TransferSession::receiver(
        dest_dir,
        TcpByteStream::new(socket),
        FsStore::new(),
        sink,
        config,
    );
    if let Some(cookie) = expected {
        session = session.expect_cookie(cookie);
    }
    Ok(drive(&mut session, cancel).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::send_files;
    use oftlink_transfer::{FailureReason, TransferEvent};

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn demo_bytes(len: u32) -> Vec<u8> {
        (0..len).map(|i| ((i * 7 + 3) % 256) as u8).collect()
    }

    #[tokio::test]
    async fn accept_cancelled_before_connect() {
        let (listener, _) = listen(loopback()).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = accept_one(&listener, &cancel).await;
        assert!(matches!(result, Err(ChannelError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn accept_times_out() {
        let (listener, _) = listen(loopback()).await.unwrap();
        let cancel = CancellationToken::new();

        let result = accept_one(&listener, &cancel).await;
        assert!(matches!(result, Err(ChannelError::Timeout)));
    }

    #[tokio::test]
    async fn files_cross_loopback() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let big = demo_bytes(200_000);
        let small = b"hello world".to_vec();
        std::fs::write(src.path().join("big.bin"), &big).unwrap();
        std::fs::write(src.path().join("small.txt"), &small).unwrap();
        // Half of big.bin is already there.
        std::fs::write(dst.path().join("big.bin"), &big[..100_000]).unwrap();

        let cookie = Cookie::generate();
        let (listener, addr) = listen(loopback()).await.unwrap();
        let cancel = CancellationToken::new();

        let rx_dir = dst.path().to_path_buf();
        let rx_cancel = cancel.clone();
        let receiver = tokio::spawn(async move {
            let mut events = Vec::new();
            let outcome = receive_files(
                &listener,
                rx_dir,
                Some(cookie),
                TransferConfig::default(),
                &mut events,
                &rx_cancel,
            )
            .await;
            (outcome, events)
        });

        let (tx_events, mut tx_rx) = tokio::sync::mpsc::unbounded_channel();
        let sent = send_files(
            addr,
            cookie,
            vec![src.path().join("big.bin"), src.path().join("small.txt")],
            TransferConfig::default(),
            tx_events,
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(sent, SessionOutcome::Completed);

        let (received, rx_events) = receiver.await.unwrap();
        assert_eq!(received.unwrap(), SessionOutcome::Completed);
        assert_eq!(rx_events.last(), Some(&TransferEvent::TransferCompleted));

        let mut first_progress = None;
        while let Ok(event) = tx_rx.try_recv() {
            if let TransferEvent::FileProcessed {
                bytes_transferred, ..
            } = event
            {
                first_progress.get_or_insert(bytes_transferred);
            }
        }
        // Resumed: the first chunk sent starts after the held prefix.
        assert_eq!(first_progress, Some(100_256));

        assert_eq!(std::fs::read(dst.path().join("big.bin")).unwrap(), big);
        assert_eq!(std::fs::read(dst.path().join("small.txt")).unwrap(), small);
    }

    #[tokio::test]
    async fn wrong_cookie_fails_receiver() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("a.txt"), b"abc").unwrap();

        let (listener, addr) = listen(loopback()).await.unwrap();
        let cancel = CancellationToken::new();
        let rx_dir = dst.path().to_path_buf();
        let rx_cancel = cancel.clone();
        let receiver = tokio::spawn(async move {
            receive_files(
                &listener,
                rx_dir,
                Some(Cookie::from_bytes([1; 8])),
                TransferConfig::default(),
                Vec::new(),
                &rx_cancel,
            )
            .await
        });

        let sent = send_files(
            addr,
            Cookie::from_bytes([2; 8]),
            vec![src.path().join("a.txt")],
            TransferConfig::default(),
            Vec::new(),
            &cancel,
        )
        .await
        .unwrap();

        let received = receiver.await.unwrap().unwrap();
        assert!(matches!(
            received,
            SessionOutcome::Failed {
                reason: FailureReason::ProtocolError,
                ..
            }
        ));
        assert!(matches!(
            sent,
            SessionOutcome::Failed {
                reason: FailureReason::ConnectionLost,
                ..
            }
        ));
        assert!(!dst.path().join("a.txt").exists());
    }
}
