//! Sending side: connects to the receiver and offers files.

use std::net::SocketAddr;
use std::path::PathBuf;

use oftlink_protocol::Cookie;
use oftlink_transfer::{EventSink, FsStore, SessionOutcome, TransferConfig, TransferSession};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ChannelError;
use crate::stream::TcpByteStream;
use crate::{CONNECT_TIMEOUT, drive};

/// Connects to `addr` with a timeout, giving up early if `cancel` fires.
pub async fn connect(
    addr: SocketAddr,
    cancel: &CancellationToken,
) -> Result<TcpStream, ChannelError> {
    let stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(ChannelError::Cancelled);
        }
        result = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)) => {
            match result {
                Ok(Ok(s)) => {
                    info!(%addr, "connected");
                    s
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ChannelError::Timeout),
            }
        }
    };
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Connects to `addr` and runs a sending session for `files`.
pub async fn send_files<E: EventSink>(
    addr: SocketAddr,
    cookie: Cookie,
    files: Vec<PathBuf>,
    config: TransferConfig,
    sink: E,
    cancel: &CancellationToken,
) -> Result<SessionOutcome, ChannelError> {
    let socket = connect(addr, cancel).await?;
    let mut session = TransferSession::sender(
        cookie,
        files,
        TcpByteStream::new(socket),
        FsStore::new(),
        sink,
        config,
    );
    Ok(drive(&mut session, cancel).await)
}
