//! Non-blocking [`ByteStream`] over a tokio `TcpStream`.

use std::io;

use bytes::{Buf, BytesMut};
use oftlink_transfer::ByteStream;
use tokio::net::TcpStream;
use tracing::debug;

use crate::{MAX_READ_PER_POLL, READ_BUFFER_SIZE};

/// Adapts a connected socket to the engine's stream contract.
///
/// Writes go straight to the socket when it can take them; the rest waits in
/// a local buffer reported through `pending_write_bytes` and is drained by
/// [`flush_pending`](Self::flush_pending) when the socket turns writable.
/// `close` takes effect once that buffer is empty.
#[derive(Debug)]
pub struct TcpByteStream {
    socket: Option<TcpStream>,
    pending: BytesMut,
    close_requested: bool,
    read_buf: Vec<u8>,
}

impl TcpByteStream {
    pub fn new(socket: TcpStream) -> Self {
        Self {
            socket: Some(socket),
            pending: BytesMut::new(),
            close_requested: false,
            read_buf: vec![0u8; READ_BUFFER_SIZE],
        }
    }

    /// The socket, until the stream is closed.
    pub fn socket(&self) -> Option<&TcpStream> {
        self.socket.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    /// Writes as much pending data as the socket accepts without blocking.
    ///
    /// On error the pending data is dropped and the socket is closed.
    pub fn flush_pending(&mut self) -> io::Result<()> {
        let Some(socket) = self.socket.as_ref() else {
            self.pending.clear();
            return Ok(());
        };
        while !self.pending.is_empty() {
            match socket.try_write(&self.pending) {
                Ok(0) => {
                    self.abort();
                    return Err(io::Error::from(io::ErrorKind::WriteZero));
                }
                Ok(n) => self.pending.advance(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => {
                    self.abort();
                    return Err(e);
                }
            }
        }
        if self.close_requested {
            self.shutdown();
        }
        Ok(())
    }

    /// Drops pending data and the socket immediately.
    pub fn abort(&mut self) {
        self.pending.clear();
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.socket.take().is_some() {
            debug!("tcp stream closed");
        }
    }
}

impl ByteStream for TcpByteStream {
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };
        let mut out = Vec::new();
        while out.len() < MAX_READ_PER_POLL {
            match socket.try_read(&mut self.read_buf) {
                Ok(0) if out.is_empty() => {
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
                }
                // EOF is reported on the next call.
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&self.read_buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.close_requested {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        let Some(socket) = self.socket.as_ref() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };
        let mut written = 0;
        if self.pending.is_empty() {
            written = match socket.try_write(data) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
                Err(e) => return Err(e),
            };
        }
        self.pending.extend_from_slice(&data[written..]);
        Ok(data.len())
    }

    fn pending_write_bytes(&self) -> usize {
        self.pending.len()
    }

    fn close(&mut self) {
        self.close_requested = true;
        if self.pending.is_empty() {
            self.shutdown();
        }
    }
}
