use std::io;

/// Reliable, ordered byte stream between the two peers.
///
/// Message boundaries are not preserved; the engine does its own framing.
/// Stream failures are reported back to the engine by the host through
/// [`TransferSession::on_stream_error`](crate::TransferSession::on_stream_error).
pub trait ByteStream {
    /// Returns whatever bytes are readable right now.
    ///
    /// An empty vector means nothing is available yet. End of stream is
    /// reported as an error of kind [`io::ErrorKind::UnexpectedEof`].
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    /// Queues `data` for sending and returns how many bytes were accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Bytes accepted by [`write`](Self::write) but not yet on the wire.
    fn pending_write_bytes(&self) -> usize;

    fn close(&mut self);
}
