#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};

use oftlink_protocol::{Cookie, MessageType, TransferDescriptor, decode};
use oftlink_transfer::{
    ByteStream, FsStore, TransferConfig, TransferEvent, TransferSession,
};

pub type Session = TransferSession<PipeEnd, FsStore, Vec<TransferEvent>>;

pub const COOKIE: Cookie = Cookie::from_bytes(*b"oftlink!");

/// One end of an in-memory link. Bytes written stay "pending" until the
/// test moves them to the other end with [`deliver`].
#[derive(Debug, Default)]
pub struct PipeEnd {
    pub incoming: Vec<u8>,
    pub outgoing: Vec<u8>,
    pub peer_closed: bool,
    pub closed: bool,
    /// Every accepted write, in order.
    pub writes: Vec<Vec<u8>>,
    /// Writes issued while earlier bytes were still pending.
    pub writes_while_pending: usize,
}

impl ByteStream for PipeEnd {
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        if !self.incoming.is_empty() {
            return Ok(std::mem::take(&mut self.incoming));
        }
        if self.peer_closed {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        Ok(Vec::new())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        if !self.outgoing.is_empty() {
            self.writes_while_pending += 1;
        }
        self.outgoing.extend_from_slice(data);
        self.writes.push(data.to_vec());
        Ok(data.len())
    }

    fn pending_write_bytes(&self) -> usize {
        self.outgoing.len()
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

pub fn demo_bytes() -> Vec<u8> {
    (0..1000u32).map(|i| ((i * 7 + 3) % 256) as u8).collect()
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

pub fn sender(files: Vec<PathBuf>, config: TransferConfig) -> Session {
    TransferSession::sender(
        COOKIE,
        files,
        PipeEnd::default(),
        FsStore::new(),
        Vec::new(),
        config,
    )
}

pub fn receiver(dir: &Path, config: TransferConfig) -> Session {
    TransferSession::receiver(
        dir,
        PipeEnd::default(),
        FsStore::new(),
        Vec::new(),
        config,
    )
}

/// Moves up to `budget` pending bytes from `from` to `to`.
pub fn deliver(from: &mut Session, to: &mut Session, budget: usize) {
    let take = budget.min(from.stream().outgoing.len());
    let bytes: Vec<u8> = from.stream_mut().outgoing.drain(..take).collect();
    to.stream_mut().incoming.extend_from_slice(&bytes);
    if from.stream().closed && from.stream().outgoing.is_empty() {
        to.stream_mut().peer_closed = true;
    }
}

/// One round of host work on both sides.
pub fn step(a: &mut Session, b: &mut Session, budget: usize) {
    a.pump();
    b.pump();
    deliver(a, b, budget);
    deliver(b, a, budget);
    a.on_readable();
    b.on_readable();
}

/// Runs both sessions until each has an outcome.
pub fn run(a: &mut Session, b: &mut Session, budget: usize) {
    a.start();
    b.start();
    for _ in 0..100_000 {
        if a.is_finished() && b.is_finished() {
            return;
        }
        step(a, b, budget);
    }
    panic!("sessions did not finish");
}

/// Descriptors the session wrote, in order (payload writes skipped).
pub fn sent_descriptors(session: &Session) -> Vec<TransferDescriptor> {
    session
        .stream()
        .writes
        .iter()
        .filter(|w| w.len() == 256 && w.starts_with(b"OFT2"))
        .filter_map(|w| decode(w).ok())
        .collect()
}

pub fn sent_kinds(session: &Session) -> Vec<MessageType> {
    sent_descriptors(session)
        .iter()
        .map(|d| d.message_type)
        .collect()
}

pub fn processed(session: &Session) -> Vec<u64> {
    session
        .sink()
        .iter()
        .filter_map(|e| match e {
            TransferEvent::FileProcessed {
                bytes_transferred, ..
            } => Some(*bytes_transferred),
            _ => None,
        })
        .collect()
}

pub fn count_completed(session: &Session) -> usize {
    session
        .sink()
        .iter()
        .filter(|e| matches!(e, TransferEvent::TransferCompleted))
        .count()
}

pub fn count_terminal(session: &Session) -> usize {
    session.sink().iter().filter(|e| e.is_terminal()).count()
}
