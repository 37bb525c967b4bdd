use std::io::{self, Read};
use std::path::Path;

use oftlink_protocol::constants::CHECKSUM_SEED;

use crate::store::{FileStore, OpenMode};

/// Read size used when checksumming files.
const CHECKSUM_READ_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// OftChecksum
// ---------------------------------------------------------------------------

/// Streaming OFT checksum.
///
/// Bytes at even file offsets are subtracted as the high byte of a 16-bit
/// word, bytes at odd offsets as the low byte; each subtraction that wraps
/// borrows one more. The result folds the accumulator to 16 bits and moves
/// it to the upper half.
///
/// Parity is tracked across [`update`](Self::update) calls, so feeding a file
/// in chunks gives the same value as feeding it at once. A checksum over the
/// first N bytes must still be computed from byte 0; two partial runs cannot
/// be combined.
///
/// Not cryptographic: it only catches accidental corruption.
#[derive(Debug, Clone)]
pub struct OftChecksum {
    acc: u32,
    consumed: u64,
}

impl OftChecksum {
    pub fn new() -> Self {
        Self {
            acc: CHECKSUM_SEED >> 16,
            consumed: 0,
        }
    }

    /// Feeds the next bytes of the file.
    pub fn update(&mut self, data: &[u8]) {
        let mut acc = self.acc;
        let mut even = self.consumed % 2 == 0;
        for &byte in data {
            let old = acc;
            let val = if even {
                u32::from(byte) << 8
            } else {
                u32::from(byte)
            };
            acc = acc.wrapping_sub(val);
            if acc > old {
                acc = acc.wrapping_sub(1);
            }
            even = !even;
        }
        self.acc = acc;
        self.consumed += data.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn finalize(self) -> u32 {
        let mut acc = self.acc;
        acc = (acc >> 16) + (acc & 0xffff);
        acc = (acc >> 16) + (acc & 0xffff);
        acc << 16
    }
}

impl Default for OftChecksum {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Checksum of an in-memory buffer.
pub fn checksum_bytes(data: &[u8]) -> u32 {
    let mut sum = OftChecksum::new();
    sum.update(data);
    sum.finalize()
}

/// Checksum of at most `max_bytes` bytes read from `reader`.
///
/// Stops early at end of input.
pub fn checksum_reader<R: Read>(mut reader: R, max_bytes: u64) -> io::Result<u32> {
    let mut sum = OftChecksum::new();
    let mut buf = vec![0u8; CHECKSUM_READ_SIZE];
    while sum.consumed() < max_bytes {
        let want = (max_bytes - sum.consumed()).min(buf.len() as u64) as usize;
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        sum.update(&buf[..n]);
    }
    Ok(sum.finalize())
}

/// Checksum of the first `max_bytes` bytes of a file, read from offset 0
/// through `store`.
pub fn checksum_file<F: FileStore>(store: &mut F, path: &Path, max_bytes: u64) -> io::Result<u32> {
    let mut handle = store.open(path, OpenMode::Read)?;
    let mut sum = OftChecksum::new();
    let result = loop {
        if sum.consumed() >= max_bytes {
            break Ok(());
        }
        let want = (max_bytes - sum.consumed()).min(CHECKSUM_READ_SIZE as u64) as usize;
        match store.read(&mut handle, want) {
            Ok(data) if data.is_empty() => break Ok(()),
            Ok(data) => sum.update(&data),
            Err(e) => break Err(e),
        }
    };
    store.close(handle)?;
    result.map(|()| sum.finalize())
}
