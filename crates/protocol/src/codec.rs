//! Fixed-record codec for transfer descriptors.
//!
//! # Wire format
//!
//! Every descriptor is a 256-byte record. All integers are big-endian.
//!
//! ```text
//! [0..4]     magic "OFT2"
//! [4..6]     record length (256)
//! [6..8]     message type
//! [8..16]    session cookie
//! [16..18]   file count
//! [18..20]   files left
//! [20..22]   part count
//! [22..24]   parts left
//! [24..32]   total size
//! [32..40]   file size
//! [40..44]   modification time
//! [44..48]   file checksum
//! [48..56]   bytes transferred
//! [56..60]   partial checksum
//! [60..62]   flags
//! [62..64]   reserved
//! [64..96]   client id, null-padded
//! [96..256]  file name (UTF-8), null-padded
//! ```
//!
//! Raw payload bytes share the stream with these records; the receiver knows
//! from its own state how many payload bytes to expect.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::constants::{CLIENT_ID, ID_FIELD_LEN, NAME_FIELD_LEN, OFT_MAGIC, RECORD_LEN};
use crate::descriptor::{Cookie, Flags, MessageType, TransferDescriptor};

/// Errors produced while decoding a descriptor record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated descriptor: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("bad record magic: {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("unsupported record length: {0}")]
    BadLength(u16),
}

/// Encodes a descriptor into a fresh 256-byte record.
pub fn encode(descriptor: &TransferDescriptor) -> Bytes {
    let mut buf = BytesMut::with_capacity(RECORD_LEN);
    encode_into(descriptor, &mut buf);
    buf.freeze()
}

/// Appends the encoded record to `buf`.
///
/// File names longer than the name field are cut on a character boundary.
pub fn encode_into(d: &TransferDescriptor, buf: &mut BytesMut) {
    buf.reserve(RECORD_LEN);
    buf.put_slice(&OFT_MAGIC);
    buf.put_u16(RECORD_LEN as u16);
    buf.put_u16(d.message_type.code());
    buf.put_slice(d.session_cookie.as_bytes());
    buf.put_u16(d.file_count);
    buf.put_u16(d.files_left);
    buf.put_u16(d.part_count);
    buf.put_u16(d.parts_left);
    buf.put_u64(d.total_size);
    buf.put_u64(d.file_size);
    buf.put_u32(d.modification_time);
    buf.put_u32(d.file_checksum);
    buf.put_u64(d.bytes_transferred);
    buf.put_u32(d.partial_checksum);
    buf.put_u16(d.flags.bits());
    buf.put_u16(0);
    put_padded(buf, CLIENT_ID, ID_FIELD_LEN);
    put_padded(buf, &d.file_name, NAME_FIELD_LEN);
}

/// Decodes exactly one record.
///
/// The input must be exactly [`RECORD_LEN`] bytes long.
pub fn decode(data: &[u8]) -> Result<TransferDescriptor, DecodeError> {
    if data.len() != RECORD_LEN {
        return Err(DecodeError::Truncated {
            expected: RECORD_LEN,
            actual: data.len(),
        });
    }

    let mut cur = data;
    let mut magic = [0u8; 4];
    cur.copy_to_slice(&mut magic);
    if magic != OFT_MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    let len = cur.get_u16();
    if len as usize != RECORD_LEN {
        return Err(DecodeError::BadLength(len));
    }

    let message_type = MessageType::from(cur.get_u16());
    let mut cookie = [0u8; Cookie::LEN];
    cur.copy_to_slice(&mut cookie);
    let file_count = cur.get_u16();
    let files_left = cur.get_u16();
    let part_count = cur.get_u16();
    let parts_left = cur.get_u16();
    let total_size = cur.get_u64();
    let file_size = cur.get_u64();
    let modification_time = cur.get_u32();
    let file_checksum = cur.get_u32();
    let bytes_transferred = cur.get_u64();
    let partial_checksum = cur.get_u32();
    let flags = Flags::from_bits_retain(cur.get_u16());
    cur.advance(2 + ID_FIELD_LEN);
    let file_name = read_padded(&cur[..NAME_FIELD_LEN]);

    Ok(TransferDescriptor {
        message_type,
        session_cookie: Cookie::from_bytes(cookie),
        file_size,
        modification_time,
        file_checksum,
        bytes_transferred,
        partial_checksum,
        flags,
        file_name,
        file_count,
        files_left,
        part_count,
        parts_left,
        total_size,
    })
}

/// Incremental decoder for records arriving over a byte stream.
pub struct FrameDecoder;

impl FrameDecoder {
    /// Decodes one record from the front of `buf`.
    ///
    /// Returns:
    /// - `Ok(Some(descriptor))` when a full record was consumed
    /// - `Ok(None)` when more bytes are needed (buffer unchanged)
    /// - `Err` when the buffered bytes cannot start a record
    pub fn decode(buf: &mut BytesMut) -> Result<Option<TransferDescriptor>, DecodeError> {
        let head = buf.len().min(OFT_MAGIC.len());
        if buf[..head] != OFT_MAGIC[..head] {
            let mut magic = [0u8; 4];
            magic[..head].copy_from_slice(&buf[..head]);
            return Err(DecodeError::BadMagic(magic));
        }

        if buf.len() < RECORD_LEN {
            return Ok(None);
        }

        let record = buf.split_to(RECORD_LEN);
        decode(&record).map(Some)
    }
}

fn put_padded(buf: &mut BytesMut, text: &str, width: usize) {
    let text = truncate_on_char_boundary(text, width);
    buf.put_slice(text.as_bytes());
    buf.put_bytes(0, width - text.len());
}

fn truncate_on_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn read_padded(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
