use std::fmt;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{
    CHECKSUM_SEED, TYPE_ACK, TYPE_DONE, TYPE_PROMPT, TYPE_RESUME_ACK_RECEIVER,
    TYPE_RESUME_ACK_SENDER, TYPE_RESUME_REQUEST,
};

/// Descriptor message type.
///
/// Codes outside the known set decode as [`MessageType::Unknown`] so the
/// state machine can reject them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Sender offers a file.
    Prompt,
    /// Receiver accepts the offered file from offset 0.
    Ack,
    /// Receiver asks to continue from the bytes it already holds.
    ResumeRequest,
    /// Receiver confirms the resume offset chosen by the sender.
    ResumeAckReceiver,
    /// Sender answers a resume request with the offset it will stream from.
    ResumeAckSender,
    /// Receiver reports the file complete.
    Done,
    /// Any other code.
    Unknown(u16),
}

impl MessageType {
    /// Returns the wire code.
    pub fn code(self) -> u16 {
        match self {
            Self::Prompt => TYPE_PROMPT,
            Self::Ack => TYPE_ACK,
            Self::ResumeRequest => TYPE_RESUME_REQUEST,
            Self::ResumeAckReceiver => TYPE_RESUME_ACK_RECEIVER,
            Self::ResumeAckSender => TYPE_RESUME_ACK_SENDER,
            Self::Done => TYPE_DONE,
            Self::Unknown(code) => code,
        }
    }
}

impl From<u16> for MessageType {
    fn from(code: u16) -> Self {
        match code {
            TYPE_PROMPT => Self::Prompt,
            TYPE_ACK => Self::Ack,
            TYPE_RESUME_REQUEST => Self::ResumeRequest,
            TYPE_RESUME_ACK_RECEIVER => Self::ResumeAckReceiver,
            TYPE_RESUME_ACK_SENDER => Self::ResumeAckSender,
            TYPE_DONE => Self::Done,
            other => Self::Unknown(other),
        }
    }
}

impl From<MessageType> for u16 {
    fn from(t: MessageType) -> Self {
        t.code()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt => write!(f, "prompt"),
            Self::Ack => write!(f, "ack"),
            Self::ResumeRequest => write!(f, "resume-request"),
            Self::ResumeAckReceiver => write!(f, "resume-ack-receiver"),
            Self::ResumeAckSender => write!(f, "resume-ack-sender"),
            Self::Done => write!(f, "done"),
            Self::Unknown(code) => write!(f, "unknown({code:#06x})"),
        }
    }
}

/// Session correlation token, chosen by the initiating peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cookie([u8; 8]);

impl Cookie {
    /// Wire width of a cookie.
    pub const LEN: usize = 8;

    /// Draws a fresh random cookie.
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::LEN];
        rand::thread_rng().fill(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cookie({self})")
    }
}

impl From<Cookie> for String {
    fn from(cookie: Cookie) -> Self {
        cookie.to_string()
    }
}

impl std::str::FromStr for Cookie {
    type Err = hex::FromHexError;

    /// Parses 16 hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; Self::LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Cookie {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

bitflags::bitflags! {
    /// Descriptor flag bits. Reserved bits are carried through unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        /// The described file has been transferred completely.
        const COMPLETE = 0x0001;
    }
}

impl Serialize for Flags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Flags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u16::deserialize(deserializer).map(Self::from_bits_retain)
    }
}

/// The control record exchanged to negotiate and track one file.
///
/// `bytes_transferred` never exceeds `file_size`, and `partial_checksum`
/// covers exactly the first `bytes_transferred` bytes of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDescriptor {
    pub message_type: MessageType,
    pub session_cookie: Cookie,
    pub file_size: u64,
    /// Seconds since the Unix epoch, as reported by the sender.
    pub modification_time: u32,
    pub file_checksum: u32,
    pub bytes_transferred: u64,
    pub partial_checksum: u32,
    pub flags: Flags,
    pub file_name: String,
    pub file_count: u16,
    pub files_left: u16,
    pub part_count: u16,
    pub parts_left: u16,
    pub total_size: u64,
}

impl TransferDescriptor {
    /// Creates an empty prompt for the given session.
    pub fn new(session_cookie: Cookie) -> Self {
        Self {
            message_type: MessageType::Prompt,
            session_cookie,
            file_size: 0,
            modification_time: 0,
            file_checksum: CHECKSUM_SEED,
            bytes_transferred: 0,
            partial_checksum: CHECKSUM_SEED,
            flags: Flags::empty(),
            file_name: String::new(),
            file_count: 0,
            files_left: 0,
            part_count: 1,
            parts_left: 1,
            total_size: 0,
        }
    }

    /// Returns `true` if the complete flag is set.
    pub fn is_complete(&self) -> bool {
        self.flags.contains(Flags::COMPLETE)
    }

    /// Bytes still to be transferred for the described file.
    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.bytes_transferred)
    }
}
