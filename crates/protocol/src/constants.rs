//! Record layout constants.

/// Magic bytes opening every descriptor record.
pub const OFT_MAGIC: [u8; 4] = *b"OFT2";

/// Total length of an encoded descriptor record.
pub const RECORD_LEN: usize = 256;

/// Width of the null-padded client identification field.
pub const ID_FIELD_LEN: usize = 32;

/// Width of the null-padded file name field.
pub const NAME_FIELD_LEN: usize = 160;

/// Byte offset of the client identification field.
pub const ID_FIELD_OFFSET: usize = 64;

/// Byte offset of the file name field.
pub const NAME_FIELD_OFFSET: usize = ID_FIELD_OFFSET + ID_FIELD_LEN;

/// Client identification written into every record.
pub const CLIENT_ID: &str = "Cool FileXfer";

/// Checksum of zero bytes; carried as the partial checksum before any
/// payload has been persisted.
pub const CHECKSUM_SEED: u32 = 0xffff_0000;

// Message type codes.
pub const TYPE_PROMPT: u16 = 0x0101;
pub const TYPE_ACK: u16 = 0x0202;
pub const TYPE_RESUME_REQUEST: u16 = 0x0205;
pub const TYPE_RESUME_ACK_RECEIVER: u16 = 0x0106;
pub const TYPE_RESUME_ACK_SENDER: u16 = 0x0207;
pub const TYPE_DONE: u16 = 0x0204;
