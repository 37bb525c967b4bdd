//! Wire types for OFT peer file transfers.
//!
//! A transfer is negotiated and tracked with a single fixed-size record, the
//! [`TransferDescriptor`], exchanged over a direct byte stream between two
//! peers. Raw file payload travels on the same stream between descriptors.
//!
//! # Wire format
//!
//! See [`codec`] for the record layout.

pub mod codec;
pub mod constants;
pub mod descriptor;

pub use codec::{DecodeError, FrameDecoder, decode, encode, encode_into};
pub use descriptor::{Cookie, Flags, MessageType, TransferDescriptor};
