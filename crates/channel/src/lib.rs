//! TCP transport for the OFT transfer engine.
//!
//! [`TcpByteStream`] adapts a non-blocking tokio socket to the engine's
//! [`ByteStream`](oftlink_transfer::ByteStream) contract and [`drive`] runs a
//! session on it until the session reports an outcome. Connection setup is
//! limited to a direct connect and a single accept; anything smarter belongs
//! to the caller.

pub mod client;
pub mod driver;
pub mod error;
pub mod manager;
pub mod server;
pub mod stream;

pub use client::{connect, send_files};
pub use driver::drive;
pub use error::ChannelError;
pub use manager::TransferManager;
pub use server::{accept_one, listen, receive_files};
pub use stream::TcpByteStream;

use std::time::Duration;

/// Timeout for the outgoing TCP connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a receiver waits for its peer to connect.
pub const ACCEPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Socket read size.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Upper bound on bytes drained from the socket per readiness event.
pub const MAX_READ_PER_POLL: usize = 1024 * 1024;
