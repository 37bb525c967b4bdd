//! Command-line arguments.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use oftlink_protocol::Cookie;

/// Direct peer-to-peer file transfer over the OFT protocol.
#[derive(Debug, Parser)]
#[command(name = "oftlink", version, about)]
pub struct Cli {
    /// JSON file with transfer settings.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Offer files to a listening receiver.
    Send(SendArgs),
    /// Accept one sender and store its files.
    Receive(ReceiveArgs),
    /// Print the OFT checksum of a file.
    Checksum(ChecksumArgs),
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Receiver address.
    #[arg(long)]
    pub to: SocketAddr,

    /// Session cookie as 16 hex digits; random if omitted.
    #[arg(long)]
    pub cookie: Option<Cookie>,

    /// Files to send, in order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReceiveArgs {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:5190")]
    pub listen: SocketAddr,

    /// Destination directory.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Only accept this session cookie.
    #[arg(long)]
    pub cookie: Option<Cookie>,
}

#[derive(Debug, Args)]
pub struct ChecksumArgs {
    pub file: PathBuf,

    /// Only checksum the first N bytes.
    #[arg(long)]
    pub bytes: Option<u64>,
}
