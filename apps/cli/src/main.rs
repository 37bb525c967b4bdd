//! oftlink entry point.

mod cli;
mod config;

use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use oftlink_channel::{listen, receive_files, send_files};
use oftlink_protocol::Cookie;
use oftlink_transfer::{
    FsStore, ProgressSnapshot, ProgressTracker, SessionOutcome, TransferConfig, TransferEvent,
    checksum_file,
};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{ChecksumArgs, Cli, Command, ReceiveArgs, SendArgs};

/// Minimum spacing between progress log lines.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting oftlink");

    let config = config::load(cli.config.as_deref());
    match cli.command {
        Command::Send(args) => send(args, config).await,
        Command::Receive(args) => receive(args, config).await,
        Command::Checksum(args) => checksum(args),
    }
}

async fn send(args: SendArgs, config: TransferConfig) -> anyhow::Result<()> {
    let cookie = args.cookie.unwrap_or_else(Cookie::generate);
    info!(%cookie, to = %args.to, files = args.files.len(), "sending");

    let cancel = cancel_on_ctrl_c();
    let (events, rx) = unbounded_channel();
    let reporter = tokio::spawn(report(rx));

    let outcome = send_files(args.to, cookie, args.files, config, events, &cancel).await?;
    let summary = reporter.await.context("progress reporter panicked")?;
    finish(outcome, &summary)
}

async fn receive(args: ReceiveArgs, config: TransferConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.dir)
        .with_context(|| format!("creating {}", args.dir.display()))?;

    let (listener, local) = listen(args.listen).await?;
    info!(%local, dir = %args.dir.display(), "waiting for sender");

    let cancel = cancel_on_ctrl_c();
    let (events, rx) = unbounded_channel();
    let reporter = tokio::spawn(report(rx));

    let outcome =
        receive_files(&listener, args.dir, args.cookie, config, events, &cancel).await?;
    let summary = reporter.await.context("progress reporter panicked")?;
    finish(outcome, &summary)
}

fn checksum(args: ChecksumArgs) -> anyhow::Result<()> {
    let mut store = FsStore::new();
    let len = std::fs::metadata(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?
        .len();
    let max = args.bytes.map_or(len, |n| n.min(len));
    let sum = checksum_file(&mut store, &args.file, max)?;
    println!("{sum:08x}  {max:>10}  {}", args.file.display());
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling transfer");
            token.cancel();
        }
    });
    cancel
}

/// Logs session events until the session drops its sender.
async fn report(mut rx: UnboundedReceiver<TransferEvent>) -> ProgressSnapshot {
    let mut tracker = ProgressTracker::new();
    let mut last_log: Option<Instant> = None;

    while let Some(event) = rx.recv().await {
        tracker.observe(&event);
        match &event {
            TransferEvent::FileIncoming { name, size } => {
                info!(name = %name, size, "incoming file");
            }
            TransferEvent::FileOutgoing { name, size } => {
                info!(name = %name, size, "outgoing file");
            }
            TransferEvent::FileProcessed {
                bytes_transferred,
                file_size,
            } => {
                let due = last_log.is_none_or(|t| t.elapsed() >= PROGRESS_LOG_INTERVAL);
                if due || bytes_transferred == file_size {
                    let snap = tracker.snapshot();
                    info!(
                        bytes = bytes_transferred,
                        size = file_size,
                        percent = format_args!("{:.1}", tracker.percent()),
                        rate = format_args!("{:.0} B/s", snap.bytes_per_second),
                        eta = ?tracker.eta(),
                        "progress"
                    );
                    last_log = Some(Instant::now());
                }
            }
            TransferEvent::FileReceived {
                name,
                bytes_transferred,
            } => info!(name = %name, bytes = bytes_transferred, "file received"),
            TransferEvent::FileSent {
                name,
                bytes_transferred,
            } => info!(name = %name, bytes = bytes_transferred, "file sent"),
            TransferEvent::TransferCompleted | TransferEvent::TransferFailed { .. } => {}
        }
    }

    tracker.snapshot()
}

fn finish(outcome: SessionOutcome, summary: &ProgressSnapshot) -> anyhow::Result<()> {
    match outcome {
        SessionOutcome::Completed => {
            info!(
                files = summary.files_done,
                bytes = summary.bytes_done,
                "transfer complete"
            );
            Ok(())
        }
        SessionOutcome::Failed { reason, message } => {
            anyhow::bail!(
                "transfer failed ({reason:?}) after {} file(s): {message}",
                summary.files_done
            )
        }
    }
}
