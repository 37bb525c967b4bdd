//! Registry of running transfers, keyed by session cookie.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use oftlink_protocol::Cookie;
use oftlink_transfer::{SessionOutcome, TransferConfig, TransferEvent};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::send_files;
use crate::error::ChannelError;
use crate::server::receive_files;

struct ActiveTransfer {
    cancel: CancellationToken,
    handle: JoinHandle<Result<SessionOutcome, ChannelError>>,
}

/// Owns the transfers started through it. Each runs as its own tokio task
/// with its own cancellation token; events go to the sender handed in.
pub struct TransferManager {
    config: TransferConfig,
    transfers: HashMap<Cookie, ActiveTransfer>,
}

impl TransferManager {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            transfers: HashMap::new(),
        }
    }

    /// Starts sending `files` to `addr`.
    pub fn send(
        &mut self,
        addr: SocketAddr,
        cookie: Cookie,
        files: Vec<PathBuf>,
        events: UnboundedSender<TransferEvent>,
    ) -> Result<(), ChannelError> {
        self.ensure_free(cookie)?;
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let config = self.config.clone();
        let handle = tokio::spawn(async move {
            send_files(addr, cookie, files, config, events, &task_cancel).await
        });
        info!(%cookie, %addr, "outgoing transfer started");
        self.transfers.insert(cookie, ActiveTransfer { cancel, handle });
        Ok(())
    }

    /// Starts accepting one peer on `listener` for the session `cookie`.
    pub fn receive(
        &mut self,
        listener: TcpListener,
        dest_dir: PathBuf,
        cookie: Cookie,
        events: UnboundedSender<TransferEvent>,
    ) -> Result<(), ChannelError> {
        self.ensure_free(cookie)?;
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let config = self.config.clone();
        let handle = tokio::spawn(async move {
            receive_files(
                &listener,
                dest_dir,
                Some(cookie),
                config,
                events,
                &task_cancel,
            )
            .await
        });
        info!(%cookie, "incoming transfer started");
        self.transfers.insert(cookie, ActiveTransfer { cancel, handle });
        Ok(())
    }

    /// Cancels one transfer. Returns `false` if the cookie is unknown.
    pub fn cancel(&self, cookie: &Cookie) -> bool {
        match self.transfers.get(cookie) {
            Some(transfer) => {
                debug!(%cookie, "cancelling transfer");
                transfer.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for transfer in self.transfers.values() {
            transfer.cancel.cancel();
        }
    }

    /// Waits for a transfer to end and forgets it.
    pub async fn wait(&mut self, cookie: &Cookie) -> Result<SessionOutcome, ChannelError> {
        let transfer = self
            .transfers
            .remove(cookie)
            .ok_or(ChannelError::UnknownCookie(*cookie))?;
        transfer
            .handle
            .await
            .map_err(|e| ChannelError::Task(e.to_string()))?
    }

    /// Cookies of transfers whose task is still running.
    pub fn active(&self) -> Vec<Cookie> {
        self.transfers
            .iter()
            .filter(|(_, t)| !t.handle.is_finished())
            .map(|(cookie, _)| *cookie)
            .collect()
    }

    fn ensure_free(&mut self, cookie: Cookie) -> Result<(), ChannelError> {
        // Finished transfers nobody waited for no longer block their cookie.
        self.transfers.retain(|_, t| !t.handle.is_finished());
        if self.transfers.contains_key(&cookie) {
            return Err(ChannelError::DuplicateCookie(cookie));
        }
        Ok(())
    }
}

impl Drop for TransferManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
