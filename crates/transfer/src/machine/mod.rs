//! Per-session protocol state machine.
//!
//! One [`TransferSession`] drives every file of a session over a single
//! stream. Descriptors and raw payload share that stream; while
//! [`TransferState::Receiving`] the next `file_size - bytes_transferred`
//! inbound bytes are payload, otherwise inbound bytes are descriptor records.

mod receiver;
mod sender;

use std::fmt;
use std::io;
use std::path::PathBuf;

use bytes::{Buf, BytesMut};
use oftlink_protocol::{Cookie, FrameDecoder, MessageType, TransferDescriptor, encode_into};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ChecksumPolicy, TransferConfig};
use crate::events::{EventSink, FailureReason, TransferEvent};
use crate::sequencer::SessionSequencer;
use crate::store::FileStore;
use crate::stream::ByteStream;
use crate::TransferError;

/// Protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Waiting for a prompt, or for the sender's answer to a resume request.
    SetupReceive,
    /// A prompt is out; waiting for the receiver's answer.
    SetupSend,
    Receiving,
    Sending,
    /// The session has completed.
    Done,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetupReceive => write!(f, "setup-receive"),
            Self::SetupSend => write!(f, "setup-send"),
            Self::Receiving => write!(f, "receiving"),
            Self::Sending => write!(f, "sending"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Which side of the session this peer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Sender,
    Receiver,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Failed {
        reason: FailureReason,
        message: String,
    },
}

/// A transfer session: the stream, the local file store, the event sink,
/// the live descriptor and the file handle for the file in flight.
///
/// The session never blocks. The host calls [`on_readable`](Self::on_readable)
/// when the stream has input and [`pump`](Self::pump) when it can take more
/// output; [`wants_write`](Self::wants_write) says whether pumping would do
/// anything. Every failure is reported once through the sink as
/// `TransferFailed` and recorded in [`outcome`](Self::outcome).
pub struct TransferSession<S, F: FileStore, E> {
    role: Role,
    state: TransferState,
    config: TransferConfig,
    stream: S,
    store: F,
    sink: E,
    sequencer: SessionSequencer,
    descriptor: TransferDescriptor,
    cookie: Option<Cookie>,
    file: Option<F::Handle>,
    local_path: Option<PathBuf>,
    dest_dir: PathBuf,
    /// Paths handed to a sender, consumed by `start`.
    pending_paths: Vec<PathBuf>,
    /// Sender: resume answer sent, waiting for the receiver's confirmation.
    resume_offered: bool,
    /// Receiver: resume requested for this many locally held bytes.
    resume_held: Option<u64>,
    inbound: BytesMut,
    outbound: BytesMut,
    started: bool,
    closing: bool,
    outcome: Option<SessionOutcome>,
}

impl<S: ByteStream, F: FileStore, E: EventSink> TransferSession<S, F, E> {
    /// Creates the initiating side of a session offering `files`.
    pub fn sender(
        cookie: Cookie,
        files: Vec<PathBuf>,
        stream: S,
        store: F,
        sink: E,
        config: TransferConfig,
    ) -> Self {
        let mut session = Self::with_role(Role::Sender, stream, store, sink, config);
        session.cookie = Some(cookie);
        session.descriptor.session_cookie = cookie;
        session.pending_paths = files;
        session
    }

    /// Creates the accepting side of a session storing files in `dest_dir`.
    pub fn receiver(
        dest_dir: impl Into<PathBuf>,
        stream: S,
        store: F,
        sink: E,
        config: TransferConfig,
    ) -> Self {
        let mut session = Self::with_role(Role::Receiver, stream, store, sink, config);
        session.dest_dir = dest_dir.into();
        session
    }

    /// Only accept descriptors carrying `cookie`.
    ///
    /// Without this a receiver adopts the cookie of the first prompt.
    pub fn expect_cookie(mut self, cookie: Cookie) -> Self {
        self.cookie = Some(cookie);
        self
    }

    fn with_role(role: Role, stream: S, store: F, sink: E, config: TransferConfig) -> Self {
        let state = match role {
            Role::Sender => TransferState::SetupSend,
            Role::Receiver => TransferState::SetupReceive,
        };
        Self {
            role,
            state,
            config: config.normalized(),
            stream,
            store,
            sink,
            sequencer: match role {
                Role::Sender => SessionSequencer::outgoing(),
                Role::Receiver => SessionSequencer::incoming(),
            },
            descriptor: TransferDescriptor::new(Cookie::default()),
            cookie: None,
            file: None,
            local_path: None,
            dest_dir: PathBuf::new(),
            pending_paths: Vec::new(),
            resume_offered: false,
            resume_held: None,
            inbound: BytesMut::new(),
            outbound: BytesMut::new(),
            started: false,
            closing: false,
            outcome: None,
        }
    }

    // -----------------------------------------------------------------------
    // Host entry points
    // -----------------------------------------------------------------------

    /// Starts the session. A sender prompts its first file; a sender with no
    /// files cancels immediately without any exchange.
    pub fn start(&mut self) {
        if self.started || self.outcome.is_some() {
            return;
        }
        self.started = true;
        let result = match self.role {
            Role::Sender => self.begin_outgoing(),
            Role::Receiver => {
                debug!(dir = %self.dest_dir.display(), "waiting for prompt");
                Ok(())
            }
        };
        self.settle(result);
    }

    /// Consumes whatever the stream has available.
    pub fn on_readable(&mut self) {
        if !self.started {
            self.start();
        }
        if self.outcome.is_some() {
            return;
        }
        let result = self.read_and_process();
        self.settle(result);
    }

    /// Flushes queued output and, while sending, pushes one payload chunk.
    ///
    /// Nothing is written while the stream reports pending bytes.
    pub fn pump(&mut self) {
        if self.outcome.is_some() {
            if self.closing {
                if let Err(e) = self.flush_outbound() {
                    debug!(error = %e, "flush after completion failed");
                }
            }
            return;
        }
        if !self.started {
            self.start();
            return;
        }
        let result = self.pump_payload();
        self.settle(result);
    }

    /// Reports a stream failure seen by the host.
    pub fn on_stream_error(&mut self, err: io::Error) {
        self.fail(TransferError::ConnectionLost(err.to_string()));
    }

    /// Reports that the peer closed the stream. Ignored once finished.
    pub fn on_stream_closed(&mut self) {
        self.fail(TransferError::ConnectionLost("peer closed the stream".into()));
    }

    /// Cancels immediately: closes the stream and the local file. Partially
    /// written destination files stay on disk.
    pub fn cancel(&mut self) {
        self.fail(TransferError::Cancelled);
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// The descriptor of the file in flight.
    pub fn descriptor(&self) -> &TransferDescriptor {
        &self.descriptor
    }

    pub fn sequencer(&self) -> &SessionSequencer {
        &self.sequencer
    }

    pub fn cookie(&self) -> Option<Cookie> {
        self.cookie
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Returns `true` if [`pump`](Self::pump) has output to produce.
    pub fn wants_write(&self) -> bool {
        if self.closing || !self.outbound.is_empty() {
            return true;
        }
        self.outcome.is_none()
            && self.state == TransferState::Sending
            && self.file.is_some()
            && self.descriptor.remaining() > 0
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut E {
        &mut self.sink
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    // -----------------------------------------------------------------------
    // Plumbing shared by both roles
    // -----------------------------------------------------------------------

    fn settle(&mut self, result: Result<(), TransferError>) {
        let result = result.and_then(|()| self.flush_outbound());
        if let Err(e) = result {
            self.fail(e);
        }
    }

    fn read_and_process(&mut self) -> Result<(), TransferError> {
        let bytes = match self.stream.read_available() {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(TransferError::ConnectionLost(
                    "peer closed the stream".into(),
                ));
            }
            Err(e) => return Err(TransferError::ConnectionLost(e.to_string())),
        };
        self.inbound.extend_from_slice(&bytes);
        self.process_inbound()
    }

    fn process_inbound(&mut self) -> Result<(), TransferError> {
        while self.outcome.is_none() {
            if self.state == TransferState::Receiving {
                if self.inbound.is_empty() {
                    break;
                }
                let take = self.descriptor.remaining().min(self.inbound.len() as u64) as usize;
                let chunk = self.inbound.split_to(take);
                self.receive_payload(&chunk)?;
                continue;
            }
            match FrameDecoder::decode(&mut self.inbound)? {
                Some(descriptor) => self.handle_descriptor(descriptor)?,
                None => break,
            }
        }
        Ok(())
    }

    fn handle_descriptor(&mut self, d: TransferDescriptor) -> Result<(), TransferError> {
        debug!(
            kind = %d.message_type,
            state = %self.state,
            bytes = d.bytes_transferred,
            "descriptor received"
        );
        if let MessageType::Unknown(code) = d.message_type {
            warn!(code, state = %self.state, "unknown descriptor type");
            return Err(self.unsupported(d.message_type));
        }
        self.check_cookie(&d)?;

        use MessageType as M;
        use TransferState as T;
        match (self.role, self.state, d.message_type) {
            (Role::Receiver, T::SetupReceive, M::Prompt) if self.resume_held.is_none() => {
                self.on_prompt(d)
            }
            (Role::Receiver, T::SetupReceive, M::ResumeAckSender) if self.resume_held.is_some() => {
                self.on_resume_accepted(d)
            }
            (Role::Sender, T::SetupSend, M::Ack) if !self.resume_offered => self.on_ack(),
            (Role::Sender, T::SetupSend, M::ResumeRequest) if !self.resume_offered => {
                self.on_resume_request(d)
            }
            (Role::Sender, T::SetupSend, M::ResumeAckReceiver) if self.resume_offered => {
                self.on_resume_confirmed()
            }
            // Done before any answer: the receiver already holds the file.
            (Role::Sender, T::SetupSend, M::Done) if !self.resume_offered => self.on_done(d),
            (Role::Sender, T::Sending, M::Done) if self.descriptor.remaining() == 0 => {
                self.on_done(d)
            }
            (_, _, message_type) => Err(self.unsupported(message_type)),
        }
    }

    fn check_cookie(&mut self, d: &TransferDescriptor) -> Result<(), TransferError> {
        match self.cookie {
            Some(cookie) if cookie != d.session_cookie => Err(TransferError::Malformed(format!(
                "foreign session cookie {} (expected {cookie})",
                d.session_cookie
            ))),
            Some(_) => Ok(()),
            None => {
                self.cookie = Some(d.session_cookie);
                Ok(())
            }
        }
    }

    fn unsupported(&self, message_type: MessageType) -> TransferError {
        TransferError::UnsupportedAction {
            message_type,
            state: self.state,
        }
    }

    /// Encodes the live descriptor with `message_type` and queues it.
    fn send_descriptor(&mut self, message_type: MessageType) -> Result<(), TransferError> {
        self.descriptor.message_type = message_type;
        if let Some(cookie) = self.cookie {
            self.descriptor.session_cookie = cookie;
        }
        encode_into(&self.descriptor, &mut self.outbound);
        debug!(
            kind = %message_type,
            file = %self.descriptor.file_name,
            bytes = self.descriptor.bytes_transferred,
            "descriptor sent"
        );
        self.flush_outbound()
    }

    /// Hands queued output to the stream unless it still has bytes pending.
    fn flush_outbound(&mut self) -> Result<(), TransferError> {
        if !self.outbound.is_empty() && self.stream.pending_write_bytes() == 0 {
            let n = self
                .stream
                .write(&self.outbound)
                .map_err(|e| TransferError::ConnectionLost(e.to_string()))?;
            self.outbound.advance(n.min(self.outbound.len()));
        }
        if self.closing && self.outbound.is_empty() {
            self.closing = false;
            self.stream.close();
            debug!("stream closed");
        }
        Ok(())
    }

    fn local_path(&self) -> Result<PathBuf, TransferError> {
        self.local_path
            .clone()
            .ok_or_else(|| TransferError::Io(io::Error::other("no file in flight")))
    }

    fn dest_path(&self, name: &str) -> PathBuf {
        self.dest_dir.join(name)
    }

    fn close_file(&mut self) -> Result<(), TransferError> {
        if let Some(handle) = self.file.take() {
            self.store.close(handle)?;
        }
        Ok(())
    }

    fn checksum_mismatch(&self, expected: u32, actual: u32) -> Result<(), TransferError> {
        match self.config.checksum_policy {
            ChecksumPolicy::Strict => Err(TransferError::ChecksumMismatch { expected, actual }),
            ChecksumPolicy::Lenient => {
                warn!(
                    file = %self.descriptor.file_name,
                    expected = format_args!("{expected:#010x}"),
                    actual = format_args!("{actual:#010x}"),
                    "checksum mismatch ignored"
                );
                Ok(())
            }
        }
    }

    fn finish(&mut self) {
        self.state = TransferState::Done;
        self.closing = true;
        info!(
            files = self.sequencer.completed(),
            total_size = self.sequencer.total_size(),
            "transfer session completed"
        );
        self.outcome = Some(SessionOutcome::Completed);
        self.sink.emit(TransferEvent::TransferCompleted);
    }

    fn fail(&mut self, err: TransferError) {
        if self.outcome.is_some() {
            return;
        }
        let reason = err.reason();
        let message = err.to_string();
        if reason == FailureReason::Cancelled {
            info!(%message, state = %self.state, "transfer session cancelled");
        } else {
            warn!(?reason, %message, state = %self.state, "transfer session failed");
        }

        if let Some(handle) = self.file.take() {
            if let Err(e) = self.store.close(handle) {
                debug!(error = %e, "closing local file after failure");
            }
        }
        if !self.outbound.is_empty() {
            debug!(bytes = self.outbound.len(), "dropping queued output");
        }
        self.outbound.clear();
        self.closing = false;
        self.stream.close();
        self.sequencer.on_session_cancelled();

        self.outcome = Some(SessionOutcome::Failed {
            reason,
            message: message.clone(),
        });
        self.sink.emit(TransferEvent::TransferFailed { reason, message });
    }
}
