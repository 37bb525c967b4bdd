use std::io;

use oftlink_protocol::constants::CHECKSUM_SEED;
use oftlink_protocol::{MessageType, TransferDescriptor};
use tracing::{debug, info, warn};

use super::{TransferSession, TransferState};
use crate::checksum::checksum_file;
use crate::events::{EventSink, TransferEvent};
use crate::sequencer::{OutgoingFile, SequenceStep};
use crate::store::{FileStore, OpenMode};
use crate::stream::ByteStream;
use crate::TransferError;

impl<S: ByteStream, F: FileStore, E: EventSink> TransferSession<S, F, E> {
    pub(super) fn begin_outgoing(&mut self) -> Result<(), TransferError> {
        let paths = std::mem::take(&mut self.pending_paths);
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let size = self.store.size(&path)?.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| TransferError::InvalidPath(path.display().to_string()))?;
            files.push(OutgoingFile { path, name, size });
        }

        self.sequencer.start(files)?;
        if self.sequencer.files_left() == 0 {
            return Err(TransferError::NoFiles);
        }
        info!(
            cookie = %self.cookie.unwrap_or_default(),
            files = self.sequencer.file_count(),
            total_size = self.sequencer.total_size(),
            "starting outgoing session"
        );
        self.prompt_next()
    }

    /// Announces the next queued file.
    fn prompt_next(&mut self) -> Result<(), TransferError> {
        let file = self
            .sequencer
            .next_file()
            .cloned()
            .ok_or(TransferError::NoFiles)?;
        let modification_time = self.store.modified(&file.path)?;
        let file_checksum = checksum_file(&mut self.store, &file.path, file.size)?;

        let mut d = TransferDescriptor::new(self.cookie.unwrap_or_default());
        d.file_size = file.size;
        d.modification_time = modification_time;
        d.file_checksum = file_checksum;
        d.file_name = file.name.clone();
        self.sequencer.stamp(&mut d);

        self.descriptor = d;
        self.local_path = Some(file.path);
        self.resume_offered = false;
        self.state = TransferState::SetupSend;

        info!(
            name = %file.name,
            size = file.size,
            files_left = self.descriptor.files_left,
            "offering file"
        );
        self.sink.emit(TransferEvent::FileOutgoing {
            name: file.name,
            size: file.size,
        });
        self.send_descriptor(MessageType::Prompt)
    }

    pub(super) fn on_ack(&mut self) -> Result<(), TransferError> {
        self.open_source(0)
    }

    /// Checks the receiver's claimed prefix against the local file. The
    /// claimed offset is kept only if its checksum matches; otherwise the
    /// answer carries offset 0.
    pub(super) fn on_resume_request(&mut self, d: TransferDescriptor) -> Result<(), TransferError> {
        let path = self.local_path()?;
        let claimed = d.bytes_transferred;
        let offset = if claimed > 0
            && claimed <= self.descriptor.file_size
            && checksum_file(&mut self.store, &path, claimed)? == d.partial_checksum
        {
            info!(name = %self.descriptor.file_name, offset = claimed, "resuming");
            claimed
        } else {
            warn!(
                name = %self.descriptor.file_name,
                claimed,
                "resume prefix does not match, restarting from offset 0"
            );
            0
        };

        self.descriptor.bytes_transferred = offset;
        self.descriptor.partial_checksum = if offset > 0 {
            d.partial_checksum
        } else {
            CHECKSUM_SEED
        };
        self.resume_offered = true;
        self.send_descriptor(MessageType::ResumeAckSender)
    }

    pub(super) fn on_resume_confirmed(&mut self) -> Result<(), TransferError> {
        self.resume_offered = false;
        let offset = self.descriptor.bytes_transferred;
        self.open_source(offset)
    }

    fn open_source(&mut self, offset: u64) -> Result<(), TransferError> {
        let path = self.local_path()?;
        let mut handle = self.store.open(&path, OpenMode::Read)?;
        if offset > 0 {
            if let Err(e) = self.store.seek(&mut handle, offset) {
                // The handle is useless now; the seek error is the one to report.
                let _ = self.store.close(handle);
                return Err(e.into());
            }
        }
        self.file = Some(handle);
        self.descriptor.bytes_transferred = offset;
        self.state = TransferState::Sending;
        debug!(
            name = %self.descriptor.file_name,
            offset,
            size = self.descriptor.file_size,
            "sending payload"
        );
        Ok(())
    }

    /// Flushes queued output, then reads and queues one chunk when the
    /// stream is idle.
    pub(super) fn pump_payload(&mut self) -> Result<(), TransferError> {
        self.flush_outbound()?;
        if self.state != TransferState::Sending
            || !self.outbound.is_empty()
            || self.stream.pending_write_bytes() > 0
        {
            return Ok(());
        }
        let remaining = self.descriptor.remaining();
        if remaining == 0 {
            return Ok(());
        }

        let want = remaining.min(self.config.chunk_size as u64) as usize;
        let handle = self
            .file
            .as_mut()
            .ok_or_else(|| TransferError::Io(io::Error::other("source file is not open")))?;
        let data = self.store.read(handle, want)?;
        if data.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{} ended at {} of {} bytes",
                    self.descriptor.file_name,
                    self.descriptor.bytes_transferred,
                    self.descriptor.file_size
                ),
            )
            .into());
        }

        self.outbound.extend_from_slice(&data);
        self.descriptor.bytes_transferred += data.len() as u64;
        self.sink.emit(TransferEvent::FileProcessed {
            bytes_transferred: self.descriptor.bytes_transferred,
            file_size: self.descriptor.file_size,
        });
        if self.descriptor.remaining() == 0 {
            debug!(name = %self.descriptor.file_name, "payload queued, waiting for done");
        }
        Ok(())
    }

    /// The receiver confirmed the file, either after the payload or because
    /// it already held an identical copy.
    pub(super) fn on_done(&mut self, d: TransferDescriptor) -> Result<(), TransferError> {
        if d.bytes_transferred != self.descriptor.file_size {
            return Err(TransferError::Malformed(format!(
                "done reports {} of {} bytes",
                d.bytes_transferred, self.descriptor.file_size
            )));
        }
        self.close_file()?;
        let expected = self.descriptor.file_checksum;
        if d.partial_checksum != expected {
            self.checksum_mismatch(expected, d.partial_checksum)?;
        }

        let name = self.descriptor.file_name.clone();
        let bytes_transferred = self.descriptor.bytes_transferred;
        info!(name = %name, bytes_transferred, "file sent");
        self.sink.emit(TransferEvent::FileSent {
            name,
            bytes_transferred,
        });

        match self.sequencer.on_file_completed() {
            SequenceStep::NextFile => self.prompt_next(),
            SequenceStep::SessionComplete => {
                self.finish();
                Ok(())
            }
        }
    }
}
