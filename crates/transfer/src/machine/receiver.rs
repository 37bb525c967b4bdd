use std::io;

use oftlink_protocol::constants::CHECKSUM_SEED;
use oftlink_protocol::{Flags, MessageType, TransferDescriptor};
use tracing::{debug, info};

use super::{TransferSession, TransferState};
use crate::checksum::checksum_file;
use crate::events::{EventSink, TransferEvent};
use crate::sequencer::SequenceStep;
use crate::store::{FileStore, OpenMode};
use crate::stream::ByteStream;
use crate::validation::validate_file_name;
use crate::TransferError;

impl<S: ByteStream, F: FileStore, E: EventSink> TransferSession<S, F, E> {
    /// Handles the announcement of the next file.
    ///
    /// Depending on what is already on disk the receiver either skips the
    /// payload (identical copy), asks to resume (shorter prefix) or accepts
    /// the file from offset 0.
    pub(super) fn on_prompt(&mut self, prompt: TransferDescriptor) -> Result<(), TransferError> {
        if prompt.files_left == 0 {
            return Err(TransferError::NoFiles);
        }
        validate_file_name(&prompt.file_name)?;

        self.sequencer.observe_prompt(&prompt);
        let path = self.dest_path(&prompt.file_name);
        let name = prompt.file_name.clone();
        let size = prompt.file_size;

        self.descriptor = prompt;
        self.descriptor.bytes_transferred = 0;
        self.descriptor.partial_checksum = CHECKSUM_SEED;
        self.descriptor.flags = Flags::empty();
        self.local_path = Some(path.clone());

        info!(
            name = %name,
            size,
            files_left = self.descriptor.files_left,
            "incoming file"
        );
        self.sink.emit(TransferEvent::FileIncoming {
            name: name.clone(),
            size,
        });

        let held = self.store.size(&path)?.unwrap_or(0);
        if held == size && size > 0 && self.config.skip_existing {
            let sum = checksum_file(&mut self.store, &path, size)?;
            if sum == self.descriptor.file_checksum {
                info!(name = %name, "identical copy present, skipping payload");
                return self.finish_received_file(sum);
            }
            debug!(name = %name, "same size but different content, replacing");
        } else if held > 0 && held < size && self.config.allow_resume {
            let partial = checksum_file(&mut self.store, &path, held)?;
            self.descriptor.bytes_transferred = held;
            self.descriptor.partial_checksum = partial;
            self.resume_held = Some(held);
            info!(name = %name, held, "asking to resume");
            return self.send_descriptor(MessageType::ResumeRequest);
        }

        let handle = self.store.open(&path, OpenMode::Create)?;
        self.file = Some(handle);
        self.send_descriptor(MessageType::Ack)?;
        self.enter_receiving()
    }

    /// Handles the sender's answer to a resume request. Offset 0 means the
    /// prefix was rejected and the file restarts from scratch.
    pub(super) fn on_resume_accepted(
        &mut self,
        d: TransferDescriptor,
    ) -> Result<(), TransferError> {
        let held = self.resume_held.take().unwrap_or(0);
        let offset = d.bytes_transferred;
        if offset != 0 && offset != held {
            return Err(TransferError::Malformed(format!(
                "resume offset {offset} does not match the {held} bytes held"
            )));
        }

        let path = self.local_path()?;
        let mode = if offset == 0 {
            info!(name = %self.descriptor.file_name, "resume declined, restarting from offset 0");
            OpenMode::Create
        } else {
            OpenMode::Append
        };
        let handle = self.store.open(&path, mode)?;
        self.file = Some(handle);

        self.descriptor.bytes_transferred = offset;
        if offset == 0 {
            self.descriptor.partial_checksum = CHECKSUM_SEED;
        }
        self.send_descriptor(MessageType::ResumeAckReceiver)?;
        if offset > 0 {
            self.sink.emit(TransferEvent::FileProcessed {
                bytes_transferred: offset,
                file_size: self.descriptor.file_size,
            });
        }
        self.enter_receiving()
    }

    fn enter_receiving(&mut self) -> Result<(), TransferError> {
        self.state = TransferState::Receiving;
        if self.descriptor.remaining() == 0 {
            return self.complete_received_file();
        }
        Ok(())
    }

    /// Appends payload bytes to the destination file.
    pub(super) fn receive_payload(&mut self, chunk: &[u8]) -> Result<(), TransferError> {
        let handle = self
            .file
            .as_mut()
            .ok_or_else(|| TransferError::Io(io::Error::other("destination file is not open")))?;
        let written = self.store.write(handle, chunk)?;
        if written != chunk.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {written} of {} bytes", chunk.len()),
            )
            .into());
        }

        self.descriptor.bytes_transferred += written as u64;
        self.sink.emit(TransferEvent::FileProcessed {
            bytes_transferred: self.descriptor.bytes_transferred,
            file_size: self.descriptor.file_size,
        });
        if self.descriptor.remaining() == 0 {
            return self.complete_received_file();
        }
        Ok(())
    }

    fn complete_received_file(&mut self) -> Result<(), TransferError> {
        self.close_file()?;
        let path = self.local_path()?;
        let sum = checksum_file(&mut self.store, &path, self.descriptor.file_size)?;
        self.finish_received_file(sum)
    }

    /// Confirms the file with `Done` carrying the local whole-file checksum,
    /// then checks it against the announced one.
    fn finish_received_file(&mut self, sum: u32) -> Result<(), TransferError> {
        let expected = self.descriptor.file_checksum;
        self.descriptor.bytes_transferred = self.descriptor.file_size;
        self.descriptor.partial_checksum = sum;
        self.descriptor.flags.insert(Flags::COMPLETE);
        self.send_descriptor(MessageType::Done)?;
        if sum != expected {
            self.checksum_mismatch(expected, sum)?;
        }

        let name = self.descriptor.file_name.clone();
        let bytes_transferred = self.descriptor.bytes_transferred;
        info!(name = %name, bytes_transferred, "file received");
        self.sink.emit(TransferEvent::FileReceived {
            name,
            bytes_transferred,
        });

        match self.sequencer.on_file_completed() {
            SequenceStep::NextFile => {
                self.state = TransferState::SetupReceive;
                Ok(())
            }
            SequenceStep::SessionComplete => {
                self.finish();
                Ok(())
            }
        }
    }
}
