use std::collections::VecDeque;
use std::path::PathBuf;

use oftlink_protocol::TransferDescriptor;

use crate::TransferError;

/// A local file queued for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    pub path: PathBuf,
    /// Display name sent to the peer (never a path).
    pub name: String,
    pub size: u64,
}

/// What the session does after a file completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStep {
    /// Another file follows; re-enter setup.
    NextFile,
    /// That was the last file; finalize the session.
    SessionComplete,
}

/// Orders the files of one session and owns the `fileCount` / `filesLeft`
/// bookkeeping shared by every descriptor of that session.
///
/// `files_left` counts files not yet completed, including the one in
/// flight. It drops by one when a file completes, before the next prompt.
#[derive(Debug, Clone)]
pub struct SessionSequencer {
    queue: VecDeque<OutgoingFile>,
    current: Option<OutgoingFile>,
    file_count: u16,
    files_left: u16,
    total_size: u64,
    completed: u16,
    cancelled: bool,
}

impl SessionSequencer {
    /// Sequencer for the sending side; call [`start`](Self::start) next.
    pub fn outgoing() -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            file_count: 0,
            files_left: 0,
            total_size: 0,
            completed: 0,
            cancelled: false,
        }
    }

    /// Sequencer for the receiving side; counts come from the peer's prompts.
    pub fn incoming() -> Self {
        Self::outgoing()
    }

    /// Queues the session's files.
    pub fn start(&mut self, files: Vec<OutgoingFile>) -> Result<(), TransferError> {
        let count =
            u16::try_from(files.len()).map_err(|_| TransferError::TooManyFiles(files.len()))?;
        self.total_size = files.iter().map(|f| f.size).sum();
        self.queue = files.into();
        self.current = None;
        self.file_count = count;
        self.files_left = count;
        self.completed = 0;
        self.cancelled = false;
        Ok(())
    }

    /// Takes the next queued file and makes it current.
    pub fn next_file(&mut self) -> Option<&OutgoingFile> {
        if self.cancelled {
            return None;
        }
        self.current = self.queue.pop_front();
        self.current.as_ref()
    }

    /// The file in flight on the sending side.
    pub fn current(&self) -> Option<&OutgoingFile> {
        self.current.as_ref()
    }

    /// Mirrors the sender's counts from a prompt.
    pub fn observe_prompt(&mut self, prompt: &TransferDescriptor) {
        self.file_count = prompt.file_count;
        self.files_left = prompt.files_left;
        self.total_size = prompt.total_size;
    }

    /// Fills the session-wide fields of an outgoing descriptor.
    pub fn stamp(&self, descriptor: &mut TransferDescriptor) {
        descriptor.file_count = self.file_count;
        descriptor.files_left = self.files_left;
        descriptor.total_size = self.total_size;
        descriptor.part_count = 1;
        descriptor.parts_left = 1;
    }

    /// Records completion of the file in flight.
    pub fn on_file_completed(&mut self) -> SequenceStep {
        self.current = None;
        self.completed = self.completed.saturating_add(1);
        if self.files_left > 1 {
            self.files_left -= 1;
            SequenceStep::NextFile
        } else {
            self.files_left = 0;
            SequenceStep::SessionComplete
        }
    }

    /// Drops everything still queued.
    pub fn on_session_cancelled(&mut self) {
        self.queue.clear();
        self.current = None;
        self.files_left = 0;
        self.cancelled = true;
    }

    pub fn file_count(&self) -> u16 {
        self.file_count
    }

    pub fn files_left(&self) -> u16 {
        self.files_left
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Files completed so far in this session.
    pub fn completed(&self) -> u16 {
        self.completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oftlink_protocol::Cookie;

    fn sample_files() -> Vec<OutgoingFile> {
        ["a.bin", "b.bin", "c.bin"]
            .iter()
            .enumerate()
            .map(|(i, name)| OutgoingFile {
                path: PathBuf::from("/data").join(name),
                name: (*name).into(),
                size: 100 * (i as u64 + 1),
            })
            .collect()
    }

    #[test]
    fn start_sets_counts() {
        let mut seq = SessionSequencer::outgoing();
        seq.start(sample_files()).unwrap();
        assert_eq!(seq.file_count(), 3);
        assert_eq!(seq.files_left(), 3);
        assert_eq!(seq.total_size(), 600);
        assert!(seq.current().is_none());
    }

    #[test]
    fn files_left_strictly_decreases() {
        let mut seq = SessionSequencer::outgoing();
        seq.start(sample_files()).unwrap();

        let mut seen = Vec::new();
        loop {
            let name = seq.next_file().unwrap().name.clone();
            let mut d = TransferDescriptor::new(Cookie::default());
            seq.stamp(&mut d);
            seen.push((name, d.files_left));
            if seq.on_file_completed() == SequenceStep::SessionComplete {
                break;
            }
        }

        assert_eq!(
            seen,
            vec![
                ("a.bin".to_string(), 3),
                ("b.bin".to_string(), 2),
                ("c.bin".to_string(), 1)
            ]
        );
        assert_eq!(seq.files_left(), 0);
        assert_eq!(seq.completed(), 3);
        assert!(seq.next_file().is_none());
    }

    #[test]
    fn single_file_completes_session() {
        let mut seq = SessionSequencer::outgoing();
        seq.start(sample_files().into_iter().take(1).collect()).unwrap();
        seq.next_file().unwrap();
        assert_eq!(seq.on_file_completed(), SequenceStep::SessionComplete);
    }

    #[test]
    fn empty_session_has_nothing_to_send() {
        let mut seq = SessionSequencer::outgoing();
        seq.start(Vec::new()).unwrap();
        assert_eq!(seq.files_left(), 0);
        assert!(seq.next_file().is_none());
    }

    #[test]
    fn too_many_files_rejected() {
        let files = vec![
            OutgoingFile {
                path: PathBuf::from("x"),
                name: "x".into(),
                size: 0,
            };
            70_000
        ];
        let mut seq = SessionSequencer::outgoing();
        assert!(matches!(
            seq.start(files),
            Err(TransferError::TooManyFiles(70_000))
        ));
    }

    #[test]
    fn incoming_mirrors_prompt() {
        let mut prompt = TransferDescriptor::new(Cookie::default());
        prompt.file_count = 2;
        prompt.files_left = 2;
        prompt.total_size = 4096;

        let mut seq = SessionSequencer::incoming();
        seq.observe_prompt(&prompt);
        assert_eq!(seq.file_count(), 2);
        assert_eq!(seq.on_file_completed(), SequenceStep::NextFile);
        assert_eq!(seq.files_left(), 1);
        assert_eq!(seq.on_file_completed(), SequenceStep::SessionComplete);
    }

    #[test]
    fn cancel_drops_queue() {
        let mut seq = SessionSequencer::outgoing();
        seq.start(sample_files()).unwrap();
        seq.next_file();
        seq.on_session_cancelled();
        assert!(seq.is_cancelled());
        assert_eq!(seq.files_left(), 0);
        assert!(seq.current().is_none());
        assert!(seq.next_file().is_none());
    }
}
