//! The background writer thread behind each recording sink.
//!
//! One writer per sink. The producer side hands over completed text blobs
//! through a one-slot channel; the writer appends them to the sink's file
//! on a short poll cadence and owns every byte it has accepted until that
//! byte is on disk. A failed append is retried on the next tick instead of
//! being dropped.

use log::{error, info, warn};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long the writer waits for new work before making a retry pass.
pub const WRITE_POLL: Duration = Duration::from_millis(5);

/// A unit of work handed from a sink to its writer. Ownership of the blob
/// transfers fully on the send; the sink never touches it again.
pub(crate) enum WriteTask {
    /// A completed text blob to append to the sink's file.
    Blob(String),
    /// Drain whatever is pending, then stop.
    Close,
}

/// Lifecycle of a writer thread, observable from the producer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WriterState {
    /// Waiting for work.
    Idle = 0,
    /// An append is in progress.
    Writing = 1,
    /// Close received, final drain under way.
    Closing = 2,
    /// Thread has exited.
    Closed = 3,
}

impl WriterState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => WriterState::Idle,
            1 => WriterState::Writing,
            2 => WriterState::Closing,
            _ => WriterState::Closed,
        }
    }
}

pub(crate) struct DataWriter {
    path: PathBuf,
    tasks: Receiver<WriteTask>,
    state: Arc<AtomicU8>,
    poll: Duration,
    /// Blob accepted but not yet on disk, kept across failed appends.
    carry: Option<String>,
}

impl DataWriter {
    /// Spawns the writer thread for one sink.
    pub(crate) fn spawn(
        path: PathBuf,
        tasks: Receiver<WriteTask>,
        state: Arc<AtomicU8>,
        poll: Duration,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            DataWriter {
                path,
                tasks,
                state,
                poll,
                carry: None,
            }
            .run()
        })
    }

    fn run(mut self) {
        loop {
            match self.tasks.recv_timeout(self.poll) {
                Ok(WriteTask::Blob(blob)) => {
                    self.accept(blob);
                    self.try_flush();
                }
                // a timeout is the poll tick: retry whatever is carried
                Err(RecvTimeoutError::Timeout) => self.try_flush(),
                Ok(WriteTask::Close) | Err(RecvTimeoutError::Disconnected) => {
                    self.set_state(WriterState::Closing);
                    self.final_drain();
                    self.set_state(WriterState::Closed);
                    info!("writer for {} terminated", self.path.display());
                    return;
                }
            }
        }
    }

    /// Accepts a blob, appending it behind any carried text so rows never
    /// reorder across a failed write.
    fn accept(&mut self, blob: String) {
        match &mut self.carry {
            Some(carried) => carried.push_str(&blob),
            None => self.carry = Some(blob),
        }
    }

    fn try_flush(&mut self) {
        let Some(blob) = self.carry.take() else {
            self.set_state(WriterState::Idle);
            return;
        };
        self.set_state(WriterState::Writing);
        match append_to(&self.path, &blob) {
            Ok(()) => self.set_state(WriterState::Idle),
            Err(err) => {
                warn!(
                    "append to {} failed ({}), retrying next tick",
                    self.path.display(),
                    err
                );
                self.carry = Some(blob);
                self.set_state(WriterState::Idle);
            }
        }
    }

    /// One final pending-write pass before stopping.
    fn final_drain(&mut self) {
        while let Ok(task) = self.tasks.try_recv() {
            if let WriteTask::Blob(blob) = task {
                self.accept(blob);
            }
        }
        if let Some(blob) = self.carry.take() {
            if let Err(err) = append_to(&self.path, &blob) {
                error!(
                    "append to {} failed at shutdown, dropping {} bytes: {}",
                    self.path.display(),
                    blob.len(),
                    err
                );
            }
        }
    }

    fn set_state(&self, state: WriterState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Append-only write; the file is created on first use and never truncated.
fn append_to(path: &Path, text: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    file.write_all(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn append_creates_and_extends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.txt");

        append_to(&path, "1,2\n").unwrap();
        append_to(&path, "3,4\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "1,2\n3,4\n");
    }

    #[test]
    fn writer_state_round_trips() {
        for state in [
            WriterState::Idle,
            WriterState::Writing,
            WriterState::Closing,
            WriterState::Closed,
        ] {
            assert_eq!(WriterState::from_u8(state as u8), state);
        }
    }
}
