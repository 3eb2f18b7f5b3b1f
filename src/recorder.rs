//! The buffered recording sink.
//!
//! A [`RecordSink`] accepts tagged scalar tuples from the real-time control
//! loop and persists them as comma-separated rows without ever blocking the
//! caller on disk I/O. Rows accumulate in a text buffer; every
//! `flush_period`-th accepted row the whole buffer is handed to the sink's
//! background [writer](crate::data_writer) through a one-slot channel.
//! Closing the sink drains everything that was accepted before the close.

use log::{info, warn};
use std::fmt;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::data_writer::{DataWriter, WriteTask, WriterState, WRITE_POLL};

/// Default number of rows batched per hand-off to the writer.
pub const DEFAULT_FLUSH_PERIOD: usize = 20;

/// Things that can go wrong while opening or feeding a sink.
#[derive(Debug)]
pub enum RecordError {
    /// `add_data` was called with the wrong number of values. The sample
    /// is rejected, not silently dropped into the file.
    ColumnCountMismatch {
        /// Columns the sink was opened with.
        expected: usize,
        /// Values the caller actually passed.
        got: usize,
    },
    /// The sink was already closed.
    Closed,
    /// Filesystem trouble while claiming the output file.
    IoError(io::Error),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::ColumnCountMismatch { expected, got } => {
                write!(f, "expected {expected} datapoints but got {got}")
            }
            RecordError::Closed => write!(f, "sink is closed"),
            RecordError::IoError(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<io::Error> for RecordError {
    fn from(value: io::Error) -> Self {
        RecordError::IoError(value)
    }
}

/// One logical output file plus its buffering and writer machinery.
pub struct RecordSink {
    path: PathBuf,
    columns: usize,
    flush_period: usize,
    pending: String,
    sample_count: u64,
    tasks: SyncSender<WriteTask>,
    writer_state: Arc<AtomicU8>,
    writer: Option<JoinHandle<()>>,
    closed: bool,
}

impl RecordSink {
    /// Opens a sink at `path`, expecting `columns` values per sample and
    /// batching `flush_period` rows per writer hand-off.
    ///
    /// If the file already exists the name is suffixed `_0`, `_1`, ...
    /// before the extension until a free one is found; prior trial data is
    /// never overwritten. Exactly one background writer is started.
    pub fn open(
        path: impl AsRef<Path>,
        columns: usize,
        flush_period: usize,
    ) -> Result<RecordSink, RecordError> {
        let resolved = claim_path(path.as_ref())?;

        let (tasks, task_rx) = mpsc::sync_channel(1);
        let writer_state = Arc::new(AtomicU8::new(WriterState::Idle as u8));
        let writer = DataWriter::spawn(
            resolved.clone(),
            task_rx,
            Arc::clone(&writer_state),
            WRITE_POLL,
        );

        info!(
            "recording to {} ({} columns, flush every {} samples)",
            resolved.display(),
            columns,
            flush_period.max(1)
        );

        Ok(RecordSink {
            path: resolved,
            columns,
            flush_period: flush_period.max(1),
            pending: String::new(),
            sample_count: 0,
            tasks,
            writer_state,
            writer: Some(writer),
            closed: false,
        })
    }

    /// Accepts one sample as a row of already-formatted values.
    ///
    /// Never performs I/O and never blocks on the writer: the row is
    /// appended to an in-memory buffer, and on a flush boundary the buffer
    /// is handed over only if the writer's slot is free. A full slot just
    /// leaves the buffer accumulating until the next boundary, so row
    /// order is preserved end to end.
    pub fn add_data<S: AsRef<str>>(&mut self, values: &[S]) -> Result<(), RecordError> {
        if self.closed {
            return Err(RecordError::Closed);
        }
        if values.len() != self.columns {
            return Err(RecordError::ColumnCountMismatch {
                expected: self.columns,
                got: values.len(),
            });
        }

        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.pending.push(',');
            }
            self.pending.push_str(value.as_ref());
        }
        self.pending.push('\n');

        self.sample_count += 1;
        if self.sample_count % self.flush_period as u64 == 0 {
            self.hand_off();
        }
        Ok(())
    }

    /// Tries to move the accumulated blob into the writer's slot.
    fn hand_off(&mut self) {
        let blob = mem::take(&mut self.pending);
        match self.tasks.try_send(WriteTask::Blob(blob)) {
            Ok(()) => {}
            Err(TrySendError::Full(WriteTask::Blob(blob))) => {
                // writer still owns an in-flight blob; keep accumulating
                self.pending = blob;
            }
            Err(TrySendError::Disconnected(WriteTask::Blob(blob))) => {
                warn!("writer for {} is gone, buffering rows", self.path.display());
                self.pending = blob;
            }
            Err(_) => {}
        }
    }

    /// Closes the sink: hands the writer any residual rows, signals it to
    /// drain and stop, and waits for it to exit. Idempotent; a second call
    /// is a no-op. Every sample accepted before the close is on disk when
    /// this returns (barring a final I/O failure, which is logged).
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if !self.pending.is_empty() {
            let blob = mem::take(&mut self.pending);
            // a blocking send is fine here, the writer drains its slot
            // within one poll tick
            if self.tasks.send(WriteTask::Blob(blob)).is_err() {
                warn!(
                    "writer for {} exited early, residual rows lost",
                    self.path.display()
                );
            }
        }
        let _ = self.tasks.send(WriteTask::Close);

        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!("writer thread for {} panicked", self.path.display());
            }
        }
        info!("closed recording sink {}", self.path.display());
    }

    /// Whether [`close`](RecordSink::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The path actually claimed, after collision resolution.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state of the background writer.
    pub fn writer_state(&self) -> WriterState {
        WriterState::from_u8(self.writer_state.load(Ordering::Acquire))
    }

    /// Total samples accepted so far.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }
}

/// Claims a non-colliding output path by creating the file eagerly.
/// `name.txt` is tried first, then `name_0.txt`, `name_1.txt`, ...
fn claim_path(requested: &Path) -> Result<PathBuf, RecordError> {
    let extension = requested
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "txt".to_owned());
    let stem = requested
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default_data".to_owned());

    let mut candidate = requested.with_file_name(format!("{stem}.{extension}"));
    let mut suffix = 0;
    loop {
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                warn!(
                    "file name {} already in use, finding an alternative",
                    candidate.display()
                );
                candidate = requested.with_file_name(format!("{stem}_{suffix}.{extension}"));
                suffix += 1;
            }
            Err(err) => return Err(RecordError::IoError(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn round_trip_two_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::open(dir.path().join("pair.txt"), 3, 2).unwrap();

        sink.add_data(&["1", "2", "3"]).unwrap();
        sink.add_data(&["4", "5", "6"]).unwrap();
        assert_eq!(sink.sample_count(), 2);
        sink.close();

        let written = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(written, "1,2,3\n4,5,6\n");
    }

    #[test]
    fn residual_rows_survive_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::open(dir.path().join("residual.txt"), 1, 50).unwrap();

        // fewer rows than a flush period, so nothing was handed off yet
        for i in 0..7 {
            sink.add_data(&[i.to_string()]).unwrap();
        }
        sink.close();

        let written = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(written, "0\n1\n2\n3\n4\n5\n6\n");
    }

    #[test]
    fn close_before_drain_loses_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::open(dir.path().join("burst.txt"), 2, 10).unwrap();

        for i in 0..100 {
            sink.add_data(&[i.to_string(), (i * i).to_string()]).unwrap();
        }
        sink.close();

        let written = fs::read_to_string(sink.path()).unwrap();
        let rows: Vec<&str> = written.lines().collect();
        assert_eq!(rows.len(), 100);
        assert_eq!(rows[0], "0,0");
        assert_eq!(rows[99], "99,9801");
        // FIFO order end to end
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(*row, format!("{},{}", i, i * i));
        }
    }

    #[test]
    fn filename_collisions_get_numbered_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("Mkrs_Trial_0.txt");

        let mut first = RecordSink::open(&base, 1, 1).unwrap();
        let mut second = RecordSink::open(&base, 1, 1).unwrap();
        let mut third = RecordSink::open(&base, 1, 1).unwrap();

        assert_eq!(first.path(), dir.path().join("Mkrs_Trial_0.txt"));
        assert_eq!(second.path(), dir.path().join("Mkrs_Trial_0_0.txt"));
        assert_eq!(third.path(), dir.path().join("Mkrs_Trial_0_1.txt"));

        first.close();
        second.close();
        third.close();
    }

    #[test]
    fn column_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::open(dir.path().join("cols.txt"), 3, 1).unwrap();

        match sink.add_data(&["only", "two"]) {
            Err(RecordError::ColumnCountMismatch { expected, got }) => {
                assert_eq!(expected, 3);
                assert_eq!(got, 2);
            }
            other => panic!("expected a mismatch error, got {other:?}"),
        }

        // the bad sample left no trace
        sink.add_data(&["1", "2", "3"]).unwrap();
        sink.close();
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "1,2,3\n");
    }

    #[test]
    fn double_close_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::open(dir.path().join("twice.txt"), 1, 1).unwrap();
        sink.add_data(&["1"]).unwrap();

        assert!(!sink.is_closed());
        sink.close();
        assert!(sink.is_closed());
        sink.close();
        assert!(sink.is_closed());
        assert_eq!(sink.writer_state(), WriterState::Closed);
    }

    #[test]
    fn add_after_close_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::open(dir.path().join("late.txt"), 1, 1).unwrap();
        sink.close();
        assert!(matches!(
            sink.add_data(&["too late"]),
            Err(RecordError::Closed)
        ));
    }

    #[test]
    fn failed_appends_are_retried_until_the_disk_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::open(dir.path().join("flaky.txt"), 1, 1).unwrap();
        let target = sink.path().to_path_buf();

        // sabotage the target: a directory in its place makes appends fail
        fs::remove_file(&target).unwrap();
        fs::create_dir(&target).unwrap();

        for i in 0..5 {
            // the caller stays unblocked and error-free during the outage
            sink.add_data(&[i.to_string()]).unwrap();
            sleep(Duration::from_millis(10));
        }
        assert_ne!(sink.writer_state(), WriterState::Closed);

        // the disk comes back; the carried rows land on the next ticks
        fs::remove_dir(&target).unwrap();
        sleep(Duration::from_millis(50));

        sink.close();
        let written = fs::read_to_string(&target).unwrap();
        assert_eq!(written, "0\n1\n2\n3\n4\n");
    }

    #[test]
    fn add_data_never_blocks_on_a_stalled_writer() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::open(dir.path().join("fast.txt"), 2, 5).unwrap();
        let target = sink.path().to_path_buf();

        // stall the writer outright: every append fails until close
        fs::remove_file(&target).unwrap();
        fs::create_dir(&target).unwrap();

        let burst_start = std::time::Instant::now();
        for i in 0..10_000 {
            sink.add_data(&[i.to_string(), "0".to_string()]).unwrap();
        }
        // pure in-memory accumulation; generous bound for a loaded machine
        assert!(burst_start.elapsed() < Duration::from_millis(500));

        fs::remove_dir(&target).unwrap();
        sink.close();
        assert_eq!(
            fs::read_to_string(&target).unwrap().lines().count(),
            10_000
        );
    }

    #[test]
    fn extensionless_paths_get_txt() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::open(dir.path().join("offset"), 3, 1).unwrap();
        assert_eq!(sink.path(), dir.path().join("offset.txt"));
        sink.close();
    }
}
