//! Bootstraps a capture session's output directory and owns its sinks.
//!
//! A [`RecordingSession`] creates the per-subject folder, keeps the
//! standard sinks (marker poses per trial, manual offsets), and guarantees
//! that every open sink is closed exactly once at shutdown, no matter how
//! many shutdown paths run.

use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::recorder::{RecordError, RecordSink};

/// Columns in the marker-pose file: a timestamp plus position (3) and
/// orientation quaternion (4) for each of the three tracked markers.
pub const MARKER_COLUMNS: usize = 22;

/// Columns in the manual-offset file: one 3-D offset per row.
pub const OFFSET_COLUMNS: usize = 3;

/// One subject's recording session: output folder plus the standard sinks.
pub struct RecordingSession {
    root: PathBuf,
    markers: Option<RecordSink>,
    offsets: Option<RecordSink>,
    flush_period: usize,
}

impl RecordingSession {
    /// Creates the subject folder under `output_dir` and opens the offset
    /// sink. The offset sink flushes every sample; offsets are rare and
    /// each one matters. The marker sink is opened per trial by
    /// [`start_trial`](RecordingSession::start_trial).
    pub fn create(
        output_dir: impl AsRef<Path>,
        subject: &str,
        flush_period: usize,
    ) -> Result<Self, RecordError> {
        let root = output_dir.as_ref().join(subject);
        if root.exists() {
            warn!(
                "subject folder {} exists already, was the subject number updated?",
                root.display()
            );
        } else {
            fs::create_dir_all(&root)?;
        }
        info!("recording session in {}", root.display());

        let offsets = RecordSink::open(root.join("offset"), OFFSET_COLUMNS, 1)?;

        Ok(RecordingSession {
            root,
            markers: None,
            offsets: Some(offsets),
            flush_period,
        })
    }

    /// Closes the previous trial's marker sink and opens the next one,
    /// named after the trial and condition numbers.
    pub fn start_trial(&mut self, trial: u32, condition: u32) -> Result<(), RecordError> {
        if let Some(sink) = self.markers.as_mut() {
            if !sink.is_closed() {
                sink.close();
            }
        }
        let name = format!("Mkrs_Trial_{trial}_Condition_{condition}");
        self.markers = Some(RecordSink::open(
            self.root.join(name),
            MARKER_COLUMNS,
            self.flush_period,
        )?);
        Ok(())
    }

    /// The marker sink of the active trial, if one was started.
    pub fn markers(&mut self) -> Option<&mut RecordSink> {
        self.markers.as_mut()
    }

    /// The manual-offset sink, if it was opened.
    pub fn offsets(&mut self) -> Option<&mut RecordSink> {
        self.offsets.as_mut()
    }

    /// Closes every open sink exactly once. Safe to call from both the
    /// end-of-trial path and the application-quit path; sinks that were
    /// never opened are skipped.
    pub fn close_all(&mut self) {
        info!("closing all recording objects");
        for sink in [self.markers.as_mut(), self.offsets.as_mut()]
            .into_iter()
            .flatten()
        {
            if !sink.is_closed() {
                sink.close();
            }
        }
    }

    /// The subject folder this session records into.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
