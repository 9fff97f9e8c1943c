//! Where batches of trip updates come from.
//!
//! Decoding a realtime feed into [`TripUpdate`]s happens upstream; the
//! updater only pulls finished batches through [`MessageSource`].

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tracing::debug;

use crate::update::TripUpdate;

use super::SourceError;

/// A blocking pull of the next batch of trip updates.
pub trait MessageSource: Send {
    /// The next batch, or `None` when nothing is waiting.
    fn next_batch(&mut self) -> Result<Option<Vec<TripUpdate>>, SourceError>;
}

/// Batches pushed through a channel by a decoder thread.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: Receiver<Vec<TripUpdate>>,
    poll_timeout: Duration,
}

impl ChannelSource {
    /// A source and the sender feeding it.
    ///
    /// Each pull waits up to `poll_timeout` for a batch.
    pub fn channel(poll_timeout: Duration) -> (Sender<Vec<TripUpdate>>, Self) {
        let (sender, receiver) = mpsc::channel();
        (
            sender,
            Self {
                receiver,
                poll_timeout,
            },
        )
    }
}

impl MessageSource for ChannelSource {
    fn next_batch(&mut self) -> Result<Option<Vec<TripUpdate>>, SourceError> {
        match self.receiver.recv_timeout(self.poll_timeout) {
            Ok(batch) => Ok(Some(batch)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Disconnected),
        }
    }
}

/// Batches recorded as JSON files, replayed one file per pull.
///
/// Every `*.json` file in the directory holds a list of trip updates.
/// Files are replayed in name order, and the source is empty afterwards.
#[derive(Debug)]
pub struct ReplaySource {
    files: VecDeque<PathBuf>,
}

impl ReplaySource {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let io_error = |source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        debug!(dir = %dir.display(), files = files.len(), "replay source opened");

        Ok(Self {
            files: files.into(),
        })
    }

    /// Number of files not yet replayed.
    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

impl MessageSource for ReplaySource {
    fn next_batch(&mut self) -> Result<Option<Vec<TripUpdate>>, SourceError> {
        let Some(path) = self.files.pop_front() else {
            return Ok(None);
        };
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(source) => return Err(SourceError::Io { path, source }),
        };
        match serde_json::from_str(&json) {
            Ok(batch) => Ok(Some(batch)),
            Err(source) => Err(SourceError::Json { path, source }),
        }
    }
}
