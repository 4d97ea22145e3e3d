//! Blocking log-file tailer.
//!
//! Yields appended lines as they arrive, waking on filesystem notifications
//! with a timed poll as fallback. The iterator ends when the file goes
//! away, which silently terminates the event pipeline thread.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct LogTail {
    path: PathBuf,
    reader: BufReader<File>,
    // Kept alive for the notifications; events are read from `wakeups`.
    _watcher: Option<RecommendedWatcher>,
    wakeups: Option<Receiver<notify::Result<notify::Event>>>,
    buf: String,
}

impl LogTail {
    /// Open `path` for following. With `from_start` the whole existing file
    /// is replayed first; otherwise reading starts at the current end.
    pub fn open(path: &Path, from_start: bool) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        if !from_start {
            reader.seek(SeekFrom::End(0))?;
        }

        let (tx, rx) = channel();
        let watcher = match notify::recommended_watcher(tx) {
            Ok(mut watcher) => match watcher.watch(path, RecursiveMode::NonRecursive) {
                Ok(()) => Some(watcher),
                Err(err) => {
                    warn!(%err, "file watch failed; falling back to polling");
                    None
                }
            },
            Err(err) => {
                warn!(%err, "no filesystem watcher available; polling instead");
                None
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            wakeups: watcher.as_ref().map(|_| rx),
            _watcher: watcher,
            buf: String::new(),
        })
    }

    /// Block until something happens to the file, or the poll interval
    /// elapses. Returns false when the file is gone for good.
    fn wait_for_change(&mut self) -> bool {
        match &self.wakeups {
            Some(rx) => match rx.recv_timeout(POLL_INTERVAL) {
                Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            },
            None => std::thread::sleep(POLL_INTERVAL),
        }

        // Rotation: the file shrank or was replaced under us.
        match std::fs::metadata(&self.path) {
            Ok(metadata) => {
                let pos = self.reader.stream_position().unwrap_or(0);
                if metadata.len() < pos {
                    debug!(path = %self.path.display(), "logfile rotated; reopening");
                    match File::open(&self.path) {
                        Ok(file) => self.reader = BufReader::new(file),
                        Err(_) => return false,
                    }
                }
                true
            }
            Err(_) => false,
        }
    }
}

impl Iterator for LogTail {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    if !self.wait_for_change() {
                        return None;
                    }
                }
                Ok(_) => {
                    // A line without a newline is still being written; back
                    // up and wait for the rest.
                    if !self.buf.ends_with('\n') {
                        let len = self.buf.len() as i64;
                        if self.reader.seek(SeekFrom::Current(-len)).is_err() {
                            return None;
                        }
                        if !self.wait_for_change() {
                            return None;
                        }
                        continue;
                    }
                    return Some(self.buf.trim_end().to_string());
                }
                Err(err) => {
                    warn!(%err, "error reading logfile");
                    return None;
                }
            }
        }
    }
}
