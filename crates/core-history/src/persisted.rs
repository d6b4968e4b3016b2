//! File-backed history.
//!
//! On open the file is read under the advisory lock, replayed into the index
//! and rewritten in compacted form. Accepted lines are queued as encoded
//! records; a flush thread appends the queue to the file on every tick and
//! once more on `exit`.
//!
//! Invariants:
//! * Every stored value is either on disk or in `queue`.
//! * The queue lock is never held across file I/O.
//! * Flushes are serialized on `write`, so a failed append puts its batch
//!   back at the front of the queue before any other flush can run.

use crate::codec::{decode_record, encode_record};
use crate::{
    DEFAULT_MAX_KEEP, FileLock, HistoryError, HistoryIterator, HistoryManager, HistoryState,
    lock_state,
};
use crossbeam_channel::{Sender, bounded, select, tick};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct PersistedOptions {
    pub max_keep: usize,
    pub flush_interval: Duration,
}

impl Default for PersistedOptions {
    fn default() -> Self {
        Self {
            max_keep: DEFAULT_MAX_KEEP,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// State reachable from the flush thread.
#[derive(Debug)]
struct Store {
    path: PathBuf,
    lock: FileLock,
    queue: Mutex<Vec<String>>,
    write: Mutex<()>,
}

impl Store {
    /// Append queued records. Returns how many were written.
    fn flush(&self) -> Result<usize, HistoryError> {
        let _writing = lock_state(&self.write);
        let batch = std::mem::take(&mut *lock_state(&self.queue));
        if batch.is_empty() {
            return Ok(0);
        }
        match self.append(&batch) {
            Ok(()) => {
                debug!(target: "history.persist", records = batch.len(), "flushed");
                Ok(batch.len())
            }
            Err(e) => {
                let mut queue = lock_state(&self.queue);
                let newer = std::mem::replace(&mut *queue, batch);
                queue.extend(newer);
                Err(e)
            }
        }
    }

    fn append(&self, records: &[String]) -> Result<(), HistoryError> {
        let _guard = self.lock.acquire()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);
        for r in records {
            out.write_all(r.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        out.get_ref().sync_data()?;
        Ok(())
    }
}

#[derive(Debug)]
struct FlushWorker {
    stop: Sender<()>,
    thread: JoinHandle<Result<(), HistoryError>>,
}

#[derive(Debug)]
pub struct PersistedHistoryManager {
    state: Mutex<HistoryState>,
    store: Arc<Store>,
    worker: Mutex<Option<FlushWorker>>,
}

impl PersistedHistoryManager {
    /// Load and compact `path`, then start the flush thread.
    pub fn open(path: impl Into<PathBuf>, options: PersistedOptions) -> Result<Self, HistoryError> {
        let path = path.into();
        let lock = FileLock::for_file(&path);
        let state = load_and_compact(&path, &lock, options.max_keep)?;

        let store = Arc::new(Store {
            path,
            lock,
            queue: Mutex::new(Vec::new()),
            write: Mutex::new(()),
        });
        let worker = spawn_flusher(store.clone(), options.flush_interval)?;
        Ok(Self {
            state: Mutex::new(state),
            store,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.store.path
    }

    /// Write queued records now instead of waiting for the next tick.
    pub fn flush(&self) -> Result<usize, HistoryError> {
        self.store.flush()
    }

    /// Records accepted but not yet on disk.
    pub fn pending(&self) -> usize {
        lock_state(&self.store.queue).len()
    }
}

impl HistoryManager for PersistedHistoryManager {
    fn push(&self, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        if lock_state(&self.state).push(value) {
            lock_state(&self.store.queue).push(encode_record(value));
        }
    }

    fn search(&self, pattern: &str) -> Vec<String> {
        lock_state(&self.state).search(pattern)
    }

    fn iterator(&self) -> HistoryIterator {
        HistoryIterator::new(self.export())
    }

    fn export(&self) -> Vec<String> {
        lock_state(&self.state).index.export()
    }

    /// Stop the flush thread after its final flush. Later calls flush inline.
    fn exit(&self) -> Result<(), HistoryError> {
        let Some(worker) = lock_state(&self.worker).take() else {
            return self.store.flush().map(|_| ());
        };
        drop(worker.stop);
        match worker.thread.join() {
            Ok(result) => result,
            Err(_) => {
                warn!(target: "history.persist", "flush_thread_panicked");
                self.store.flush().map(|_| ())
            }
        }
    }
}

impl Drop for PersistedHistoryManager {
    fn drop(&mut self) {
        if lock_state(&self.worker).is_none() {
            return;
        }
        if let Err(e) = self.exit() {
            warn!(target: "history.persist", error = %e, "final_flush_failed");
        }
    }
}

fn spawn_flusher(store: Arc<Store>, interval: Duration) -> Result<FlushWorker, HistoryError> {
    let (stop, stopped) = bounded::<()>(0);
    let thread = std::thread::Builder::new()
        .name("history-flush".into())
        .spawn(move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(ticker) -> _ => {
                        if let Err(e) = store.flush() {
                            warn!(target: "history.persist", error = %e, "flush_failed_will_retry");
                        }
                    }
                    recv(stopped) -> _ => break,
                }
            }
            let result = store.flush().map(|_| ());
            debug!(target: "history.persist", ok = result.is_ok(), "flush_thread_exit");
            result
        })?;
    Ok(FlushWorker { stop, thread })
}

/// Replay `path` into a fresh state and rewrite it with the surviving entries.
fn load_and_compact(path: &Path, lock: &FileLock, max_keep: usize) -> Result<HistoryState, HistoryError> {
    let _guard = lock.acquire()?;
    let mut state = HistoryState::new(max_keep);

    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let text = String::from_utf8_lossy(&bytes);
    let mut skipped = 0usize;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        match decode_record(line) {
            Some(value) if !value.trim().is_empty() => {
                state.push(value.trim());
            }
            _ => skipped += 1,
        }
    }

    let records: Vec<String> = state
        .index
        .iter()
        .map(|e| encode_record(e.value()))
        .collect();
    rewrite(path, &records)?;
    info!(
        target: "history.persist",
        entries = state.index.len(),
        skipped,
        "loaded"
    );
    Ok(state)
}

/// Replace `path` with `records` through a sibling file and a rename.
fn rewrite(path: &Path, records: &[String]) -> Result<(), HistoryError> {
    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".compact");
    let tmp = PathBuf::from(tmp_name);
    {
        let mut out = BufWriter::new(fs::File::create(&tmp)?);
        for r in records {
            out.write_all(r.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        out.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
