//! Session-wide events and the shared context handed to the line reader.
//!
//! Three producers feed one bounded channel consumed by the editing thread:
//! the stdin reader thread (`Input`, `InputClosed`, `InputError`), the signal
//! watcher (`Resize`, `Shutdown`), and any holder of a `ShutdownHandle`.
//! The consumer blocks on `recv`, so a shutdown request unblocks a pending
//! read without touching stdin.

use core_terminal::WindowSize;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod signal_watcher;
pub use signal_watcher::SignalWatcher;

// Single consumer; producers block when full rather than dropping keystrokes.
pub const EVENT_CHANNEL_CAP: usize = 1024;

/// Top-level event enum consumed by the line reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A chunk of raw bytes exactly as read from stdin.
    Input(Vec<u8>),
    /// The terminal was resized. The shared `WindowSize` is already updated.
    Resize(WindowSize),
    /// stdin reached end of file.
    InputClosed,
    /// Reading stdin failed.
    InputError(std::io::ErrorKind),
    /// Interrupt/terminate signal or an explicit shutdown request.
    Shutdown,
}

/// Window size shared between the editing thread and the signal watcher.
#[derive(Debug, Clone)]
pub struct SharedWindowSize {
    inner: Arc<Mutex<WindowSize>>,
}

impl SharedWindowSize {
    pub fn new(size: WindowSize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(size)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WindowSize> {
        // A panicked writer cannot leave a half-written Copy value behind.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self) -> WindowSize {
        *self.lock()
    }

    pub fn set(&self, size: WindowSize) {
        *self.lock() = size;
    }
}

/// Cloneable handle that asks the session to end.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Sender<Event>,
}

impl ShutdownHandle {
    /// Request shutdown. Returns false when the session is already gone.
    pub fn request(&self) -> bool {
        tracing::debug!(target: "runtime.events", "shutdown_requested");
        self.tx.send(Event::Shutdown).is_ok()
    }
}

/// Explicit per-session context: the event channel and the window size.
#[derive(Debug, Clone)]
pub struct Session {
    window: SharedWindowSize,
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Session {
    pub fn new(size: WindowSize) -> Self {
        let (tx, rx) = bounded(EVENT_CHANNEL_CAP);
        Self {
            window: SharedWindowSize::new(size),
            tx,
            rx,
        }
    }

    pub fn window(&self) -> &SharedWindowSize {
        &self.window
    }

    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.tx.clone(),
        }
    }
}
