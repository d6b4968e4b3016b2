//! OS signal translation for the editing session.
//!
//! `SIGWINCH` refreshes the shared window size and publishes `Event::Resize`.
//! `SIGINT`/`SIGTERM` publish `Event::Shutdown`, which the line reader treats
//! like end of input. Stopping closes the `signal_hook` handle, which ends the
//! iterator loop; the thread is then joined.

use crate::{Event, SharedWindowSize};
use core_terminal::{WindowSize, query_window_size};
use crossbeam_channel::Sender;
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
use signal_hook::iterator::{Handle, Signals};
use std::io;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

pub struct SignalWatcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    /// Register the handlers and start the watcher thread.
    pub fn start(window: SharedWindowSize, tx: Sender<Event>) -> io::Result<Self> {
        Self::start_with(window, tx, query_window_size)
    }

    /// As `start`, with an injected window-size source.
    pub fn start_with<F>(window: SharedWindowSize, tx: Sender<Event>, query: F) -> io::Result<Self>
    where
        F: Fn() -> WindowSize + Send + 'static,
    {
        let mut signals = Signals::new([SIGWINCH, SIGINT, SIGTERM])?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("signal-watcher".into())
            .spawn(move || {
                info!(target: "signals", "watcher_started");
                for sig in signals.forever() {
                    let event = match sig {
                        SIGWINCH => {
                            let size = query();
                            window.set(size);
                            debug!(target: "signals", %size, "window_resized");
                            Event::Resize(size)
                        }
                        SIGINT | SIGTERM => {
                            info!(target: "signals", signal = sig, "shutdown_signal");
                            Event::Shutdown
                        }
                        _ => continue,
                    };
                    if tx.send(event).is_err() {
                        warn!(target: "signals", "event_channel_closed");
                        break;
                    }
                }
                info!(target: "signals", "watcher_stopped");
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Stop the watcher and wait for its thread. Idempotent.
    pub fn stop(&mut self) {
        self.handle.close();
        if let Some(t) = self.thread.take()
            && t.join().is_err()
        {
            warn!(target: "signals", "watcher_thread_panicked");
        }
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
