//! Stdin reader thread and key decoding.
//!
//! The reader thread performs one `read(2)` per permit. The line reader asks
//! for a read only while it is waiting for keys, so nothing is pulled off stdin
//! while an external editor or the shell's command owns the terminal.

mod key_token;
pub use key_token::{
    KEY_BACKSPACE, KEY_CTRL_C, KEY_CTRL_D, KEY_CTRL_L, KEY_CTRL_R, KEY_CTRL_T, KEY_ENTER,
    KEY_ESCAPE, KEY_TAB, Key, KeyDecoder, parse_cursor_report,
};

use core_events::Event;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::io::{self, ErrorKind, Read};
use tracing::{debug, info, trace, warn};

const READ_CHUNK: usize = 256;

/// Gate between the line reader and whatever produces `Event::Input`.
pub trait InputSource {
    /// Ask for the next chunk. No-op while a request is outstanding.
    fn request(&mut self);
    /// Record that a requested chunk arrived.
    fn delivered(&mut self);
}

/// Source for setups where input is pushed onto the channel by other means.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeRunning;

impl InputSource for FreeRunning {
    fn request(&mut self) {}
    fn delivered(&mut self) {}
}

/// Permits for the stdin reader thread returned by [`spawn_stdin_reader`].
#[derive(Debug)]
pub struct ReadPermits {
    tx: Sender<()>,
    outstanding: bool,
}

impl InputSource for ReadPermits {
    fn request(&mut self) {
        if self.outstanding {
            return;
        }
        // A closed channel means the reader already stopped and reported why.
        if self.tx.send(()).is_ok() {
            self.outstanding = true;
        }
    }

    fn delivered(&mut self) {
        self.outstanding = false;
    }
}

#[inline]
pub(crate) fn log_chunk_read(chunk: &[u8]) {
    trace!(target: "input.thread", byte_len = chunk.len(), "chunk_read");
}

/// Spawn the stdin reader thread.
///
/// The thread ends after publishing `InputClosed` or `InputError`, when the
/// permits are dropped, or when the event channel closes. It is detached: a
/// read already blocked in the kernel cannot be cancelled.
pub fn spawn_stdin_reader<R>(reader: R, events: Sender<Event>) -> io::Result<ReadPermits>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = bounded(1);
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || run_reader(reader, rx, events))?;
    Ok(ReadPermits {
        tx,
        outstanding: false,
    })
}

fn run_reader<R: Read>(mut reader: R, permits: Receiver<()>, events: Sender<Event>) {
    info!(target: "input.thread", "reader_started");
    let mut buf = [0u8; READ_CHUNK];
    'permits: while permits.recv().is_ok() {
        let event = loop {
            match reader.read(&mut buf) {
                Ok(0) => break Event::InputClosed,
                Ok(n) => {
                    log_chunk_read(&buf[..n]);
                    break Event::Input(buf[..n].to_vec());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(target: "input.thread", error = %e, "read_failed");
                    break Event::InputError(e.kind());
                }
            }
        };
        let last = !matches!(event, Event::Input(_));
        if events.send(event).is_err() {
            debug!(target: "input.thread", "event_channel_closed");
            break 'permits;
        }
        if last {
            break;
        }
    }
    info!(target: "input.thread", "reader_stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fmt;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing::Subscriber;
    use tracing::dispatcher::Dispatch;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::Registry;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn reads_only_when_permitted() {
        struct Counting {
            reads: Arc<AtomicUsize>,
        }
        impl Read for Counting {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                self.reads.fetch_add(1, Ordering::SeqCst);
                buf[0] = b'x';
                Ok(1)
            }
        }

        let reads = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = bounded(8);
        let mut permits = spawn_stdin_reader(
            Counting {
                reads: reads.clone(),
            },
            tx,
        )
        .unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(reads.load(Ordering::SeqCst), 0);

        permits.request();
        permits.request();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Event::Input(b"x".to_vec()));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        permits.delivered();
        permits.request();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Event::Input(b"x".to_vec()));
    }

    #[test]
    fn end_of_input_is_published_once() {
        let (tx, rx) = bounded(8);
        let mut permits = spawn_stdin_reader(Cursor::new(b"ls\r".to_vec()), tx).unwrap();
        permits.request();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Event::Input(b"ls\r".to_vec()));
        permits.delivered();
        permits.request();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Event::InputClosed);
        // Thread is gone; the sender side of the event channel is dropped.
        assert!(rx.recv_timeout(WAIT).is_err());
    }

    #[test]
    fn interrupted_reads_are_retried() {
        struct Flaky {
            failed: bool,
        }
        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if !self.failed {
                    self.failed = true;
                    return Err(io::Error::from(ErrorKind::Interrupted));
                }
                buf[..2].copy_from_slice(b"ok");
                Ok(2)
            }
        }

        let (tx, rx) = bounded(8);
        let mut permits = spawn_stdin_reader(Flaky { failed: false }, tx).unwrap();
        permits.request();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Event::Input(b"ok".to_vec()));
    }

    #[test]
    fn read_errors_are_published() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from(ErrorKind::BrokenPipe))
            }
        }

        let (tx, rx) = bounded(8);
        let mut permits = spawn_stdin_reader(Broken, tx).unwrap();
        permits.request();
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            Event::InputError(ErrorKind::BrokenPipe)
        );
    }

    #[derive(Clone, Default)]
    struct Capture {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    #[derive(Clone, Debug)]
    struct CapturedEvent {
        target: String,
        fields: Vec<(String, String)>,
    }

    #[derive(Default)]
    struct FieldCollector {
        fields: Vec<(String, String)>,
    }

    impl Visit for FieldCollector {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S> Layer<S> for Capture
    where
        S: Subscriber,
    {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut collector = FieldCollector::default();
            event.record(&mut collector);
            self.events.lock().unwrap().push(CapturedEvent {
                target: event.metadata().target().to_string(),
                fields: collector.fields,
            });
        }
    }

    #[test]
    fn chunk_log_redacts_content() {
        let capture = Capture::default();
        let events = capture.events.clone();
        let dispatch = Dispatch::new(Registry::default().with(capture));

        tracing::dispatcher::with_default(&dispatch, || {
            super::log_chunk_read("git commit -m 'hunter2'".as_bytes());
        });

        let events = events.lock().unwrap();
        let event = events
            .iter()
            .find(|e| e.target == "input.thread")
            .expect("missing input.thread event");
        assert!(
            event
                .fields
                .iter()
                .any(|(name, value)| name == "byte_len" && value == "23")
        );
        for (_, value) in &event.fields {
            assert!(!value.contains("hunter2"), "event leaked raw input: {value}");
        }
    }
}
