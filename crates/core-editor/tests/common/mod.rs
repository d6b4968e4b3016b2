#![allow(dead_code)]

use core_editor::LineReader;
use core_events::{Event, SharedWindowSize};
use core_history::{BasicHistoryManager, HistoryManager};
use core_terminal::{RawMode, WindowSize};
use crossbeam_channel::{Sender, unbounded};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Cloneable in-memory terminal output.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Raw mode double that records transitions.
#[derive(Clone, Default)]
pub struct FakeMode(pub Arc<Mutex<Vec<&'static str>>>);

impl FakeMode {
    pub fn log(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

impl RawMode for FakeMode {
    fn enable(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().push("enable");
        Ok(())
    }

    fn disable(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().push("disable");
        Ok(())
    }
}

pub struct Harness {
    pub out: SharedBuf,
    pub mode: FakeMode,
    pub tx: Sender<Event>,
    pub window: SharedWindowSize,
    pub history: Arc<BasicHistoryManager>,
}

impl Harness {
    pub fn new() -> (Self, LineReader<SharedBuf, FakeMode>) {
        Self::with_window(WindowSize::new(24, 80))
    }

    pub fn with_window(size: WindowSize) -> (Self, LineReader<SharedBuf, FakeMode>) {
        let out = SharedBuf::default();
        let mode = FakeMode::default();
        let (tx, rx) = unbounded();
        let window = SharedWindowSize::new(size);
        let history = Arc::new(BasicHistoryManager::new(100));
        let manager: Arc<dyn HistoryManager> = history.clone();
        let reader = LineReader::new(out.clone(), mode.clone(), rx, window.clone(), manager);
        (
            Self {
                out,
                mode,
                tx,
                window,
                history,
            },
            reader,
        )
    }

    pub fn send(&self, bytes: &[u8]) {
        self.tx.send(Event::Input(bytes.to_vec())).unwrap();
    }

    pub fn event(&self, event: Event) {
        self.tx.send(event).unwrap();
    }
}
