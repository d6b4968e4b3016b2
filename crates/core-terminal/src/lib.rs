//! Terminal mode control, window size, and escape-sequence emission.
//!
//! Raw mode is acquired through `RawModeGuard`, which restores the previous
//! mode on drop. That makes restoration unconditional: normal return, early
//! `?` return and panic unwinding all release the guard exactly once.

use std::fmt;

pub mod writer;
pub use writer::{Command, REQUEST_CURSOR_POSITION, Writer};

/// Terminal dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub rows: u16,
    pub columns: u16,
}

impl WindowSize {
    pub const FALLBACK: WindowSize = WindowSize {
        rows: 24,
        columns: 80,
    };

    pub fn new(rows: u16, columns: u16) -> Self {
        Self { rows, columns }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.columns, self.rows)
    }
}

/// Query the controlling terminal size, falling back to 80x24 when unavailable.
pub fn query_window_size() -> WindowSize {
    match crossterm::terminal::size() {
        Ok((columns, rows)) if columns > 0 && rows > 0 => WindowSize { rows, columns },
        Ok(_) => WindowSize::FALLBACK,
        Err(e) => {
            tracing::debug!(target: "terminal", ?e, "window_size_query_failed");
            WindowSize::FALLBACK
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("failed to enter raw mode: {0}")]
    EnterRaw(#[source] std::io::Error),
    #[error("failed to restore terminal mode: {0}")]
    Restore(#[source] std::io::Error),
}

/// Provider of raw/cooked mode switching. Implemented for the real terminal and
/// by test doubles that only record transitions.
pub trait RawMode {
    fn enable(&mut self) -> std::io::Result<()>;
    fn disable(&mut self) -> std::io::Result<()>;
}

/// Raw mode on the process's controlling terminal via crossterm.
#[derive(Debug, Default)]
pub struct CrosstermRawMode {
    entered: bool,
}

impl CrosstermRawMode {
    pub fn new() -> Self {
        Self { entered: false }
    }
}

impl RawMode for CrosstermRawMode {
    fn enable(&mut self) -> std::io::Result<()> {
        if !self.entered {
            crossterm::terminal::enable_raw_mode()?;
            self.entered = true;
        }
        Ok(())
    }

    fn disable(&mut self) -> std::io::Result<()> {
        if self.entered {
            crossterm::terminal::disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }
}

/// Scoped raw mode. Dropping the guard restores the terminal.
pub struct RawModeGuard<'a, M: RawMode + ?Sized> {
    mode: &'a mut M,
    active: bool,
}

impl<'a, M: RawMode + ?Sized> RawModeGuard<'a, M> {
    /// Enter raw mode and return a guard that will leave it on drop.
    pub fn acquire(mode: &'a mut M) -> Result<Self, TerminalError> {
        mode.enable().map_err(TerminalError::EnterRaw)?;
        tracing::trace!(target: "terminal", "raw_mode_entered");
        Ok(Self { mode, active: true })
    }

    /// Leave raw mode while `f` runs, then enter it again.
    pub fn suspend<R>(&mut self, f: impl FnOnce() -> R) -> Result<R, TerminalError> {
        self.mode.disable().map_err(TerminalError::Restore)?;
        let out = f();
        self.mode.enable().map_err(TerminalError::EnterRaw)?;
        Ok(out)
    }

    /// Restore the terminal now, reporting failure instead of swallowing it.
    pub fn release(mut self) -> Result<(), TerminalError> {
        self.active = false;
        self.mode.disable().map_err(TerminalError::Restore)
    }
}

impl<M: RawMode + ?Sized> Drop for RawModeGuard<'_, M> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.mode.disable() {
                tracing::error!(target: "terminal", ?e, "raw_mode_restore_failed");
            } else {
                tracing::trace!(target: "terminal", "raw_mode_restored");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        log: Vec<&'static str>,
        fail_enable: bool,
    }

    impl RawMode for Recording {
        fn enable(&mut self) -> std::io::Result<()> {
            if self.fail_enable {
                return Err(std::io::Error::other("not a tty"));
            }
            self.log.push("enable");
            Ok(())
        }
        fn disable(&mut self) -> std::io::Result<()> {
            self.log.push("disable");
            Ok(())
        }
    }

    #[test]
    fn guard_restores_on_drop() {
        let mut mode = Recording::default();
        {
            let _guard = RawModeGuard::acquire(&mut mode).unwrap();
        }
        assert_eq!(mode.log, vec!["enable", "disable"]);
    }

    #[test]
    fn explicit_release_disables_once() {
        let mut mode = Recording::default();
        let guard = RawModeGuard::acquire(&mut mode).unwrap();
        guard.release().unwrap();
        assert_eq!(mode.log, vec!["enable", "disable"]);
    }

    #[test]
    fn guard_restores_on_unwind() {
        let mut mode = Recording::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = RawModeGuard::acquire(&mut mode).unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(mode.log, vec!["enable", "disable"]);
    }

    #[test]
    fn suspend_restores_then_reenters() {
        let mut mode = Recording::default();
        {
            let mut guard = RawModeGuard::acquire(&mut mode).unwrap();
            let v = guard.suspend(|| 7).unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(mode.log, vec!["enable", "disable", "enable", "disable"]);
    }

    #[test]
    fn enable_failure_is_reported() {
        let mut mode = Recording {
            fail_enable: true,
            ..Default::default()
        };
        let err = RawModeGuard::acquire(&mut mode).err().expect("should fail");
        assert!(matches!(err, TerminalError::EnterRaw(_)));
        assert!(mode.log.is_empty());
    }
}
