//! Configuration loading and parsing.
//!
//! Parses `oxshell.toml` (or an override path provided by the binary). Every
//! section and field is optional; anything absent takes its default. Unknown
//! fields are ignored so older binaries tolerate newer files. A file that
//! fails to parse is reported on the `config` target and replaced by defaults
//! rather than aborting startup.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const FILE_NAME: &str = "oxshell.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// History file; absent keeps history in memory only.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "HistoryConfig::default_max_keep")]
    pub max_keep: usize,
    #[serde(default = "HistoryConfig::default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: None,
            max_keep: Self::default_max_keep(),
            flush_interval_ms: Self::default_flush_interval_ms(),
        }
    }
}

impl HistoryConfig {
    const fn default_max_keep() -> usize {
        100
    }
    const fn default_flush_interval_ms() -> u64 {
        5000
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    #[serde(default = "CompletionConfig::default_display_limit")]
    pub display_limit: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            display_limit: Self::default_display_limit(),
        }
    }
}

impl CompletionConfig {
    const fn default_display_limit() -> usize {
        20
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Used when `$EDITOR` is unset.
    #[serde(default = "EditorConfig::default_command")]
    pub command: String,
    #[serde(default)]
    pub debug: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            debug: false,
        }
    }
}

impl EditorConfig {
    fn default_command() -> String {
        "vi".to_string()
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub source: Option<PathBuf>,
    pub file: ConfigFile,
}

/// Config path: `./oxshell.toml` if present, else the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("oxshell").join(FILE_NAME);
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                source: Some(path),
                file,
            })
        }
        Err(e) => {
            warn!(
                target: "config",
                path = %path.display(),
                error = %e.message(),
                "config_parse_failed_using_defaults"
            );
            Ok(Config::default())
        }
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

impl Config {
    /// History file with `~/` expanded, if persistence is configured.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.file.history.file.as_deref().map(expand_home)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.file.history.flush_interval_ms.max(1))
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.file.logging.file.as_deref().map(expand_home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct LogCapture {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl LogCapture {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct CaptureSink<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for CaptureSink<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = CaptureSink<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            CaptureSink {
                guard: self.inner.lock().expect("capture poisoned"),
            }
        }
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        tmp
    }

    #[test]
    fn defaults_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file, ConfigFile::default());
        assert_eq!(cfg.file.history.max_keep, 100);
        assert_eq!(cfg.file.history.flush_interval_ms, 5000);
        assert_eq!(cfg.file.completion.display_limit, 20);
        assert_eq!(cfg.file.editor.command, "vi");
        assert!(!cfg.file.editor.debug);
        assert!(cfg.history_path().is_none());
        assert!(cfg.source.is_none());
    }

    #[test]
    fn parses_all_sections() {
        let tmp = write_config(
            "[history]\nfile = \"/tmp/h\"\nmax_keep = 7\nflush_interval_ms = 250\n\
             [completion]\ndisplay_limit = 3\n\
             [editor]\ncommand = \"nano\"\ndebug = true\n\
             [logging]\nfile = \"/tmp/oxshell.log\"\n",
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.history_path(), Some(PathBuf::from("/tmp/h")));
        assert_eq!(cfg.file.history.max_keep, 7);
        assert_eq!(cfg.flush_interval(), Duration::from_millis(250));
        assert_eq!(cfg.file.completion.display_limit, 3);
        assert_eq!(cfg.file.editor.command, "nano");
        assert!(cfg.file.editor.debug);
        assert_eq!(cfg.log_path(), Some(PathBuf::from("/tmp/oxshell.log")));
        assert!(cfg.raw.is_some());
    }

    #[test]
    fn partial_sections_keep_field_defaults() {
        let tmp = write_config("[history]\nmax_keep = 5\n[editor]\ndebug = true\nunknown = 1\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.history.max_keep, 5);
        assert_eq!(cfg.file.history.flush_interval_ms, 5000);
        assert_eq!(cfg.file.editor.command, "vi");
    }

    #[test]
    fn home_prefix_expands() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.oxshell_history"), home.join(".oxshell_history"));
        }
        assert_eq!(expand_home("relative/~/x"), PathBuf::from("relative/~/x"));
    }

    #[test]
    fn parse_failure_logs_and_uses_defaults() {
        let tmp = write_config("[history\nmax_keep = ");
        let (writer, buffer) = LogCapture::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || {
            load_from(Some(tmp.path().to_path_buf())).unwrap()
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("WARN config:"));
        assert!(log_output.contains("config_parse_failed_using_defaults"));
        assert_eq!(cfg.file, ConfigFile::default());
    }
}
