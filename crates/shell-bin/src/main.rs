//! oxshell entrypoint: a demo shell around the line reader.
use anyhow::{Context, Result};
use clap::Parser;
use core_config::{Config, load_from};
use core_editor::external_editor::resolve_command;
use core_editor::{Control, LineReader, ProcessFn, ReaderOptions, Shell};
use core_events::Session;
use core_history::{BasicHistoryManager, HistoryManager, PersistedHistoryManager, PersistedOptions};
use core_input::spawn_stdin_reader;
use core_terminal::{CrosstermRawMode, query_window_size};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

mod vegetables;

const PROMPT: &str = "» ";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "oxshell", version, about = "Line editing demo shell")]
struct Args {
    /// Configuration file path (overrides discovery of `oxshell.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// History file; overrides `history.file`.
    #[arg(long = "history")]
    history: Option<PathBuf>,
    /// Log file; overrides `logging.file`. Without one nothing is logged.
    #[arg(long = "log")]
    log: Option<PathBuf>,
}

fn configure_logging(path: Option<&Path>) -> Option<WorkerGuard> {
    let path = path?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = path.file_name()?;
    let file_appender = tracing_appender::rolling::never(dir, name);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
        .ok()
        .map(|_| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn open_history(config: &Config, cli: Option<PathBuf>) -> Result<Arc<dyn HistoryManager>> {
    let history = &config.file.history;
    match cli.or_else(|| config.history_path()) {
        Some(path) => {
            let options = PersistedOptions {
                max_keep: history.max_keep,
                flush_interval: config.flush_interval(),
            };
            let manager = PersistedHistoryManager::open(&path, options)
                .with_context(|| format!("opening history file {}", path.display()))?;
            info!(target: "runtime.startup", path = %path.display(), "persisted_history");
            Ok(Arc::new(manager))
        }
        None => Ok(Arc::new(BasicHistoryManager::new(history.max_keep))),
    }
}

fn process() -> ProcessFn {
    Box::new(|line| {
        if line == "exit" {
            return Ok(Control::Exit);
        }
        let mut out = std::io::stdout();
        writeln!(out, "got command: {line}")?;
        out.flush()?;
        Ok(Control::Continue)
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_from(args.config.clone())?;
    let _log_guard = configure_logging(args.log.clone().or_else(|| config.log_path()).as_deref());
    install_panic_hook();
    info!(target: "runtime", "startup");

    let session = Session::new(query_window_size());
    let permits = spawn_stdin_reader(std::io::stdin(), session.sender())
        .context("starting stdin reader")?;
    let history = open_history(&config, args.history)?;

    let options = ReaderOptions {
        display_limit: config.file.completion.display_limit,
        editor_command: resolve_command(&config.file.editor.command),
        debug: config.file.editor.debug,
    };
    let reader = LineReader::new(
        std::io::stdout(),
        CrosstermRawMode::new(),
        session.receiver(),
        session.window().clone(),
        history,
    )
    .with_prompt(Box::new(|| PROMPT.to_string()))
    .with_completer(vegetables::completer())
    .with_input_source(Box::new(permits))
    .with_options(options);

    let mut shell = Shell::new(reader, process()).watch_signals(&session);
    let result = shell.read_loop();
    info!(target: "runtime", ok = result.is_ok(), "shutdown");
    result
}
