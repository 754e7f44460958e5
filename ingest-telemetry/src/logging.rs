use ingest_config::Environment;
use std::io::Error;
use std::io::Write;
use std::sync::OnceLock;
use std::{
    backtrace::{Backtrace, BacktraceStatus},
    panic::PanicHookInfo,
    sync::Once,
};
use thiserror::Error;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, InitError},
};
use tracing_log::{LogTracer, log_tracer::SetLoggerError};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber, Registry, fmt, layer::SubscriberExt};

/// JSON field name identifying one invocation of the runner.
const RUN_ID_KEY_IN_LOG: &str = "run_id";

/// Directory holding the rolling log files in production.
const LOG_DIR: &str = "logs";

/// Errors that can occur during tracing initialization.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to build rolling file appender: {0}")]
    InitAppender(#[from] InitError),

    #[error("failed to init log tracer: {0}")]
    InitLogTracer(#[from] SetLoggerError),

    #[error("failed to set global default subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),

    #[error("an io error occurred: {0}")]
    Io(#[from] Error),
}

/// Keeps buffered log lines alive until the process exits.
///
/// Production mode holds a [`WorkerGuard`] that flushes the file appender on
/// drop. Development mode writes synchronously and needs no guard.
#[must_use]
pub enum LogFlusher {
    Flusher(WorkerGuard),
    NullFlusher,
}

static INIT_TEST_TRACING: Once = Once::new();

/// Initializes tracing for tests.
///
/// Call once at the beginning of a test. Set `ENABLE_TRACING=1` to see the output:
/// ```bash
/// ENABLE_TRACING=1 cargo test test_name
/// ```
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_ok() {
            // Without an explicit environment the default is prod, which logs to files.
            Environment::Dev.set();
            let _log_flusher =
                init_tracing("test", None).expect("Failed to initialize tracing for tests");
        }
    });
}

static RUN_ID: OnceLock<String> = OnceLock::new();

/// Sets the run identifier injected into every JSON log line.
pub fn set_global_run_id(run_id: String) {
    let _ = RUN_ID.set(run_id);
}

/// Returns the run identifier, if one was set.
pub fn get_global_run_id() -> Option<&'static str> {
    RUN_ID.get().map(|s| s.as_str())
}

/// Writer wrapper that adds the run identifier to JSON log entries.
struct RunIdInjectingWriter<W> {
    inner: W,
}

impl<W> RunIdInjectingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W> Write for RunIdInjectingWriter<W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(run_id) = get_global_run_id()
            && let Some(output) = inject_field(buf, RUN_ID_KEY_IN_LOG, run_id)
        {
            self.inner.write_all(output.as_bytes())?;
            return Ok(buf.len());
        }

        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Adds `key: value` to a JSON object log line unless the key is already present.
///
/// Returns `None` when the buffer is not a JSON object or nothing was changed.
fn inject_field(buf: &[u8], key: &str, value: &str) -> Option<String> {
    let json_str = std::str::from_utf8(buf).ok()?;
    let serde_json::Value::Object(mut map) = serde_json::from_str(json_str).ok()? else {
        return None;
    };

    if map.contains_key(key) {
        return None;
    }
    map.insert(key.to_owned(), serde_json::Value::String(value.to_owned()));

    let modified = serde_json::to_string(&map).ok()?;
    if json_str.ends_with('\n') {
        Some(format!("{modified}\n"))
    } else {
        Some(modified)
    }
}

/// Initializes tracing for the application.
///
/// Production-like environments write JSON lines to daily rolling files under
/// `logs/`, development prints pretty output to the terminal. The level defaults
/// to `info` and can be changed with `RUST_LOG`.
pub fn init_tracing(app_name: &str, run_id: Option<String>) -> Result<LogFlusher, TracingError> {
    if let Some(run_id) = run_id {
        set_global_run_id(run_id);
    }

    // Forward records emitted through the `log` crate by dependencies.
    LogTracer::init()?;

    let is_prod = Environment::load()?.is_prod();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_flusher = if is_prod {
        configure_prod_tracing(filter, app_name)?
    } else {
        configure_dev_tracing(filter)?
    };

    set_tracing_panic_hook();

    Ok(log_flusher)
}

fn configure_prod_tracing(filter: EnvFilter, app_name: &str) -> Result<LogFlusher, TracingError> {
    let file_appender = rolling::Builder::new()
        .filename_prefix(app_name)
        .filename_suffix("log")
        .rotation(rolling::Rotation::DAILY)
        .max_log_files(14)
        .build(LOG_DIR)?;

    let (file_appender, guard) = tracing_appender::non_blocking(file_appender);

    let format = fmt::format()
        .with_level(true)
        .with_ansi(false)
        .with_target(false);

    let subscriber = Registry::default().with(filter).with(
        fmt::layer()
            .event_format(format)
            .with_writer(move || RunIdInjectingWriter::new(file_appender.make_writer()))
            .json()
            .with_current_span(true)
            .with_span_list(true),
    );

    set_global_default(subscriber)?;

    Ok(LogFlusher::Flusher(guard))
}

fn configure_dev_tracing(filter: EnvFilter) -> Result<LogFlusher, TracingError> {
    let format = fmt::format()
        .with_level(true)
        .with_ansi(true)
        .pretty()
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let subscriber = FmtSubscriber::builder()
        .event_format(format)
        .with_env_filter(filter)
        .finish();

    set_global_default(subscriber)?;

    Ok(LogFlusher::NullFlusher)
}

/// Routes panics through tracing before running the previous hook.
fn set_tracing_panic_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        panic_hook(info);
        prev_hook(info);
    }));
}

fn panic_hook(panic_info: &PanicHookInfo) {
    let backtrace = Backtrace::capture();
    let (backtrace, note) = match backtrace.status() {
        BacktraceStatus::Captured => (Some(backtrace), None),
        BacktraceStatus::Disabled => (
            None,
            Some("run with RUST_BACKTRACE=1 to display backtraces"),
        ),
        BacktraceStatus::Unsupported => {
            (None, Some("backtraces are not supported on this platform"))
        }
        _ => (None, Some("backtrace status is unknown")),
    };

    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    };

    let location = panic_info.location().map(|location| location.to_string());

    tracing::error!(
        panic.payload = payload,
        panic.location = location,
        panic.backtrace = backtrace.map(tracing::field::display),
        panic.note = note,
        "a panic occurred",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_run_id_into_json_lines() {
        let output = inject_field(b"{\"message\":\"hi\"}\n", "run_id", "abc").unwrap();
        let value: serde_json::Value = serde_json::from_str(output.trim_end()).unwrap();

        assert_eq!(value["run_id"], "abc");
        assert_eq!(value["message"], "hi");
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn leaves_existing_field_and_plain_text_alone() {
        assert!(inject_field(b"{\"run_id\":\"x\"}", "run_id", "abc").is_none());
        assert!(inject_field(b"plain text line", "run_id", "abc").is_none());
    }
}
