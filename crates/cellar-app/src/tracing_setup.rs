use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Env var naming the JSONL trace file.
pub(crate) const TRACE_FILE_VAR: &str = "CELLAR_TRACE_FILE";

/// Guard that must be held alive for non-blocking writer flush on shutdown.
/// When dropped, buffered JSONL lines are flushed to disk.
#[derive(Debug)]
pub(crate) struct TracingGuard {
    _guards: Vec<WorkerGuard>,
}

/// Initialize the layered tracing subscriber.
///
/// Layers:
/// 1. Console to stderr, filtered by `RUST_LOG` (default `info`). Left out
///    when `console` is false, since the full-screen UI owns the terminal.
/// 2. JSONL file, activated by `CELLAR_TRACE_FILE`, filtered at `debug`.
///
/// Returns a guard that must be held in `main()` to ensure buffered writes flush.
pub(crate) fn init(console: bool) -> TracingGuard {
    let mut guards = Vec::new();

    let console_layer = console.then(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
    });

    let jsonl_layer = std::env::var(TRACE_FILE_VAR).ok().map(|trace_file| {
        let path = std::path::PathBuf::from(&trace_file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(std::path::Path::new("."))
            .to_path_buf();
        let filename = path.file_name().map_or_else(
            || "cellar-traces.jsonl".to_owned(),
            |f| f.to_string_lossy().into_owned(),
        );

        let file_appender = tracing_appender::rolling::never(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_span_list(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_filter(filter)
    });

    Registry::default()
        .with(console_layer)
        .with(jsonl_layer)
        .init();

    TracingGuard { _guards: guards }
}
