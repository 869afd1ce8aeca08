//! Chrome-trace output for render timing (`profiling` feature).
//!
//! The renderer opens a `render` span per call and [`SnacCodec`] a
//! `snac_decode` span per decode. [`init`] routes them to a Chrome trace
//! file (`SNAC_TRACE_FILE`, default `trace.json`) next to the usual
//! `RUST_LOG`-filtered console output. Load the file in `chrome://tracing` or
//! [Perfetto](https://ui.perfetto.dev) to see how much of each chunk's
//! latency is the neural decode.
//!
//! [`SnacCodec`]: crate::SnacCodec

/// Environment variable naming the trace file.
pub const TRACE_FILE_ENV: &str = "SNAC_TRACE_FILE";

const DEFAULT_TRACE_FILE: &str = "trace.json";

/// Flushes the trace file when dropped.
#[cfg(feature = "profiling")]
pub struct ProfilingGuard {
    _flush: tracing_chrome::FlushGuard,
}

#[cfg(not(feature = "profiling"))]
pub struct ProfilingGuard;

/// Trace file path from [`TRACE_FILE_ENV`], or `trace.json`.
pub fn trace_file() -> String {
    std::env::var(TRACE_FILE_ENV)
        .ok()
        .filter(|path| !path.is_empty())
        .unwrap_or_else(|| DEFAULT_TRACE_FILE.to_string())
}

/// Install the global subscriber with a Chrome trace layer.
///
/// Returns `None` without the `profiling` feature, in which case the caller
/// installs its own subscriber. Keep the guard alive until exit.
pub fn init() -> Option<ProfilingGuard> {
    #[cfg(feature = "profiling")]
    {
        use tracing_chrome::ChromeLayerBuilder;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        use tracing_subscriber::{EnvFilter, Layer};

        let path = trace_file();
        let (chrome, flush) = ChromeLayerBuilder::new()
            .file(path.clone())
            .include_args(true)
            .build();
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(chrome)
            .with(tracing_subscriber::fmt::layer().with_filter(filter))
            .init();

        tracing::info!("Writing render trace to {}", path);
        Some(ProfilingGuard { _flush: flush })
    }

    #[cfg(not(feature = "profiling"))]
    {
        None
    }
}
