// Logging for surge
//
// Unified logging setup for the worker pool, built on the `tracing`
// ecosystem. Slot threads are spawned under the spawner's dispatcher, so
// whatever subscriber is installed here also receives slot lifecycle events.
//
// # Usage
//
// ```rust
// use surge::logging;
//
// // INFO level, human-readable console output
// logging::init_default();
//
// // Or pick the fields yourself
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: true,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// Lifecycle events use the exported macros:
//
// ```rust
// use surge::{log_slot, slot_span};
//
// let span = slot_span!(3, "extra");
// let _guard = span.enter();
// log_slot!(3, "ready");
// ```

use std::io;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the surge logging system
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id; slot threads are named per index
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

static INIT: Once = Once::new();

fn build_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.trim().parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }

    env_filter
}

/// Initialize the logging system with the given configuration.
///
/// Only the first call of any `init*` function in the process takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(build_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(
                registry.with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_thread_names(config.show_thread_info),
                ),
            )
        } else if config.show_time {
            Box::new(
                registry.with(
                    fmt::layer()
                        .with_ansi(atty::is(atty::Stream::Stdout))
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        } else {
            Box::new(
                registry.with(
                    fmt::layer()
                        .without_time()
                        .with_ansi(atty::is(atty::Stream::Stdout))
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        };

        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens `path` in append mode, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(Box::new(file))
}

/// Initialize logging with both console and file output.
///
/// The file is opened up front so a bad path is reported to the caller
/// instead of being swallowed by the writer.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    drop(file_writer(log_file)?);

    INIT.call_once(|| {
        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&log_file_path) {
                Ok(writer) => writer,
                Err(_) => Box::new(io::stderr()),
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(build_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG everywhere, TRACE for the pool internals.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("surge=debug,surge::pool=trace".to_string()),
        ..LogConfig::default()
    });
}

/// JSON output for log aggregators, no file/line information.
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    });
}

/// Warnings and errors only, compact output.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    });
}

/// Span covering everything a slot's backing thread does.
#[macro_export]
macro_rules! slot_span {
    ($index:expr, $role:expr) => {
        tracing::info_span!("slot", index = $index, role = $role)
    };
    ($index:expr, $role:expr, $($fields:tt)*) => {
        tracing::info_span!("slot", index = $index, role = $role, $($fields)*)
    };
}

/// Slot lifecycle events: spawning, ready, retiring, exited.
#[macro_export]
macro_rules! log_slot {
    ($index:expr, $event:expr) => {
        tracing::info!(slot = $index, event = $event)
    };
    ($index:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(slot = $index, event = $event, $($fields)*)
    };
}

/// Routing decisions made by the registry.
#[macro_export]
macro_rules! log_dispatch {
    ($lane:expr, $index:expr) => {
        tracing::debug!(lane = ?$lane, slot = $index, "dispatched update")
    };
    ($lane:expr, $index:expr, $($fields:tt)*) => {
        tracing::debug!(lane = ?$lane, slot = $index, $($fields)*, "dispatched update")
    };
}

/// The dispatcher active on the calling thread.
///
/// Slot threads install this with `tracing::dispatcher::with_default` so
/// their events reach the subscriber of the thread that spawned them.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

pub use tracing::{debug, error, info, trace, warn};
