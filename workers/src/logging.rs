// Logging for the workers toolkit
//
// The runtime emits structured events through `tracing`. Nothing is printed
// until the embedding application installs a subscriber, either its own or one
// of the presets below.
//
// # Usage Examples
//
// ```rust
// use workers::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or pick the fields yourself
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// Component events use the exported macros:
//
// ```rust
// workers::log_lifecycle!("pool", "3f1c", "expanded", size = 8);
// workers::log_scheduler!("bucket-12", "timer_scheduled");
// ```

use std::io;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the logging presets
///
/// # Examples
///
/// ```rust
/// use workers::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     target_filters: Some("workers::scheduler=trace".to_string()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id; worker threads are named after their pool
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

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(config.level.into());

    if let Some(filters) = &config.target_filters {
        for directive in filters.split(',') {
            if let Ok(directive) = directive.trim().parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    filter
}

/// Install the global subscriber described by `config`.
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(registry.with(fmt::layer().json().flatten_event(true)))
        } else if config.show_time {
            Box::new(registry.with(
                fmt::layer()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            ))
        } else {
            Box::new(registry.with(
                fmt::layer()
                    .without_time()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            ))
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

/// Log to the console and to `log_file`.
///
/// The file is opened up front so a bad path is reported to the caller instead
/// of silently falling back to stderr.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    file_writer(log_file)?;

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
            .with_writer(move || {
                let writer: Box<dyn io::Write + Send + Sync> = match file_writer(&log_file_path) {
                    Ok(writer) => writer,
                    Err(_) => Box::new(io::stderr()),
                };
                writer
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level with human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG everywhere, TRACE for timer scheduling.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("workers=debug,workers::scheduler=trace".to_string()),
        ..Default::default()
    });
}

/// JSON output without file/line information, for log aggregators.
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

/// Warnings and errors only, compact output for test runs.
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

/// Log a component lifecycle event (started, expanded, stopped, ...)
///
/// ```rust
/// workers::log_lifecycle!("actor", "42:printer", "stopped");
/// workers::log_lifecycle!("pool", "pool-1", "contracted", size = 3);
/// ```
#[macro_export]
macro_rules! log_lifecycle {
    ($component:expr, $id:expr, $event:expr) => {
        $crate::__tracing::info!(component = $component, id = %$id, event = $event);
    };
    ($component:expr, $id:expr, $event:expr, $($fields:tt)*) => {
        $crate::__tracing::info!(component = $component, id = %$id, event = $event, $($fields)*);
    };
}

/// Log a timer scheduling event at debug level
///
/// ```rust
/// workers::log_scheduler!("scheduler", "timer_scheduled");
/// workers::log_scheduler!("scheduler", "timers_fired", count = 3);
/// ```
#[macro_export]
macro_rules! log_scheduler {
    ($scheduler:expr, $event:expr) => {
        $crate::__tracing::debug!(scheduler = $scheduler, event = $event);
    };
    ($scheduler:expr, $event:expr, $($fields:tt)*) => {
        $crate::__tracing::debug!(scheduler = $scheduler, event = $event, $($fields)*);
    };
}

/// Log an error with optional context fields
///
/// ```rust
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// workers::log_error!(error);
/// workers::log_error!(error, component = "pool");
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        $crate::__tracing::error!(error = %$error);
    };
    ($error:expr, $($fields:tt)*) => {
        $crate::__tracing::error!(error = %$error, $($fields)*);
    };
}

/// Current dispatcher, for threads spawned outside the toolkit that should log
/// through the same subscriber.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}
