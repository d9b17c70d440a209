//! Log output for the client
//!
//! The operator console owns stdout, so log lines go to a daily-rolled file
//! and, when enabled, to stderr. Components log through a `StructuredLogger`
//! that stamps every event with the component name and, for the session,
//! the connection it belongs to.

use once_cell::sync::OnceCell;
use std::path::Path;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::LoggingConfig;
use crate::error::{ChargelinkError, Result};

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Outcome of the first `init_logging` call, replayed on later calls
static INIT: OnceCell<std::result::Result<(), String>> = OnceCell::new();
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Install the global subscriber. Only the first call has any effect.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT.get_or_init(|| install(config).map_err(|e| e.to_string()))
        .clone()
        .map_err(ChargelinkError::config)
}

fn install(config: &LoggingConfig) -> Result<()> {
    let level = level_filter(&config.level)?;
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chargelink={},tungstenite=warn", level)));

    let mut outputs: Vec<OutputLayer> = Vec::new();
    if let Some(path) = config.file.as_deref().filter(|p| !p.trim().is_empty()) {
        let (writer, guard) = tracing_appender::non_blocking(daily_file(Path::new(path))?);
        let _ = FILE_GUARD.set(guard);
        outputs.push(output_layer(writer, config.json_format));
    }
    if config.console_output {
        outputs.push(output_layer(std::io::stderr, config.json_format));
    }
    let sinks = outputs.len();

    if tracing_subscriber::registry()
        .with(outputs)
        .with(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("A global subscriber is already installed; keeping it");
        return Ok(());
    }
    tracing::info!(max_level = %level, sinks, "Logging initialised");
    Ok(())
}

/// Daily-rolled file named after `path`, e.g. `chargelink.log.2024-05-01`
fn daily_file(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("chargelink.log");
    Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .build(dir)
        .map_err(|e| {
            ChargelinkError::io(format!("Cannot open log file in {}: {}", dir.display(), e))
        })
}

fn output_layer<W>(writer: W, json: bool) -> OutputLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_target(false);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Parse a configured level name. `WARNING` is accepted for `WARN`.
pub fn level_filter(name: &str) -> Result<LevelFilter> {
    let name = name.trim();
    let canonical = if name.eq_ignore_ascii_case("warning") {
        "warn"
    } else {
        name
    };
    LevelFilter::from_str(canonical).map_err(|_| {
        ChargelinkError::validation("logging.level", &format!("unknown log level '{}'", name))
    })
}

/// Fields attached to every event a logger emits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    pub component: &'static str,
    /// Per-connection id, fresh on every connect attempt
    pub session_id: Option<String>,
    pub endpoint: Option<String>,
    pub generation: Option<u64>,
}

impl LogContext {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            ..Default::default()
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }
}

macro_rules! emit {
    ($level:expr, $ctx:expr, $message:expr) => {
        tracing::event!(
            $level,
            component = $ctx.component,
            session_id = $ctx.session_id.as_deref(),
            endpoint = $ctx.endpoint.as_deref(),
            generation = $ctx.generation,
            "{}",
            $message
        )
    };
}

#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context: LogContext,
}

impl StructuredLogger {
    pub fn new(context: LogContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &LogContext {
        &self.context
    }

    pub fn error(&self, message: &str) {
        emit!(tracing::Level::ERROR, self.context, message);
    }

    pub fn warn(&self, message: &str) {
        emit!(tracing::Level::WARN, self.context, message);
    }

    pub fn info(&self, message: &str) {
        emit!(tracing::Level::INFO, self.context, message);
    }

    pub fn debug(&self, message: &str) {
        emit!(tracing::Level::DEBUG, self.context, message);
    }

    pub fn trace(&self, message: &str) {
        emit!(tracing::Level::TRACE, self.context, message);
    }
}

pub fn get_logger(component: &'static str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}
