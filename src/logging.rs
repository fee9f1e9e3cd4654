//! Logging setup for element-injector
//!
//! Every event the crate emits uses the `element_injector` target, so the
//! bootstrap can be followed on its own:
//!
//! | level | events |
//! |-------|--------|
//! | debug | scanning, assembly, registration, construction |
//! | trace | singleton cache hits, instance requests |
//! | info  | bootstrap summary |
//! | warn  | configuration input that is ignored |
//! | error | configured scan classes that are not registered |
//!
//! # Features
//!
//! - `logging` - emit events (default)
//! - `logging-json` - JSON subscriber output
//! - `logging-pretty` - multi-line colored subscriber output
//!
//! # Example
//!
//! ```rust,ignore
//! use element_injector::logging;
//!
//! logging::builder()
//!     .with_level(tracing::Level::DEBUG)
//!     .elements_only()
//!     .pretty()
//!     .init();
//! ```

use crate::{DiError, PropertiesContainer, Result};
use std::str::FromStr;
use tracing::Level;

/// Target of every event emitted by this crate.
pub const TARGET: &str = "element_injector";

/// Property selecting the level, e.g. `debug`.
pub const LOGGING_LEVEL: &str = "elements.logging.level";
/// Property selecting the format: `json`, `pretty` or `compact`.
pub const LOGGING_FORMAT: &str = "elements.logging.format";

/// Subscriber output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    Pretty,
    /// Single line per event
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    with_file: bool,
    with_line_number: bool,
    with_thread_names: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            target: None,
            with_file: false,
            with_line_number: false,
            with_thread_names: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder configured from `elements.logging.level` and
    /// `elements.logging.format`; absent keys keep the defaults.
    pub fn from_properties(properties: &PropertiesContainer) -> Result<Self> {
        let mut builder = Self::default();
        if let Some(level) = properties.property(LOGGING_LEVEL) {
            builder.level = level.trim().parse().map_err(|_| DiError::InvalidConfiguration {
                key: LOGGING_LEVEL.to_string(),
                value: level.to_string(),
                reason: "expected trace, debug, info, warn or error".to_string(),
            })?;
        }
        if let Some(format) = properties.property(LOGGING_FORMAT) {
            builder.format = format.parse().map_err(|reason| DiError::InvalidConfiguration {
                key: LOGGING_FORMAT.to_string(),
                value: format.to_string(),
                reason,
            })?;
        }
        Ok(builder)
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    /// Only show events of `target`.
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show this crate's events.
    pub fn elements_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// The `EnvFilter` directive this builder installs.
    pub fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{}={}", target, self.level),
            None => self.level.to_string(),
        }
    }

    /// Install the global subscriber. Returns `false` when one is already
    /// installed.
    ///
    /// JSON output needs `logging-json`; without it the compact format is
    /// used instead.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) -> bool {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = EnvFilter::new(self.directive());
        let layer = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_thread_names(self.with_thread_names)
            .with_target(true);
        let registry = tracing_subscriber::registry().with(filter);

        match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry.with(layer.json()).try_init().is_ok(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init().is_ok(),
            _ => registry.with(layer.compact()).try_init().is_ok(),
        }
    }

    /// No subscriber is available without `logging-json` or `logging-pretty`.
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) -> bool {
        false
    }
}

pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install a subscriber configured from the properties.
pub fn init_from_properties(properties: &PropertiesContainer) -> Result<bool> {
    Ok(LoggingBuilder::from_properties(properties)?.init())
}
