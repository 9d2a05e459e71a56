//! Structured Logging for the Bridge
//!
//! Two layers:
//! - `tracing` macros with `target: "opbridge::<area>"` throughout the crate
//! - `LogEvent` JSON records for lifecycle milestones (submissions, phase
//!   changes, failures), correlated by the bridge transaction id
//!
//! # Usage
//!
//! ```rust,no_run
//! use opbridge::logging::{init_logging, LogLevel};
//!
//! // JSON for log aggregation, pretty for a terminal
//! init_logging(LogLevel::Info, true).ok();
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::types::{BridgeTransaction, Phase};

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// L1 → L2 deposits
    Deposit,
    /// L2 → L1 withdrawals
    Withdrawal,
    /// Wait loops
    Poll,
    /// Startup, configuration
    System,
    /// Error events
    Error,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    /// Bridge transaction id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for error events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: format!("{:?}", level).to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    /// Serialize to a single JSON line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

fn transaction_data(tx: &BridgeTransaction) -> serde_json::Value {
    serde_json::json!({
        "direction": tx.direction,
        "phase": tx.phase.to_string(),
        "amount_wei": tx.amount.to_string(),
        "recipient": tx.recipient.to_string(),
        "source_hash": tx.source_hash.map(|h| h.to_string()),
        "derived_hash": tx.derived_hash.map(|h| h.to_string()),
    })
}

fn emit(target: Target, success: bool, event: &LogEvent) {
    let line = event.to_json();
    match (target, success) {
        (Target::Deposit, true) => tracing::info!(target: "opbridge::deposit", "{}", line),
        (Target::Deposit, false) => tracing::error!(target: "opbridge::deposit", "{}", line),
        (Target::Withdrawal, true) => tracing::info!(target: "opbridge::withdrawal", "{}", line),
        (Target::Withdrawal, false) => tracing::error!(target: "opbridge::withdrawal", "{}", line),
    }
}

#[derive(Clone, Copy)]
enum Target {
    Deposit,
    Withdrawal,
}

// ============================================================================
// Lifecycle Event Logging
// ============================================================================

/// Log a deposit milestone
pub fn log_deposit_event(
    event_type: &str,
    tx: &BridgeTransaction,
    success: bool,
    error: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Deposit, event_type)
        .with_correlation_id(&tx.id)
        .with_data(transaction_data(tx));

    if let Some(err) = error {
        event = event.with_error("DEPOSIT_ERROR", err);
    }

    emit(Target::Deposit, success, &event);
}

/// Log a withdrawal milestone
pub fn log_withdrawal_event(
    event_type: &str,
    tx: &BridgeTransaction,
    success: bool,
    error: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut data = transaction_data(tx);
    if let Some(map) = data.as_object_mut() {
        map.insert(
            "l2_block_number".to_string(),
            serde_json::json!(tx.l2_block_number),
        );
        map.insert(
            "prove_hash".to_string(),
            serde_json::json!(tx.prove_hash.map(|h| h.to_string())),
        );
        map.insert(
            "finalize_hash".to_string(),
            serde_json::json!(tx.finalize_hash.map(|h| h.to_string())),
        );
    }

    let mut event = LogEvent::new(level, EventCategory::Withdrawal, event_type)
        .with_correlation_id(&tx.id)
        .with_data(data);

    if let Some(err) = error {
        event = event.with_error("WITHDRAWAL_ERROR", err);
    }

    emit(Target::Withdrawal, success, &event);
}

/// Log a phase change; failure phases are logged at error level
pub fn log_phase_transition(tx: &BridgeTransaction, from: Phase, to: Phase) {
    let success = !to.is_failed();
    let mut event = LogEvent::new(
        if success { LogLevel::Info } else { LogLevel::Error },
        match to {
            Phase::Deposit(_) => EventCategory::Deposit,
            Phase::Withdrawal(_) => EventCategory::Withdrawal,
        },
        format!("{} -> {}", from, to),
    )
    .with_correlation_id(&tx.id)
    .with_data(transaction_data(tx));

    if let Some(record) = tx.error.as_ref().filter(|_| !success) {
        event = event.with_error(record.kind.to_string(), record.message.clone());
    }

    match to {
        Phase::Deposit(_) => emit(Target::Deposit, success, &event),
        Phase::Withdrawal(_) => emit(Target::Withdrawal, success, &event),
    }
}

/// Log the end of a wait loop
pub fn log_wait_finished(what: &str, correlation_id: &str, duration_ms: u64, outcome: &str) {
    let event = LogEvent::new(LogLevel::Debug, EventCategory::Poll, what)
        .with_correlation_id(correlation_id)
        .with_duration(duration_ms)
        .with_data(serde_json::json!({ "outcome": outcome }));

    tracing::debug!(target: "opbridge::poll", "{}", event.to_json());
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("opbridge={}", level.as_filter())));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    let event = LogEvent::new(LogLevel::Info, EventCategory::System, "logging initialized")
        .with_data(serde_json::json!({ "level": level.as_filter(), "json": json_format }));
    tracing::info!(target: "opbridge::system", "{}", event.to_json());

    Ok(())
}

/// Initialize logging from BridgeConfig; mainnet logs JSON
pub fn init_from_config(config: &crate::config::BridgeConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from(config.log_level.as_str());
    let json_format = config.network == crate::config::Network::Mainnet;

    init_logging(level, json_format)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}
