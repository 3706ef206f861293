//! Diagnostic logging for plugin binaries.
//!
//! Protocol log lines go through [`EventWriter`](crate::EventWriter); this
//! module only installs a `tracing` subscriber for the runtime's own
//! diagnostics. The library never installs one on its own.

use std::io;

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Install a stderr subscriber the first time it is called.
///
/// `RUST_LOG` takes precedence over `default_filter`. Lines carry the level
/// first and no timestamp or colour, since the host timestamps stderr
/// itself. Repeated calls return a fresh [`TelemetryHandle`] without touching
/// the global state again.
///
/// # Examples
///
/// ```rust
/// use modinput::telemetry;
///
/// # fn main() -> Result<(), modinput::telemetry::TelemetryError> {
/// let first = telemetry::initialise("warn")?;
/// let second = telemetry::initialise("debug")?;
/// drop(first);
/// drop(second);
/// # Ok(())
/// # }
/// ```
pub fn initialise(default_filter: &str) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(default_filter))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(default_filter: &str) -> Result<(), TelemetryError> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(default_filter),
    }
    .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(io::stderr)
        .with_ansi(false)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
