//! Error types for the modular input runtime.

use std::fmt;

use thiserror::Error;

/// Which output stream a write was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// The data stream (stdout): scheme documents, events, validation errors.
    Out,
    /// The log stream (stderr): `LEVEL message` lines.
    Err,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Out => f.write_str("stdout"),
            SinkKind::Err => f.write_str("stderr"),
        }
    }
}

/// Main error type for all runtime operations.
#[derive(Debug, Error)]
pub enum ModularInputError {
    /// I/O error while reading stdin or writing a sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The XML document piped to stdin could not be understood.
    #[error("failed to parse input configuration: {0}")]
    ConfigParse(String),

    /// The scheme hook returned nothing.
    #[error("Modular input script returned a null scheme.")]
    NullScheme,

    /// A scheme broke one of its invariants.
    #[error("invalid scheme: {0}")]
    InvalidScheme(String),

    /// Two arguments with the same name were added to a scheme.
    #[error("duplicate argument name: {0}")]
    DuplicateArgument(String),

    /// An event could not be serialized.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A write would have pushed a sink past its capacity.
    #[error("write of {requested} bytes overflows {sink} ({remaining} bytes remaining)")]
    WriteOverflow {
        /// Sink the write was aimed at.
        sink: SinkKind,
        /// Size of the rejected write.
        requested: usize,
        /// Capacity left before the write.
        remaining: usize,
    },

    /// The writer task has finished; the run is over.
    #[error("event writer is closed")]
    WriterClosed,

    /// Metadata needed to reach the management API is absent.
    #[error("missing metadata field: {0}")]
    MissingMetadata(&'static str),

    /// The `server_uri` metadata is not a usable URI.
    #[error("invalid server URI: {0}")]
    InvalidServerUri(String),

    /// The command line did not select a known mode.
    #[error("Invalid arguments to modular input script: {0}")]
    UnrecognizedArguments(String),

    /// The streaming hook failed or panicked.
    #[error("{0}")]
    Streaming(String),
}

impl From<quick_xml::Error> for ModularInputError {
    fn from(err: quick_xml::Error) -> Self {
        ModularInputError::ConfigParse(err.to_string())
    }
}

/// Result type alias using ModularInputError.
pub type Result<T> = std::result::Result<T, ModularInputError>;

/// Boxed error returned by plugin streaming hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a validation hook.
///
/// The message is shown to the operator verbatim, so it should describe what
/// is wrong with the proposed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    /// Create a validation failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The operator-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Outcome of a validation hook.
pub type ValidationResult = std::result::Result<(), ValidationError>;

/// Outcome of a streaming hook.
pub type StreamResult = std::result::Result<(), BoxError>;
