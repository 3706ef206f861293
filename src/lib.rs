//! # modinput
//!
//! Rust runtime for modular input plugins.
//!
//! A modular input is an executable the host launches repeatedly, talking to
//! it only through the command line, stdin, stdout and stderr. This crate
//! implements that contract; plugin authors implement [`ModularInput`].
//!
//! ## Architecture
//!
//! - **Control** (argv + stdin): mode flag and one XML configuration document
//! - **Data** (stdout): scheme document, `<stream>` of events, or validation error
//! - **Log** (stderr): `LEVEL message` lines
//!
//! ## Example
//!
//! ```ignore
//! use modinput::handler::{ModularInput, RunContext};
//! use modinput::protocol::{Event, InputDefinition, Scheme};
//! use modinput::{EventWriter, Script, StreamResult};
//!
//! struct Hello;
//!
//! impl ModularInput for Hello {
//!     fn scheme(&self) -> Option<Scheme> {
//!         Some(Scheme::new("hello"))
//!     }
//!
//!     async fn stream_events(
//!         &self,
//!         inputs: &InputDefinition,
//!         writer: &EventWriter,
//!         _ctx: &RunContext,
//!     ) -> StreamResult {
//!         for stanza in inputs.inputs.keys() {
//!             writer.write_event(&Event::new("hello").stanza(stanza.as_str())).await?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     Script::new(Hello).run().await.into()
//! }
//! ```

pub mod control;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod service;
pub mod telemetry;

mod script;
mod sink;
mod writer;

pub use error::{
    BoxError, ModularInputError, SinkKind, StreamResult, ValidationError, ValidationResult,
};
pub use handler::{ModularInput, RunContext};
pub use script::{RunConfig, RunOutcome, RunReport, Script};
pub use service::Service;
pub use sink::{BoundedSink, UNBOUNDED};
pub use writer::{
    spawn_event_writer, spawn_event_writer_default, EventWriter, Severity, WriterConfig,
    WriterTask, DEFAULT_CHANNEL_CAPACITY,
};
