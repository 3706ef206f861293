//! Plugin hooks.
//!
//! Provides:
//! - [`ModularInput`] - the three behaviours a plugin implements
//! - [`RunContext`] - run metadata and the lazy management API handle
//!
//! # Example
//!
//! ```
//! use modinput::handler::{ModularInput, RunContext};
//! use modinput::protocol::{Event, InputDefinition, Scheme};
//! use modinput::{EventWriter, StreamResult};
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
//! ```

mod context;

use std::future::Future;

pub use context::RunContext;

use crate::error::{StreamResult, ValidationResult};
use crate::protocol::{InputDefinition, Scheme, ValidationDefinition};
use crate::writer::EventWriter;

/// The capability interface a modular input implements.
///
/// The orchestrator only ever talks to a plugin through this trait. Exactly
/// one hook runs per process.
pub trait ModularInput: Send + Sync + 'static {
    /// Describe the configuration this input accepts.
    ///
    /// Returning `None` is a fatal error reported to the host.
    fn scheme(&self) -> Option<Scheme>;

    /// Check a proposed stanza before the host saves it.
    ///
    /// Only called when the scheme sets `use_external_validation`. The
    /// default accepts everything.
    fn validate_input(
        &self,
        definition: &ValidationDefinition,
        ctx: &RunContext,
    ) -> impl Future<Output = ValidationResult> + Send {
        let _ = (definition, ctx);
        async { Ok(()) }
    }

    /// Stream events for the configured stanzas.
    ///
    /// Returning (or panicking) ends the run; `Err` makes it fail.
    fn stream_events(
        &self,
        inputs: &InputDefinition,
        writer: &EventWriter,
        ctx: &RunContext,
    ) -> impl Future<Output = StreamResult> + Send;
}
