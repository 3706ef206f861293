//! Protocol module - XML documents exchanged with the host.
//!
//! This module implements the data formats of the modular input protocol:
//! - Scheme document written in `--scheme` mode
//! - `<items>` validation definition read in `--validate-arguments` mode
//! - `<input>` definition read in streaming mode
//! - `<event>` fragments written inside the `<stream>` envelope

mod definition;
mod event;
mod scheme;
pub(crate) mod xml;

pub use definition::{
    InputDefinition, Metadata, ParamValue, Params, ValidationDefinition, CHECKPOINT_DIR, NAME,
    SERVER_HOST, SERVER_URI, SESSION_KEY,
};
pub use event::Event;
pub use scheme::{Argument, DataType, Scheme, StreamingMode};
