//! Control plane: how the host tells a run what to do.
//!
//! The command line selects the [`Mode`]; in validate and stream modes the
//! configuration arrives as one XML document on stdin.
//!
//! # Workflow
//!
//! 1. Host launches the executable with zero or one flag
//! 2. [`Mode::from_args`] picks the mode
//! 3. Validate/stream: [`read_document`] reads stdin to EOF
//! 4. The orchestrator parses the document and calls the plugin
//!
//! # Example
//!
//! ```
//! use modinput::control::Mode;
//!
//! let mode = Mode::from_args(&["--scheme"]).unwrap();
//! assert_eq!(mode, Mode::Scheme);
//! assert!(!mode.reads_stdin());
//! ```

mod mode;
mod stdio;

pub use mode::{Mode, SCHEME_FLAG, VALIDATE_FLAG};
pub use stdio::read_document;
