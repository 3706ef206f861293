//! Invocation mode selection.
//!
//! The host launches the same executable in three ways:
//!
//! | arguments              | mode                |
//! |------------------------|---------------------|
//! | (none)                 | [`Mode::Stream`]    |
//! | `--scheme`             | [`Mode::Scheme`]    |
//! | `--validate-arguments` | [`Mode::Validate`]  |
//!
//! Flags are matched case-insensitively. Anything else is rejected.

use crate::error::{ModularInputError, Result};

/// Flag requesting the scheme document.
pub const SCHEME_FLAG: &str = "--scheme";
/// Flag requesting validation of a proposed stanza.
pub const VALIDATE_FLAG: &str = "--validate-arguments";

/// What the host asked this invocation to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Print the scheme and exit.
    Scheme,
    /// Validate the stanza on stdin.
    Validate,
    /// Stream events for the stanzas on stdin.
    Stream,
}

impl Mode {
    /// Select the mode from the arguments after the program path.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        match args {
            [] => Ok(Mode::Stream),
            [flag] if flag.as_ref().eq_ignore_ascii_case(SCHEME_FLAG) => Ok(Mode::Scheme),
            [flag] if flag.as_ref().eq_ignore_ascii_case(VALIDATE_FLAG) => Ok(Mode::Validate),
            _ => Err(ModularInputError::UnrecognizedArguments(
                args.iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<&str>>()
                    .join(" "),
            )),
        }
    }

    /// Whether this mode reads a document from stdin.
    pub fn reads_stdin(self) -> bool {
        !matches!(self, Mode::Scheme)
    }
}
