//! Stdio plumbing for a run.
//!
//! # Important
//!
//! - **stdin**: one XML document, read to EOF before any hook runs
//! - **stdout**: protocol data only (scheme, event stream, validation error)
//! - **stderr**: `LEVEL message` lines the host copies into its own log
//! - **Never use `println!`**: every byte must go through the event writer

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ModularInputError, Result};

/// Read the whole stdin document.
///
/// # Errors
///
/// Returns an I/O error if reading fails, or a parse error if the bytes are
/// not UTF-8.
pub async fn read_document<R: AsyncRead + Unpin>(mut input: R) -> Result<String> {
    let mut buf = Vec::new();
    input.read_to_end(&mut buf).await?;
    String::from_utf8(buf).map_err(|e| {
        ModularInputError::ConfigParse(format!("stdin is not valid UTF-8: {}", e))
    })
}
