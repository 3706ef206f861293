//! Run context passed to plugin hooks.
//!
//! Holds the metadata of the current run and lazily builds the management
//! API [`Service`] from it on first use.
//!
//! # Example
//!
//! ```ignore
//! async fn stream_events(&self, inputs: &InputDefinition, ew: &EventWriter, ctx: &RunContext) -> StreamResult {
//!     let service = ctx.service()?;
//!     ew.info(format!("talking to {}", service.prefix())).await?;
//!     Ok(())
//! }
//! ```

use once_cell::sync::OnceCell;

use crate::error::Result;
use crate::protocol::{Metadata, CHECKPOINT_DIR};
use crate::service::Service;

/// Per-run state shared with the validation and streaming hooks.
#[derive(Debug, Default)]
pub struct RunContext {
    metadata: Metadata,
    service: OnceCell<Service>,
}

impl RunContext {
    /// Create a context for a run with the given metadata.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            service: OnceCell::new(),
        }
    }

    /// Metadata of the current run.
    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Checkpoint directory, if the host supplied one.
    pub fn checkpoint_dir(&self) -> Option<&str> {
        self.metadata.get(CHECKPOINT_DIR).map(String::as_str)
    }

    /// The management API handle, built on first call and reused afterwards.
    ///
    /// # Errors
    ///
    /// Fails when the metadata lacks `server_uri`/`session_key` or the URI is
    /// invalid. A failed attempt is not cached.
    pub fn service(&self) -> Result<&Service> {
        self.service
            .get_or_try_init(|| Service::from_metadata(&self.metadata))
    }

    /// Whether [`service`](Self::service) has been built.
    pub fn has_service(&self) -> bool {
        self.service.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModularInputError;

    fn metadata() -> Metadata {
        [
            ("server_uri", "https://127.0.0.1:8089"),
            ("session_key", "123102983109283019283"),
            ("checkpoint_dir", "/some/dir"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_service_is_lazy_and_memoized() {
        let ctx = RunContext::new(metadata());
        assert!(!ctx.has_service());

        let first = ctx.service().unwrap();
        assert_eq!(first.prefix(), "https://127.0.0.1:8089");
        assert!(ctx.has_service());

        let second = ctx.service().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_service_error_not_cached() {
        let ctx = RunContext::default();
        assert!(matches!(
            ctx.service(),
            Err(ModularInputError::MissingMetadata(_))
        ));
        assert!(!ctx.has_service());
    }

    #[test]
    fn test_checkpoint_dir() {
        let ctx = RunContext::new(metadata());
        assert_eq!(ctx.checkpoint_dir(), Some("/some/dir"));
        assert_eq!(ctx.metadata().len(), 3);
    }
}
