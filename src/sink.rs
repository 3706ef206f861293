//! Capacity-bounded output sinks.
//!
//! A [`BoundedSink`] wraps an async writer with a write position and a
//! fixed capacity. A write that does not fit is rejected up front, so the
//! bytes already committed stay exactly as they were.
//!
//! The process sinks are unbounded in practice ([`UNBOUNDED`]); small
//! capacities are useful when a host-side buffer size must be honoured, and
//! in tests.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{ModularInputError, Result, SinkKind};

/// Capacity meaning "no limit".
pub const UNBOUNDED: usize = usize::MAX;

/// An async writer with a monotonically increasing position and a cap.
#[derive(Debug)]
pub struct BoundedSink<W> {
    kind: SinkKind,
    inner: W,
    position: usize,
    capacity: usize,
}

impl<W> BoundedSink<W> {
    /// Wrap `inner` with the given capacity.
    pub fn new(kind: SinkKind, inner: W, capacity: usize) -> Self {
        Self {
            kind,
            inner,
            position: 0,
            capacity,
        }
    }

    /// Wrap `inner` without a capacity limit.
    pub fn unbounded(kind: SinkKind, inner: W) -> Self {
        Self::new(kind, inner, UNBOUNDED)
    }

    /// Which stream this sink feeds.
    #[inline]
    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    /// Bytes committed so far.
    #[inline]
    pub fn bytes_written(&self) -> usize {
        self.position
    }

    /// Maximum number of bytes this sink accepts.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes that can still be written.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.position)
    }

    /// Whether a write of `len` bytes would fit.
    #[inline]
    pub fn can_accept(&self, len: usize) -> bool {
        len <= self.remaining()
    }

    /// Borrow the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> BoundedSink<W> {
    /// Write and flush all of `bytes`, or nothing if they do not fit.
    ///
    /// An I/O error part way through leaves the position unchanged; whatever
    /// the underlying writer accepted is outside this sink's control.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.can_accept(bytes.len()) {
            return Err(ModularInputError::WriteOverflow {
                sink: self.kind,
                requested: bytes.len(),
                remaining: self.remaining(),
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        self.position += bytes.len();
        Ok(())
    }
}
