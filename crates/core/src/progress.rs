//! Cooperative progress reporting and cancellation.
//!
//! Every long-running phase of the engine accepts a callback
//! `(step, max, phase) -> bool`. Returning `false` aborts the operation
//! with [`Error::Cancelled`] and nothing partial is ever published.

use crate::error::{Error, Result};

/// Stages at which a progress callback may be invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Filling the cache with the seeded hash chain.
    CacheSeeding,
    /// RandMemoHash passes over the seeded cache.
    CacheGeneration,
    /// Writing cache elements to disk.
    CacheSaving,
    /// Reading cache elements from disk.
    CacheLoading,
    /// Deriving dataset elements from the cache.
    DagGeneration,
    /// Writing dataset elements to disk.
    DagSaving,
    /// Reading dataset elements from disk.
    DagLoading,
}

/// Invokes a progress callback at a bounded rate, turning a `false` return
/// into [`Error::Cancelled`].
pub(crate) struct Reporter<'a> {
    callback: &'a mut dyn FnMut(usize, usize, Phase) -> bool,
    frequency: usize,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(
        callback: &'a mut dyn FnMut(usize, usize, Phase) -> bool,
        frequency: usize,
    ) -> Self {
        Self {
            callback,
            frequency: frequency.max(1),
        }
    }

    #[inline]
    pub(crate) fn step(&mut self, step: usize, max: usize, phase: Phase) -> Result<()> {
        if step % self.frequency == 0 && !(self.callback)(step, max, phase) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
