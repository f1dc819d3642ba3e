//! [`MapCursor`]: step-wise iteration over a map's entries.
//!
//! The cursor owns one key buffer and one value buffer and rewrites them on
//! every step. Entries are handed out as borrows that end before the next
//! step, so a caller that wants to keep an entry has to copy it.

use crate::error::KernelError;
use crate::traits::MapHandle;

/// Walks a map with next-key/lookup pairs.
pub struct MapCursor<'h, H: MapHandle> {
    handle: &'h H,
    key: Vec<u8>,
    next: Vec<u8>,
    value: Vec<u8>,
    started: bool,
    finished: bool,
    steps: u64,
    limit: u64,
}

impl<'h, H: MapHandle> MapCursor<'h, H> {
    /// Creates a cursor positioned before the first key.
    ///
    /// `max_entries` bounds the walk; a map with no declared capacity is
    /// walked without a bound.
    pub fn new(handle: &'h H, max_entries: u32) -> Self {
        let limit = if max_entries == 0 {
            u64::MAX
        } else {
            u64::from(max_entries)
        };
        MapCursor {
            handle,
            key: vec![0; handle.key_len()],
            next: vec![0; handle.key_len()],
            value: vec![0; handle.value_len()],
            started: false,
            finished: false,
            steps: 0,
            limit,
        }
    }

    /// Advances to the next entry.
    ///
    /// Returns `Ok(None)` once the walk is complete. A key deleted between
    /// the next-key and lookup calls is skipped.
    pub fn next_entry(&mut self) -> Result<Option<(&[u8], &[u8])>, KernelError> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let prev = if self.started {
                Some(self.key.as_slice())
            } else {
                None
            };
            match self.handle.next_key(prev, &mut self.next) {
                Ok(()) => {}
                Err(KernelError::EndOfSequence) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
            self.started = true;
            std::mem::swap(&mut self.key, &mut self.next);

            self.steps += 1;
            if self.steps > self.limit {
                return Err(KernelError::IterationAborted { steps: self.steps });
            }

            match self.handle.lookup(&self.key, &mut self.value) {
                Ok(()) => return Ok(Some((&self.key, &self.value))),
                Err(KernelError::NotFound) => {
                    tracing::debug!(steps = self.steps, "entry vanished between next-key and lookup");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
