//! Data slicing — which bars a generation or simulation slice sees.
//!
//! Two shapes:
//! - [`DataSlice`]: a fixed-length window that shifts forward once per
//!   generation, wrapping back to its start index when looping is enabled.
//! - [`subslices`]: consecutive, non-overlapping ranges covering `start..end`
//!   for the multi-slice trade simulation. The last one may be shorter.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DataSliceConfig;

/// Sliding window over a price series of known length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSlice {
    origin: usize,
    start: usize,
    len: usize,
    shift: usize,
    looping: bool,
    available: usize,
    exhausted: bool,
}

impl DataSlice {
    /// Window of `config.slice_size` bars starting at `config.start_index`,
    /// clipped to the `available` bars.
    pub fn new(config: &DataSliceConfig, available: usize) -> Self {
        let origin = config.start_index.min(available.saturating_sub(1));
        let len = config.slice_size.min(available - origin).max(1);
        Self {
            origin,
            start: origin,
            len,
            shift: config.shift_per_generation,
            looping: config.looping,
            available,
            exhausted: false,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// True once a non-looping slice has been pinned to the last full window.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Move the window forward by one generation's shift.
    pub fn advance(&mut self) {
        if self.shift == 0 {
            return;
        }
        let next = self.start + self.shift;
        if next + self.len <= self.available {
            self.start = next;
            return;
        }
        if self.looping {
            debug!(from = self.start, to = self.origin, "data slice wrapped");
            self.start = self.origin;
        } else {
            self.start = self.available.saturating_sub(self.len);
            self.exhausted = true;
        }
    }
}

/// Consecutive ranges of at most `size` steps covering `start..end`.
///
/// `ceil((end - start) / size)` ranges; empty when `start >= end` or `size == 0`.
pub fn subslices(start: usize, end: usize, size: usize) -> Vec<Range<usize>> {
    if size == 0 || start >= end {
        return Vec::new();
    }
    (start..end)
        .step_by(size)
        .map(|s| s..(s + size).min(end))
        .collect()
}
