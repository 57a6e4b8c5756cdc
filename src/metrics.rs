//! Row heights for the virtualized table.
//!
//! Heights are in pixels so they stay independent of the surface drawing
//! them; the terminal ui maps them to lines with [`PIXELS_PER_LINE`].

use std::ops::Range;

use tracing::trace;

use crate::dataset::{Dataset, Record};

pub const MIN_ROW_HEIGHT: u16 = 40;
pub const MAX_ROW_HEIGHT: u16 = 200;
pub const ROW_HEIGHT_STEP: u16 = 20;
pub const CHARS_PER_STEP: usize = 50;
pub const PIXELS_PER_LINE: u16 = 20;

/// Height of one row, derived from its longest value in the selected columns.
pub fn row_height(record: &Record, selected: &[String]) -> u16 {
    let max_len = selected
        .iter()
        .map(|f| record.get(f).chars().count())
        .max()
        .unwrap_or(0);
    let steps = (max_len / CHARS_PER_STEP).min(usize::from(MAX_ROW_HEIGHT / ROW_HEIGHT_STEP));
    let height = MIN_ROW_HEIGHT as usize + steps * ROW_HEIGHT_STEP as usize;
    height.min(MAX_ROW_HEIGHT as usize) as u16
}

/// Number of terminal lines a row of `height` pixels occupies.
pub fn lines_for(height: u16) -> u16 {
    (height / PIXELS_PER_LINE).max(1)
}

/// Heights and offsets of every visible row.
///
/// Built from scratch for each new view and thrown away afterwards, it is
/// never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowMetrics {
    heights: Vec<u16>,
    // offsets[i] is the top of row i, offsets[len] the total height.
    offsets: Vec<u64>,
}

impl RowMetrics {
    pub fn build(dataset: &Dataset, rows: &[usize], selected: &[String]) -> Self {
        let heights: Vec<u16> = dataset
            .rows(rows)
            .map(|r| row_height(r, selected))
            .collect();
        let mut offsets = Vec::with_capacity(heights.len() + 1);
        let mut acc = 0u64;
        offsets.push(acc);
        for h in &heights {
            acc += u64::from(*h);
            offsets.push(acc);
        }
        trace!("Row metrics for {} rows, total height {acc}", heights.len());
        RowMetrics { heights, offsets }
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    pub fn height(&self, index: usize) -> Option<u16> {
        self.heights.get(index).copied()
    }

    /// Top of row `index` measured from the top of the first row.
    pub fn offset(&self, index: usize) -> Option<u64> {
        if index < self.heights.len() {
            self.offsets.get(index).copied()
        } else {
            None
        }
    }

    pub fn total_height(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Row covering `offset`. Offsets past the end resolve to the last row.
    pub fn index_at(&self, offset: u64) -> Option<usize> {
        if self.heights.is_empty() {
            return None;
        }
        // First boundary strictly greater than offset ends the covering row.
        let idx = self.offsets.partition_point(|&o| o <= offset);
        Some(idx.saturating_sub(1).min(self.heights.len() - 1))
    }

    /// Rows starting at `first` that begin inside a viewport of `viewport` pixels.
    pub fn visible_range(&self, first: usize, viewport: u64) -> Range<usize> {
        let Some(top) = self.offset(first) else {
            return first..first;
        };
        let bottom = top + viewport;
        let end = self.offsets[first..self.heights.len()].partition_point(|&o| o < bottom) + first;
        first..end.max(first + 1).min(self.heights.len())
    }

    /// First row to draw so that `target` is fully inside the viewport, keeping `current` when possible.
    pub fn scroll_to(&self, current: usize, target: usize, viewport: u64) -> usize {
        let (Some(top), Some(height)) = (self.offset(target), self.height(target)) else {
            return current;
        };
        if target <= current {
            return target;
        }
        let bottom = top + u64::from(height);
        let Some(current_top) = self.offset(current) else {
            return target;
        };
        if bottom <= current_top + viewport {
            return current;
        }
        let wanted_top = bottom.saturating_sub(viewport);
        match self.index_at(wanted_top) {
            Some(idx) if self.offsets[idx] < wanted_top => (idx + 1).min(target),
            Some(idx) => idx.min(target),
            None => target,
        }
    }
}
