//! Entry-space addressing and the partition algebra.
//!
//! A [`Range`] is a half-open `[begin, end)` span of dataset-global entry
//! numbers. A [`Partition`] is an ordered, contiguous, non-overlapping
//! sequence of ranges starting at zero -- the unit of work distribution and
//! the thing [`align`], [`truncate`], and [`merge`] operate on.
//!
//! `merge` uses a greedy accumulate-then-cut bin-packing policy, with the
//! last slot absorbing any remainder; `truncate` keeps leading ranges and
//! shortens the tail. Neither policy is the only reasonable choice for
//! "as close to total/n as achievable", so both are pinned down here as the
//! crate's own rounding rule.

use crate::error::{QueryosityError, Result};

/// A half-open span of dataset-global entry numbers `[begin, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    /// Inclusive start of the span.
    pub begin: u64,
    /// Exclusive end of the span.
    pub end: u64,
}

impl Range {
    /// Construct a range, asserting `begin <= end`.
    pub fn new(begin: u64, end: u64) -> Self {
        assert!(begin <= end, "range begin {begin} must not exceed end {end}");
        Self { begin, end }
    }

    /// Number of entries covered by this range.
    pub fn len(&self) -> u64 {
        self.end - self.begin
    }

    /// True if the range covers no entries.
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// An ordered, contiguous, non-overlapping sequence of [`Range`]s starting
/// at zero. The unit of work distribution across player slots.
pub type Partition = Vec<Range>;

/// Total number of entries spanned by a partition.
pub fn total_entries(partition: &Partition) -> u64 {
    partition.iter().map(Range::len).sum()
}

/// Return the common refinement of several non-empty partitions, over the
/// set of boundary points that appear in *every* input.
///
/// All inputs must share the same total span (`0..total`); if they do not,
/// this is a configuration error the processor surfaces as
/// [`QueryosityError::UnalignedPartitions`].
pub fn align(partitions: &[Partition]) -> Result<Partition> {
    let nonempty: Vec<&Partition> = partitions.iter().filter(|p| !p.is_empty()).collect();
    if nonempty.is_empty() {
        return Err(QueryosityError::NoPartition);
    }

    let totals: Vec<u64> = nonempty.iter().map(|p| total_entries(p)).collect();
    let total = totals[0];
    for t in &totals[1..] {
        if *t != total {
            return Err(QueryosityError::UnalignedPartitions(total, *t));
        }
    }

    // The common refinement's boundaries are the union of every input's
    // own range endpoints: a finer grid still respects every coarser
    // input's ranges, so union (not intersection) is the correct merge.
    let mut all_boundaries: Vec<u64> = vec![0, total];
    for p in &nonempty {
        for r in p.iter() {
            all_boundaries.push(r.end);
        }
    }
    all_boundaries.sort_unstable();
    all_boundaries.dedup();

    let mut result = Partition::with_capacity(all_boundaries.len().saturating_sub(1));
    for w in all_boundaries.windows(2) {
        result.push(Range::new(w[0], w[1]));
    }
    Ok(result)
}

/// Keep leading ranges, possibly shortening the last, so the total entry
/// count does not exceed `max_rows`. `max_rows < 0` is a no-op.
///
/// `max_rows == 0` still emits one zero-length leading range `(begin, begin)`
/// for the first input range, rather than an empty partition: the first
/// range is always visited and truncated down to its budget before the
/// remaining-budget check can end the loop.
pub fn truncate(partition: &Partition, max_rows: i64) -> Partition {
    if max_rows < 0 {
        return partition.clone();
    }

    let mut remaining = max_rows as u64;
    let mut out = Partition::new();
    for r in partition {
        let take = remaining.min(r.len());
        out.push(Range::new(r.begin, r.begin + take));
        remaining -= take;
        if remaining == 0 {
            break;
        }
    }
    out
}

/// Coalesce neighbouring ranges so the output has exactly
/// `min(n_slots, len(partition))` ranges, each as close to `total/n_slots`
/// as achievable under the constraint that ranges remain contiguous and
/// respect input boundaries.
pub fn merge(partition: &Partition, n_slots: u32) -> Partition {
    if partition.is_empty() || n_slots == 0 {
        return Partition::new();
    }
    if n_slots as usize >= partition.len() {
        return partition.clone();
    }

    let total: u64 = total_entries(partition);
    let size_per_slot = total / n_slots as u64;
    let extra = total % n_slots as u64;

    let mut merged = Partition::new();
    let mut current_start = partition[0].begin;
    let mut current_end = current_start;
    let mut accumulated: u64 = 0;
    let mut slots_created: u32 = 0;

    for r in partition {
        let part_len = r.len();
        let budget = size_per_slot + if slots_created < extra as u32 { 1 } else { 0 };
        if accumulated + part_len > budget && slots_created < n_slots - 1 {
            merged.push(Range::new(current_start, current_end));
            current_start = current_end;
            accumulated = 0;
            slots_created += 1;
        }

        accumulated += part_len;
        current_end += part_len;

        if slots_created == n_slots - 1 {
            merged.push(Range::new(current_start, partition.last().unwrap().end));
            return merged;
        }
    }

    if (merged.len() as u32) < n_slots {
        merged.push(Range::new(current_start, partition.last().unwrap().end));
    }
    merged
}
