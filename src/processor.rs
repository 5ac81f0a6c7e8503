//! Parallel partitioned driver.
//!
//! [`Processor`] resolves a concurrency hint to an actual slot count (`0`
//! means single-threaded/one slot, negative means "use all hardware
//! threads", positive means "up to this many, capped at hardware
//! threads"), computes a common partition across all loaded sources' own
//! partitions, and runs each player's assigned range -- one `rayon` scope
//! task per range in multi-threaded mode, a plain sequential loop in
//! single-threaded mode. There is no work-stealing: one thread runs one
//! range to completion, and a single join barrier waits for all of them.
//!
//! The processor does not aggregate query results across slots -- that
//! happens on demand in [`crate::dataflow::Dataflow`] via each query's own
//! `Query::merge`, once it is known which query is actually being asked
//! for.

use crate::error::{QueryosityError, Result};
use crate::partition::{self, Partition};
use crate::player::Player;
use crate::source::Source;
use std::any::Any;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::MetricsCollector;

/// Resolve a concurrency suggestion to an actual slot count.
///
/// `0` -> 1 (single-threaded). Negative -> hardware concurrency. Positive
/// -> `min(hardware concurrency, n)`.
pub fn resolve_concurrency(suggestion: i32) -> u32 {
    match suggestion.cmp(&0) {
        std::cmp::Ordering::Equal => 1,
        std::cmp::Ordering::Less => num_cpus::get() as u32,
        std::cmp::Ordering::Greater => (num_cpus::get() as u32).min(suggestion as u32),
    }
}

/// The parallel, partitioned entry-loop driver.
pub struct Processor {
    concurrency_suggestion: i32,
    /// Upper bound on entries processed; `< 0` means unbounded.
    pub max_rows: i64,
    #[cfg(feature = "metrics")]
    metrics: Option<MetricsCollector>,
}

impl Processor {
    /// Construct a processor with a concurrency suggestion (see
    /// [`resolve_concurrency`]) and no row limit.
    pub fn new(concurrency_suggestion: i32) -> Self {
        Self {
            concurrency_suggestion,
            max_rows: -1,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// The number of player slots this processor will drive.
    pub fn concurrency(&self) -> u32 {
        resolve_concurrency(self.concurrency_suggestion)
    }

    /// Attach a metrics collector (see [`crate::metrics`]).
    #[cfg(feature = "metrics")]
    pub fn set_metrics(&mut self, metrics: MetricsCollector) {
        self.metrics = Some(metrics);
    }

    /// Take the attached metrics collector, if any.
    #[cfg(feature = "metrics")]
    pub fn take_metrics(&mut self) -> Option<MetricsCollector> {
        self.metrics.take()
    }

    /// Run the full process: initialize sources, compute the aligned and
    /// downsized partition, dispatch each range to its player, finalize
    /// sources. Returns one boxed result per query per active slot, in
    /// `[slot][query]` order.
    pub(crate) fn process(
        &self,
        sources: &[Arc<dyn Source>],
        players: &mut [Player],
        scale: f64,
    ) -> Result<Vec<Vec<Box<dyn Any + Send>>>> {
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.record_start();
        }

        for s in sources {
            s.initialize();
        }

        let partitions: Vec<Partition> = sources
            .iter()
            .map(|s| s.partition())
            .filter(|p| !p.is_empty())
            .collect();
        if partitions.is_empty() {
            return Err(QueryosityError::NoPartition);
        }

        let aligned = partition::align(&partitions)?;
        let truncated = partition::truncate(&aligned, self.max_rows);
        let n_slots = self.concurrency();
        let merged = partition::merge(&truncated, n_slots);

        let active_len = merged.len().min(players.len());
        let active = &mut players[..active_len];

        let results: Vec<Vec<Box<dyn Any + Send>>> = if n_slots <= 1 {
            active
                .iter_mut()
                .zip(merged.iter())
                .map(|(p, r)| p.play(sources, scale, r.begin, r.end))
                .collect::<Result<Vec<_>>>()?
        } else {
            use rayon::prelude::*;
            active
                .par_iter_mut()
                .zip(merged.par_iter())
                .map(|(p, r)| p.play(sources, scale, r.begin, r.end))
                .collect::<Result<Vec<_>>>()?
        };

        for s in sources {
            s.finalize();
        }

        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.record_end();
            m.set_counter("entries_processed", partition::total_entries(&merged));
            m.set_counter("slots_used", active_len as u64);
        }

        Ok(results)
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_zero_is_single_threaded() {
        assert_eq!(resolve_concurrency(0), 1);
    }

    #[test]
    fn concurrency_negative_uses_hardware_count() {
        assert_eq!(resolve_concurrency(-1), num_cpus::get() as u32);
    }

    #[test]
    fn concurrency_positive_is_capped_at_hardware_count() {
        let huge = i32::MAX;
        assert_eq!(resolve_concurrency(huge), num_cpus::get() as u32);
    }
}
