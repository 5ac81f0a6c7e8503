//! Per-entry query accumulators.
//!
//! A [`Query`] is bound to exactly one selection and accumulates a typed
//! result across the entries that selection passes, using the current
//! selection weight (or `1` if weights are disabled) times a dataflow-global
//! scale. The shape is a small `create`/`add_input`/`merge`/`finish`-style
//! combine function, specialized to a per-entry, weighted, selection-gated
//! fill protocol instead of a per-key batch fold.
//!
//! Fill-group argument lists are modeled with [`FillArgs`], implemented for
//! tuples of up to three typed columns -- the Rust analogue of a variadic
//! "fill with N observables" call.

use crate::error::Result;
use crate::player::{ColumnId, Player, SelectionId};
use crate::column::Value;
use std::any::Any;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod builtins;
pub use builtins::{Count, Series, Sum};

/// The arguments passed to [`Query::fill`] for one fill group, extracted
/// from a player's columns for the current entry.
pub trait FillArgs: Send + 'static {
    /// The tuple of typed column handles needed to produce `Self`.
    type Ids: Clone + Send + Sync + 'static;

    /// Read the bound columns and assemble the fill arguments.
    fn from_player(player: &Player, ids: &Self::Ids) -> Result<Self>
    where
        Self: Sized;
}

impl FillArgs for () {
    type Ids = ();
    fn from_player(_player: &Player, _ids: &()) -> Result<Self> {
        Ok(())
    }
}

impl<A: Value> FillArgs for (A,) {
    type Ids = (ColumnId<A>,);
    fn from_player(player: &Player, ids: &(ColumnId<A>,)) -> Result<Self> {
        Ok((player.value(ids.0)?,))
    }
}

impl<A: Value, B: Value> FillArgs for (A, B) {
    type Ids = (ColumnId<A>, ColumnId<B>);
    fn from_player(player: &Player, ids: &(ColumnId<A>, ColumnId<B>)) -> Result<Self> {
        Ok((player.value(ids.0)?, player.value(ids.1)?))
    }
}

impl<A: Value, B: Value, C: Value> FillArgs for (A, B, C) {
    type Ids = (ColumnId<A>, ColumnId<B>, ColumnId<C>);
    fn from_player(player: &Player, ids: &(ColumnId<A>, ColumnId<B>, ColumnId<C>)) -> Result<Self> {
        Ok((player.value(ids.0)?, player.value(ids.1)?, player.value(ids.2)?))
    }
}

/// A per-entry accumulator bound to exactly one selection.
///
/// Implementors hold whatever running state they need (a running sum, a
/// `Vec` of observations, a histogram's bin counts, ...). `count` is called
/// once per passing entry for queries with zero fill groups (pure
/// counters); `fill` is called once per fill group per passing entry for
/// queries that declare one or more.
pub trait Query: Send + 'static {
    /// The shape of one fill group's arguments.
    type Fill: FillArgs;
    /// The typed result this query yields, mergeable across slots. Must be
    /// `Clone` so a dataflow can read a slot's boxed result out without
    /// consuming it (other queries booked on the same player share the same
    /// per-slot result vector).
    type Result: Send + Clone + 'static;

    /// Arity-0 fill, for pure counters (no fill groups declared).
    fn count(&mut self, weight: f64) {
        let _ = weight;
    }

    /// Invoked once per fill group per passing entry.
    fn fill(&mut self, args: Self::Fill, weight: f64) {
        let _ = (args, weight);
    }

    /// Produce this slot's result from the accumulator's current state.
    fn result(&self) -> Self::Result;

    /// Combine one result per slot into a single result. Must be
    /// associative and commutative: partitioning order across slots is not
    /// guaranteed stable across runs.
    fn merge(results: Vec<Self::Result>) -> Self::Result;
}

/// Type-erased, slot-local lifecycle surface every query in a `Player`
/// exposes, regardless of its accumulator/result types.
pub(crate) trait AnyQuery: Send {
    fn set_scale(&self, scale: f64);
    fn initialize(&self, slot: u32, begin: u64, end: u64);
    fn execute(&self, player: &Player) -> Result<()>;
    fn finalize(&self, slot: u32);
    fn result_any(&self) -> Box<dyn Any + Send>;
}

/// A single query instance, owned by one [`Player`], bound to one
/// selection, with zero or more fill groups.
pub(crate) struct QueryRuntime<Q: Query> {
    accumulator: RefCell<Q>,
    selection: SelectionId,
    own_scale: f64,
    scale_bits: AtomicU64,
    use_weight: bool,
    fill_groups: Vec<<Q::Fill as FillArgs>::Ids>,
}

impl<Q: Query> QueryRuntime<Q> {
    pub(crate) fn new(
        accumulator: Q,
        selection: SelectionId,
        own_scale: f64,
        use_weight: bool,
        fill_groups: Vec<<Q::Fill as FillArgs>::Ids>,
    ) -> Self {
        Self {
            accumulator: RefCell::new(accumulator),
            selection,
            own_scale,
            scale_bits: AtomicU64::new(own_scale.to_bits()),
            use_weight,
            fill_groups,
        }
    }
}

impl<Q: Query> AnyQuery for QueryRuntime<Q> {
    fn set_scale(&self, global_scale: f64) {
        self.scale_bits
            .store((self.own_scale * global_scale).to_bits(), Ordering::Relaxed);
    }

    fn initialize(&self, _slot: u32, _begin: u64, _end: u64) {}

    fn execute(&self, player: &Player) -> Result<()> {
        let (passed, selection_weight) = player.selection_state(self.selection)?;
        if !passed {
            return Ok(());
        }

        let scale = f64::from_bits(self.scale_bits.load(Ordering::Relaxed));
        let w = scale * if self.use_weight { selection_weight } else { 1.0 };

        let mut acc = self.accumulator.borrow_mut();
        if self.fill_groups.is_empty() {
            acc.count(w);
        } else {
            for ids in &self.fill_groups {
                let args = Q::Fill::from_player(player, ids)?;
                acc.fill(args, w);
            }
        }
        Ok(())
    }

    fn finalize(&self, _slot: u32) {}

    fn result_any(&self) -> Box<dyn Any + Send> {
        Box::new(self.accumulator.borrow().result())
    }
}
