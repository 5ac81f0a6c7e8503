//! Per-slot DAG container.
//!
//! A [`Player`] owns one independent copy of every column, selection, and
//! query for a single worker slot. Columns/selections/queries are stored in
//! insertion order, since that order must be preserved for deterministic
//! per-entry execution, and are addressed by the typed index handles
//! [`ColumnId`], [`SelectionId`], and [`QueryId`] rather than raw
//! cross-pointers -- each node is just a typed offset into its player's own
//! vectors.
//!
//! [`Player::play`] implements a five-step protocol: apply scale, initialize
//! (sources, columns, selections, queries, in that order), run the entry
//! loop, finalize in reverse creation order, then clear the queries list.
//! Clearing happens *after* this function has already harvested each
//! query's boxed result into the `Vec` it returns, so that result retrieval
//! and list-clearing are atomic from the caller's point of view, rather
//! than leaving stale-but-readable state floating between `play` calls.

use crate::column::{AnyColumn, ColumnCell, Value};
use crate::error::Result;
use crate::query::AnyQuery;
use crate::selection::SelectionNode;
use crate::source::Source;
use std::any::Any;
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed, slot-local handle to a column of value type `T`.
#[derive(Debug)]
pub struct ColumnId<T> {
    pub(crate) index: usize,
    _t: PhantomData<fn() -> T>,
}

// Manual impls: `#[derive]` would otherwise require `T: Copy/Clone`, which
// column value types needn't be for the *handle* itself to be copyable.
impl<T> Clone for ColumnId<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ColumnId<T> {}

impl<T> ColumnId<T> {
    pub(crate) fn new(index: usize) -> Self {
        Self { index, _t: PhantomData }
    }
}

/// A slot-local handle to a selection node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SelectionId(pub(crate) usize);

/// A slot-local handle to a query accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueryId(pub(crate) usize);

/// One worker's private copy of the whole analysis DAG.
pub(crate) struct Player {
    slot: u32,
    current_entry: Cell<u64>,
    columns: Vec<Box<dyn AnyColumn>>,
    selections: Vec<SelectionNode>,
    queries: Vec<Box<dyn AnyQuery>>,
}

impl Player {
    pub(crate) fn new(slot: u32) -> Self {
        Self {
            slot,
            current_entry: Cell::new(0),
            columns: Vec::new(),
            selections: Vec::new(),
            queries: Vec::new(),
        }
    }

    pub(crate) fn slot(&self) -> u32 {
        self.slot
    }

    pub(crate) fn current_entry(&self) -> u64 {
        self.current_entry.get()
    }

    pub(crate) fn push_column<T: Value>(&mut self, cell: ColumnCell<T>) -> ColumnId<T> {
        let index = self.columns.len();
        self.columns.push(Box::new(cell));
        ColumnId::new(index)
    }

    pub(crate) fn push_selection(&mut self, node: SelectionNode) -> SelectionId {
        let index = self.selections.len();
        self.selections.push(node);
        SelectionId(index)
    }

    pub(crate) fn push_query(&mut self, query: Box<dyn AnyQuery>) -> QueryId {
        let index = self.queries.len();
        self.queries.push(query);
        QueryId(index)
    }

    /// Read (computing if necessary) the value of column `id` for the
    /// current entry.
    pub(crate) fn value<T: Value>(&self, id: ColumnId<T>) -> Result<T> {
        let col = self.columns[id.index]
            .as_any()
            .downcast_ref::<ColumnCell<T>>()
            .expect("column type mismatch: construction invariant violated");
        col.value(self)
    }

    /// Evaluate (computing if necessary) the `(passed, weight)` pair for
    /// selection `id`, recursing through its preselection chain.
    pub(crate) fn selection_state(&self, id: SelectionId) -> Result<(bool, f64)> {
        self.selections[id.0].evaluate(self)
    }

    /// Run this player's assigned entry range.
    ///
    /// Returns one boxed result per query, in the player's query insertion
    /// order, after which the player's query list is cleared so a second
    /// `play` call cannot double-count.
    pub(crate) fn play(
        &mut self,
        sources: &[Arc<dyn Source>],
        scale: f64,
        begin: u64,
        end: u64,
    ) -> Result<Vec<Box<dyn Any + Send>>> {
        for q in &self.queries {
            q.set_scale(scale);
        }

        for s in sources {
            s.initialize_slot(self.slot, begin, end);
        }
        for c in &self.columns {
            c.initialize(self.slot, begin, end)?;
        }
        for q in &self.queries {
            q.initialize(self.slot, begin, end);
        }

        for entry in begin..end {
            for s in sources {
                s.execute_slot(self.slot, entry);
            }
            self.current_entry.set(entry);
            for c in &self.columns {
                c.reset();
            }
            for sel in &self.selections {
                sel.reset();
            }
            for q in &self.queries {
                q.execute(self)?;
            }
        }

        for q in &self.queries {
            q.finalize(self.slot);
        }
        for c in &self.columns {
            c.finalize(self.slot);
        }
        for s in sources {
            s.finalize_slot(self.slot);
        }

        let results = self.queries.iter().map(|q| q.result_any()).collect();
        self.queries.clear();
        Ok(results)
    }
}
