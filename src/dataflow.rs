//! The user-facing graph builder.
//!
//! A [`Dataflow`] owns one [`Player`] per slot (the slot count fixed at
//! construction from the [`Processor`]'s resolved concurrency) and mints
//! **lazy handles** that thread every builder call across all of them in
//! lockstep: `read`/`define` push one column per player, `filter`/`weight`
//! push one selection per player, `make(...).fill(...).book()` pushes one
//! query per player. Because every push happens to every player in the
//! same order, a handle's per-slot index is the identical integer for
//! every player -- this is what lets [`crate::query::FillArgs`] and
//! [`crate::selection::SelectionNode::new`] take a single index rather
//! than a per-slot vector of them.
//!
//! `Dataflow` is a thin, cheaply cloneable wrapper around a shared,
//! `Mutex`-protected inner state: builder methods take `&self`, so a
//! caller can hold several lazy handles plus the dataflow itself
//! simultaneously without fighting the borrow checker.

use crate::column::{ColumnCell, Value};
use crate::error::Result;
use crate::lazy::{Lazy, LazyQuery, LazySelection, QueryBuilder};
use crate::player::{Player, QueryId};
use crate::processor::Processor;
use crate::query::{FillArgs, Query, QueryRuntime};
use crate::selection::{SelectionKind, SelectionNode};
use crate::source::Source;
use std::any::Any;
use std::sync::{Arc, Mutex};

#[cfg(feature = "metrics")]
use crate::metrics::MetricsCollector;

struct DataflowInner {
    players: Vec<Player>,
    sources: Vec<Arc<dyn Source>>,
    processor: Processor,
    scale: f64,
    analyzed: bool,
    query_results: Option<Vec<Vec<Box<dyn Any + Send>>>>,
}

impl DataflowInner {
    fn register_source(&mut self, source: Arc<dyn Source>) {
        if self
            .sources
            .iter()
            .any(|s| Arc::ptr_eq(s, &source))
        {
            return;
        }
        self.sources.push(source);
    }

    fn invalidate(&mut self) {
        self.analyzed = false;
        self.query_results = None;
    }
}

/// The user-facing graph builder. Cheap to clone; clones share the same
/// underlying players and sources.
#[derive(Clone)]
pub struct Dataflow {
    inner: Arc<Mutex<DataflowInner>>,
}

impl Dataflow {
    /// Construct a dataflow with `processor`'s resolved concurrency worth
    /// of empty players.
    pub fn new(processor: Processor) -> Self {
        let n_slots = processor.concurrency();
        let players = (0..n_slots).map(Player::new).collect();
        Self {
            inner: Arc::new(Mutex::new(DataflowInner {
                players,
                sources: Vec::new(),
                processor,
                scale: 1.0,
                analyzed: false,
                query_results: None,
            })),
        }
    }

    /// Set a global scale factor applied to every query's weight.
    pub fn set_scale(&self, scale: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.scale = scale;
        inner.invalidate();
    }

    /// Cap the total number of entries processed; `< 0` is unbounded.
    pub fn set_max_rows(&self, max_rows: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.processor.max_rows = max_rows;
        inner.invalidate();
    }

    /// Attach a metrics collector to this dataflow's processor.
    #[cfg(feature = "metrics")]
    pub fn set_metrics(&self, metrics: MetricsCollector) {
        let mut inner = self.inner.lock().unwrap();
        inner.processor.set_metrics(metrics);
    }

    /// Take the attached metrics collector, if any.
    #[cfg(feature = "metrics")]
    pub fn take_metrics(&self) -> Option<MetricsCollector> {
        let mut inner = self.inner.lock().unwrap();
        inner.processor.take_metrics()
    }

    /// Allocate a column reader bound to `name` on `source`, in every
    /// player.
    pub fn read<T: Value>(&self, source: Arc<dyn Source>, name: impl Into<String>) -> Lazy<T> {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        inner.register_source(source.clone());
        let ids = inner
            .players
            .iter_mut()
            .map(|p| p.push_column(ColumnCell::reader(source.clone(), name.clone())))
            .collect();
        Lazy::new(self.clone(), ids)
    }

    /// Allocate a column reader varied under one or more named alternate
    /// columns, all read from `source`. `nominal_name` is the column the
    /// unvaried handle reads; each entry in `variations` maps a variation
    /// name to the column it reads instead.
    pub fn vary_read<T: Value>(
        &self,
        source: Arc<dyn Source>,
        nominal_name: impl Into<String>,
        variations: impl IntoIterator<Item = (String, String)>,
    ) -> crate::systematic::Systematic<Lazy<T>> {
        let nominal = self.read::<T>(source.clone(), nominal_name);
        let varied = variations
            .into_iter()
            .map(|(var_name, column_name)| (var_name, self.read::<T>(source.clone(), column_name)))
            .collect::<Vec<_>>();
        crate::systematic::Systematic::vary(nominal, varied)
    }

    /// Allocate a fixed-value column, in every player.
    pub fn define<T: Value>(&self, value: T) -> Lazy<T> {
        let mut inner = self.inner.lock().unwrap();
        let ids = inner
            .players
            .iter_mut()
            .map(|p| p.push_column(ColumnCell::fixed(value.clone())))
            .collect();
        Lazy::new(self.clone(), ids)
    }

    /// Allocate a definition column computed from other columns' values, in
    /// every player. `ids` is a single fill-argument index tuple (e.g.
    /// `(col_a.id(), col_b.id())`): valid for every player because builder
    /// calls replicate in lockstep, so a column's index is identical across
    /// slots.
    pub fn define_with<Args, F, T>(&self, ids: Args::Ids, f: F) -> Lazy<T>
    where
        Args: FillArgs,
        F: Fn(Args) -> T + Send + Sync + Clone + 'static,
        T: Value,
    {
        let mut inner = self.inner.lock().unwrap();
        let out_ids = inner
            .players
            .iter_mut()
            .map(|p| {
                let ids = ids.clone();
                let f = f.clone();
                p.push_column(ColumnCell::definition(move |player: &Player| {
                    let args = Args::from_player(player, &ids).map_err(|e| e.to_string())?;
                    Ok(f(args))
                }))
            })
            .collect();
        Lazy::new(self.clone(), out_ids)
    }

    /// Allocate an initial cut, in every player.
    pub fn filter(&self, decision: &Lazy<f64>) -> LazySelection {
        self.new_selection(None, decision, SelectionKind::Cut)
    }

    /// Allocate an initial weight, in every player.
    pub fn weight(&self, decision: &Lazy<f64>) -> LazySelection {
        self.new_selection(None, decision, SelectionKind::Weight)
    }

    pub(crate) fn compound_selection(
        &self,
        parent: Option<&LazySelection>,
        decision: &Lazy<f64>,
        kind: SelectionKind,
    ) -> Result<LazySelection> {
        Ok(self.new_selection(parent, decision, kind))
    }

    fn new_selection(
        &self,
        parent: Option<&LazySelection>,
        decision: &Lazy<f64>,
        kind: SelectionKind,
    ) -> LazySelection {
        let mut inner = self.inner.lock().unwrap();
        let n = inner.players.len();
        let mut ids = Vec::with_capacity(n);
        for slot in 0..n {
            let parent_id = parent.map(|p| p.id_for_slot(slot));
            let decision_id = decision.id_for_slot(slot);
            let node = SelectionNode::new(parent_id, kind, decision_id);
            ids.push(inner.players[slot].push_selection(node));
        }
        LazySelection::new(self.clone(), ids)
    }

    /// Begin assembling a query bound to `selection`: chain `.fill(...)`
    /// calls, then `.book()`.
    pub fn make<Q: Query>(
        &self,
        selection: &LazySelection,
        factory: impl Fn() -> Q + Send + Sync + 'static,
    ) -> QueryBuilder<Q> {
        QueryBuilder::new(self.clone(), selection.clone(), factory)
    }

    pub(crate) fn book_query<Q: Query>(
        &self,
        selection: LazySelection,
        factory: Box<dyn Fn() -> Q + Send + Sync>,
        fill_groups: Vec<<Q::Fill as FillArgs>::Ids>,
        use_weight: bool,
    ) -> Result<LazyQuery<Q>> {
        let mut inner = self.inner.lock().unwrap();
        let n = inner.players.len();
        let mut ids: Vec<QueryId> = Vec::with_capacity(n);
        for slot in 0..n {
            let sel_id = selection.id_for_slot(slot);
            let runtime = QueryRuntime::new(factory(), sel_id, 1.0, use_weight, fill_groups.clone());
            ids.push(inner.players[slot].push_query(Box::new(runtime)));
        }
        inner.invalidate();
        drop(inner);
        Ok(LazyQuery::new(self.clone(), ids))
    }

    /// Run the dataflow if it has not been analyzed since the last
    /// state-changing builder call, then collect and merge `ids`' per-slot
    /// results.
    pub(crate) fn query_result<Q: Query>(&self, ids: &[QueryId]) -> Result<Q::Result> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.analyzed {
            let DataflowInner {
                sources,
                players,
                processor,
                scale,
                ..
            } = &mut *inner;
            let results = processor.process(sources.as_slice(), players, *scale)?;
            inner.query_results = Some(results);
            inner.analyzed = true;
        }

        let results = inner
            .query_results
            .as_ref()
            .expect("query_results populated immediately above");

        let mut per_slot = Vec::with_capacity(results.len());
        for (slot, qid) in ids.iter().enumerate() {
            if slot >= results.len() {
                // This slot's player was dropped when the processor
                // downsized the player count to the aligned partition's
                // length; it contributed no entries.
                continue;
            }
            let boxed = &results[slot][qid.0];
            let v = boxed
                .downcast_ref::<Q::Result>()
                .expect("query result type mismatch: construction invariant violated")
                .clone();
            per_slot.push(v);
        }
        Ok(Q::merge(per_slot))
    }
}
