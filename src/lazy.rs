//! Lazy handles: the user-facing, non-owning references minted by
//! [`crate::dataflow::Dataflow`].
//!
//! A lazy handle never touches player state directly -- it carries one
//! per-slot index ([`ColumnId`], [`SelectionId`], or [`QueryId`]) plus a
//! shared reference back to the dataflow that owns the players. Every
//! builder call returns a new handle that borrows the same shared graph.
//! Reading a query's result is the only place where the handle forces
//! anything to run.

use crate::column::Value;
use crate::dataflow::Dataflow;
use crate::error::{QueryosityError, Result};
use crate::player::{ColumnId, QueryId, SelectionId};
use crate::query::{FillArgs, Query};
use crate::systematic::Systematic;
use std::collections::HashMap;
use std::marker::PhantomData;

/// A non-owning, per-slot-replicated handle to a column of type `T`.
#[derive(Clone)]
pub struct Lazy<T> {
    pub(crate) dataflow: Dataflow,
    pub(crate) ids: Vec<ColumnId<T>>,
    pub(crate) _t: PhantomData<fn() -> T>,
}

impl<T: Value> Lazy<T> {
    pub(crate) fn new(dataflow: Dataflow, ids: Vec<ColumnId<T>>) -> Self {
        Self {
            dataflow,
            ids,
            _t: PhantomData,
        }
    }

    pub(crate) fn id_for_slot(&self, slot: usize) -> ColumnId<T> {
        self.ids[slot]
    }

    /// Define a new column by applying a pure function to this column's
    /// value.
    pub fn map<U: Value>(&self, f: impl Fn(T) -> U + Send + Sync + Clone + 'static) -> Lazy<U> {
        self.dataflow
            .define_with::<(T,), _, U>((self.id_for_slot(0),), move |(a,)| f(a))
    }

    /// Define a new column from `self` and one other column.
    pub fn zip2<U: Value, V: Value>(
        &self,
        other: &Lazy<U>,
        f: impl Fn(T, U) -> V + Send + Sync + Clone + 'static,
    ) -> Lazy<V> {
        self.dataflow
            .define_with::<(T, U), _, V>((self.id_for_slot(0), other.id_for_slot(0)), move |(a, b)| {
                f(a, b)
            })
    }

    /// Define a new column from `self` and two other columns.
    pub fn zip3<U: Value, W: Value, V: Value>(
        &self,
        b: &Lazy<U>,
        c: &Lazy<W>,
        f: impl Fn(T, U, W) -> V + Send + Sync + Clone + 'static,
    ) -> Lazy<V> {
        self.dataflow.define_with::<(T, U, W), _, V>(
            (self.id_for_slot(0), b.id_for_slot(0), c.id_for_slot(0)),
            move |(a, b2, c2)| f(a, b2, c2),
        )
    }
}

impl<T: Value + PartialOrd> Lazy<T> {
    /// A decision column (`1.0`/`0.0`), usable directly as a cut or weight's
    /// decision input: `self > other`.
    pub fn gt(&self, other: &Lazy<T>) -> Lazy<f64> {
        self.zip2(other, |a, b| if a > b { 1.0 } else { 0.0 })
    }

    /// `self < other`, as a decision column.
    pub fn lt(&self, other: &Lazy<T>) -> Lazy<f64> {
        self.zip2(other, |a, b| if a < b { 1.0 } else { 0.0 })
    }

    /// `self >= other`, as a decision column.
    pub fn ge(&self, other: &Lazy<T>) -> Lazy<f64> {
        self.zip2(other, |a, b| if a >= b { 1.0 } else { 0.0 })
    }

    /// `self <= other`, as a decision column.
    pub fn le(&self, other: &Lazy<T>) -> Lazy<f64> {
        self.zip2(other, |a, b| if a <= b { 1.0 } else { 0.0 })
    }

    /// `self == other`, as a decision column.
    pub fn eq_to(&self, other: &Lazy<T>) -> Lazy<f64> {
        self.zip2(other, |a, b| if a == b { 1.0 } else { 0.0 })
    }
}

impl Lazy<f64> {
    /// Logical AND over decision-column truthiness (nonzero is true).
    pub fn and(&self, other: &Lazy<f64>) -> Lazy<f64> {
        self.zip2(other, |a, b| if a != 0.0 && b != 0.0 { 1.0 } else { 0.0 })
    }

    /// Logical OR over decision-column truthiness.
    pub fn or(&self, other: &Lazy<f64>) -> Lazy<f64> {
        self.zip2(other, |a, b| if a != 0.0 || b != 0.0 { 1.0 } else { 0.0 })
    }

    /// Logical NOT over decision-column truthiness.
    pub fn not(&self) -> Lazy<f64> {
        self.map(|a| if a == 0.0 { 1.0 } else { 0.0 })
    }
}

impl<T: Value> Lazy<Vec<T>> {
    /// Index into a vector-valued column with an index column.
    pub fn index(&self, idx: &Lazy<usize>) -> Lazy<T> {
        self.zip2(idx, |v, i| v[i].clone())
    }
}

/// A non-owning, per-slot-replicated handle to a selection node: either an
/// initial cut/weight or a compound one chained off another selection.
#[derive(Clone)]
pub struct LazySelection {
    pub(crate) dataflow: Dataflow,
    pub(crate) ids: Vec<SelectionId>,
}

impl LazySelection {
    pub(crate) fn new(dataflow: Dataflow, ids: Vec<SelectionId>) -> Self {
        Self { dataflow, ids }
    }

    pub(crate) fn id_for_slot(&self, slot: usize) -> SelectionId {
        self.ids[slot]
    }

    /// Compound cut: a new selection whose parent is `self`.
    pub fn filter(&self, decision: &Lazy<f64>) -> Result<LazySelection> {
        self.dataflow
            .compound_selection(Some(self), decision, crate::selection::SelectionKind::Cut)
    }

    /// Compound weight: a new selection whose parent is `self`.
    pub fn weight(&self, decision: &Lazy<f64>) -> Result<LazySelection> {
        self.dataflow
            .compound_selection(Some(self), decision, crate::selection::SelectionKind::Weight)
    }
}

/// Converts a tuple of borrowed [`Lazy`] handles into the [`ColumnId`]
/// tuple a query's fill group is stored as internally. This is what lets
/// [`QueryBuilder::fill`] take `(&x, &y)` rather than raw column indices,
/// which are not constructible outside this module.
pub trait IntoFillIds<Ids> {
    /// Perform the conversion.
    fn into_fill_ids(self) -> Ids;
}

impl<T: Value> IntoFillIds<(ColumnId<T>,)> for (&Lazy<T>,) {
    fn into_fill_ids(self) -> (ColumnId<T>,) {
        (self.0.id_for_slot(0),)
    }
}

impl<T: Value, U: Value> IntoFillIds<(ColumnId<T>, ColumnId<U>)> for (&Lazy<T>, &Lazy<U>) {
    fn into_fill_ids(self) -> (ColumnId<T>, ColumnId<U>) {
        (self.0.id_for_slot(0), self.1.id_for_slot(0))
    }
}

impl<T: Value, U: Value, V: Value> IntoFillIds<(ColumnId<T>, ColumnId<U>, ColumnId<V>)>
    for (&Lazy<T>, &Lazy<U>, &Lazy<V>)
{
    fn into_fill_ids(self) -> (ColumnId<T>, ColumnId<U>, ColumnId<V>) {
        (self.0.id_for_slot(0), self.1.id_for_slot(0), self.2.id_for_slot(0))
    }
}

/// A query still being assembled: one or more `.fill(...)` calls followed
/// by `.book()`, using the same builder-returns-self chain the rest of the
/// crate's builder methods use.
pub struct QueryBuilder<Q: Query> {
    dataflow: Dataflow,
    selection: LazySelection,
    factory: Box<dyn Fn() -> Q + Send + Sync>,
    fill_groups: Vec<<Q::Fill as FillArgs>::Ids>,
    use_weight: bool,
}

impl<Q: Query> QueryBuilder<Q> {
    pub(crate) fn new(
        dataflow: Dataflow,
        selection: LazySelection,
        factory: impl Fn() -> Q + Send + Sync + 'static,
    ) -> Self {
        Self {
            dataflow,
            selection,
            factory: Box::new(factory),
            fill_groups: Vec::new(),
            use_weight: true,
        }
    }

    /// Disable multiplying by the bound selection's weight (default: on).
    pub fn unweighted(mut self) -> Self {
        self.use_weight = false;
        self
    }

    /// Add one fill group, e.g. `.fill((&x, &y))` for a two-argument query.
    pub fn fill(mut self, args: impl IntoFillIds<<Q::Fill as FillArgs>::Ids>) -> Self {
        self.fill_groups.push(args.into_fill_ids());
        self
    }

    /// Allocate one query per player, bound to the selection, and return
    /// the resulting lazy query handle.
    pub fn book(self) -> Result<LazyQuery<Q>> {
        self.dataflow
            .book_query(self.selection, self.factory, self.fill_groups, self.use_weight)
    }
}

/// A non-owning, per-slot-replicated handle to a query accumulator. Unlike
/// [`Lazy`] and [`LazySelection`], this handle memoizes its merged result
/// on first `result()` call.
pub struct LazyQuery<Q: Query> {
    pub(crate) dataflow: Dataflow,
    pub(crate) ids: Vec<QueryId>,
    memo: std::cell::RefCell<Option<Q::Result>>,
}

impl<Q: Query> LazyQuery<Q> {
    pub(crate) fn new(dataflow: Dataflow, ids: Vec<QueryId>) -> Self {
        Self {
            dataflow,
            ids,
            memo: std::cell::RefCell::new(None),
        }
    }

    /// The nominal merged result, running the dataflow if it has not yet
    /// been analyzed since the last state-changing builder call.
    pub fn result(&self) -> Result<Q::Result> {
        if let Some(v) = self.memo.borrow().as_ref() {
            return Ok(v.clone());
        }
        let merged = self.dataflow.query_result::<Q>(&self.ids)?;
        *self.memo.borrow_mut() = Some(merged.clone());
        Ok(merged)
    }
}

/// A carrier for a query that may have been run under one or more named
/// systematic variations. `query["name"]` style access is provided via
/// [`Varied::variation`].
pub struct Varied<Q: Query> {
    pub(crate) nominal: LazyQuery<Q>,
    pub(crate) variations: HashMap<String, LazyQuery<Q>>,
}

impl<Q: Query> Varied<Q> {
    /// The nominal merged result.
    pub fn result(&self) -> Result<Q::Result> {
        self.nominal.result()
    }

    /// A named variation's merged result. Unknown names raise
    /// [`QueryosityError::UnknownVariation`].
    pub fn variation(&self, name: &str) -> Result<Q::Result> {
        self.variations
            .get(name)
            .ok_or_else(|| QueryosityError::UnknownVariation(name.to_string()))?
            .result()
    }

    /// The set of variation names carried by this query.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variations.keys().map(String::as_str)
    }
}

/// Book a single-fill-argument query once per name in the union of
/// `selection`'s and `fill`'s variations, plus once for the nominal pair,
/// producing a [`Varied`] -- the terminal fan-out step for booking a query
/// under systematic variations. This is the common case -- a query filled
/// from one systematically-varied column bound to a systematically-varied
/// selection -- spelled out directly
/// rather than generalized through [`crate::systematic::fan_out2`], since a
/// query booking is not itself a pure function of its inputs (it registers
/// a new accumulator per call).
pub fn vary_query1<Q, T>(
    dataflow: &Dataflow,
    selection: &Systematic<LazySelection>,
    fill: &Systematic<Lazy<T>>,
    factory: impl Fn() -> Q + Send + Sync + Clone + 'static,
) -> Result<Varied<Q>>
where
    Q: Query<Fill = (T,)>,
    T: Value,
{
    let nominal = dataflow
        .make(selection.nominal(), factory.clone())
        .fill((fill.nominal(),))
        .book()?;

    let mut names: Vec<String> = selection.names().into_iter().map(String::from).collect();
    for n in fill.names() {
        if !names.iter().any(|x| x == n) {
            names.push(n.to_string());
        }
    }

    let mut variations = HashMap::with_capacity(names.len());
    for name in names {
        let sel_v = selection.variation(&name);
        let fill_v = fill.variation(&name);
        let q = dataflow
            .make(&sel_v, factory.clone())
            .fill((&fill_v,))
            .book()?;
        variations.insert(name, q);
    }

    Ok(Varied { nominal, variations })
}
