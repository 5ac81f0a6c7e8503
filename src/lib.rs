//! # Queryosity
//!
//! A library for declaring, scheduling, and executing columnar analyses over
//! tabular datasets. An analysis is a directed acyclic graph of three node
//! families -- **columns** (per-entry values), **selections** (cut/weight
//! cascades), and **queries** (per-entry accumulators) -- threaded across a
//! partitioned, multi-threaded entry loop. Systematic variations (alternate
//! versions of chosen columns) propagate through every downstream operation,
//! so a terminal query yields a nominal result plus one result per variation
//! in a single pass.
//!
//! ## Quick Start
//!
//! ```
//! use queryosity::dataflow::Dataflow;
//! use queryosity::processor::Processor;
//! use queryosity::query::Sum;
//! use queryosity::testing::VecSource;
//! use std::sync::Arc;
//!
//! let source = Arc::new(
//!     VecSource::new(5)
//!         .with_column("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])
//! );
//!
//! let df = Dataflow::new(Processor::new(0));
//! let x = df.read::<f64>(source, "x");
//!
//! // cut: x >= 3
//! let three = df.define(3.0);
//! let cut = x.ge(&three);
//! let sel = df.filter(&cut);
//!
//! let q = df
//!     .make(&sel, Sum::default)
//!     .fill((&x,))
//!     .book()
//!     .unwrap();
//!
//! assert_eq!(q.result().unwrap(), 12.0); // 3 + 4 + 5
//! ```
//!
//! ## Core Concepts
//!
//! - [`partition`] -- entry-space addressing and the partition algebra:
//!   [`partition::align`], [`partition::truncate`], [`partition::merge`].
//! - [`source`] -- the abstract per-entry dataset provider: the
//!   [`source::Source`] trait and [`source::ColumnReader`].
//! - [`column`] -- typed, per-entry cached values: readers, fixed constants,
//!   and pure-function definitions, all behind the single-evaluation-per-entry
//!   cache contract.
//! - [`selection`] -- the cut/weight cascade: every selection derives
//!   `(passed, weight)` from an optional preselection plus its own decision
//!   column.
//! - [`query`] -- per-entry accumulators bound to a selection: the
//!   [`query::Query`] trait plus built-in [`query::Count`], [`query::Sum`],
//!   and [`query::Series`].
//! - [`player`] -- the per-slot DAG container that owns one copy of every
//!   column/selection/query for a single worker.
//! - [`processor`] -- the parallel, partitioned entry-loop driver that aligns
//!   partitions, dispatches player ranges, and (optionally) reports
//!   [`metrics`].
//! - [`dataflow`] -- the user-facing graph builder: the
//!   [`dataflow::Dataflow`] type that mints [`lazy`] handles.
//! - [`systematic`] -- the variation-propagation algebra:
//!   [`systematic::Systematic`] and the `fan_out1`/`fan_out2`/`fan_out3`
//!   combinators.
//!
//! ## Error Handling
//!
//! Every failure mode maps to one variant of [`error::QueryosityError`].
//! Builder methods return `error::Result<_>` directly; embedding programs
//! can propagate with `?` into their own `anyhow::Result`.
//!
//! ## Testing Your Analyses
//!
//! The [`testing`] module ships [`testing::VecSource`] (an in-memory
//! `Source` over named `Vec<T>` columns) plus [`testing::assert_results_equal`]
//! and [`testing::assert_close`] for comparing merged query results, which
//! are sums/products of floats accumulated in an order the engine does not
//! guarantee across slots.
//!
//! ## Metrics
//!
//! With the (default-enabled) `metrics` feature, a [`metrics::MetricsCollector`]
//! can be attached to a [`processor::Processor`] via
//! [`dataflow::Dataflow::set_metrics`] to report per-run wall-clock duration
//! and entries-processed counters alongside any user-registered
//! [`metrics::Metric`].

pub mod column;
pub mod dataflow;
pub mod error;
pub mod lazy;
pub mod partition;
pub mod player;
pub mod processor;
pub mod query;
pub mod selection;
pub mod source;
pub mod systematic;
pub mod testing;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use column::Value;
pub use dataflow::Dataflow;
pub use error::{QueryosityError, Result};
pub use lazy::{vary_query1, Lazy, LazyQuery, LazySelection, Varied};
pub use partition::{Partition, Range};
pub use processor::Processor;
pub use query::{Count, Query, Series, Sum};
pub use source::Source;
pub use systematic::{Systematic, Variable};
