//! End-to-end scenarios: each test seeds one concrete dataflow and checks
//! it against a hand-computed expected result.

use queryosity::error::Result as QResult;
use queryosity::partition::{Partition, Range};
use queryosity::query::{Count, Sum};
use queryosity::source::Source;
use queryosity::testing::{assert_close, VecSource};
use queryosity::{vary_query1, Dataflow, Processor, Systematic};
use std::any::Any;
use std::sync::Arc;

#[test]
fn s1_plain_sum_with_cut() {
    let source = Arc::new(
        VecSource::new(5)
            .with_column("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])
            .with_column("w", vec![1.0, 1.0, 1.0, 1.0, 1.0]),
    );

    let df = Dataflow::new(Processor::new(0));
    let x = df.read::<f64>(source.clone(), "x");
    let w = df.read::<f64>(source, "w");

    let three = df.define(3.0);
    let cut = x.ge(&three);
    let sel = df.filter(&cut).weight(&w).unwrap();

    let q = df.make(&sel, Sum::default).fill((&x,)).book().unwrap();

    assert_close(q.result().unwrap(), 12.0, 1e-9); // 3 + 4 + 5
}

#[test]
fn s2_weighted_sum_matches_across_thread_counts() {
    let n = 1000usize;
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let ws: Vec<f64> = (0..n).map(|i| ((i % 2) + 1) as f64).collect();

    let run = |concurrency: i32| {
        let source = Arc::new(
            VecSource::new(n as u64)
                .with_column("x", xs.clone())
                .with_column("w", ws.clone()),
        );
        let df = Dataflow::new(Processor::new(concurrency));
        let x = df.read::<f64>(source.clone(), "x");
        let w = df.read::<f64>(source, "w");
        let sel = df.weight(&w);
        df.make(&sel, Sum::default)
            .fill((&x,))
            .book()
            .unwrap()
            .result()
            .unwrap()
    };

    let single_threaded = run(0);
    let four_threaded = run(4);

    assert_close(single_threaded, 750750.0, 1e-6);
    assert_close(four_threaded, 750750.0, 1e-6);
}

#[test]
fn s3_variation_propagation() {
    let nominal: Vec<f64> = (0..100).map(|i| i as f64).collect();
    let varied: Vec<f64> = (0..100).map(|i| (2 * i) as f64).collect();

    let source = Arc::new(
        VecSource::new(100)
            .with_column("x_nom", nominal)
            .with_column("x_var", varied),
    );

    let df = Dataflow::new(Processor::new(0));
    let x = df.vary_read::<f64>(source, "x_nom", [("hi".to_string(), "x_var".to_string())]);

    let always_true = df.define(1.0);
    let sel = Systematic::nominal_only(df.filter(&always_true));

    let query = vary_query1::<Sum, f64>(&df, &sel, &x, Sum::default).unwrap();

    assert_close(query.result().unwrap(), 4950.0, 1e-6); // sum(0..100)
    assert_close(query.variation("hi").unwrap(), 9900.0, 1e-6); // sum(0, 2, ..., 198)
}

#[test]
fn s4_selection_composition() {
    let source = Arc::new(VecSource::new(6).with_column("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    let df = Dataflow::new(Processor::new(0));
    let x = df.read::<f64>(source, "x");

    let two = df.define(2.0);
    let five = df.define(5.0);

    let c1 = df.filter(&x.gt(&two));
    let c2 = c1.filter(&x.lt(&five)).unwrap();
    let w1 = c2.weight(&x).unwrap();

    let q = df.make(&w1, Sum::default).fill((&x,)).book().unwrap();

    assert_close(q.result().unwrap(), 25.0, 1e-9); // 3*3 + 4*4
}

/// A source that reports several ranges instead of one, delegating column
/// reads to an in-memory [`VecSource`] -- used only to exercise
/// multi-source partition alignment (S5, S6), since [`VecSource`] itself
/// always reports a single range.
struct RangedSource {
    inner: VecSource,
    ranges: Vec<(u64, u64)>,
}

impl Source for RangedSource {
    fn partition(&self) -> Partition {
        self.ranges.iter().map(|&(b, e)| Range::new(b, e)).collect()
    }

    fn open_column(&self, slot: u32, name: &str, type_name: &'static str) -> QResult<Box<dyn Any + Send>> {
        self.inner.open_column(slot, name, type_name)
    }
}

#[test]
fn s5_aligned_multi_source_processes_every_entry_exactly_once() {
    let a_values: Vec<f64> = (0..100).map(|i| i as f64).collect();
    let b_values: Vec<f64> = (0..100).map(|i| i as f64 * 10.0).collect();

    let a = Arc::new(RangedSource {
        inner: VecSource::new(100).with_column("a", a_values.clone()),
        ranges: vec![(0, 50), (50, 100)],
    });
    let b = Arc::new(RangedSource {
        inner: VecSource::new(100).with_column("b", b_values),
        ranges: vec![(0, 25), (25, 75), (75, 100)],
    });

    let df = Dataflow::new(Processor::new(2));
    let av = df.read::<f64>(a, "a");
    let bv = df.read::<f64>(b, "b");

    let always_true = df.define(1.0);
    let sel = df.filter(&always_true);

    let count = df.make(&sel, Count::default).book().unwrap();
    let sum_a = df.make(&sel, Sum::default).fill((&av,)).book().unwrap();
    let sum_b = df.make(&sel, Sum::default).fill((&bv,)).book().unwrap();

    assert_close(count.result().unwrap(), 100.0, 1e-9);
    assert_close(sum_a.result().unwrap(), a_values.iter().sum(), 1e-6);
    assert_close(sum_b.result().unwrap(), 45000.0, 1e-6); // 10 * sum(0..100)
}

#[test]
fn s6_empty_partition_source_follows_the_other_sources_entries() {
    let a_values: Vec<f64> = (0..100).map(|i| i as f64).collect();
    let b_values: Vec<f64> = (0..100).map(|i| i as f64 * 2.0).collect();

    let a = Arc::new(VecSource::new(100).with_column("a", a_values.clone()));
    let b = Arc::new(RangedSource {
        inner: VecSource::new(100).with_column("b", b_values.clone()),
        ranges: Vec::new(), // reports no partition of its own
    });

    let df = Dataflow::new(Processor::new(0));
    let av = df.read::<f64>(a, "a");
    let bv = df.read::<f64>(b, "b");

    let always_true = df.define(1.0);
    let sel = df.filter(&always_true);

    let sum_a = df.make(&sel, Sum::default).fill((&av,)).book().unwrap();
    let sum_b = df.make(&sel, Sum::default).fill((&bv,)).book().unwrap();

    assert_close(sum_a.result().unwrap(), a_values.iter().sum(), 1e-6);
    assert_close(sum_b.result().unwrap(), b_values.iter().sum(), 1e-6);
}
