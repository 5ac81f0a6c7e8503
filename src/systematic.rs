//! Systematic-variation algebra.
//!
//! [`Systematic`] models "nominal" and "varied" as a tagged union over a
//! lazy handle: a plain variant carrying one handle, and a varied variant
//! carrying the nominal handle plus a name-keyed map of variation handles.
//!
//! [`fan_out1`]/[`fan_out2`]/[`fan_out3`] implement the fan-out rule: the
//! output is varied under the union of all inputs' variation names, with
//! each variation computed by re-running the same builder step against
//! that name's inputs (falling back to an input's nominal when it does not
//! carry that name -- the "nominal-only input behaviour" that makes plain
//! handles transparent to the rule).

use crate::column::Value;
use crate::error::Result;
use crate::lazy::{Lazy, LazySelection};
use std::collections::HashMap;

/// A handle that can answer "give me your view under variation `name`",
/// falling back to itself when it does not carry one. This is what makes a
/// plain (non-varied) handle transparent to [`fan_out1`] and friends.
pub trait Variable: Clone {
    fn variation(&self, name: &str) -> Self {
        let _ = name;
        self.clone()
    }
}

impl<T: Value> Variable for Lazy<T> {}
impl Variable for LazySelection {}

/// A handle that is either plain, or varied under one or more named
/// systematic shifts.
pub enum Systematic<H> {
    Nominal(H),
    Varied(H, HashMap<String, H>),
}

impl<H: Variable> Systematic<H> {
    /// Wrap a plain handle with no variations.
    pub fn nominal_only(handle: H) -> Self {
        Systematic::Nominal(handle)
    }

    /// The nominal handle, regardless of variant.
    pub fn nominal(&self) -> &H {
        match self {
            Systematic::Nominal(h) => h,
            Systematic::Varied(h, _) => h,
        }
    }

    /// The set of variation names this handle carries (empty for
    /// [`Systematic::Nominal`]).
    pub fn names(&self) -> Vec<&str> {
        match self {
            Systematic::Nominal(_) => Vec::new(),
            Systematic::Varied(_, variations) => variations.keys().map(String::as_str).collect(),
        }
    }

    /// This handle's view under `name`, or its nominal view if it does not
    /// carry `name` -- never an error; the transparency rule is what lets a
    /// partially-varied analysis mix plain and varied handles freely (only
    /// a terminal query's `query["name"]` access raises
    /// `UnknownVariation`).
    pub fn variation(&self, name: &str) -> H {
        match self {
            Systematic::Nominal(h) => h.variation(name),
            Systematic::Varied(h, variations) => variations
                .get(name)
                .cloned()
                .unwrap_or_else(|| h.variation(name)),
        }
    }

    pub fn is_varied(&self) -> bool {
        matches!(self, Systematic::Varied(_, _))
    }

    /// Construct a handle explicitly varied under the given named
    /// alternatives. An empty `variations` collapses to
    /// [`Systematic::Nominal`], matching the transparency rule: a handle
    /// with zero recorded variations behaves exactly like a plain one.
    pub fn vary(nominal: H, variations: impl IntoIterator<Item = (String, H)>) -> Self {
        let variations: HashMap<String, H> = variations.into_iter().collect();
        if variations.is_empty() {
            Systematic::Nominal(nominal)
        } else {
            Systematic::Varied(nominal, variations)
        }
    }
}

impl<T: Value> Systematic<Lazy<T>> {
    /// [`Lazy::map`], fanned out across every variation.
    pub fn map<U: Value>(&self, f: impl Fn(T) -> U + Send + Sync + Clone + 'static) -> Systematic<Lazy<U>> {
        fan_out1(self, move |a| Ok(a.map(f.clone()))).expect("Lazy::map never fails")
    }

    /// [`Lazy::zip2`], fanned out across the union of both inputs'
    /// variations.
    pub fn zip2<U: Value, V: Value>(
        &self,
        other: &Systematic<Lazy<U>>,
        f: impl Fn(T, U) -> V + Send + Sync + Clone + 'static,
    ) -> Systematic<Lazy<V>> {
        fan_out2(self, other, move |a, b| Ok(a.zip2(b, f.clone()))).expect("Lazy::zip2 never fails")
    }
}

impl Systematic<LazySelection> {
    /// [`LazySelection::filter`], fanned out across every variation.
    pub fn filter(&self, decision: &Systematic<Lazy<f64>>) -> Result<Systematic<LazySelection>> {
        fan_out2(self, decision, |s, d| s.filter(d))
    }

    /// [`LazySelection::weight`], fanned out across every variation.
    pub fn weight(&self, decision: &Systematic<Lazy<f64>>) -> Result<Systematic<LazySelection>> {
        fan_out2(self, decision, |s, d| s.weight(d))
    }
}

fn union_names<'a>(sets: impl IntoIterator<Item = Vec<&'a str>>) -> Vec<String> {
    let mut names: Vec<String> = sets.into_iter().flatten().map(String::from).collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// Fan out a one-input builder step across a systematic handle.
pub fn fan_out1<H1, O>(a: &Systematic<H1>, step: impl Fn(&H1) -> Result<O>) -> Result<Systematic<O>>
where
    H1: Variable,
    O: Variable,
{
    let nominal = step(a.nominal())?;
    let names = union_names([a.names()]);
    if names.is_empty() {
        return Ok(Systematic::Nominal(nominal));
    }
    let mut variations = HashMap::with_capacity(names.len());
    for n in names {
        let a_n = a.variation(&n);
        variations.insert(n, step(&a_n)?);
    }
    Ok(Systematic::Varied(nominal, variations))
}

/// Fan out a two-input builder step across two systematic handles.
pub fn fan_out2<H1, H2, O>(
    a: &Systematic<H1>,
    b: &Systematic<H2>,
    step: impl Fn(&H1, &H2) -> Result<O>,
) -> Result<Systematic<O>>
where
    H1: Variable,
    H2: Variable,
    O: Variable,
{
    let nominal = step(a.nominal(), b.nominal())?;
    let names = union_names([a.names(), b.names()]);
    if names.is_empty() {
        return Ok(Systematic::Nominal(nominal));
    }
    let mut variations = HashMap::with_capacity(names.len());
    for n in names {
        let a_n = a.variation(&n);
        let b_n = b.variation(&n);
        variations.insert(n, step(&a_n, &b_n)?);
    }
    Ok(Systematic::Varied(nominal, variations))
}

/// Fan out a three-input builder step across three systematic handles.
pub fn fan_out3<H1, H2, H3, O>(
    a: &Systematic<H1>,
    b: &Systematic<H2>,
    c: &Systematic<H3>,
    step: impl Fn(&H1, &H2, &H3) -> Result<O>,
) -> Result<Systematic<O>>
where
    H1: Variable,
    H2: Variable,
    H3: Variable,
    O: Variable,
{
    let nominal = step(a.nominal(), b.nominal(), c.nominal())?;
    let names = union_names([a.names(), b.names(), c.names()]);
    if names.is_empty() {
        return Ok(Systematic::Nominal(nominal));
    }
    let mut variations = HashMap::with_capacity(names.len());
    for n in names {
        let a_n = a.variation(&n);
        let b_n = b.variation(&n);
        let c_n = c.variation(&n);
        variations.insert(n, step(&a_n, &b_n, &c_n)?);
    }
    Ok(Systematic::Varied(nominal, variations))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Tag(i64);
    impl Variable for Tag {}

    #[test]
    fn fan_out1_stays_nominal_with_no_variations() {
        let a = Systematic::nominal_only(Tag(1));
        let out = fan_out1(&a, |t| Ok(Tag(t.0 * 10))).unwrap();
        assert!(!out.is_varied());
        assert_eq!(out.nominal(), &Tag(10));
    }

    #[test]
    fn fan_out2_unions_variation_names_from_both_inputs() {
        let mut a_vars = HashMap::new();
        a_vars.insert("up".to_string(), Tag(2));
        let a = Systematic::Varied(Tag(1), a_vars);

        let mut b_vars = HashMap::new();
        b_vars.insert("down".to_string(), Tag(200));
        let b = Systematic::Varied(Tag(100), b_vars);

        let out = fan_out2(&a, &b, |x, y| Ok(Tag(x.0 + y.0))).unwrap();
        let mut names = out.names();
        names.sort_unstable();
        assert_eq!(names, vec!["down", "up"]);
        assert_eq!(out.nominal(), &Tag(101));
        assert_eq!(out.variation("up"), Tag(2 + 100)); // b has no "up": falls back to nominal
        assert_eq!(out.variation("down"), Tag(1 + 200)); // a has no "down": falls back to nominal
    }
}
