//! Cut/weight selection cascade.
//!
//! A [`SelectionNode`] derives two per-entry scalars from an optional
//! preselection and its own decision column:
//!
//! ```text
//! passed(entry) = (preselection?.passed ?? true) AND (cut? decision != 0 : true)
//! weight(entry) = (preselection?.weight ?? 1)   *  (weight? decision : 1)
//! ```
//!
//! Weight multiplication folds from the root down -- each child multiplies
//! its own factor onto the parent-accumulated weight. The fold is
//! associative but not commutative in principle (though in practice float
//! multiplication commutes; the *order* is still root-to-leaf by
//! construction).
//!
//! Selections cache their own per-entry `(passed, weight)` pair exactly
//! like columns do, to avoid re-walking the whole preselection chain every
//! time a query reads the same selection.

use crate::error::Result;
use crate::player::{ColumnId, Player, SelectionId};
use std::cell::Cell;

/// Whether a selection node is a cut (boolean gate) or a weight
/// (multiplicative factor).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SelectionKind {
    Cut,
    Weight,
}

/// One node in a selection cascade, owned by a single [`Player`].
pub(crate) struct SelectionNode {
    parent: Option<SelectionId>,
    kind: SelectionKind,
    decision: ColumnId<f64>,
    cache: Cell<Option<(bool, f64)>>,
}

impl SelectionNode {
    pub(crate) fn new(parent: Option<SelectionId>, kind: SelectionKind, decision: ColumnId<f64>) -> Self {
        Self {
            parent,
            kind,
            decision,
            cache: Cell::new(None),
        }
    }

    pub(crate) fn reset(&self) {
        self.cache.set(None);
    }

    pub(crate) fn evaluate(&self, player: &Player) -> Result<(bool, f64)> {
        if let Some(v) = self.cache.get() {
            return Ok(v);
        }

        let (parent_passed, parent_weight) = match self.parent {
            Some(pid) => player.selection_state(pid)?,
            None => (true, 1.0),
        };

        let decision = player.value(self.decision)?;

        let (passed, weight) = match self.kind {
            SelectionKind::Cut => (parent_passed && decision != 0.0, parent_weight),
            SelectionKind::Weight => (parent_passed, parent_weight * decision),
        };

        self.cache.set(Some((passed, weight)));
        Ok((passed, weight))
    }
}
