//! The dataset source contract.
//!
//! A [`Source`] is the abstract per-entry data provider a [`crate::Dataflow`]
//! loads. It offers partition information, dataset- and slot-scoped
//! lifecycle hooks, and typed column readers. Concrete readers (JSON, CSV,
//! Parquet, row-binding adapters) are deliberately out of scope for this
//! crate -- they are external collaborators, specified only by this
//! interface. The one concrete implementation the crate ships,
//! [`crate::testing::VecSource`], exists purely to make the engine testable
//! end-to-end.

use crate::error::{QueryosityError, Result};
use crate::partition::Partition;
use std::any::Any;
use std::fmt;

/// A per-slot typed column reader produced by [`Source::open_column`].
///
/// The reader may cache internally; the calling column's own cache
/// enforces the per-entry single-evaluation guarantee regardless of what
/// the reader does.
pub trait ColumnReader<T>: Send {
    /// Read the value for `(slot, entry)`.
    fn read(&mut self, slot: u32, entry: u64) -> T;
}

/// Blanket impl so any `FnMut(u32, u64) -> T` closure is usable directly as
/// a reader, since most readers are thin wrappers around a single `read`
/// call anyway.
impl<T, F: FnMut(u32, u64) -> T + Send> ColumnReader<T> for F {
    fn read(&mut self, slot: u32, entry: u64) -> T {
        self(slot, entry)
    }
}

/// The abstract per-entry dataset provider.
///
/// Implementors must be `Send + Sync`: sources are shared across slots and
/// their per-slot methods may be called concurrently from different
/// threads, one thread per slot.
pub trait Source: Send + Sync {
    /// Advisory: informs the source of intended concurrency.
    fn parallelize(&self, _n_slots: u32) {}

    /// This source's view of the dataset's partition. May be empty, in
    /// which case the source relinquishes partition control to other
    /// loaded sources but must still answer `execute_slot` for whatever
    /// entries the processor ultimately assigns.
    fn partition(&self) -> Partition {
        Partition::new()
    }

    /// Dataset-scoped lifecycle, called once before the entry loop begins.
    fn initialize(&self) {}

    /// Dataset-scoped lifecycle, called once after the entry loop ends.
    fn finalize(&self) {}

    /// Per-slot lifecycle, called once before that slot's range begins.
    fn initialize_slot(&self, _slot: u32, _begin: u64, _end: u64) {}

    /// Per-slot lifecycle, called once for every entry advance.
    fn execute_slot(&self, _slot: u32, _entry: u64) {}

    /// Per-slot lifecycle, called once after that slot's range ends.
    fn finalize_slot(&self, _slot: u32) {}

    /// Produce a per-slot typed column reader bound to `name`.
    ///
    /// Implementations must validate eagerly: an unknown name is
    /// [`QueryosityError::MissingColumn`], a known name of the wrong type
    /// is [`QueryosityError::TypeMismatch`] -- both surfaced at builder
    /// time, by checking the type token before returning a reader, rather
    /// than deferred to first read.
    fn open_column(&self, slot: u32, name: &str, type_name: &'static str) -> Result<Box<dyn Any + Send>>;
}

/// Helper for `Source::open_column` implementors: box a concrete reader
/// as a type-erased trait object the caller can later downcast via
/// [`downcast_reader`].
pub fn box_reader<T: 'static, R: ColumnReader<T> + 'static>(reader: R) -> Box<dyn Any + Send> {
    let typed: Box<dyn ColumnReader<T>> = Box::new(reader);
    Box::new(typed) as Box<dyn Any + Send>
}

/// Downcast a boxed reader produced by [`box_reader`] back to its concrete
/// reader type, raising [`QueryosityError::TypeMismatch`] on failure.
pub fn downcast_reader<T: 'static>(
    boxed: Box<dyn Any + Send>,
    name: &str,
) -> Result<Box<dyn ColumnReader<T>>> {
    boxed
        .downcast::<Box<dyn ColumnReader<T>>>()
        .map(|b| *b)
        .map_err(|_| QueryosityError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

impl fmt::Debug for dyn Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<dyn Source>")
    }
}
