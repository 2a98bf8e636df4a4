//! Error taxonomy (spec.md §7).
//!
//! Every error that can cross a public function boundary is one variant of
//! [`Error`]. The allocator is the only component that *swallows* an error
//! internally (an [`Error::Allocation`] raised from inside a `build`
//! closure unwinds the reservation and is reported to the caller of
//! `allocate`/`replace` as the same variant, not resurfaced as something
//! else) — there is no retry anywhere in this crate.

use std::io;

/// A `Result` type using this crate's [`Error`] taxonomy.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Pool creation failed (file could not be created/sized), or
    /// [`crate::PersistentPool::remove`] could not delete the backing file.
    #[error("failed to create pool at {path}: {source}")]
    CreateError { path: String, #[source] source: io::Error },

    /// Pool open failed (file missing, too small, or layout mismatch).
    #[error("failed to open pool at {path}: {reason}")]
    OpenError { path: String, reason: String },

    /// Raised by an `AtomicConstructor::build` to abort a single allocation.
    /// Caught by the allocator, which unwinds the reservation; reported to
    /// the caller of the offending `allocate`/`replace`.
    #[error("allocation aborted: {0}")]
    Allocation(String),

    /// An invariant the library itself is responsible for was violated:
    /// allocating into a non-persistent handle, replacing/freeing a null
    /// handle, an unknown pool in the registry, or a pool outlived by a
    /// handle still referencing it.
    #[error("internal invariant violated: {0}")]
    SeriousBug(String),

    /// `PODVector` push without resize headroom, or `String` index past
    /// `size()`.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// `TreeSchema::process_insert_key` rejected an insert key (wrong
    /// arity, or a key name missing from the supplied dictionary).
    #[error("invalid user input: {0}")]
    UserError(String),

    /// `TreeNode::add_node` addressed an existing leaf.
    #[error("leaf already exists for value {0:?}")]
    LeafExists(String),

    /// A structural invariant breach discovered during
    /// `Vector::consistency_check` (a null slot inside `[0, nelem)`).
    #[error("structural invariant violated: {0}")]
    AssertionFailed(String),
}
