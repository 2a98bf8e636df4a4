//! Embeddable persistent-memory object pool library: typed handles over a
//! memory-mapped file, atomic constructors, variable-size containers, and a
//! schema-driven lookup tree built on top of them.
//!
//! See `PersistentPool` for the pool lifecycle, `Handle`/`PersistentType`
//! for the typed-reference discipline every stored object follows, and the
//! `tree` module for the indexed-lookup structure built from the rest.

mod alloc;
mod buffer;
mod ctor;
mod error;
mod fixedstr;
mod handle;
mod ll;
mod podvec;
mod pool;
mod registry;
#[cfg(feature = "stat_footprint")]
mod stat;
mod string;
mod tree;
mod utils;
mod vector;

pub use buffer::PersistentBuffer;
pub use ctor::{AtomicConstructor, FnConstructor};
pub use error::{Error, Result};
pub use fixedstr::FixedStr;
pub use handle::{Handle, PersistentType};
pub use podvec::PODVector;
pub use pool::{open_flags, PersistentPool};
#[cfg(feature = "stat_footprint")]
pub use stat::Footprint;
pub use string::PersistentString;
pub use tree::{TreeNode, TreeObject, TreeSchema};
pub use vector::Vector;
