//! Fixed-capacity, NUL-padded string value type used for tree keys/values
//! and the pool root tag.
//!
//! Grounded on the `TreeNode`/`TreeRoot` key and tag fields (`original_source`
//! stores these as fixed-size `char[]` buffers compared byte-for-byte, not as
//! `std::string`s, so that the node/root structs stay `memcpy`-able POD
//! types safe to place directly in the pool).

use crate::error::{Error, Result};
use std::fmt;

/// An inline, NUL-padded, byte-comparable string of at most `N - 1`
/// printable bytes (one byte is reserved for the trailing NUL so the
/// buffer can also be read as a C string).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FixedStr<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> FixedStr<N> {
    pub const CAPACITY: usize = N - 1;

    /// The all-zero value, used for unset keys/values.
    pub const fn empty() -> Self {
        Self { bytes: [0u8; N] }
    }

    pub fn new(s: &str) -> Result<Self> {
        if s.len() > Self::CAPACITY {
            return Err(Error::UserError(format!(
                "\"{}\" is {} bytes, longer than the {}-byte capacity",
                s,
                s.len(),
                Self::CAPACITY
            )));
        }
        let mut bytes = [0u8; N];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self { bytes })
    }

    pub fn as_str(&self) -> &str {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(N);
        std::str::from_utf8(&self.bytes[..end]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.bytes[0] == 0
    }
}

impl<const N: usize> PartialEq for FixedStr<N> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}
impl<const N: usize> Eq for FixedStr<N> {}

impl<const N: usize> PartialOrd for FixedStr<N> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<const N: usize> Ord for FixedStr<N> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl<const N: usize> std::hash::Hash for FixedStr<N> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state)
    }
}

impl<const N: usize> fmt::Debug for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedStr({:?})", self.as_str())
    }
}

impl<const N: usize> fmt::Display for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<const N: usize> TryFrom<&str> for FixedStr<N> {
    type Error = Error;
    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
