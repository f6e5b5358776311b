//! Error types for the cube engine.
//!
//! Every fallible entry point (`Cube::new`, `insert`, `range_query`) returns
//! `Result<_, Error>`. Invariant violations detected by the debug self-check
//! are reported separately via [`CheckFailure`], since those describe the
//! structure's own health rather than a caller mistake.

use thiserror::Error;

/// Errors produced by the cube engine's public entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `Cube::new` was called with an empty `widths` slice.
    #[error("a cube must have at least one dimension")]
    NoDimensions,

    /// A declared dimension width was `0` or exceeded the supported maximum.
    #[error("dimension {dim} has width {width}, which is outside the supported range 1..={max}")]
    WidthOutOfRange {
        dim: usize,
        width: u32,
        max: u32,
    },

    /// `insert`/`range_query` was called with an address/bounds tuple whose
    /// length doesn't match the cube's dimensionality.
    #[error("expected {expected} components, found {found}")]
    WrongArity { expected: usize, found: usize },

    /// An inserted address component did not fit within its dimension's width.
    #[error("address component {value} at dimension {dim} does not fit in width {width} (must be < {bound})")]
    AddressOutOfRange {
        dim: usize,
        value: u64,
        width: u32,
        bound: u64,
    },

    /// A query bound was malformed: `lo > hi`, or `hi` exceeded `2^width`.
    #[error("malformed bounds at dimension {dim}: [{lo}, {hi}) with width {width}")]
    MalformedBounds { dim: usize, lo: u64, hi: u64, width: u32 },
}

/// The result of the debug self-check (see [`crate::cube::Cube::self_check`]).
///
/// Unlike [`Error`], a `CheckFailure` is never returned by ordinary API calls:
/// it indicates that the engine's own invariants (§3 of the design) have been
/// violated, which is a bug in the core rather than a caller mistake.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum CheckFailure {
    /// A node with a nonzero refcount is not reachable from the root (I1).
    #[error("node {node} in dimension {dim} has refcount {refcount} but is unreachable from the root")]
    Unreachable {
        dim: usize,
        node: u32,
        refcount: u32,
    },

    /// A node or summary's stored refcount disagrees with its live incoming-edge count (I2).
    #[error("node {node} in dimension {dim} has stored refcount {stored} but {observed} live incoming edges")]
    RefcountMismatch {
        dim: usize,
        node: u32,
        stored: u32,
        observed: u32,
    },

    /// A singleton node's `next` does not equal its single child's `next` (I3).
    #[error("singleton {node} in dimension {dim} has next {next:?} but its child's next is {child_next:?}")]
    SingletonNextMismatch {
        dim: usize,
        node: u32,
        next: Option<u32>,
        child_next: Option<u32>,
    },

    /// A fork's `next` summary does not equal the sum of its children's summaries (I4).
    #[error("fork {node} in dimension {dim} has a next summary that does not equal the sum of its children's summaries")]
    PartitionMismatch { dim: usize, node: u32 },
}
