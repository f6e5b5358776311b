//! A reference-counted, structurally-shared multi-dimensional range-summary
//! index ("nanocube").
//!
//! Each inserted record is an address tuple — one integer per dimension,
//! interpreted as a path of bits through that dimension's binary refinement
//! tree — paired with a summary value drawn from a commutative monoid. The
//! cube stores, for every orthogonal region describable by prefixes of those
//! paths, the combined summary of every record it contains, sharing
//! sub-structure across records so storage stays far below the naive
//! product of per-dimension resolutions.
//!
//! The entry point is [`Cube`]: construct one with [`Cube::new`], populate it
//! with [`Cube::insert_in_place`] (or the simpler, more garbage-prone
//! [`Cube::insert_via_merge`] baseline), and read it back with
//! [`Cube::range_query`].
//!
//! This crate is the core engine only: it has no opinion about how
//! addresses are produced (coordinate projection, Morton codes, ...) or how
//! queries reach it (HTTP, CLI). Those are left to callers.

mod arena;
mod cube;
mod dimension;
mod error;
mod handle;
mod node;
mod summary;

pub use cube::{CombineSummaryPolicy, Cube, InternalsReport, NodeReport, SummaryPolicy, SummaryReport, MAX_WIDTH};
pub use error::{CheckFailure, Error};
pub use handle::Handle;
pub use summary::Summary;

#[cfg(feature = "init_env_logger")]
/// Installs `env_logger` as the default log subscriber.
///
/// Convenience for binaries and tests that want to see the crate's
/// `trace!`/`debug!` diagnostics without wiring up their own subscriber; the
/// library itself never calls this on its caller's behalf.
pub fn init_logger() {
    let _ = env_logger::try_init();
}
