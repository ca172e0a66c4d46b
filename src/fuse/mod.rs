//! Binary fuse filter: 3-hash peeling construction over 8-bit fingerprints.

mod filter;
mod layout;

pub use filter::{FuseFilter, MAGIC_FUSE, MAX_ITERATIONS};
