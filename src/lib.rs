//! Succinct approximate-membership filters for breached-credential lookups.
//!
//! This crate answers "is this credential in a known breach set?" without
//! storing the set itself, trading a small, tunable false-positive rate for
//! enormous space savings over an exact set. Keys are 20-byte SHA-1 digests
//! split into a 128-bit ribbon value and a 32-bit placement index.
//!
//! Two filter families are provided, sharing one build/query/persist
//! contract ([`AmqFilter`]):
//!
//! * [`FuseFilter`] is a binary fuse filter: 3-hash peeling construction
//!   over 8-bit fingerprints, about 9 bits per key, false-positive rate
//!   about 1/256.
//! * [`RibbonFilter`] is a ribbon filter: banded Gaussian elimination over
//!   128-bit coefficient vectors with 8- or 16-bit solution cells,
//!   false-positive rate about 2^-8 or 2^-16.
//!
//! Both are bulk-loaded from a [`KeySource`] (a packed key-stream file or an
//! in-memory list), never updated afterwards, and guarantee no false
//! negatives for the keys they were built from.
//!
//! ```
//! use breach_filters_rs::{FuseFilter, MemoryKeySource};
//! use rand::{SeedableRng, rngs::SmallRng};
//!
//! let mut rng = SmallRng::seed_from_u64(1);
//! let mut keys = MemoryKeySource::from_values(1..=10u128);
//! let filter = FuseFilter::build(&mut keys, None, &mut rng)?;
//! assert!(filter.contains(5));
//! # Ok::<(), breach_filters_rs::FilterError>(())
//! ```

mod error;
mod filter;
mod format;
mod fuse;
mod key;
mod keystream;
mod ribbon;

pub use error::{FilterError, Result};
pub use filter::AmqFilter;
pub use fuse::{FuseFilter, MAGIC_FUSE, MAX_ITERATIONS};
pub use key::{FilterKey, KEY_RECORD_SIZE};
pub use keystream::{
    FileKeySource, KeySource, MAGIC_KEYS, MemoryKeySource, count_keys,
    write_keys_file, write_synthetic_keys,
};
pub use ribbon::{
    MAGIC_RIBBON, RIBBON_SLACK, RibbonConfig, RibbonConfigBuilder,
    RibbonConfigBuilderError, RibbonFilter, RibbonWidth,
};
