use crate::error::Result;
use crate::key::FilterKey;
use crate::keystream::KeySource;
use rand::RngCore;
use std::path::Path;
use tracing::debug;

/// Operations shared by every filter kind.
///
/// A filter is built once by its kind-specific `build`, replaced wholesale
/// by `load`, and read-only thereafter; `destroy` releases the backing array
/// and leaves an empty shell that answers `false` to every query.
pub trait AmqFilter {
    /// Membership probe against a pre-derived key. O(1), side-effect free.
    fn contains_key(&self, key: &FilterKey) -> bool;

    /// Whether the filter currently holds a backing array.
    fn exists(&self) -> bool;

    /// Releases the backing array.
    fn destroy(&mut self);

    /// Serializes the filter to its versioned binary format.
    fn save(&self, path: &Path) -> Result<()>;

    /// Membership probe for a credential, either raw or already hashed to a
    /// 40-character hex SHA-1 digest.
    fn query_credential(&self, credential: &str, pre_hashed: bool) -> Result<bool> {
        let key = if pre_hashed {
            FilterKey::from_hex(credential)?
        } else {
            FilterKey::from_credential(credential)
        };
        Ok(self.contains_key(&key))
    }

    /// Re-queries every key of a source; `true` means no false negatives.
    ///
    /// `max_keys` must match the cap the filter was built with, if any.
    fn sanity_check(
        &self,
        source: &mut dyn KeySource,
        max_keys: Option<u32>,
    ) -> Result<bool> {
        source.rewind()?;
        let limit = match max_keys {
            Some(cap) if cap > 0 => cap.min(source.count()),
            _ => source.count(),
        };
        for _ in 0..limit {
            let Some(key) = source.next_key()? else {
                break;
            };
            if !self.contains_key(&key) {
                debug!(key = %key.to_hex(), "sanity check failed");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Draws `n` random keys (disjoint from any realistic set with
    /// overwhelming probability) and counts how many spuriously match.
    fn sample_false_positive_rate(&self, n: u32, rng: &mut dyn RngCore) -> u32 {
        let mut matches = 0;
        for _ in 0..n {
            if self.contains_key(&FilterKey::random(rng)) {
                matches += 1;
            }
        }
        matches
    }
}
