use super::layout::{Layout, fingerprint, mix_split, mod3};
use crate::error::{FilterError, Result};
use crate::filter::AmqFilter;
use crate::format::{
    read_magic, read_u32, read_u64, write_magic, write_u32, write_u64,
};
use crate::key::FilterKey;
use crate::keystream::{KeySource, pull_key};
use rand::RngCore;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Magic line identifying a serialized binary fuse filter.
pub const MAGIC_FUSE: &str = "$binaryfuse8-filter-1.0\n";

/// Retry cap for the peeling construction. The per-attempt success
/// probability exceeds 0.5, so exhausting this almost certainly means
/// duplicate keys in the input.
pub const MAX_ITERATIONS: u32 = 100;

/// Immutable binary fuse filter with 8-bit fingerprints.
///
/// Consumes the low 64 bits of each key's ribbon value. For every key that
/// survived construction, the XOR of the fingerprint bytes at its three
/// probe positions equals the key's own fingerprint, so `contains` never
/// reports a false negative; unrelated keys match with probability 1/256.
pub struct FuseFilter {
    seed: u64,
    layout: Layout,
    fingerprints: Vec<u8>,
    attempts: u32,
}

impl FuseFilter {
    /// Builds a filter over up to `capacity` keys from the source
    /// (`None` consumes the whole stream).
    ///
    /// Retries with a fresh seed from `rng` whenever peeling leaves a
    /// residual core; fails with [`FilterError::TooManyIterations`] after
    /// [`MAX_ITERATIONS`] attempts.
    pub fn build<S: KeySource>(
        source: &mut S,
        capacity: Option<u32>,
        rng: &mut impl RngCore,
    ) -> Result<Self> {
        let available = source.count();
        if available == 0 {
            return Err(FilterError::EmptyKeySource);
        }
        let size = match capacity {
            Some(cap) if cap > 0 => cap.min(available),
            _ => available,
        };
        let layout = Layout::for_size(size);
        let slots = layout.array_length as usize;
        debug!(
            size,
            segment_length = layout.segment_length,
            segment_count = layout.segment_count,
            array_length = layout.array_length,
            "fuse layout derived"
        );

        // Build-local scratch, released on every exit path by ownership.
        // `order` receives key hashes in a randomized open-addressed
        // placement; its extra trailing slot is a nonzero sentinel that
        // stops bucket probing from running off the end.
        let mut order = vec![0u64; size as usize + 1];
        order[size as usize] = 1;
        let mut degree = vec![0u8; slots];
        let mut tag = vec![0u8; slots];
        let mut acc = vec![0u64; slots];
        let mut alone = vec![0u32; slots];
        let mut stack_hash = vec![0u64; size as usize];
        let mut stack_tag = vec![0u8; size as usize];

        let mut block_bits = 1u32;
        while (1u32 << block_bits) < layout.segment_count {
            block_bits += 1;
        }
        let block = 1u32 << block_bits;
        let mask_block = (block - 1) as u64;
        let mut start_pos = vec![0u32; block as usize];

        let mut seed = rng.next_u64();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if attempts > MAX_ITERATIONS {
                return Err(FilterError::TooManyIterations {
                    attempts: MAX_ITERATIONS,
                });
            }

            for i in 0..block as usize {
                // i * size would overflow 32 bits for large sets
                start_pos[i] = ((i as u64 * size as u64) >> block_bits) as u32;
            }

            source.rewind()?;
            for got in 0..size {
                let key = pull_key(source, size, got)?;
                let hash = mix_split(key.ribbon as u64, seed);
                let mut bucket = (hash >> (64 - block_bits)) as usize;
                while order[start_pos[bucket] as usize] != 0 {
                    bucket = ((bucket as u64 + 1) & mask_block) as usize;
                }
                order[start_pos[bucket] as usize] = hash;
                start_pos[bucket] += 1;
            }

            // Per-slot degree counting and hash accumulation. A wrapped
            // degree counter means a pathological number of collisions on
            // one slot; abort the attempt.
            let mut wrapped = false;
            for i in 0..size as usize {
                let hash = order[i];
                for slot in 0..3u8 {
                    let h = layout.probe(slot as u32, hash) as usize;
                    degree[h] = degree[h].wrapping_add(1);
                    wrapped |= degree[h] == 0;
                    tag[h] ^= slot;
                    acc[h] ^= hash;
                }
            }

            let mut stack_size = 0usize;
            if !wrapped {
                // Peel: drain degree-1 slots, recovering the sole key
                // hashed there from the XOR accumulator.
                let mut qsize = 0usize;
                for (i, &d) in degree.iter().enumerate() {
                    alone[qsize] = i as u32;
                    qsize += usize::from(d == 1);
                }
                while qsize > 0 {
                    qsize -= 1;
                    let slot = alone[qsize] as usize;
                    if degree[slot] != 1 {
                        continue;
                    }
                    let hash = acc[slot];
                    let found = tag[slot];
                    stack_hash[stack_size] = hash;
                    stack_tag[stack_size] = found;
                    stack_size += 1;
                    let probes = layout.probes(hash);
                    for step in 1..3u8 {
                        let other_slot = mod3(found + step);
                        let other = probes[other_slot as usize] as usize;
                        degree[other] -= 1;
                        tag[other] ^= other_slot;
                        acc[other] ^= hash;
                        if degree[other] == 1 {
                            alone[qsize] = other as u32;
                            qsize += 1;
                        }
                    }
                }
            }
            if stack_size == size as usize {
                break;
            }

            // Cyclic hypergraph residue: clear scratch, reseed, retry.
            warn!(
                attempt = attempts,
                peeled = stack_size,
                size,
                "peeling left a residual core, reseeding"
            );
            order[..size as usize].fill(0);
            degree.fill(0);
            tag.fill(0);
            acc.fill(0);
            seed = rng.next_u64();
        }

        // Back-substitution in reverse peel order: assign the fingerprint
        // byte at the slot the key was peeled from so that the query-time
        // XOR of all three slots reconstructs the key's fingerprint.
        let mut fingerprints = vec![0u8; slots];
        for i in (0..size as usize).rev() {
            let hash = stack_hash[i];
            let found = stack_tag[i];
            let probes = layout.probes(hash);
            fingerprints[probes[found as usize] as usize] = fingerprint(hash)
                ^ fingerprints[probes[mod3(found + 1) as usize] as usize]
                ^ fingerprints[probes[mod3(found + 2) as usize] as usize];
        }

        info!(size, attempts, array_length = layout.array_length, "fuse filter built");
        Ok(Self {
            seed,
            layout,
            fingerprints,
            attempts,
        })
    }

    /// Membership probe against the low 64 bits of a key.
    #[inline]
    pub fn contains(&self, key: u64) -> bool {
        if self.fingerprints.is_empty() {
            return false;
        }
        let hash = mix_split(key, self.seed);
        let [h0, h1, h2] = self.layout.probes(hash);
        let f = fingerprint(hash)
            ^ self.fingerprints[h0 as usize]
            ^ self.fingerprints[h1 as usize]
            ^ self.fingerprints[h2 as usize];
        f == 0
    }

    /// Loads a filter, re-deriving the expected geometry from `capacity`
    /// and rejecting the file if it was built for a different one
    /// (`None` skips the capacity check).
    pub fn load(path: impl AsRef<Path>, capacity: Option<u32>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        read_magic(&mut reader, MAGIC_FUSE)?;
        let seed = read_u64(&mut reader)?;
        let layout = Layout {
            segment_length: read_u32(&mut reader)?,
            segment_length_mask: read_u32(&mut reader)?,
            segment_count: read_u32(&mut reader)?,
            segment_count_length: read_u32(&mut reader)?,
            array_length: read_u32(&mut reader)?,
        };
        // Probe positions are bounded by the header fields, not by the
        // fingerprint array, so a self-inconsistent header must be
        // rejected before any query can run.
        if !layout.is_consistent() {
            return Err(FilterError::CorruptHeader {
                reason: "fuse segment geometry is self-inconsistent",
            });
        }
        if let Some(size) = capacity.filter(|&c| c > 0) {
            let derived = Layout::for_size(size);
            if derived.array_length != layout.array_length {
                return Err(FilterError::SizeMismatch {
                    stored: layout.array_length,
                    derived: derived.array_length,
                });
            }
        }
        let mut fingerprints = vec![0u8; layout.array_length as usize];
        reader.read_exact(&mut fingerprints)?;
        Ok(Self {
            seed,
            layout,
            fingerprints,
            attempts: 0,
        })
    }

    /// Memory held by the fingerprint array.
    pub fn size_in_bytes(&self) -> usize {
        self.fingerprints.len()
    }

    /// Construction attempts the last `build` needed (0 for loaded filters).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn fingerprints(&self) -> &[u8] {
        &self.fingerprints
    }
}

impl AmqFilter for FuseFilter {
    fn contains_key(&self, key: &FilterKey) -> bool {
        self.contains(key.ribbon as u64)
    }

    fn exists(&self) -> bool {
        !self.fingerprints.is_empty()
    }

    fn destroy(&mut self) {
        self.fingerprints = Vec::new();
    }

    fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        write_magic(&mut writer, MAGIC_FUSE)?;
        write_u64(&mut writer, self.seed)?;
        write_u32(&mut writer, self.layout.segment_length)?;
        write_u32(&mut writer, self.layout.segment_length_mask)?;
        write_u32(&mut writer, self.layout.segment_count)?;
        write_u32(&mut writer, self.layout.segment_count_length)?;
        write_u32(&mut writer, self.layout.array_length)?;
        writer.write_all(&self.fingerprints)?;
        writer.flush()?;
        Ok(())
    }
}

/// Equality over the persisted state; construction bookkeeping such as the
/// attempt count is excluded.
impl PartialEq for FuseFilter {
    fn eq(&self, other: &Self) -> bool {
        self.seed == other.seed
            && self.layout == other.layout
            && self.fingerprints == other.fingerprints
    }
}

impl Eq for FuseFilter {}

impl std::fmt::Debug for FuseFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FuseFilter {{ seed: {:#x}, segment_length: {}, segment_count: {}, array_length: {}, attempts: {} }}",
            self.seed,
            self.layout.segment_length,
            self.layout.segment_count,
            self.layout.array_length,
            self.attempts
        )
    }
}
