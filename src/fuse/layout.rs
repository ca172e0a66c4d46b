//! Closed-form sizing and probe derivation for the binary fuse filter.
//!
//! The sizing constants are empirically fitted for arity 3 and very
//! sensitive; replacing `floor` by `round` changes construction time
//! substantially.

pub(crate) const ARITY: u32 = 3;
pub(crate) const MAX_SEGMENT_LENGTH: u32 = 262_144;

/// 64-bit avalanche mix (murmur64 finalizer).
#[inline]
pub(crate) fn murmur64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

#[inline]
pub(crate) fn mix_split(key: u64, seed: u64) -> u64 {
    murmur64(key.wrapping_add(seed))
}

/// High 64 bits of the 128-bit product, for multiply-based range reduction.
#[inline]
pub(crate) fn mulhi(a: u64, b: u64) -> u64 {
    ((a as u128 * b as u128) >> 64) as u64
}

/// 8-bit fingerprint: XOR of the mixed hash's 32-bit halves, truncated.
#[inline]
pub(crate) fn fingerprint(hash: u64) -> u8 {
    (hash ^ (hash >> 32)) as u8
}

#[inline]
pub(crate) fn mod3(x: u8) -> u8 {
    if x > 2 { x - 3 } else { x }
}

/// Derived array geometry: three overlapping segments of `segment_length`
/// slots exist per key, `array_length = (segment_count + 2) * segment_length`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Layout {
    pub segment_length: u32,
    pub segment_length_mask: u32,
    pub segment_count: u32,
    pub segment_count_length: u32,
    pub array_length: u32,
}

fn calculate_segment_length(size: u32) -> u32 {
    let shift = ((size.max(1) as f64).ln() / 3.33f64.ln() + 2.25).floor() as u32;
    (1u32 << shift).min(MAX_SEGMENT_LENGTH)
}

fn calculate_size_factor(size: u32) -> f64 {
    if size < 2 {
        return 2.0;
    }
    (0.875 + 0.25 * 1_000_000f64.ln() / (size as f64).ln()).max(1.125)
}

impl Layout {
    /// Sizes the fingerprint array for a target set of `size` keys.
    pub fn for_size(size: u32) -> Self {
        let segment_length = calculate_segment_length(size);
        let segment_length_mask = segment_length - 1;
        let size_factor = calculate_size_factor(size);
        // u64 intermediates: the products overflow u32 for sizes in the
        // billions.
        let capacity = (size as f64 * size_factor).round() as u64;
        let sl = segment_length as u64;
        let extra = (ARITY - 1) as u64;
        let init_segment_count = capacity.div_ceil(sl).saturating_sub(extra);
        let provisional = (init_segment_count + extra) * sl;
        let mut segment_count = provisional.div_ceil(sl);
        segment_count = if segment_count <= extra {
            1
        } else {
            segment_count - extra
        };
        Self {
            segment_length,
            segment_length_mask,
            segment_count: segment_count as u32,
            segment_count_length: (segment_count * sl) as u32,
            array_length: ((segment_count + extra) * sl) as u32,
        }
    }

    /// Whether the field relations `for_size` establishes hold; only a
    /// corrupt or tampered filter header violates them.
    pub fn is_consistent(&self) -> bool {
        self.segment_length.is_power_of_two()
            && self.segment_length <= MAX_SEGMENT_LENGTH
            && self.segment_length_mask == self.segment_length - 1
            && self.segment_count >= 1
            && Some(self.segment_count_length)
                == self.segment_count.checked_mul(self.segment_length)
            && Some(self.array_length)
                == self
                    .segment_count
                    .checked_add(ARITY - 1)
                    .and_then(|c| c.checked_mul(self.segment_length))
    }

    /// Probe position for one of the key's three slots.
    ///
    /// The mulhi reduction lands in `[0, segment_count_length)`; the slot
    /// offset shifts into the slot's segment window and an independent
    /// 18-bit slice of the hash perturbs the position within the segment.
    #[inline]
    pub fn probe(&self, slot: u32, hash: u64) -> u32 {
        let mut h = mulhi(hash, self.segment_count_length as u64)
            + (slot * self.segment_length) as u64;
        // keep the lower 36 bits; slot 0 shifts by 36, slot 1 by 18, slot 2 by 0
        let hh = hash & ((1u64 << 36) - 1);
        h ^= (hh >> (36 - 18 * slot)) & self.segment_length_mask as u64;
        h as u32
    }

    #[inline]
    pub fn probes(&self, hash: u64) -> [u32; 3] {
        [self.probe(0, hash), self.probe(1, hash), self.probe(2, hash)]
    }
}
