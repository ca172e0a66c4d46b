use super::config::{RIBBON_SLACK, RibbonConfig, RibbonWidth};
use crate::error::{FilterError, Result};
use crate::filter::AmqFilter;
use crate::format::{
    read_magic, read_u8, read_u32, write_magic, write_u8, write_u32,
};
use crate::key::FilterKey;
use crate::keystream::{KeySource, pull_key};
use rand::RngCore;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Magic line identifying a serialized ribbon filter.
pub const MAGIC_RIBBON: &str = "$ribbon128-filter-1.0\n";

/// Leading coefficient forced on every row vector so its pivot column is
/// always identifiable.
const SENTINEL: u128 = 1 << 127;

/// Immutable ribbon filter over 128-bit coefficient vectors.
///
/// Each key contributes one row to a banded linear system; the solved cell
/// array answers membership through a windowed XOR-parity that is zero for
/// every construction key and uniformly random for everything else.
pub struct RibbonFilter {
    width: RibbonWidth,
    m: u32,
    // Cells are kept widened to u16 and masked to the configured width;
    // save/load pack them back to their on-disk cell size.
    solution: Vec<u16>,
    dependent: u32,
}

impl RibbonFilter {
    /// Builds a filter from the source under the given configuration.
    ///
    /// Fails with [`FilterError::CapacityExceeded`] once more rows than the
    /// slack margin reduce to zero: that is the over-capacity regime where
    /// the designed false-positive rate no longer holds, and unlike fuse
    /// peeling it is not recoverable by reseeding, only by a larger
    /// oversize factor.
    pub fn build<S: KeySource>(
        source: &mut S,
        config: &RibbonConfig,
        rng: &mut impl RngCore,
    ) -> Result<Self> {
        config.validate()?;
        let available = source.count();
        if available == 0 {
            return Err(FilterError::EmptyKeySource);
        }
        let maxkeys = match config.max_keys {
            Some(cap) if cap > 0 => cap.min(available),
            _ => available,
        };
        let m = config.rows_for(maxkeys);
        let placement_range = m - RIBBON_SLACK;
        debug!(maxkeys, m, width = config.width.bits(), "ribbon band sized");

        // Incremental triangularization: each key's vector lands at its
        // starting row and is folded against stored rows, shifting by the
        // leading-zero count, until it either finds an empty row (its
        // pivot bit is in place) or cancels to zero (a dependent row).
        let mut coeff = vec![0u128; m as usize];
        let mut dependent = 0u32;
        source.rewind()?;
        for got in 0..maxkeys {
            let key = pull_key(source, maxkeys, got)?;
            let mut index =
                ((key.index as u64 * placement_range as u64) >> 32) as usize;
            let mut v = key.ribbon | SENTINEL;
            loop {
                v ^= coeff[index];
                if v == 0 {
                    dependent += 1;
                    if dependent > RIBBON_SLACK {
                        return Err(FilterError::CapacityExceeded {
                            dependent,
                            slack: RIBBON_SLACK,
                        });
                    }
                    break;
                }
                let lz = v.leading_zeros();
                if lz == 0 {
                    coeff[index] = v;
                    break;
                }
                index += lz as usize;
                v <<= lz;
            }
        }

        // Back-substitution from the last row down. A row's cell is the
        // XOR of the already-solved cells its still-set coefficient bits
        // select; the 128 zero cells past the band cover rows whose window
        // extends into the slack headroom. Zero rows get a random cell so
        // the solution stays statistically indistinguishable from noise.
        let mut cells = vec![0u16; m as usize + RIBBON_SLACK as usize];
        for i in (0..m as usize).rev() {
            let v = coeff[i];
            if v == 0 {
                cells[i] = config.width.random_cell(rng);
                continue;
            }
            let mut parity = 0u16;
            let mut bits = v & !SENTINEL;
            while bits != 0 {
                let j = bits.leading_zeros() as usize;
                parity ^= cells[i + j];
                bits &= !(SENTINEL >> j);
            }
            cells[i] = parity;
        }
        cells.truncate(m as usize);

        info!(
            maxkeys,
            m,
            dependent,
            width = config.width.bits(),
            "ribbon filter built"
        );
        Ok(Self {
            width: config.width,
            m,
            solution: cells,
            dependent,
        })
    }

    /// Membership probe: the same windowed XOR-parity as elimination,
    /// read-only against the finished solution.
    #[inline]
    pub fn contains_key(&self, key: &FilterKey) -> bool {
        if self.solution.is_empty() {
            return false;
        }
        let placement_range = (self.m - RIBBON_SLACK) as u64;
        let start = ((key.index as u64 * placement_range) >> 32) as usize;
        let mut parity = 0u16;
        let mut bits = key.ribbon | SENTINEL;
        while bits != 0 {
            let j = bits.leading_zeros() as usize;
            parity ^= self.solution[start + j];
            bits &= !(SENTINEL >> j);
        }
        parity == 0
    }

    /// Loads a filter, re-deriving the expected band size from the config
    /// and `maxkeys` and rejecting width or size mismatches
    /// (`None` skips the size check).
    pub fn load(
        path: impl AsRef<Path>,
        config: &RibbonConfig,
        maxkeys: Option<u32>,
    ) -> Result<Self> {
        config.validate()?;
        let mut reader = BufReader::new(File::open(path)?);
        read_magic(&mut reader, MAGIC_RIBBON)?;
        let stored_bytes = read_u8(&mut reader)?;
        let width = RibbonWidth::from_cell_bytes(stored_bytes).ok_or(
            FilterError::WidthMismatch {
                stored: stored_bytes.saturating_mul(8),
                requested: config.width.bits(),
            },
        )?;
        if width != config.width {
            return Err(FilterError::WidthMismatch {
                stored: width.bits(),
                requested: config.width.bits(),
            });
        }
        let m = read_u32(&mut reader)?;
        // Every build allocates at least one key's row plus the slack
        // margin; a smaller band cannot hold a coefficient window and
        // would send queries out of bounds.
        if m <= RIBBON_SLACK {
            return Err(FilterError::CorruptHeader {
                reason: "ribbon band smaller than the coefficient window",
            });
        }
        if let Some(keys) = maxkeys.filter(|&k| k > 0) {
            let derived = config.rows_for(keys);
            if m != derived {
                return Err(FilterError::SizeMismatch { stored: m, derived });
            }
        }
        let cell_bytes = width.cell_bytes() as usize;
        let mut packed = vec![0u8; m as usize * cell_bytes];
        reader.read_exact(&mut packed)?;
        let solution = match width {
            RibbonWidth::R8 => packed.iter().map(|&b| b as u16).collect(),
            RibbonWidth::R16 => packed
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        };
        Ok(Self {
            width,
            m,
            solution,
            dependent: 0,
        })
    }

    pub fn width(&self) -> RibbonWidth {
        self.width
    }

    /// Rows in the band.
    pub fn rows(&self) -> u32 {
        self.m
    }

    /// Dependent rows the last `build` absorbed (0 for loaded filters).
    /// Always within the slack margin for a successfully built filter.
    pub fn dependent_rows(&self) -> u32 {
        self.dependent
    }

    /// Memory held by the solution array, at its on-disk cell size.
    pub fn size_in_bytes(&self) -> usize {
        self.solution.len() * self.width.cell_bytes() as usize
    }

    fn packed_solution(&self) -> Vec<u8> {
        match self.width {
            RibbonWidth::R8 => {
                self.solution.iter().map(|&c| c as u8).collect()
            }
            RibbonWidth::R16 => self
                .solution
                .iter()
                .flat_map(|&c| c.to_le_bytes())
                .collect(),
        }
    }
}

impl AmqFilter for RibbonFilter {
    fn contains_key(&self, key: &FilterKey) -> bool {
        RibbonFilter::contains_key(self, key)
    }

    fn exists(&self) -> bool {
        !self.solution.is_empty()
    }

    fn destroy(&mut self) {
        self.solution = Vec::new();
    }

    fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        write_magic(&mut writer, MAGIC_RIBBON)?;
        write_u8(&mut writer, self.width.cell_bytes())?;
        write_u32(&mut writer, self.m)?;
        writer.write_all(&self.packed_solution())?;
        writer.flush()?;
        Ok(())
    }
}

/// Equality over the persisted state; the dependent-row diagnostic is
/// excluded.
impl PartialEq for RibbonFilter {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.m == other.m
            && self.solution == other.solution
    }
}

impl Eq for RibbonFilter {}

impl std::fmt::Debug for RibbonFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RibbonFilter {{ width: {} bits, rows: {}, dependent: {} }}",
            self.width.bits(),
            self.m,
            self.dependent
        )
    }
}
