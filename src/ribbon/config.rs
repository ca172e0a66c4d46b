use crate::error::{FilterError, Result};
use derive_builder::Builder;
use rand::{Rng, RngCore};

/// Fixed slack margin added to the band: equal to the 128-column coefficient
/// window, it bounds how far a row can travel during elimination and how
/// many dependent rows a healthy build may produce.
pub const RIBBON_SLACK: u32 = 128;

/// Solution cell width. Selects the false-positive rate: 2^-8 for
/// [`RibbonWidth::R8`], 2^-16 for [`RibbonWidth::R16`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RibbonWidth {
    R8,
    R16,
}

impl RibbonWidth {
    pub fn bits(self) -> u8 {
        match self {
            Self::R8 => 8,
            Self::R16 => 16,
        }
    }

    /// Bytes per cell, which is also how the width is stored on disk.
    pub(crate) fn cell_bytes(self) -> u8 {
        match self {
            Self::R8 => 1,
            Self::R16 => 2,
        }
    }

    pub(crate) fn from_cell_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::R8),
            2 => Some(Self::R16),
            _ => None,
        }
    }

    pub(crate) fn random_cell(self, rng: &mut dyn RngCore) -> u16 {
        match self {
            Self::R8 => rng.random::<u8>() as u16,
            Self::R16 => rng.random::<u16>(),
        }
    }
}

/// Construction parameters for the ribbon filter.
#[derive(Clone, Debug, Builder)]
#[builder(pattern = "owned")]
pub struct RibbonConfig {
    /// Output cell width.
    #[builder(default = "RibbonWidth::R8")]
    pub width: RibbonWidth,

    /// Allocated rows per key; trades memory for construction headroom.
    #[builder(default = "1.045")]
    pub oversize_factor: f64,

    /// Cap on keys consumed from the source (`None` consumes all).
    #[builder(default)]
    pub max_keys: Option<u32>,
}

impl Default for RibbonConfig {
    fn default() -> Self {
        RibbonConfigBuilder::default()
            .build()
            .expect("builder defaults are complete")
    }
}

impl RibbonConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.oversize_factor.is_finite() || self.oversize_factor <= 0.0 {
            return Err(FilterError::InvalidConfig(format!(
                "oversize factor must be positive and finite, got {}",
                self.oversize_factor
            )));
        }
        Ok(())
    }

    /// Band rows for a key count: `maxkeys * oversize_factor` plus the
    /// fixed slack margin.
    pub(crate) fn rows_for(&self, maxkeys: u32) -> u32 {
        (maxkeys as f64 * self.oversize_factor + RIBBON_SLACK as f64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RibbonConfig::default();
        assert_eq!(config.width, RibbonWidth::R8);
        assert!((config.oversize_factor - 1.045).abs() < 1e-9);
        assert_eq!(config.max_keys, None);
    }

    #[test]
    fn rejects_bad_oversize() {
        let config = RibbonConfigBuilder::default()
            .oversize_factor(0.0)
            .build()
            .unwrap();
        assert!(config.validate().is_err());
        let config = RibbonConfigBuilder::default()
            .oversize_factor(f64::NAN)
            .build()
            .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rows_include_slack() {
        let config = RibbonConfig::default();
        assert_eq!(config.rows_for(0), RIBBON_SLACK);
        let exact = RibbonConfigBuilder::default()
            .oversize_factor(1.5)
            .build()
            .unwrap();
        assert_eq!(exact.rows_for(1_000), 1_500 + RIBBON_SLACK);
    }

    #[test]
    fn width_disk_encoding() {
        assert_eq!(RibbonWidth::from_cell_bytes(1), Some(RibbonWidth::R8));
        assert_eq!(RibbonWidth::from_cell_bytes(2), Some(RibbonWidth::R16));
        assert_eq!(RibbonWidth::from_cell_bytes(8), None);
        assert_eq!(RibbonWidth::R16.cell_bytes(), 2);
        assert_eq!(RibbonWidth::R16.bits(), 16);
    }
}
