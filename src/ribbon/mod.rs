//! Ribbon filter: banded linear system over 128-bit coefficient vectors
//! with 8- or 16-bit solution cells.

mod config;
mod filter;

pub use config::{
    RIBBON_SLACK, RibbonConfig, RibbonConfigBuilder, RibbonConfigBuilderError,
    RibbonWidth,
};
pub use filter::{MAGIC_RIBBON, RibbonFilter};
