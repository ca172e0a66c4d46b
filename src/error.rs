use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic string, expected {expected:?}")]
    BadMagic { expected: &'static str },

    #[error("stored filter does not match requested capacity: stored {stored}, derived {derived}")]
    SizeMismatch { stored: u32, derived: u32 },

    #[error("stored cell width ({stored} bits) does not match requested ({requested} bits)")]
    WidthMismatch { stored: u8, requested: u8 },

    #[error("corrupt filter header: {reason}")]
    CorruptHeader { reason: &'static str },

    #[error("peeling did not converge after {attempts} attempts; are all keys unique?")]
    TooManyIterations { attempts: u32 },

    #[error(
        "ribbon capacity exceeded: {dependent} dependent rows, slack margin {slack}; \
         rebuild with a larger oversize factor"
    )]
    CapacityExceeded { dependent: u32, slack: u32 },

    #[error("key source is empty")]
    EmptyKeySource,

    #[error("key source ended early: expected {expected} keys, got {got}")]
    TruncatedKeySource { expected: u32, got: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid credential hash: {0}")]
    InvalidHex(String),
}
