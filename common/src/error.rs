use std::net::AddrParseError;
use thiserror::Error;

/// Invalid user input, detected before any packet leaves the host.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid drawing technique: {0}")]
    InvalidTechnique(String),

    #[error("invalid destination prefix {input:?}: {source}")]
    InvalidPrefix {
        input: String,
        source: AddrParseError,
    },

    #[error("invalid prefix length in {0:?}")]
    InvalidPrefixLength(String),

    /// The low 64 bits carry the pixel, so the network part can't be longer.
    #[error("prefix length /{0} overlaps the 64-bit pixel payload")]
    PrefixTooLong(u8),

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("unknown transmission backend: {0}")]
    UnknownBackend(String),

    #[error("unknown send policy: {0}")]
    UnknownSendPolicy(String),

    #[error("{0} support was not compiled into this build")]
    BackendUnavailable(&'static str),

    #[error("draw rate must be greater than zero")]
    ZeroRate,

    #[error("worker count must be greater than zero")]
    ZeroWorkers,

    #[error("missing input: {0}")]
    MissingInput(&'static str),
}
