use thiserror::Error;

/// Failures surfaced by the session core and its rules oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Malformed square text. Taps are validated to the 8x8 grid before they
    /// reach the core, so this only comes from programmer error or a bad
    /// oracle/client payload.
    #[error("invalid notation square: {0:?}")]
    InvalidNotation(String),

    /// The oracle refused to apply a move.
    #[error("illegal move {from}-{to}")]
    IllegalMove { from: String, to: String },

    /// The oracle could not answer at all.
    #[error("rules oracle unavailable: {0}")]
    OracleUnavailable(String),
}

/// Failures while loading settings or server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}
