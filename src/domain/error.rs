//! Domain error types.

/// Top-level error type for pairtrader.
#[derive(Debug, thiserror::Error)]
pub enum PairtraderError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("unsupported hedge method {method:?} (available: OLS)")]
    UnsupportedMethod { method: String },

    #[error("incompatible date ranges for {symbol1} and {symbol2}: {reason}")]
    IncompatibleRange {
        symbol1: String,
        symbol2: String,
        reason: String,
    },

    #[error("invalid date range {start} to {end}: {reason}")]
    Range {
        start: String,
        end: String,
        reason: String,
    },

    #[error("{requested} requested before {missing} was computed")]
    Precedence { requested: String, missing: String },

    #[error("no price data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PairtraderError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        PairtraderError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn precedence(requested: &str, missing: &str) -> Self {
        PairtraderError::Precedence {
            requested: requested.to_string(),
            missing: missing.to_string(),
        }
    }
}

impl From<&PairtraderError> for std::process::ExitCode {
    fn from(err: &PairtraderError) -> Self {
        let code: u8 = match err {
            PairtraderError::Io(_) => 1,
            PairtraderError::ConfigParse { .. }
            | PairtraderError::ConfigMissing { .. }
            | PairtraderError::ConfigInvalid { .. } => 2,
            PairtraderError::DataUnavailable { .. } => 3,
            PairtraderError::InvalidParameter { .. }
            | PairtraderError::UnsupportedMethod { .. } => 4,
            PairtraderError::IncompatibleRange { .. } | PairtraderError::Range { .. } => 5,
            PairtraderError::Precedence { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
