use polars::prelude::PolarsError;
use thiserror::Error;

/// Main error type for refguard.
///
/// Centralizes all failure cases across rule loading, dataset access,
/// suite compilation, evaluation, and persistence. Uses `thiserror` for
/// ergonomic `Display` + `Error` implementations. The HTTP adapter in
/// `api::error` maps each variant onto a status code and a structured
/// JSON body.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Malformed or missing configuration; fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// A named custom/combined rule set does not exist anywhere in the
    /// lookup chain
    #[error("rule set '{name}' not found (available: {})", .available.join(", "))]
    RuleNotFound { name: String, available: Vec<String> },

    /// Include resolution revisited a set already on the resolution path
    #[error("circular include detected: {}", .chain.join(" -> "))]
    CircularInclude { chain: Vec<String> },

    /// A rule document is structurally valid YAML but semantically broken
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// The rule names an expectation type the compiler does not know
    #[error("unsupported expectation type '{0}'")]
    UnsupportedExpectation(String),

    /// The requested exchange is not present in the configured map
    #[error("exchange '{exchange}' not found (available: {})", .available.join(", "))]
    ExchangeNotFound { exchange: String, available: Vec<String> },

    /// The data source backing an exchange is missing
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    /// The data source exists but produced unparseable content
    #[error("dataset could not be parsed: {0}")]
    DatasetParse(String),

    /// Recoverable engine glitch; retried before surfacing
    #[error("transient engine failure: {0}")]
    EngineTransient(String),

    /// DB write failed; the validation result is still returned upstream
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Point lookup found nothing
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// Caller supplied an unusable request (e.g. custom-only with no rules)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Filesystem or IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars DataFrame operation failed
    #[error("dataframe operation failed: {0}")]
    Polars(#[from] PolarsError),

    /// YAML parsing error in a rule or regions document
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Regex compilation error
    #[error("regex pattern error: {0}")]
    Regex(#[from] regex::Error),

    /// Database driver error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error (batch generator side)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic fallback error
    #[error("{0}")]
    Other(String),
}

impl DomainError {
    /// Stable machine-readable tag for the wire `error_type` field.
    pub fn error_type(&self) -> &'static str {
        match self {
            DomainError::Config(_) => "ConfigError",
            DomainError::RuleNotFound { .. } => "RuleNotFound",
            DomainError::CircularInclude { .. } => "CircularInclude",
            DomainError::InvalidRule(_) => "InvalidRule",
            DomainError::UnsupportedExpectation(_) => "UnsupportedExpectation",
            DomainError::ExchangeNotFound { .. } => "ExchangeNotFound",
            DomainError::DatasetNotFound(_) => "DatasetNotFound",
            DomainError::DatasetParse(_) => "DatasetParseError",
            DomainError::EngineTransient(_) => "EngineTransientError",
            DomainError::Persistence(_) => "PersistenceError",
            DomainError::RecordNotFound(_) => "RecordNotFound",
            DomainError::InvalidRequest(_) => "InvalidRequest",
            DomainError::Io(_) => "IOError",
            DomainError::Polars(_) => "DatasetParseError",
            DomainError::Yaml(_) => "InvalidRule",
            DomainError::Regex(_) => "InvalidRule",
            DomainError::Database(_) => "PersistenceError",
            DomainError::Http(_) => "Unreachable",
            DomainError::Other(_) => "InternalError",
        }
    }
}

/// Result type for all domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Fold dynamic errors into the unified error type.
impl From<Box<dyn std::error::Error>> for DomainError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        DomainError::Other(err.to_string())
    }
}
