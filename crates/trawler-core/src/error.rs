use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for scripts and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidPolicy,
    ConfigParseError,
    MissingToken,
    TimestampParseError,
    SnapshotNotFound,
    Unauthorized,
    ApiError,
    TransportError,
    DecodeError,
    CleanupAborted,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidPolicy => "E1001",
            Self::ConfigParseError => "E1002",
            Self::MissingToken => "E1003",
            Self::TimestampParseError => "E2001",
            Self::SnapshotNotFound => "E3001",
            Self::Unauthorized => "E3002",
            Self::ApiError => "E3003",
            Self::TransportError => "E3004",
            Self::DecodeError => "E3005",
            Self::CleanupAborted => "E4001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidPolicy => "Invalid retention policy",
            Self::ConfigParseError => "Config file parse error",
            Self::MissingToken => "API token missing",
            Self::TimestampParseError => "Snapshot timestamp could not be parsed",
            Self::SnapshotNotFound => "Snapshot not found",
            Self::Unauthorized => "Provider rejected credentials",
            Self::ApiError => "Provider API error",
            Self::TransportError => "Provider unreachable",
            Self::DecodeError => "Provider response could not be decoded",
            Self::CleanupAborted => "Cleanup aborted part-way",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidPolicy => Some(
                "Use <count><r|d|w|m|y> tokens, e.g. `3r2w1m`; a bare number means recent.",
            ),
            Self::ConfigParseError => Some("Fix syntax in trawler/config.toml and retry."),
            Self::MissingToken => {
                Some("Pass --token or set DIGITALOCEAN_TOKEN (or [api].token in config).")
            }
            Self::TimestampParseError => {
                Some("Snapshot timestamps must look like 2023-01-15T04:05:06Z.")
            }
            Self::SnapshotNotFound => Some("Run `trawler list-snapshots` to see current ids."),
            Self::Unauthorized => Some("Check that the API token is valid and has write scope."),
            Self::ApiError | Self::DecodeError => None,
            Self::TransportError => Some("Check network connectivity and --api-url, then retry."),
            Self::CleanupAborted => Some(
                "Snapshots deleted before the failure stay deleted; rerun cleanup to finish.",
            ),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures reported by a snapshot provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The referenced snapshot or volume does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Credentials were rejected (HTTP 401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success response.
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Machine-readable code associated with this provider error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::SnapshotNotFound,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::Api { .. } => ErrorCode::ApiError,
            Self::Transport(_) => ErrorCode::TransportError,
            Self::Decode(_) => ErrorCode::DecodeError,
        }
    }

    /// Shorthand for a missing snapshot.
    #[must_use]
    pub fn snapshot_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "snapshot",
            id: id.to_string(),
        }
    }
}

/// Errors surfaced by trawler-core operations.
#[derive(Debug, thiserror::Error)]
pub enum TrawlerError {
    /// The retention policy string does not match the grammar.
    #[error("invalid retention policy '{policy}'")]
    InvalidPolicy { policy: String },

    /// A snapshot carried a timestamp outside the `YYYY-MM-DDTHH:MM:SSZ` format.
    #[error("failed to parse snapshot timestamp '{value}': {source}")]
    TimeParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A deletion failed after `deleted` snapshots were already removed.
    #[error("cleanup aborted after deleting {deleted} snapshot(s): {source}")]
    Cleanup {
        deleted: usize,
        #[source]
        source: ProviderError,
    },

    /// No API token was supplied by flag, environment or config file.
    #[error("no API token configured")]
    MissingToken,

    /// The configuration file exists but could not be read or parsed.
    #[error("failed to load config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl TrawlerError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidPolicy { .. } => ErrorCode::InvalidPolicy,
            Self::TimeParse { .. } => ErrorCode::TimestampParseError,
            Self::Provider(err) => err.code(),
            Self::Cleanup { .. } => ErrorCode::CleanupAborted,
            Self::MissingToken => ErrorCode::MissingToken,
            Self::Config { .. } => ErrorCode::ConfigParseError,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
