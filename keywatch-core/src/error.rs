use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Source API error: {0}")]
    SourceApi(#[from] SourceApiError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Link resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum SourceApiError {
    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Stream disconnected by the source: {reason}")]
    Disconnected { reason: String },

    #[error("Stream hangup: {reason}")]
    Hangup { reason: String },

    #[error("Malformed stream frame: {details}")]
    MalformedFrame { details: String },

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Credentials rejected by the source")]
    Unauthorized,

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {reason}")]
    MigrationFailed { reason: String },

    #[error("Stored document is corrupt: {details}")]
    CorruptDocument { details: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("Too many redirects (last url: {last_url})")]
    TooManyRedirects { last_url: String },

    #[error("Redirect without a Location header (status {status})")]
    MissingLocation { status: u16 },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Connection failed: {details}")]
    Connect { details: String },

    #[error("Request timeout")]
    Timeout,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
