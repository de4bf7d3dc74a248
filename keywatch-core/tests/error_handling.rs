use keywatch_core::{
    ConfigError, CoreError, DatabaseError, ErrorExt, ResolveError, SourceApiError,
};
use std::time::Duration;

#[test]
fn test_transient_classification() {
    let disconnect = CoreError::SourceApi(SourceApiError::Disconnected {
        reason: "stall".to_string(),
    });
    assert!(disconnect.is_transient());

    let malformed = CoreError::SourceApi(SourceApiError::MalformedFrame {
        details: "truncated json".to_string(),
    });
    assert!(malformed.is_transient());

    let unauthorized = CoreError::SourceApi(SourceApiError::Unauthorized);
    assert!(!unauthorized.is_transient());

    let config = CoreError::Config(ConfigError::MissingField {
        field: "bearer_token".to_string(),
    });
    assert!(!config.is_transient());
}

#[test]
fn test_retry_after() {
    let rate_limited = CoreError::SourceApi(SourceApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

    let server_error = CoreError::SourceApi(SourceApiError::ServerError { status_code: 503 });
    assert_eq!(server_error.retry_after(), Some(Duration::from_secs(2)));

    let permanent = CoreError::SourceApi(SourceApiError::Unauthorized);
    assert_eq!(permanent.retry_after(), None);
}

#[test]
fn test_error_display_messages() {
    let err = CoreError::SourceApi(SourceApiError::RateLimitExceeded { retry_after: 900 });
    assert!(err.to_string().contains("900"));

    let err = CoreError::Resolve(ResolveError::TooManyRedirects {
        last_url: "https://example.com/final".to_string(),
    });
    assert!(err.to_string().contains("https://example.com/final"));

    let err = CoreError::Database(DatabaseError::ConnectionFailed {
        reason: "file locked".to_string(),
    });
    assert!(err.to_string().contains("file locked"));
}

#[test]
fn test_error_conversions() {
    let source: CoreError = SourceApiError::RequestTimeout.into();
    assert!(matches!(source, CoreError::SourceApi(_)));

    let database: CoreError = DatabaseError::ConnectionFailed {
        reason: "no such file".to_string(),
    }
    .into();
    assert!(matches!(database, CoreError::Database(_)));

    let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
    let serialization: CoreError = json_err.into();
    assert!(matches!(serialization, CoreError::Serialization(_)));
}
