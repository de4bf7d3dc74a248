use crate::error::*;
use std::time::Duration;

pub trait ErrorExt {
    fn is_transient(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
}

impl ErrorExt for CoreError {
    fn is_transient(&self) -> bool {
        match self {
            CoreError::SourceApi(e) => e.is_transient(),
            // Connection-level failures recover on their own; anything else
            // points at a bug or a permanent condition.
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            CoreError::Serialization(_) => false,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::SourceApi(SourceApiError::RateLimitExceeded { retry_after }) => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_transient() => Some(Duration::from_secs(2)),
            _ => None,
        }
    }
}

impl SourceApiError {
    pub fn is_transient(&self) -> bool {
        match self {
            SourceApiError::Disconnected { .. } => true,
            SourceApiError::Hangup { .. } => true,
            SourceApiError::MalformedFrame { .. } => true,
            SourceApiError::InvalidResponse { .. } => true,
            SourceApiError::RequestTimeout => true,
            SourceApiError::ServerError { .. } => true,
            // Rate limits are scheduled around, not blindly retried.
            SourceApiError::RateLimitExceeded { .. } => false,
            SourceApiError::Unauthorized => false,
        }
    }
}
