use keywatch_core::{CoreError, SourceApiError};
use reqwest::Response;
use tracing::{error, warn};

/// Map non-success HTTP statuses onto the source error taxonomy.
pub(crate) fn check_status(response: Response) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    error!("Source request failed with status {}", status);

    match status.as_u16() {
        401 | 403 => Err(CoreError::SourceApi(SourceApiError::Unauthorized)),
        420 | 429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(60);
            warn!("Rate limited by the source, retry after {}s", retry_after);
            Err(CoreError::SourceApi(SourceApiError::RateLimitExceeded {
                retry_after,
            }))
        }
        code if status.is_server_error() => {
            Err(CoreError::SourceApi(SourceApiError::ServerError {
                status_code: code,
            }))
        }
        code => Err(CoreError::SourceApi(SourceApiError::InvalidResponse {
            details: format!("unexpected status {code}"),
        })),
    }
}

pub(crate) fn map_request_error(e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        CoreError::SourceApi(SourceApiError::RequestTimeout)
    } else {
        CoreError::Network(e)
    }
}
