//! Outbound HTTP plumbing shared by every provider client.
//!
//! - [`resilience`]: timeout, cancellation and bounded retry
//! - response helpers mapping HTTP status codes into [`ProviderError`]s
//! - NDJSON body parsing

mod resilience;

pub use resilience::{
    classify, retry_transient, ResilientClient, RetryPolicy, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT_MS, RETRY_DELAY_MS,
};

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{ProviderError, Result};

/// Media type for newline-delimited JSON.
pub const NDJSON: &str = "application/x-ndjson";

/// Maps a non-2xx response into a provider error.
///
/// A 404 becomes [`ProviderError::NotFound`] for `resource`/`id`; every other
/// non-2xx status becomes [`ProviderError::Upstream`] carrying the body.
///
/// # Errors
///
/// Returns an error if the response status is not successful.
pub async fn ensure_success(
    response: Response,
    operation: &str,
    resource: &str,
    id: &str,
) -> Result<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
        .into());
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::upstream(operation, status.as_u16(), body).into())
}

/// Reads a JSON body into `T`.
///
/// # Errors
///
/// Returns an error if the body cannot be read or does not match `T`.
pub async fn read_json<T: DeserializeOwned>(response: Response, operation: &str) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::invalid_response(operation, format!("Failed to read body: {e}")))?;

    serde_json::from_str(&body).map_err(|e| {
        ProviderError::invalid_response(operation, format!("Failed to parse response: {e}")).into()
    })
}

/// Parses a newline-delimited JSON body.
///
/// Blank lines are ignored; lines that do not match `T` are logged and
/// skipped so one malformed record does not hide the rest of the stream.
#[must_use]
pub fn parse_ndjson<T: DeserializeOwned>(body: &str) -> Vec<T> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed NDJSON record: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Line {
        level: String,
        message: String,
    }

    #[test]
    fn test_parse_ndjson_skips_blank_and_malformed_lines() {
        let body = "{\"level\":\"info\",\"message\":\"a\"}\n\n not json\n{\"level\":\"error\",\"message\":\"b\"}\n";
        let lines: Vec<Line> = parse_ndjson(body);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "a");
        assert_eq!(lines[1].level, "error");
    }
}
