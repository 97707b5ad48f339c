//! Outbound call plumbing shared by every vendor adapter.

use reqwest::{RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::ProviderDetail,
    errors::{AppError, AppResult},
};

/// Credential for `provider`, or a configuration error naming the variable to set
pub fn require_key<'a>(detail: &'a ProviderDetail, provider: &str, env_var: &str) -> AppResult<&'a str> {
    detail
        .api_key()
        .ok_or_else(|| AppError::missing_credential(provider, env_var))
}

/// `base` with `segments` appended as individually escaped path segments
pub fn endpoint_url(provider: &str, base: &str, segments: &[&str]) -> AppResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| AppError::ConfigError(format!("Invalid {} base URL '{}': {}", provider, base, e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::ConfigError(format!("{} base URL '{}' cannot take a path", provider, base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Send one request and return the JSON body of a 2xx response.
///
/// Non-2xx statuses are mapped with [`map_status`]; transport failures become
/// `NetworkError`.
pub async fn send_json(provider: &str, request: RequestBuilder) -> AppResult<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| AppError::network(format!("Failed to reach {}: {}", provider, e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::network(format!("Failed to read {} response: {}", provider, e)))?;

    debug!(provider, status = status.as_u16(), bytes = body.len(), "Provider responded");

    if !status.is_success() {
        warn!(provider, status = status.as_u16(), "Provider returned error status");
        return Err(map_status(provider, status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        AppError::provider_error_with_details(
            502,
            format!("{} returned a non-JSON response: {}", provider, e),
            Value::String(body),
        )
    })
}

/// Map a provider's error status onto the normalized error shape.
///
/// The raw body is kept under `details` for diagnostics.
pub fn map_status(provider: &str, status: u16, body: &str) -> AppError {
    let details = serde_json::from_str::<Value>(body)
        .unwrap_or_else(|_| Value::String(body.to_string()));

    let message = match status {
        401 => format!("Invalid {} API key", provider),
        402 => "Credits exceeded".to_string(),
        429 => "Rate limit exceeded".to_string(),
        _ => format!("{} API error (status {})", provider, status),
    };

    AppError::provider_error_with_details(status, message, details)
}

/// A 2xx body none of the known shapes matched
pub fn unrecognized(provider: &str, payload: Value) -> AppError {
    AppError::provider_error_with_details(
        502,
        format!("Unrecognized {} response shape", provider),
        payload,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_status_known_codes() {
        let err = map_status("Ideogram", 401, r#"{"detail":"bad key"}"#);
        assert!(matches!(err, AppError::ProviderError { status: 401, .. }));
        assert_eq!(err.message(), "Invalid Ideogram API key");

        let err = map_status("Ideogram", 429, "slow down");
        assert_eq!(err.message(), "Rate limit exceeded");
        assert!(matches!(err, AppError::ProviderError { status: 429, .. }));

        let err = map_status("Flux", 402, "{}");
        assert_eq!(err.message(), "Credits exceeded");
    }

    #[test]
    fn test_map_status_passthrough_keeps_body() {
        let err = map_status("Runway", 418, r#"{"error":"teapot"}"#);
        match err {
            AppError::ProviderError { status, details, .. } => {
                assert_eq!(status, 418);
                assert_eq!(details.unwrap()["error"], "teapot");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = map_status("Runway", 503, "upstream down");
        match err {
            AppError::ProviderError { details, .. } => {
                assert_eq!(details.unwrap(), Value::String("upstream down".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_endpoint_url_escapes_segments() {
        let url = endpoint_url("Runway", "https://api.example.com", &["v1", "tasks", "task-1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/tasks/task-1");

        let url = endpoint_url("Seedance", "https://ark.example.com/api/v3", &["contents", "generations", "tasks", "cgt-1"]).unwrap();
        assert_eq!(url.as_str(), "https://ark.example.com/api/v3/contents/generations/tasks/cgt-1");

        let url = endpoint_url("Runway", "https://api.example.com", &["v1", "tasks", "../../v1/organization"]).unwrap();
        assert_eq!(url.path(), "/v1/tasks/..%2F..%2Fv1%2Forganization");

        let url = endpoint_url("Runway", "https://api.example.com", &["v1", "tasks", "a?b#c"]).unwrap();
        assert_eq!(url.path(), "/v1/tasks/a%3Fb%23c");
        assert!(url.query().is_none());
    }

    #[test]
    fn test_endpoint_url_rejects_bad_base() {
        let err = endpoint_url("Runway", "not a url", &["v1"]).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_require_key() {
        let mut detail = ProviderDetail::default();
        let err = require_key(&detail, "Flux", "BFL_API_KEY").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert!(err.message().contains("BFL_API_KEY"));

        detail.api_key = Some("   ".to_string());
        assert!(require_key(&detail, "Flux", "BFL_API_KEY").is_err());

        detail.api_key = Some("bfl-secret".to_string());
        assert_eq!(require_key(&detail, "Flux", "BFL_API_KEY").unwrap(), "bfl-secret");
    }
}
