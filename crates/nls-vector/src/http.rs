//! Shared plumbing for HTTP embedding providers.

use nls_core::{Error, Result};
use serde_json::Value;
use std::time::Duration;

/// Build a client whose every request carries `timeout`.
pub(crate) fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))
}

/// Send a prepared request and return the JSON body of a 2xx response.
///
/// Timeouts map to [`Error::Timeout`]; transport failures, non-success
/// statuses (authentication failures included) and unparseable bodies map
/// to [`Error::Provider`].
pub(crate) async fn send_json(request: reqwest::RequestBuilder, provider: &str) -> Result<Value> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            Error::timeout(format!("{provider} request timed out: {e}"))
        } else {
            Error::provider(format!("Failed to call {provider} API: {e}"))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        log::error!("{provider} API error {status}: {error_text}");
        return Err(Error::provider(format!(
            "{provider} API error {status}: {error_text}"
        )));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| Error::provider(format!("Failed to parse {provider} response: {e}")))
}

/// Strip trailing slashes so paths can be appended with `format!`.
pub(crate) fn base_url(url: Option<&str>, default: &str) -> String {
    url.unwrap_or(default).trim_end_matches('/').to_string()
}
