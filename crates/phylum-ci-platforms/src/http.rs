use std::time::Duration;

use phylum_ci_core::PhylumCiError;
use serde::de::DeserializeOwned;

const USER_AGENT: &str = concat!("phylum-ci/", env!("CARGO_PKG_VERSION"));

pub(crate) fn client(platform: &str) -> Result<reqwest::Client, PhylumCiError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| PhylumCiError::platform(platform, format!("failed to create HTTP client: {e}")))
}

/// Send a request and decode a JSON response.
pub(crate) async fn send_json<T: DeserializeOwned>(
    platform: &str,
    what: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, PhylumCiError> {
    let response = request
        .send()
        .await
        .map_err(|e| PhylumCiError::platform(platform, format!("failed to {what}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PhylumCiError::platform(
            platform,
            format!("failed to {what}: HTTP {status}: {body}"),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| PhylumCiError::platform(platform, format!("failed to parse response to {what}: {e}")))
}
