use crate::error::{BrancherError, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

const USER_AGENT: &str = concat!("release-brancher/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(TIMEOUT)
        .build()?)
}

/// Send `request` and decode a JSON body. A non-2xx status becomes
/// [`BrancherError::Http`] carrying the response text.
pub(crate) fn send_json<T: DeserializeOwned>(operation: &str, request: RequestBuilder) -> Result<T> {
    tracing::info!(operation, "request");
    let response = request.send().map_err(|e| {
        tracing::error!(operation, error = %e, "request failed");
        BrancherError::Transport(e)
    })?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        tracing::error!(operation, status = status.as_u16(), %body, "request rejected");
        return Err(BrancherError::Http {
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    let value = response.json::<T>()?;
    tracing::info!(operation, "request successful");
    Ok(value)
}
