//! Shared HTTP client construction

use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

use crate::error::Result;

/// Default timeout for outbound requests in seconds.
/// Can be overridden via HARVEST_HTTP_TIMEOUT_SECS.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

const USER_AGENT: &str = concat!("harvest-ingest/", env!("CARGO_PKG_VERSION"));

/// Build the client used by every fetch source, change feed and index client
pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Read an error response body for logging, without failing on unreadable bodies
pub(crate) async fn error_body(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

/// Join a base URL and a path with exactly one slash between them
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
