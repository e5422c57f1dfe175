// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a URL as text.
///
/// Server errors and throttling become retryable fetch errors; any other
/// non-success status is reported as a structural error.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(AppError::fetch(url, format!("HTTP {status}")));
    }
    if !status.is_success() {
        return Err(AppError::structure(url, format!("HTTP {status}")));
    }
    Ok(response.text().await?)
}

/// Fetch a URL and decode its JSON body.
pub async fn fetch_json(client: &reqwest::Client, url: &str) -> Result<serde_json::Value> {
    let text = fetch_text(client, url).await?;
    serde_json::from_str(&text)
        .map_err(|e| AppError::structure(url, format!("response is not JSON: {e}")))
}
