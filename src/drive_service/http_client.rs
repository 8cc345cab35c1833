use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;

const DRIVE_API_BASE: &str = "https://www.googleapis.com";

/// HTTP client for the drive REST API
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        Self::with_base_url(DRIVE_API_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get full URL by prepending the API base if needed
    pub fn get_full_url(&self, url: &str) -> String {
        if url.starts_with("http") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        }
    }

    /// Make a GET request with authorization header
    pub async fn get<T>(&self, url: &str, auth_header: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.get_full_url(url);
        debug!("Getting url: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", auth_header)
            .send()
            .await
            .context("Failed to get response")?
            .error_for_status()
            .context("Not a success status")?;

        let response_json = response
            .json::<T>()
            .await
            .context("Failed to deserialize response")?;
        Ok(response_json)
    }
}
