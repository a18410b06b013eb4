use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{CustomerPage, CustomerPageSource, Error};
use crate::config::Config;

/// Ewity REST API 客户端
///
/// 上游没有按 ID 查询客户的接口，只提供分页的 `GET /customers`。
#[derive(Clone)]
pub struct EwityClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl EwityClient {
    pub fn new(base_url: &str, api_token: &str, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::new(
            &config.ewity_api_base_url,
            &config.ewity_api_token,
            config.ewity_timeout(),
        )
    }

    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value, Error> {
        let url = format!("{}{}", self.base_url, endpoint);

        tracing::debug!("Sending GET request to {} {:?}", url, query);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ewity API request to {} failed: {}", url, e);
                Error::Http(e)
            })?;

        let status = response.status();
        tracing::debug!("Received response with status: {}", status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            tracing::error!("Ewity API returned {} for {}: {}", status, url, body);
            return Err(Error::Status { status, body });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::Decode(format!("Failed to parse response from {}: {}", url, e)))
    }
}

#[async_trait]
impl CustomerPageSource for EwityClient {
    async fn fetch_page(&self, page: u32) -> Result<CustomerPage, Error> {
        let body = self.get("/customers", &[("page", page.to_string())]).await?;
        CustomerPage::from_response(&body)
    }
}
