//! HTTP client of the DM REST API.

use anyhow::{bail, Context, Result};
use serde_json::Value;

pub struct DmClient {
    base_url: String,
    http: reqwest::Client,
}

impl DmClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Full URL of a route, with its non-empty query parameters.
    pub fn url(&self, route: &str, params: &[(&str, Option<&str>)]) -> String {
        let query: Vec<String> = params
            .iter()
            .filter_map(|(k, v)| v.map(|v| format!("{}={}", k, v)))
            .collect();
        if query.is_empty() {
            format!("{}{}", self.base_url, route)
        } else {
            format!("{}{}?{}", self.base_url, route, query.join("&"))
        }
    }

    pub async fn get(&self, route: &str, params: &[(&str, Option<&str>)]) -> Result<Value> {
        let response = self
            .http
            .get(self.url(route, params))
            .send()
            .await
            .context("The DM is unreachable")?;
        read(response).await
    }

    pub async fn post(
        &self,
        route: &str,
        params: &[(&str, Option<&str>)],
        body: Option<Value>,
    ) -> Result<Value> {
        let mut request = self.http.post(self.url(route, params));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.context("The DM is unreachable")?;
        read(response).await
    }
}

async fn read(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        let msg = body["msg"].as_str().unwrap_or("no detail");
        bail!("{} ({})", msg, status);
    }
    Ok(body)
}
