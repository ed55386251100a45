//! `gloo-net` implementation of the scanning backend API.

use std::rc::Rc;

use async_trait::async_trait;
use gloo_net::http::{Request, Response};
use serde::de::DeserializeOwned;
use xrecon_core::backend::{paths, report_url};
use xrecon_core::models::{ReportEntry, ServerStats};
use xrecon_core::{ApiError, Backend, ClientConfig};

/// HTTP client for `/api/*` below the configured origin.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    config: Rc<ClientConfig>,
}

impl HttpBackend {
    pub fn new(config: Rc<ClientConfig>) -> Self {
        Self { config }
    }

    fn url(&self, path: &str) -> Result<String, ApiError> {
        self.config
            .api_url(path)
            .map(String::from)
            .map_err(|e| ApiError::Network(e.to_string()))
    }
}

fn network(e: gloo_net::Error) -> ApiError {
    ApiError::Network(e.to_string())
}

fn checked(response: Response) -> Result<Response, ApiError> {
    if response.ok() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            status: response.status(),
            text: response.status_text(),
        })
    }
}

async fn get_json<T: DeserializeOwned>(url: &str) -> Result<T, ApiError> {
    let response = Request::get(url).send().await.map_err(network)?;
    checked(response)?
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait(?Send)]
impl Backend for HttpBackend {
    async fn stats(&self) -> Result<ServerStats, ApiError> {
        get_json(&self.url(paths::STATS)?).await
    }

    async fn reports(&self) -> Result<Vec<ReportEntry>, ApiError> {
        get_json(&self.url(paths::REPORTS)?).await
    }

    async fn delete_report(&self, filename: &str) -> Result<(), ApiError> {
        let url = report_url(&self.config, filename)?;
        let response = Request::delete(url.as_str())
            .send()
            .await
            .map_err(network)?;
        checked(response)?;
        tracing::debug!(filename, "Report delete acknowledged");
        Ok(())
    }
}
