use std::sync::Arc;

use async_trait::async_trait;
use openportal_config::DatasourceSource;
use openportal_http::{HttpClient, HttpRequest, Method};
use openportal_template::stringify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DatasourceHandler, mismatch};
use crate::error::DatasourceError;

/// Fetches over HTTP. Datasource params become query parameters.
pub struct HttpDatasource {
  client: Arc<dyn HttpClient>,
}

impl HttpDatasource {
  pub fn new(client: Arc<dyn HttpClient>) -> Self {
    Self { client }
  }
}

#[async_trait]
impl DatasourceHandler for HttpDatasource {
  async fn fetch(
    &self,
    source: &DatasourceSource,
    params: &serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<serde_json::Value, DatasourceError> {
    let DatasourceSource::Http(config) = source else {
      return Err(mismatch("http", source));
    };

    let method: Method = config.method.parse()?;
    let mut request = HttpRequest::new(method, config.url.clone());
    for (key, value) in &config.headers {
      request = request.with_header(key.clone(), value.clone());
    }
    if let Some(params) = params.as_object() {
      for (key, value) in params {
        if !value.is_null() {
          request = request.with_query(key.clone(), stringify(value));
        }
      }
    }
    if let Some(body) = &config.body {
      request = request.with_body(body.clone());
    }

    let response = tokio::select! {
      response = self.client.send(request) => response?,
      _ = cancel.cancelled() => return Err(DatasourceError::Cancelled),
    };

    debug!(url = %config.url, status = response.status, "datasource response");
    if !response.is_success() {
      return Err(DatasourceError::Status {
        status: response.status,
        body: response.body,
      });
    }
    Ok(response.body)
  }
}
