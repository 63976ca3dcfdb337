use async_trait::async_trait;
use openportal_config::DatasourceSource;
use tokio_util::sync::CancellationToken;

use super::{DatasourceHandler, mismatch};
use crate::error::DatasourceError;

/// Returns the configured literal.
pub struct StaticDatasource;

#[async_trait]
impl DatasourceHandler for StaticDatasource {
  async fn fetch(
    &self,
    source: &DatasourceSource,
    _params: &serde_json::Value,
    _cancel: CancellationToken,
  ) -> Result<serde_json::Value, DatasourceError> {
    match source {
      DatasourceSource::Static(value) => Ok(value.clone()),
      other => Err(mismatch("static", other)),
    }
  }
}
