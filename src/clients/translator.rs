use async_trait::async_trait;

use crate::clients::TransletClient;
use crate::lifecycle::service::{ServiceError, TransletOutcome, TransletRequest};
use crate::model::MethodType;

/// Request helpers shared by anything that can reach a translet service.
///
/// Implementors only expose their [`TransletClient`]; the shorthands are
/// provided.
#[async_trait]
pub trait Translator: Send + Sync {
    fn inner(&self) -> &TransletClient;

    #[tracing::instrument(skip(self))]
    async fn get(&self, name: &str) -> Result<TransletOutcome, ServiceError> {
        tracing::debug!("Sending request");
        self.inner().translate(TransletRequest::new(name)).await
    }

    #[tracing::instrument(skip(self, parameters))]
    async fn post(&self, name: &str, parameters: Vec<(String, String)>) -> Result<TransletOutcome, ServiceError> {
        tracing::debug!(count = parameters.len(), "Sending request");
        let request = parameters
            .into_iter()
            .fold(TransletRequest::new(name).method(MethodType::Post), |r, (k, v)| r.parameter(k, v));
        self.inner().translate(request).await
    }

    /// Performs the translet without its response and returns only the result tree.
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, name: &str) -> Result<serde_json::Value, ServiceError> {
        tracing::debug!("Sending request");
        let outcome = self
            .inner()
            .translate(TransletRequest::new(name).without_response())
            .await?;
        Ok(outcome.result)
    }
}

#[async_trait]
impl Translator for TransletClient {
    fn inner(&self) -> &TransletClient {
        self
    }
}
