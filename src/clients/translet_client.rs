use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

use crate::lifecycle::service::{ServiceError, ServiceRequest, TransletOutcome, TransletRequest};

/// Sends translet requests to a [`TransletService`](crate::lifecycle::TransletService).
///
/// Cheap to clone. The service stops once every clone is dropped.
#[derive(Debug, Clone)]
pub struct TransletClient {
    sender: mpsc::Sender<ServiceRequest>,
}

impl TransletClient {
    pub fn new(sender: mpsc::Sender<ServiceRequest>) -> Self {
        Self { sender }
    }

    #[instrument(skip(self, request), fields(translet = %request.name))]
    pub async fn translate(&self, request: TransletRequest) -> Result<TransletOutcome, ServiceError> {
        debug!(?request, "translate called");
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ServiceRequest::Translate { request, respond_to })
            .await
            .map_err(|_| ServiceError::ServiceClosed)?;
        response.await.map_err(|_| ServiceError::ServiceDropped)?
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
