use std::sync::Arc;

use tracing::{error, info};

use crate::clients::TransletClient;
use crate::framework::ActivityContext;
use crate::lifecycle::service::{ServiceError, TransletService};

/// Owns a running [`TransletService`] and the client that talks to it.
///
/// # Example
///
/// ```
/// use activity_engine::framework::{ActivityContext, Executable, Response};
/// use activity_engine::lifecycle::{TransletRequest, TransletSystem};
/// use activity_engine::model::TransletRule;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let context = ActivityContext::builder()
///     .translet(
///         TransletRule::new("ping")
///             .action(Executable::echo("pong", json!(true)))
///             .response(Response::json()),
///     )
///     .build()?;
///
/// let system = TransletSystem::new(context);
/// let outcome = system.client.translate(TransletRequest::new("ping")).await?;
/// assert_eq!(outcome.response.body(), Some(r#"{"pong":true}"#));
///
/// system.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct TransletSystem {
    pub client: TransletClient,
    handle: tokio::task::JoinHandle<()>,
}

impl TransletSystem {
    /// Spawns the service on the current runtime.
    pub fn new(context: Arc<ActivityContext>) -> Self {
        let (service, client) = TransletService::new(context);
        let handle = tokio::spawn(service.run());
        Self { client, handle }
    }

    /// Drops the client and waits for the service to drain.
    pub async fn shutdown(self) -> Result<(), ServiceError> {
        info!("Shutting down translet service...");
        drop(self.client);

        if let Err(e) = self.handle.await {
            error!(error = %e, "Service task failed");
            return Err(ServiceError::TaskFailed(e.to_string()));
        }

        info!("Translet service shutdown complete.");
        Ok(())
    }
}
