//! # Translet Service
//!
//! The transport boundary of the engine. A [`TransletService`] owns the
//! shared [`ActivityContext`] and receives requests over a channel; every
//! request gets its own [`Activity`](crate::framework::Activity) on the
//! blocking pool, so a slow translet never stalls the receive loop.
//!
//! ```text
//! TransletClient ──mpsc──▶ TransletService ──spawn_blocking──▶ translate()
//!        ▲                                                        │
//!        └──────────────────────── oneshot ◀──────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::clients::TransletClient;
use crate::framework::{ActivityContext, ActivityError, ProcessResult, ResponseAdapter};
use crate::model::MethodType;

// =============================================================================
// MESSAGES & ERRORS
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("Translet service closed")]
    ServiceClosed,
    #[error("Translet service dropped response channel")]
    ServiceDropped,
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error("Activity task failed: {0}")]
    TaskFailed(String),
}

/// A request for one translet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransletRequest {
    pub name: String,
    /// Falls back to the configured default method.
    #[serde(default)]
    pub method: Option<MethodType>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub without_response: bool,
}

impl TransletRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: MethodType) -> Self {
        self.method = Some(method);
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn without_response(mut self) -> Self {
        self.without_response = true;
        self
    }
}

/// What a finished activity left behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransletOutcome {
    /// The last translet performed, after any forwards.
    pub translet_name: String,
    pub result: Value,
    pub response: ResponseAdapter,
    pub ended: bool,
}

pub type Responder<T> = oneshot::Sender<Result<T, ServiceError>>;

#[derive(Debug)]
pub enum ServiceRequest {
    Translate {
        request: TransletRequest,
        respond_to: Responder<TransletOutcome>,
    },
}

// =============================================================================
// THE SERVICE
// =============================================================================

pub struct TransletService {
    receiver: mpsc::Receiver<ServiceRequest>,
    context: Arc<ActivityContext>,
}

impl TransletService {
    pub fn new(context: Arc<ActivityContext>) -> (Self, TransletClient) {
        let (sender, receiver) = mpsc::channel(context.config().service_buffer);
        let service = Self { receiver, context };
        (service, TransletClient::new(sender))
    }

    /// Serves until every client is dropped, then waits for in-flight
    /// activities.
    pub async fn run(mut self) {
        info!(translets = self.context.translets().len(), "Translet service started");
        let mut in_flight = JoinSet::new();
        let mut handled = 0usize;

        loop {
            tokio::select! {
                msg = self.receiver.recv() => {
                    let Some(ServiceRequest::Translate { request, respond_to }) = msg else {
                        break;
                    };
                    handled += 1;
                    debug!(translet = %request.name, method = ?request.method, "Translate");
                    let context = Arc::clone(&self.context);
                    in_flight.spawn(serve(context, request, respond_to));
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Request task failed");
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Request task failed");
            }
        }
        info!(handled, "Shutdown");
    }
}

async fn serve(context: Arc<ActivityContext>, request: TransletRequest, respond_to: Responder<TransletOutcome>) {
    let name = request.name.clone();
    let outcome = tokio::task::spawn_blocking(move || translate(&context, request))
        .await
        .map_err(|e| ServiceError::TaskFailed(e.to_string()))
        .and_then(|outcome| outcome);

    match &outcome {
        Ok(o) => info!(translet = %name, performed = %o.translet_name, ended = o.ended, "Translated"),
        Err(e) => warn!(translet = %name, error = %e, "Translate failed"),
    }
    let _ = respond_to.send(outcome);
}

/// Runs one request to completion on the calling thread.
///
/// A terminated activity is a normal outcome.
pub fn translate(context: &Arc<ActivityContext>, request: TransletRequest) -> Result<TransletOutcome, ServiceError> {
    let mut activity = context.new_activity();
    for (name, value) in request.parameters {
        activity.request_mut().set_parameter(name, value);
    }
    for (name, value) in request.attributes {
        activity.request_mut().set_attribute(name, value);
    }
    match request.method {
        Some(method) => activity.ready_with_method(&request.name, method)?,
        None => activity.ready(&request.name)?,
    }

    let performed = if request.without_response {
        activity.perform_without_response()
    } else {
        activity.perform()
    };
    activity.finish();

    match performed {
        Ok(()) => {}
        Err(ActivityError::Terminated(reason)) => debug!(translet = %request.name, %reason, "Activity terminated"),
        Err(err) => return Err(err.into()),
    }

    Ok(TransletOutcome {
        translet_name: activity
            .translet_name()
            .unwrap_or(&request.name)
            .to_string(),
        result: activity
            .process_result()
            .map(ProcessResult::to_value)
            .unwrap_or(Value::Null),
        response: activity.response_adapter().clone(),
        ended: activity.is_activity_ended(),
    })
}
