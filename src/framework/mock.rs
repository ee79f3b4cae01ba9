//! # Mock Framework
//!
//! Utilities for testing the engine and its callers in isolation.
//!
//! - [`RecordingBean`] is a scripted bean that remembers every call, so tests
//!   can assert which actions and advice ran, and in which order.
//! - [`MockService`] stands in for a running
//!   [`TransletService`](crate::lifecycle::TransletService): callers get a real
//!   [`TransletClient`] whose requests are answered from queued expectations.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::clients::TransletClient;
use crate::framework::action::Bean;
use crate::framework::error::BeanError;
use crate::framework::result::ActionOutcome;
use crate::framework::translet::Translet;
use crate::lifecycle::service::{ServiceError, ServiceRequest, TransletOutcome};

// =============================================================================
// RECORDING BEAN
// =============================================================================

/// Ordered record of bean calls, shareable between beans.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().expect("call log poisoned").push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("call log poisoned").clone()
    }

    pub fn clear(&self) {
        self.0.lock().expect("call log poisoned").clear();
    }
}

#[derive(Debug, Clone)]
enum Script {
    Returns(Value),
    Fails { kind: String, message: String },
    Terminates(String),
}

/// A bean answering from a per-method script.
///
/// Calls are logged as `"{name}.{method}"`. Unscripted methods succeed
/// without a result.
///
/// ```
/// use activity_engine::framework::mock::RecordingBean;
/// use serde_json::json;
///
/// let bean = RecordingBean::new("cart")
///     .returns("total", json!(42))
///     .fails("checkout", "PaymentError", "card declined");
/// assert!(bean.calls().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct RecordingBean {
    name: String,
    script: HashMap<String, Script>,
    log: CallLog,
}

impl RecordingBean {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: HashMap::new(),
            log: CallLog::new(),
        }
    }

    /// Records into `log` instead of a private one.
    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = log.clone();
        self
    }

    pub fn returns(mut self, method: impl Into<String>, value: impl Into<Value>) -> Self {
        self.script.insert(method.into(), Script::Returns(value.into()));
        self
    }

    pub fn fails(mut self, method: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.script.insert(
            method.into(),
            Script::Fails {
                kind: kind.into(),
                message: message.into(),
            },
        );
        self
    }

    pub fn terminates(mut self, method: impl Into<String>, reason: impl Into<String>) -> Self {
        self.script.insert(method.into(), Script::Terminates(reason.into()));
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.entries()
    }
}

impl Bean for RecordingBean {
    fn invoke(&self, method: &str, _args: &[Value], _translet: &mut Translet<'_>) -> Result<ActionOutcome, BeanError> {
        self.log.record(format!("{}.{}", self.name, method));
        match self.script.get(method) {
            Some(Script::Returns(value)) => Ok(ActionOutcome::Value(value.clone())),
            Some(Script::Fails { kind, message }) => Err(BeanError::failed(kind.clone(), message.clone())),
            Some(Script::Terminates(reason)) => Err(BeanError::terminate(reason.clone())),
            None => Ok(ActionOutcome::NoResult),
        }
    }
}

// =============================================================================
// MOCK SERVICE
// =============================================================================

struct Expectation {
    name: String,
    response: Result<TransletOutcome, ServiceError>,
}

/// A mock translet service with expectation tracking.
///
/// # Example
/// ```
/// use activity_engine::framework::mock::MockService;
/// use activity_engine::lifecycle::{TransletOutcome, TransletRequest};
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut mock = MockService::new();
/// mock.expect_translate("ping").return_ok(TransletOutcome::default());
///
/// let client = mock.client();
/// let outcome = client.translate(TransletRequest::new("ping")).await;
/// assert!(outcome.is_ok());
/// mock.verify(); // Ensures all expectations were met
/// # }
/// ```
pub struct MockService {
    client: TransletClient,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockService {
    /// Creates a new mock service with no expectations.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<ServiceRequest>(100);
        let expectations: Arc<Mutex<VecDeque<Expectation>>> = Arc::new(Mutex::new(VecDeque::new()));
        let expectations_clone = expectations.clone();

        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let expectation = expectations_clone
                    .lock()
                    .expect("expectations poisoned")
                    .pop_front();

                match (request, expectation) {
                    (ServiceRequest::Translate { request, respond_to }, Some(expected)) => {
                        assert_eq!(request.name, expected.name, "Unexpected translet requested");
                        let _ = respond_to.send(expected.response);
                    }
                    (ServiceRequest::Translate { request, .. }, None) => {
                        panic!("Unexpected request for translet '{}'", request.name);
                    }
                }
            }
        });

        Self {
            client: TransletClient::new(sender),
            expectations,
            _handle: handle,
        }
    }

    /// Returns the client for use in tests.
    pub fn client(&self) -> TransletClient {
        self.client.clone()
    }

    /// Expects a request for the named translet.
    pub fn expect_translate(&mut self, name: impl Into<String>) -> TranslateExpectationBuilder {
        TranslateExpectationBuilder {
            name: name.into(),
            expectations: self.expectations.clone(),
        }
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = self.expectations.lock().expect("expectations poisoned");
        if !exps.is_empty() {
            panic!("Not all expectations were met. {} remaining", exps.len());
        }
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `translate` expectations.
pub struct TranslateExpectationBuilder {
    name: String,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl TranslateExpectationBuilder {
    pub fn return_ok(self, outcome: TransletOutcome) {
        self.push(Ok(outcome));
    }

    pub fn return_err(self, error: ServiceError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<TransletOutcome, ServiceError>) {
        let mut exps = self.expectations.lock().expect("expectations poisoned");
        exps.push_back(Expectation {
            name: self.name,
            response,
        });
    }
}
