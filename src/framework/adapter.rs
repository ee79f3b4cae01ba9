//! Transport-neutral request and response state of an activity.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::model::MethodType;

/// Incoming request data. Survives forwards unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestAdapter {
    method: MethodType,
    parameters: BTreeMap<String, String>,
    attributes: BTreeMap<String, Value>,
}

impl RequestAdapter {
    pub fn new(method: MethodType) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn method(&self) -> MethodType {
        self.method
    }

    pub fn set_method(&mut self, method: MethodType) {
        self.method = method;
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }
}

/// What the activity produced for the transport to send back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseAdapter {
    content_type: Option<String>,
    encoding: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<String>,
    redirect_location: Option<String>,
    dispatched_view: Option<String>,
}

impl ResponseAdapter {
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = Some(encoding.into());
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn write_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    pub fn redirect_location(&self) -> Option<&str> {
        self.redirect_location.as_deref()
    }

    pub fn set_redirect_location(&mut self, location: impl Into<String>) {
        self.redirect_location = Some(location.into());
    }

    pub fn dispatched_view(&self) -> Option<&str> {
        self.dispatched_view.as_deref()
    }

    pub fn set_dispatched_view(&mut self, view: impl Into<String>) {
        self.dispatched_view = Some(view.into());
    }

    /// Drops any partial output.
    pub fn reset(&mut self) {
        self.content_type = None;
        self.body = None;
        self.redirect_location = None;
        self.dispatched_view = None;
    }
}

type DestroyHook = Box<dyn FnOnce() + Send>;

/// Resources bound to a single request.
///
/// Hooks run in reverse registration order, exactly once.
#[derive(Default)]
pub struct RequestScope {
    hooks: Vec<(String, DestroyHook)>,
    destroyed: bool,
}

impl RequestScope {
    pub fn on_destroy(&mut self, name: impl Into<String>, hook: impl FnOnce() + Send + 'static) {
        let name = name.into();
        if self.destroyed {
            debug!(%name, "Request scope already destroyed; running hook now");
            hook();
            return;
        }
        self.hooks.push((name, Box::new(hook)));
    }

    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        while let Some((name, hook)) = self.hooks.pop() {
            debug!(%name, "Destroying request-scoped resource");
            hook();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("hooks", &self.hooks.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
