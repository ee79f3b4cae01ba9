//! # Responses
//!
//! The four ways an activity can finish:
//!
//! | Variant | Effect |
//! |---|---|
//! | [`Response::Transform`] | renders the process result (JSON, text template or a registered [`Renderer`]) |
//! | [`Response::Dispatch`] | hands off to the registered [`ViewDispatcher`] |
//! | [`Response::Redirect`] | computes a location with encoded parameters |
//! | [`Response::Forward`] | re-enters the engine with another translet |
//!
//! Each variant may carry an [`ActionList`] that runs right before its effect.

use serde_json::Value;
use url::form_urlencoded;

use crate::framework::adapter::{RequestAdapter, ResponseAdapter};
use crate::framework::error::BeanError;
use crate::framework::result::ProcessResult;
use crate::framework::token::{self, TokenResolver};
use crate::model::{ActionList, MethodType};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Renders a transform response registered under a name.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        rule: &TransformResponse,
        result: Option<&ProcessResult>,
        request: &RequestAdapter,
    ) -> Result<String, BeanError>;
}

/// Hands a dispatch response to a view technology.
pub trait ViewDispatcher: Send + Sync {
    fn dispatch(
        &self,
        rule: &DispatchResponse,
        result: Option<&ProcessResult>,
        request: &RequestAdapter,
        response: &mut ResponseAdapter,
    ) -> Result<(), BeanError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformFormat {
    Json,
    Text,
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct TransformResponse {
    format: TransformFormat,
    content_type: Option<String>,
    template: Option<String>,
    pretty: bool,
    action_list: Option<ActionList>,
}

impl TransformResponse {
    pub fn format(&self) -> &TransformFormat {
        &self.format
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref().or(match self.format {
            TransformFormat::Json => Some(CONTENT_TYPE_JSON),
            TransformFormat::Text => Some(CONTENT_TYPE_TEXT),
            TransformFormat::Custom(_) => None,
        })
    }

    pub(crate) fn render_json(&self, result: Option<&ProcessResult>) -> Result<String, BeanError> {
        let value = result.map(ProcessResult::to_value).unwrap_or(Value::Null);
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        rendered.map_err(|e| BeanError::failed("Serialization", e.to_string()))
    }

    /// Renders the template if present, else the result as text.
    pub(crate) fn render_text(
        &self,
        result: Option<&ProcessResult>,
        resolver: &dyn TokenResolver,
    ) -> String {
        match &self.template {
            Some(template) => token::evaluate_string(template, resolver),
            None => match result.map(ProcessResult::to_value) {
                Some(Value::String(s)) => s,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchResponse {
    name: String,
    content_type: Option<String>,
    action_list: Option<ActionList>,
}

impl DispatchResponse {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct RedirectResponse {
    target: String,
    parameters: Vec<(String, String)>,
    content_type: Option<String>,
    action_list: Option<ActionList>,
}

impl RedirectResponse {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// Target followed by the evaluated parameters, form-urlencoded.
    pub fn location(&self, resolver: &dyn TokenResolver) -> String {
        let mut location = token::evaluate_string(&self.target, resolver);
        if self.parameters.is_empty() {
            return location;
        }
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.parameters {
            query.append_pair(name, &token::evaluate_string(value, resolver));
        }
        location.push(if location.contains('?') { '&' } else { '?' });
        location.push_str(&query.finish());
        location
    }
}

#[derive(Debug, Clone)]
pub struct ForwardResponse {
    translet: String,
    method: Option<MethodType>,
    attributes: Vec<(String, Value)>,
    content_type: Option<String>,
    action_list: Option<ActionList>,
}

impl ForwardResponse {
    pub fn translet(&self) -> &str {
        &self.translet
    }

    pub fn method(&self) -> Option<MethodType> {
        self.method
    }

    pub fn attributes(&self) -> &[(String, Value)] {
        &self.attributes
    }
}

#[derive(Debug, Clone)]
pub enum Response {
    Transform(TransformResponse),
    Dispatch(DispatchResponse),
    Redirect(RedirectResponse),
    Forward(ForwardResponse),
}

impl Response {
    fn transform(format: TransformFormat) -> Self {
        Response::Transform(TransformResponse {
            format,
            content_type: None,
            template: None,
            pretty: false,
            action_list: None,
        })
    }

    pub fn json() -> Self {
        Self::transform(TransformFormat::Json)
    }

    pub fn json_pretty() -> Self {
        let mut response = Self::json();
        if let Response::Transform(t) = &mut response {
            t.pretty = true;
        }
        response
    }

    /// A text transform; `template` may hold token expressions.
    pub fn text(template: impl Into<String>) -> Self {
        let mut response = Self::transform(TransformFormat::Text);
        if let Response::Transform(t) = &mut response {
            t.template = Some(template.into());
        }
        response
    }

    /// A transform rendered by the renderer registered under `renderer`.
    pub fn render(renderer: impl Into<String>) -> Self {
        Self::transform(TransformFormat::Custom(renderer.into()))
    }

    pub fn dispatch(view: impl Into<String>) -> Self {
        Response::Dispatch(DispatchResponse {
            name: view.into(),
            content_type: None,
            action_list: None,
        })
    }

    pub fn redirect(target: impl Into<String>) -> Self {
        Response::Redirect(RedirectResponse {
            target: target.into(),
            parameters: Vec::new(),
            content_type: None,
            action_list: None,
        })
    }

    pub fn forward(translet: impl Into<String>) -> Self {
        Response::Forward(ForwardResponse {
            translet: translet.into(),
            method: None,
            attributes: Vec::new(),
            content_type: None,
            action_list: None,
        })
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = Some(content_type.into());
        match &mut self {
            Response::Transform(r) => r.content_type = content_type,
            Response::Dispatch(r) => r.content_type = content_type,
            Response::Redirect(r) => r.content_type = content_type,
            Response::Forward(r) => r.content_type = content_type,
        }
        self
    }

    pub fn with_actions(mut self, list: ActionList) -> Self {
        let list = Some(list);
        match &mut self {
            Response::Transform(r) => r.action_list = list,
            Response::Dispatch(r) => r.action_list = list,
            Response::Redirect(r) => r.action_list = list,
            Response::Forward(r) => r.action_list = list,
        }
        self
    }

    /// Adds a redirect query parameter; the value may hold tokens.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Response::Redirect(r) = &mut self {
            r.parameters.push((name.into(), value.into()));
        }
        self
    }

    /// Adds an attribute set before forwarding.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Response::Forward(r) = &mut self {
            r.attributes.push((name.into(), value.into()));
        }
        self
    }

    pub fn with_method(mut self, method: MethodType) -> Self {
        if let Response::Forward(r) = &mut self {
            r.method = Some(method);
        }
        self
    }

    pub fn response_type(&self) -> &'static str {
        match self {
            Response::Transform(_) => "transform",
            Response::Dispatch(_) => "dispatch",
            Response::Redirect(_) => "redirect",
            Response::Forward(_) => "forward",
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            Response::Transform(r) => r.content_type(),
            Response::Dispatch(r) => r.content_type.as_deref(),
            Response::Redirect(r) => r.content_type.as_deref(),
            Response::Forward(r) => r.content_type.as_deref(),
        }
    }

    pub fn action_list(&self) -> Option<&ActionList> {
        match self {
            Response::Transform(r) => r.action_list.as_ref(),
            Response::Dispatch(r) => r.action_list.as_ref(),
            Response::Redirect(r) => r.action_list.as_ref(),
            Response::Forward(r) => r.action_list.as_ref(),
        }
    }

    /// The view, location or translet name this response points at.
    pub fn target(&self) -> Option<&str> {
        match self {
            Response::Transform(_) => None,
            Response::Dispatch(r) => Some(&r.name),
            Response::Redirect(r) => Some(&r.target),
            Response::Forward(r) => Some(&r.translet),
        }
    }

    /// Copy of this response with only the target replaced.
    /// Transforms have no target and are returned unchanged.
    pub fn replicate_with_target(&self, target: impl Into<String>) -> Self {
        let mut copy = self.clone();
        let target = target.into();
        match &mut copy {
            Response::Transform(_) => {}
            Response::Dispatch(r) => r.name = target,
            Response::Redirect(r) => r.target = target,
            Response::Forward(r) => r.translet = target,
        }
        copy
    }

    pub fn is_same_type(&self, other: &Response) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
