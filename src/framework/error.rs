//! Error types raised while an activity runs.
//!
//! [`ActivityError`] is what the engine returns. [`BeanError`] is what user
//! beans, renderers and dispatchers return; the engine wraps it into
//! [`ActivityError::ActionExecution`] together with the name of the failing
//! action.
//!
//! Both are `Clone` so the activity can keep a copy of the first raised
//! error while the original keeps propagating.

use crate::model::MethodType;

/// Errors produced by the activity engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ActivityError {
    #[error("Translet not found: {0}")]
    TransletNotFound(String),

    #[error("Request method {method} is not allowed for translet '{name}'")]
    MethodNotAllowed { name: String, method: MethodType },

    #[error("Activity is not ready; call ready() before perform()")]
    NotReady,

    #[error("Missing mandatory parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("Request processing failed")]
    Request(#[source] Box<ActivityError>),

    #[error("Content processing failed")]
    Content(#[source] Box<ActivityError>),

    #[error("Response processing failed")]
    Response(#[source] Box<ActivityError>),

    #[error("Failed to perform translet '{name}'")]
    Perform {
        name: String,
        #[source]
        source: Box<ActivityError>,
    },

    #[error("Failed to execute action {action}")]
    ActionExecution {
        action: String,
        #[source]
        source: Box<BeanError>,
    },

    #[error("Activity terminated: {0}")]
    Terminated(String),

    #[error("Forward depth exceeded ({max}) while forwarding to '{target}'")]
    ForwardDepthExceeded { target: String, max: usize },

    #[error("Include depth exceeded ({max}) while including '{target}'")]
    IncludeDepthExceeded { target: String, max: usize },

    #[error("Bean not found: {0}")]
    BeanNotFound(String),

    #[error("No unique bean for {name}: {count} candidates")]
    BeanNotUnique { name: String, count: usize },

    #[error("No renderer registered under '{0}'")]
    RendererNotFound(String),

    #[error("No view dispatcher registered")]
    DispatcherNotFound,

    #[error("Failed to render response '{name}'")]
    Render {
        name: String,
        #[source]
        source: Box<BeanError>,
    },

    #[error("Invalid rule: {0}")]
    InvalidRule(String),
}

impl ActivityError {
    /// Variant name, used when matching exception-handling rules.
    pub fn name(&self) -> &'static str {
        match self {
            ActivityError::TransletNotFound(_) => "TransletNotFound",
            ActivityError::MethodNotAllowed { .. } => "MethodNotAllowed",
            ActivityError::NotReady => "NotReady",
            ActivityError::MissingParameters(_) => "MissingParameters",
            ActivityError::Request(_) => "Request",
            ActivityError::Content(_) => "Content",
            ActivityError::Response(_) => "Response",
            ActivityError::Perform { .. } => "Perform",
            ActivityError::ActionExecution { .. } => "ActionExecution",
            ActivityError::Terminated(_) => "Terminated",
            ActivityError::ForwardDepthExceeded { .. } => "ForwardDepthExceeded",
            ActivityError::IncludeDepthExceeded { .. } => "IncludeDepthExceeded",
            ActivityError::BeanNotFound(_) => "BeanNotFound",
            ActivityError::BeanNotUnique { .. } => "BeanNotUnique",
            ActivityError::RendererNotFound(_) => "RendererNotFound",
            ActivityError::DispatcherNotFound => "DispatcherNotFound",
            ActivityError::Render { .. } => "Render",
            ActivityError::InvalidRule(_) => "InvalidRule",
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, ActivityError::Terminated(_))
    }

    /// True for errors already classified by one of the request, content
    /// or response phases.
    pub fn is_phase_error(&self) -> bool {
        matches!(
            self,
            ActivityError::Request(_) | ActivityError::Content(_) | ActivityError::Response(_)
        )
    }

    /// Names of this error and every error it wraps, outermost first.
    /// Exception-handling rules match on these.
    pub fn chain_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<String>) {
        names.push(self.name().to_string());
        match self {
            ActivityError::Request(inner)
            | ActivityError::Content(inner)
            | ActivityError::Response(inner)
            | ActivityError::Perform { source: inner, .. } => inner.collect_names(names),
            ActivityError::ActionExecution { source, .. } | ActivityError::Render { source, .. } => {
                source.collect_names(names)
            }
            _ => {}
        }
    }

    /// The innermost wrapped error, rendered for logs.
    pub fn root_cause(&self) -> String {
        match self {
            ActivityError::Request(inner)
            | ActivityError::Content(inner)
            | ActivityError::Response(inner)
            | ActivityError::Perform { source: inner, .. } => inner.root_cause(),
            ActivityError::ActionExecution { source, .. } | ActivityError::Render { source, .. } => {
                match source.as_ref() {
                    BeanError::Activity(inner) => inner.root_cause(),
                    other => other.to_string(),
                }
            }
            other => other.to_string(),
        }
    }
}

/// Errors returned by beans, renderers and view dispatchers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BeanError {
    /// An application failure. `kind` is the name exception rules match on.
    #[error("{kind}: {message}")]
    Failed { kind: String, message: String },

    /// Deliberate short-circuit of the whole activity.
    #[error("Activity terminated: {0}")]
    Terminated(String),

    /// An engine error surfaced through a translet operation.
    #[error(transparent)]
    Activity(Box<ActivityError>),
}

impl BeanError {
    pub fn failed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        BeanError::Failed {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn terminate(reason: impl Into<String>) -> Self {
        BeanError::Terminated(reason.into())
    }

    fn collect_names(&self, names: &mut Vec<String>) {
        match self {
            BeanError::Activity(inner) => inner.collect_names(names),
            other => names.push(other.kind().to_string()),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            BeanError::Failed { kind, .. } => kind,
            BeanError::Terminated(_) => "Terminated",
            BeanError::Activity(inner) => inner.name(),
        }
    }
}

impl From<ActivityError> for BeanError {
    fn from(err: ActivityError) -> Self {
        BeanError::Activity(Box::new(err))
    }
}

impl From<String> for BeanError {
    fn from(message: String) -> Self {
        BeanError::failed("BeanError", message)
    }
}
