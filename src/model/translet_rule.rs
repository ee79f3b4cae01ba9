use std::sync::Arc;

use crate::framework::advice::TransletAdvice;
use crate::framework::action::Executable;
use crate::framework::response::Response;
use crate::model::{ExceptionHandlingRule, MethodType, PathPattern};

/// An ordered group of actions whose results land in one content group.
#[derive(Debug, Clone, Default)]
pub struct ActionList {
    name: Option<String>,
    omittable: bool,
    hidden: bool,
    actions: Vec<Executable>,
}

impl ActionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn omittable(mut self, omittable: bool) -> Self {
        self.omittable = omittable;
        self
    }

    /// Hidden lists still run, but their results are invisible to lookups.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn action(mut self, action: Executable) -> Self {
        self.actions.push(action);
        self
    }

    pub fn push(&mut self, action: Executable) {
        self.actions.push(action);
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_omittable(&self) -> bool {
        self.omittable
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn actions(&self) -> &[Executable] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// The CONTENT phase work of a translet.
#[derive(Debug, Clone, Default)]
pub struct ContentList {
    name: Option<String>,
    omittable: bool,
    action_lists: Vec<ActionList>,
}

impl ContentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn omittable(mut self, omittable: bool) -> Self {
        self.omittable = omittable;
        self
    }

    pub fn list(mut self, list: ActionList) -> Self {
        self.action_lists.push(list);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_omittable(&self) -> bool {
        self.omittable
    }

    pub fn action_lists(&self) -> &[ActionList] {
        &self.action_lists
    }
}

/// Declared request handling of a translet.
#[derive(Debug, Clone, Default)]
pub struct RequestRule {
    allowed_methods: Vec<MethodType>,
    mandatory_parameters: Vec<String>,
    attributes: Vec<(String, String)>,
}

impl RequestRule {
    /// An empty method list allows every method.
    pub fn allows(&self, method: MethodType) -> bool {
        self.allowed_methods.is_empty() || self.allowed_methods.contains(&method)
    }

    pub fn allowed_methods(&self) -> &[MethodType] {
        &self.allowed_methods
    }

    pub fn mandatory_parameters(&self) -> &[String] {
        &self.mandatory_parameters
    }

    /// Attribute name and token expression pairs evaluated on request.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }
}

/// Declared response of a translet, or an urgent replacement built while
/// resolving an error.
#[derive(Debug, Clone, Default)]
pub struct ResponseRule {
    name: Option<String>,
    encoding: Option<String>,
    response: Option<Response>,
    urgent: bool,
}

impl ResponseRule {
    pub fn new(response: Response) -> Self {
        Self {
            response: Some(response),
            ..Self::default()
        }
    }

    pub fn urgent(response: Response, encoding: Option<String>) -> Self {
        Self {
            name: None,
            encoding,
            response: Some(response),
            urgent: true,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.response.as_ref().and_then(Response::content_type)
    }

    pub fn is_urgent(&self) -> bool {
        self.urgent
    }
}

/// A named, immutable processing endpoint.
///
/// Built once, then shared through `Arc` by every activity that runs it.
#[derive(Debug, Clone)]
pub struct TransletRule {
    name: String,
    description: Option<String>,
    pattern: Option<PathPattern>,
    request_rule: RequestRule,
    response_rule: Arc<ResponseRule>,
    content_list: Option<ContentList>,
    exception_rules: Vec<Arc<ExceptionHandlingRule>>,
    advice: Option<TransletAdvice>,
}

impl TransletRule {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            pattern: PathPattern::parse(&name),
            name,
            description: None,
            request_rule: RequestRule::default(),
            response_rule: Arc::new(ResponseRule::default()),
            content_list: None,
            exception_rules: Vec::new(),
            advice: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn method(mut self, method: MethodType) -> Self {
        self.request_rule.allowed_methods.push(method);
        self
    }

    pub fn mandatory(mut self, parameter: impl Into<String>) -> Self {
        self.request_rule.mandatory_parameters.push(parameter.into());
        self
    }

    /// Declares a request attribute computed from a token expression.
    pub fn attribute(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.request_rule
            .attributes
            .push((name.into(), expression.into()));
        self
    }

    pub fn content(mut self, content_list: ContentList) -> Self {
        self.content_list = Some(content_list);
        self
    }

    /// Appends an action to the implicit content list, creating it on first use.
    pub fn action(mut self, action: Executable) -> Self {
        let content = self
            .content_list
            .get_or_insert_with(|| ContentList::new().omittable(true));
        if content.action_lists.is_empty() {
            content.action_lists.push(ActionList::new());
        }
        if let Some(last) = content.action_lists.last_mut() {
            last.push(action);
        }
        self
    }

    pub fn response(mut self, response: Response) -> Self {
        let encoding = self.response_rule.encoding.clone();
        self.response_rule = Arc::new(ResponseRule {
            encoding,
            ..ResponseRule::new(response)
        });
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.response_rule).encoding = Some(encoding.into());
        self
    }

    pub fn exception(mut self, rule: ExceptionHandlingRule) -> Self {
        self.exception_rules.push(Arc::new(rule));
        self
    }

    pub(crate) fn with_advice(mut self, advice: TransletAdvice) -> Self {
        self.advice = Some(advice);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn pattern(&self) -> Option<&PathPattern> {
        self.pattern.as_ref()
    }

    /// True when the name holds variables or wildcards.
    pub fn is_pattern(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn request_rule(&self) -> &RequestRule {
        &self.request_rule
    }

    pub fn response_rule(&self) -> &Arc<ResponseRule> {
        &self.response_rule
    }

    pub fn content_list(&self) -> Option<&ContentList> {
        self.content_list.as_ref()
    }

    pub fn exception_rules(&self) -> &[Arc<ExceptionHandlingRule>] {
        &self.exception_rules
    }

    /// Advice registries baked at build time. `None` for pattern names.
    pub fn advice(&self) -> Option<&TransletAdvice> {
        self.advice.as_ref()
    }

    /// Every action declared by the translet, content first, then response
    /// and exception responses.
    pub fn actions(&self) -> Vec<&Executable> {
        let mut actions: Vec<&Executable> = self
            .content_list
            .iter()
            .flat_map(|c| c.action_lists.iter())
            .flat_map(|l| l.actions.iter())
            .collect();
        let responses = self
            .response_rule
            .response()
            .into_iter()
            .chain(self.exception_rules.iter().flat_map(|r| r.responses()));
        for response in responses {
            if let Some(list) = response.action_list() {
                actions.extend(list.actions().iter());
            }
        }
        actions
    }
}
