use std::collections::BTreeMap;

use serde_json::Value;

use crate::framework::action::{BeanRef, Executable};
use crate::framework::advice::{AdviceType, AspectAdviceRule, Joinpoint};
use crate::framework::response::Response;
use crate::model::Pointcut;

/// Maps raised errors to alternate responses.
///
/// An empty exception list matches any error. Responses are keyed by the
/// content type of the response that was active when the error was raised.
#[derive(Debug, Clone, Default)]
pub struct ExceptionHandlingRule {
    exception_types: Vec<String>,
    action: Option<Executable>,
    responses: BTreeMap<String, Response>,
    default_response: Option<Response>,
}

impl ExceptionHandlingRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches an `ActivityError` variant name or a `BeanError` kind
    /// anywhere in the error chain.
    pub fn on(mut self, exception_type: impl Into<String>) -> Self {
        self.exception_types.push(exception_type.into());
        self
    }

    /// Runs as advice before the alternate response is chosen.
    pub fn action(mut self, action: Executable) -> Self {
        self.action = Some(action);
        self
    }

    /// Registers a response under its own content type. A response without
    /// content type becomes the default.
    pub fn respond(mut self, response: Response) -> Self {
        match response.content_type() {
            Some(content_type) => {
                self.responses.insert(content_type.to_string(), response);
            }
            None => self.default_response = Some(response),
        }
        self
    }

    pub fn respond_by_default(mut self, response: Response) -> Self {
        self.default_response = Some(response);
        self
    }

    pub fn exception_types(&self) -> &[String] {
        &self.exception_types
    }

    pub fn get_action(&self) -> Option<&Executable> {
        self.action.as_ref()
    }

    pub fn matches(&self, error_names: &[String]) -> bool {
        self.exception_types.is_empty()
            || self
                .exception_types
                .iter()
                .any(|t| error_names.iter().any(|n| n == t))
    }

    /// The response for the given content type, else the default.
    pub fn response_for(&self, content_type: Option<&str>) -> Option<&Response> {
        content_type
            .and_then(|ct| self.responses.get(ct))
            .or(self.default_response.as_ref())
    }

    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.responses.values().chain(self.default_response.iter())
    }
}

/// A named set of advice bound to one joinpoint.
#[derive(Debug, Clone)]
pub struct AspectRule {
    id: String,
    joinpoint: Joinpoint,
    pointcut: Option<Pointcut>,
    advice_bean: Option<BeanRef>,
    advice_rules: Vec<AspectAdviceRule>,
    exception_rules: Vec<ExceptionHandlingRule>,
    settings: BTreeMap<String, Value>,
}

impl AspectRule {
    pub fn new(id: impl Into<String>, joinpoint: Joinpoint) -> Self {
        Self {
            id: id.into(),
            joinpoint,
            pointcut: None,
            advice_bean: None,
            advice_rules: Vec::new(),
            exception_rules: Vec::new(),
            settings: BTreeMap::new(),
        }
    }

    pub fn pointcut(mut self, pointcut: Pointcut) -> Self {
        self.pointcut = Some(pointcut);
        self
    }

    /// Bean used by advice bean actions that name no target of their own.
    pub fn advice_bean(mut self, bean: BeanRef) -> Self {
        self.advice_bean = Some(bean);
        self
    }

    pub fn advice(mut self, advice_type: AdviceType, action: Executable) -> Self {
        self.advice_rules
            .push(AspectAdviceRule::new(self.id.clone(), advice_type, action));
        self
    }

    pub fn before(self, action: Executable) -> Self {
        self.advice(AdviceType::Before, action)
    }

    pub fn after(self, action: Executable) -> Self {
        self.advice(AdviceType::After, action)
    }

    pub fn around(self, action: Executable) -> Self {
        self.advice(AdviceType::Around, action)
    }

    pub fn finally(self, action: Executable) -> Self {
        self.advice(AdviceType::Finally, action)
    }

    pub fn exception(mut self, rule: ExceptionHandlingRule) -> Self {
        self.exception_rules.push(rule);
        self
    }

    pub fn setting(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn joinpoint(&self) -> Joinpoint {
        self.joinpoint
    }

    pub fn get_pointcut(&self) -> Option<&Pointcut> {
        self.pointcut.as_ref()
    }

    /// An aspect without pointcut applies to every translet.
    pub fn applies_to(&self, translet_name: &str) -> bool {
        self.pointcut
            .as_ref()
            .map_or(true, |pc| pc.matches(translet_name))
    }

    /// Advice rules with the aspect's advice bean filled in.
    pub fn advice_rules(&self) -> impl Iterator<Item = AspectAdviceRule> + '_ {
        self.advice_rules.iter().map(|rule| match &self.advice_bean {
            Some(bean) if rule.advice_bean().is_none() => rule.clone().with_advice_bean(bean.clone()),
            _ => rule.clone(),
        })
    }

    pub fn exception_rules(&self) -> &[ExceptionHandlingRule] {
        &self.exception_rules
    }

    pub fn settings(&self) -> &BTreeMap<String, Value> {
        &self.settings
    }
}
