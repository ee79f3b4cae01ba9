//! # Actions
//!
//! The executable units of a translet. Every content list, response and
//! advice is made of [`Executable`] values, a closed set of variants:
//!
//! - **Bean**: invokes a method on a registered [`Bean`].
//! - **Echo**: evaluates token expressions into a value.
//! - **Headers**: writes response headers.
//! - **Include**: runs another translet in a nested activity and yields its result.
//!
//! Execution returns [`ActionOutcome`]; failures surface as [`BeanError`],
//! which the engine wraps with the action's name.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::framework::activity::Activity;
use crate::framework::error::{ActivityError, BeanError};
use crate::framework::result::ActionOutcome;
use crate::framework::token;
use crate::framework::translet::Translet;
use crate::model::MethodType;

/// A user component reachable from bean actions.
///
/// Beans are shared between concurrent activities, so they take `&self`.
/// The translet gives access to the request, the result tree and the
/// response operations of the running activity.
pub trait Bean: Send + Sync + 'static {
    fn invoke(
        &self,
        method: &str,
        args: &[Value],
        translet: &mut Translet<'_>,
    ) -> Result<ActionOutcome, BeanError>;
}

/// How a bean action names its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeanRef {
    Id(String),
    Type {
        type_id: TypeId,
        type_name: &'static str,
    },
    TypedId {
        type_id: TypeId,
        type_name: &'static str,
        id: String,
    },
}

impl BeanRef {
    pub fn id(id: impl Into<String>) -> Self {
        BeanRef::Id(id.into())
    }

    pub fn of<B: Bean>() -> Self {
        BeanRef::Type {
            type_id: TypeId::of::<B>(),
            type_name: type_name::<B>(),
        }
    }

    pub fn of_named<B: Bean>(id: impl Into<String>) -> Self {
        BeanRef::TypedId {
            type_id: TypeId::of::<B>(),
            type_name: type_name::<B>(),
            id: id.into(),
        }
    }
}

impl fmt::Display for BeanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanRef::Id(id) => f.write_str(id),
            BeanRef::Type { type_name, .. } => f.write_str(type_name),
            BeanRef::TypedId { type_name, id, .. } => write!(f, "{type_name}#{id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BeanAction {
    id: Option<String>,
    target: Option<BeanRef>,
    method: String,
    arguments: Vec<Value>,
    hidden: bool,
}

impl BeanAction {
    pub fn target(&self) -> Option<&BeanRef> {
        self.target.as_ref()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    fn execute(
        &self,
        activity: &mut Activity,
        advice_bean: Option<Arc<dyn Bean>>,
    ) -> Result<ActionOutcome, BeanError> {
        let bean = match (&self.target, advice_bean) {
            (Some(target), _) => activity.context().beans().resolve(target)?,
            (None, Some(bean)) => bean,
            (None, None) => {
                return Err(ActivityError::BeanNotFound(format!(
                    "no target bean for method '{}'",
                    self.method
                ))
                .into())
            }
        };
        let args: Vec<Value> = self
            .arguments
            .iter()
            .map(|arg| token::evaluate_value(arg, &*activity))
            .collect();

        debug!(method = %self.method, args = args.len(), "Invoking bean");
        let mut translet = Translet::new(activity);
        bean.invoke(&self.method, &args, &mut translet)
    }
}

#[derive(Debug, Clone)]
pub struct EchoAction {
    id: Option<String>,
    items: Vec<(String, Value)>,
    hidden: bool,
}

impl EchoAction {
    /// Evaluated items in declaration order.
    pub(crate) fn evaluate(&self, activity: &Activity) -> Vec<(String, Value)> {
        self.items
            .iter()
            .map(|(name, value)| (name.clone(), token::evaluate_value(value, activity)))
            .collect()
    }

    /// One item yields its value, several yield an object.
    pub(crate) fn outcome(mut values: Vec<(String, Value)>) -> ActionOutcome {
        if values.len() == 1 {
            let (_, value) = values.remove(0);
            return ActionOutcome::Value(value);
        }
        ActionOutcome::Value(Value::Object(values.into_iter().collect::<Map<_, _>>()))
    }

    fn execute(&self, activity: &Activity) -> ActionOutcome {
        Self::outcome(self.evaluate(activity))
    }
}

#[derive(Debug, Clone)]
pub struct HeaderAction {
    id: Option<String>,
    headers: Vec<(String, String)>,
}

impl HeaderAction {
    fn execute(&self, activity: &mut Activity) -> ActionOutcome {
        let headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), token::evaluate_string(value, &*activity)))
            .collect();
        let adapter = activity.response_adapter_mut();
        for (name, value) in headers {
            adapter.add_header(name, value);
        }
        ActionOutcome::NoResult
    }
}

#[derive(Debug, Clone)]
pub struct IncludeAction {
    id: Option<String>,
    translet: String,
    method: Option<MethodType>,
    attributes: Vec<(String, Value)>,
    hidden: bool,
}

impl IncludeAction {
    fn execute(&self, activity: &mut Activity) -> Result<ActionOutcome, BeanError> {
        let name = token::evaluate_string(&self.translet, &*activity);
        let attributes: Vec<(String, Value)> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), token::evaluate_value(v, &*activity)))
            .collect();
        let value = activity.include(&name, self.method, attributes)?;
        Ok(ActionOutcome::Value(value))
    }
}

/// A single executable unit.
#[derive(Debug, Clone)]
pub enum Executable {
    Bean(BeanAction),
    Echo(EchoAction),
    Headers(HeaderAction),
    Include(IncludeAction),
}

impl Executable {
    pub fn bean(target: BeanRef, method: impl Into<String>) -> Self {
        Executable::Bean(BeanAction {
            id: None,
            target: Some(target),
            method: method.into(),
            arguments: Vec::new(),
            hidden: false,
        })
    }

    /// A bean action that runs against the aspect's advice bean.
    pub fn invoke(method: impl Into<String>) -> Self {
        Executable::Bean(BeanAction {
            id: None,
            target: None,
            method: method.into(),
            arguments: Vec::new(),
            hidden: false,
        })
    }

    /// An echo of a single value, recorded under `id`.
    pub fn echo(id: impl Into<String>, value: impl Into<Value>) -> Self {
        let id = id.into();
        Executable::Echo(EchoAction {
            id: Some(id.clone()),
            items: vec![(id, value.into())],
            hidden: false,
        })
    }

    pub fn echo_items<I, K>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Executable::Echo(EchoAction {
            id: None,
            items: items.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            hidden: false,
        })
    }

    pub fn headers<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Executable::Headers(HeaderAction {
            id: None,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }

    pub fn include(translet: impl Into<String>) -> Self {
        Executable::Include(IncludeAction {
            id: None,
            translet: translet.into(),
            method: None,
            attributes: Vec::new(),
            hidden: false,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = Some(id.into());
        match &mut self {
            Executable::Bean(a) => a.id = id,
            Executable::Echo(a) => a.id = id,
            Executable::Headers(a) => a.id = id,
            Executable::Include(a) => a.id = id,
        }
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        match &mut self {
            Executable::Bean(a) => a.hidden = hidden,
            Executable::Echo(a) => a.hidden = hidden,
            Executable::Include(a) => a.hidden = hidden,
            Executable::Headers(_) => {}
        }
        self
    }

    /// Appends a bean argument. Strings may hold token expressions.
    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        if let Executable::Bean(a) = &mut self {
            a.arguments.push(arg.into());
        }
        self
    }

    /// Sets an attribute on the included request.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Executable::Include(a) = &mut self {
            a.attributes.push((name.into(), value.into()));
        }
        self
    }

    pub fn with_method(mut self, method: MethodType) -> Self {
        if let Executable::Include(a) = &mut self {
            a.method = Some(method);
        }
        self
    }

    pub fn action_id(&self) -> Option<&str> {
        match self {
            Executable::Bean(a) => a.id.as_deref(),
            Executable::Echo(a) => a.id.as_deref(),
            Executable::Headers(a) => a.id.as_deref(),
            Executable::Include(a) => a.id.as_deref(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        match self {
            Executable::Bean(a) => a.hidden,
            Executable::Echo(a) => a.hidden,
            Executable::Include(a) => a.hidden,
            Executable::Headers(_) => false,
        }
    }

    pub fn action_type(&self) -> &'static str {
        match self {
            Executable::Bean(_) => "bean",
            Executable::Echo(_) => "echo",
            Executable::Headers(_) => "headers",
            Executable::Include(_) => "include",
        }
    }

    pub fn is_bean_action(&self) -> bool {
        matches!(self, Executable::Bean(_))
    }

    pub(crate) fn execute(
        &self,
        activity: &mut Activity,
        advice_bean: Option<Arc<dyn Bean>>,
    ) -> Result<ActionOutcome, BeanError> {
        match self {
            Executable::Bean(action) => action.execute(activity, advice_bean),
            Executable::Echo(action) => Ok(action.execute(activity)),
            Executable::Headers(action) => Ok(action.execute(activity)),
            Executable::Include(action) => action.execute(activity),
        }
    }
}

impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executable::Bean(a) => match &a.target {
                Some(target) => write!(f, "bean[{target}.{}]", a.method)?,
                None => write!(f, "bean[advice.{}]", a.method)?,
            },
            Executable::Echo(_) => f.write_str("echo")?,
            Executable::Headers(_) => f.write_str("headers")?,
            Executable::Include(a) => write!(f, "include[{}]", a.translet)?,
        }
        if let Some(id) = self.action_id() {
            write!(f, "#{id}")?;
        }
        Ok(())
    }
}
