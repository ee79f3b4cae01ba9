use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use activity_engine::framework::mock::{CallLog, RecordingBean};
use activity_engine::framework::{
    ActionOutcome, ActivityContext, ActivityError, Bean, BeanError, BeanRef, DispatchResponse, EngineConfig,
    Executable, Joinpoint, ProcessResult, Renderer, RequestAdapter, RequestHandler, Response, ResponseAdapter,
    TransformResponse, Translet, ViewDispatcher,
};
use activity_engine::model::{
    ActionList, AspectRule, ContentList, ExceptionHandlingRule, MethodType, Pointcut, TransletRule,
};
use serde_json::{json, Value};

// =============================================================================
// TEST BEANS
// =============================================================================

/// Appends `log:<method>` to the `log` request attribute.
struct AttributeLogger;

impl Bean for AttributeLogger {
    fn invoke(&self, method: &str, _: &[Value], translet: &mut Translet<'_>) -> Result<ActionOutcome, BeanError> {
        let mut entries = match translet.attribute("log") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        entries.push(json!(format!("log:{method}")));
        translet.set_attribute("log", Value::Array(entries));
        Ok(ActionOutcome::NoResult)
    }
}

/// Registers a late aspect on the joinpoint named by the method.
struct Registrar;

impl Bean for Registrar {
    fn invoke(&self, method: &str, _: &[Value], translet: &mut Translet<'_>) -> Result<ActionOutcome, BeanError> {
        let joinpoint = match method {
            "content" => Joinpoint::Content,
            _ => Joinpoint::Request,
        };
        let aspect = AspectRule::new(format!("late-{method}"), joinpoint)
            .advice_bean(BeanRef::id("late"))
            .before(Executable::invoke("before"))
            .after(Executable::invoke("after"));
        let accepted = translet.register_aspect_rule(aspect)?;
        Ok(ActionOutcome::value(accepted))
    }
}

/// Redirects to `/welcome`; `hard` skips the declared redirect's parameters.
struct Router;

impl Bean for Router {
    fn invoke(&self, method: &str, _: &[Value], translet: &mut Translet<'_>) -> Result<ActionOutcome, BeanError> {
        translet.redirect("/welcome", method == "hard");
        Ok(ActionOutcome::NoResult)
    }
}

/// Returns the before-advice result of the `meta` aspect.
struct Peeker;

impl Bean for Peeker {
    fn invoke(&self, _: &str, _: &[Value], translet: &mut Translet<'_>) -> Result<ActionOutcome, BeanError> {
        Ok(ActionOutcome::Value(
            translet.before_advice_result("meta").cloned().unwrap_or(Value::Null),
        ))
    }
}

/// Flags request-scope teardown.
struct ScopeStamp(Arc<AtomicBool>);

impl RequestHandler for ScopeStamp {
    fn handle(&self, translet: &mut Translet<'_>) -> Result<(), BeanError> {
        let flag = Arc::clone(&self.0);
        translet.on_request_destroy("stamp", move || flag.store(true, Ordering::SeqCst));
        Ok(())
    }
}

struct Upper;

impl Renderer for Upper {
    fn render(
        &self,
        _rule: &TransformResponse,
        result: Option<&ProcessResult>,
        _request: &RequestAdapter,
    ) -> Result<String, BeanError> {
        Ok(result
            .map(|r| r.to_value().to_string())
            .unwrap_or_default()
            .to_uppercase())
    }
}

/// Always fails to render.
struct Broken;

impl Renderer for Broken {
    fn render(
        &self,
        _rule: &TransformResponse,
        _result: Option<&ProcessResult>,
        _request: &RequestAdapter,
    ) -> Result<String, BeanError> {
        Err(BeanError::failed("TemplateError", "unclosed tag"))
    }
}

struct Views;

impl ViewDispatcher for Views {
    fn dispatch(
        &self,
        rule: &DispatchResponse,
        result: Option<&ProcessResult>,
        _request: &RequestAdapter,
        response: &mut ResponseAdapter,
    ) -> Result<(), BeanError> {
        let model = result.map(|r| r.to_value().to_string()).unwrap_or_default();
        response.write_body(format!("<{}>{}", rule.name(), model));
        Ok(())
    }
}

fn body_json(activity: &activity_engine::framework::Activity) -> Value {
    let body = activity.response_adapter().body().expect("response body");
    serde_json::from_str(body).expect("JSON body")
}

// =============================================================================
// PHASES & ADVICE
// =============================================================================

#[test]
fn greet_runs_advice_once_and_ends_after_response() {
    let context = ActivityContext::builder()
        .bean("logger", AttributeLogger)
        .aspect(
            AspectRule::new("logging", Joinpoint::Translet)
                .advice_bean(BeanRef::id("logger"))
                .before(Executable::invoke("before")),
        )
        .translet(
            TransletRule::new("greet")
                .action(Executable::echo("msg", "hi"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("greet").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(activity.result_value("msg"), Some(&json!("hi")));
    assert_eq!(activity.request().attribute("log"), Some(&json!(["log:before"])));
    assert!(activity.is_activity_ended());
    assert_eq!(activity.response_adapter().body(), Some(r#"{"msg":"hi"}"#));
    assert_eq!(activity.response_adapter().content_type(), Some("application/json"));
}

#[test]
fn translet_without_content_never_enters_content_phase() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .bean("watch", RecordingBean::new("watch").with_log(&log))
        .aspect(
            AspectRule::new("watch", Joinpoint::Content)
                .advice_bean(BeanRef::id("watch"))
                .before(Executable::invoke("before"))
                .finally(Executable::invoke("finally")),
        )
        .translet(TransletRule::new("empty").response(Response::text("nothing")))
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("empty").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert!(activity.process_result().is_none());
    assert!(log.entries().is_empty());
    assert_eq!(activity.response_adapter().body(), Some("nothing"));
    assert!(activity.is_activity_ended());
}

#[test]
fn advice_runs_in_registration_order_around_each_phase() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .bean("logger", RecordingBean::new("logger").with_log(&log))
        .bean("tx", RecordingBean::new("tx").with_log(&log))
        .bean("worker", RecordingBean::new("worker").with_log(&log).returns("run", 7))
        .aspect(
            AspectRule::new("log", Joinpoint::Translet)
                .advice_bean(BeanRef::id("logger"))
                .before(Executable::invoke("before"))
                .after(Executable::invoke("after"))
                .finally(Executable::invoke("finally")),
        )
        .aspect(
            AspectRule::new("tx", Joinpoint::Content)
                .advice_bean(BeanRef::id("tx"))
                .around(Executable::invoke("around")),
        )
        .translet(
            TransletRule::new("work")
                .action(Executable::bean(BeanRef::id("worker"), "run").with_id("n"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("work").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(
        log.entries(),
        vec![
            "logger.before",
            "tx.around",
            "worker.run",
            "tx.around",
            "logger.after",
            "logger.finally",
        ]
    );
    assert_eq!(activity.result_value("n"), Some(&json!(7)));
}

#[test]
fn finally_advice_runs_when_core_work_fails() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .bean("logger", RecordingBean::new("logger").with_log(&log))
        .bean("worker", RecordingBean::new("worker").with_log(&log).fails("run", "IllegalState", "boom"))
        .aspect(
            AspectRule::new("log", Joinpoint::Translet)
                .advice_bean(BeanRef::id("logger"))
                .before(Executable::invoke("before"))
                .after(Executable::invoke("after"))
                .finally(Executable::invoke("finally")),
        )
        .translet(
            TransletRule::new("work")
                .action(Executable::bean(BeanRef::id("worker"), "run"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("work").expect("Failed to ready");
    let err = activity.perform().expect_err("content failure should propagate");

    assert!(matches!(err, ActivityError::Content(_)));
    assert_eq!(log.entries(), vec!["logger.before", "worker.run", "logger.finally"]);
}

#[test]
fn phase_finally_advice_runs_when_that_phase_fails() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .bean("tx", RecordingBean::new("tx").with_log(&log))
        .bean("worker", RecordingBean::new("worker").with_log(&log).fails("run", "IllegalState", "boom"))
        .aspect(
            AspectRule::new("tx", Joinpoint::Content)
                .advice_bean(BeanRef::id("tx"))
                .before(Executable::invoke("begin"))
                .after(Executable::invoke("commit"))
                .finally(Executable::invoke("close")),
        )
        .translet(
            TransletRule::new("work")
                .action(Executable::bean(BeanRef::id("worker"), "run"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("work").expect("Failed to ready");
    let err = activity.perform().expect_err("content failure should propagate");

    assert!(matches!(err, ActivityError::Content(_)));
    assert_eq!(log.entries(), vec!["tx.begin", "worker.run", "tx.close"]);
}

#[test]
fn response_finally_advice_runs_when_rendering_fails() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .renderer("broken", Broken)
        .bean("writer", RecordingBean::new("writer").with_log(&log))
        .aspect(
            AspectRule::new("writer", Joinpoint::Response)
                .advice_bean(BeanRef::id("writer"))
                .after(Executable::invoke("flush"))
                .finally(Executable::invoke("close")),
        )
        .translet(
            TransletRule::new("report")
                .action(Executable::echo("rows", 3))
                .response(Response::render("broken")),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("report").expect("Failed to ready");
    match activity.perform() {
        Err(ActivityError::Response(inner)) => assert!(matches!(*inner, ActivityError::Render { .. })),
        other => panic!("expected response failure, got {other:?}"),
    }

    assert_eq!(log.entries(), vec!["writer.close"]);
    assert!(!activity.is_activity_ended());
    assert!(activity.response_adapter().body().is_none());
    assert!(activity
        .raised_exception()
        .is_some_and(|e| e.chain_names().contains(&"TemplateError".to_string())));
}

#[test]
fn failing_finally_advice_does_not_hide_the_real_error() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .bean("cleanup", RecordingBean::new("cleanup").with_log(&log).fails("finally", "IoError", "disk gone"))
        .bean("worker", RecordingBean::new("worker").with_log(&log).fails("run", "IllegalState", "boom"))
        .aspect(
            AspectRule::new("cleanup", Joinpoint::Request)
                .advice_bean(BeanRef::id("cleanup"))
                .finally(Executable::invoke("finally")),
        )
        .translet(
            TransletRule::new("work")
                .action(Executable::bean(BeanRef::id("worker"), "run"))
                .response(Response::text("@{out}"))
                .exception(ExceptionHandlingRule::new().on("IllegalState").respond(Response::text("handled"))),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("work").expect("Failed to ready");
    activity.perform().expect("the content error has a rule");

    assert_eq!(log.entries(), vec!["cleanup.finally", "worker.run"]);
    assert_eq!(activity.response_adapter().body(), Some("handled"));
    let raised = activity.raised_exception().expect("raised exception");
    assert!(raised.chain_names().contains(&"IllegalState".to_string()));
    assert!(!raised.chain_names().contains(&"IoError".to_string()));
}

#[test]
fn echo_advice_seeds_request_attributes() {
    let context = ActivityContext::builder()
        .aspect(AspectRule::new("locale", Joinpoint::Translet).before(Executable::echo("who", "kim")))
        .translet(
            TransletRule::new("hello")
                .action(Executable::echo("greeting", "hello @{who}"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("hello").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(activity.request().attribute("who"), Some(&json!("kim")));
    assert_eq!(activity.translet_scope().before_advice_result("locale"), Some(&json!("kim")));
    assert_eq!(activity.response_adapter().body(), Some(r#"{"greeting":"hello kim"}"#));
}

#[test]
fn failing_finally_advice_is_swallowed() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .bean("cleanup", RecordingBean::new("cleanup").with_log(&log).fails("finally", "IoError", "disk gone"))
        .aspect(
            AspectRule::new("cleanup", Joinpoint::Translet)
                .advice_bean(BeanRef::id("cleanup"))
                .finally(Executable::invoke("finally")),
        )
        .translet(
            TransletRule::new("ok")
                .action(Executable::echo("done", true))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("ok").expect("Failed to ready");
    activity.perform().expect("finally failure must not surface");

    assert_eq!(log.entries(), vec!["cleanup.finally"]);
    assert_eq!(activity.response_adapter().body(), Some(r#"{"done":true}"#));
}

#[test]
fn advice_results_are_visible_to_beans() {
    let context = ActivityContext::builder()
        .bean("peeker", Peeker)
        .aspect(AspectRule::new("meta", Joinpoint::Translet).before(Executable::echo("started", true)))
        .translet(
            TransletRule::new("peek")
                .action(Executable::bean(BeanRef::id("peeker"), "peek").with_id("seen"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("peek").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(activity.result_value("seen"), Some(&json!(true)));
    assert_eq!(activity.translet_scope().before_advice_result("meta"), Some(&json!(true)));
}

#[test]
fn aspects_registered_mid_activity_run_before_now_and_after_later() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .bean("registrar", Registrar)
        .bean("late", RecordingBean::new("late").with_log(&log))
        .translet(
            TransletRule::new("dyn")
                .action(Executable::bean(BeanRef::id("registrar"), "content").with_id("content"))
                .action(Executable::bean(BeanRef::id("registrar"), "request").with_id("request"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("dyn").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(log.entries(), vec!["late.before", "late.after"]);
    assert_eq!(activity.result_value("content"), Some(&json!(true)));
    assert_eq!(activity.result_value("request"), Some(&json!(false)));

    // The overlay belongs to one activity only.
    let mut second = context.new_activity();
    second.ready("dyn").expect("Failed to ready");
    second.perform().expect("Failed to perform");
    assert_eq!(log.entries().len(), 4);
}

#[test]
fn settings_resolve_from_aspects_then_config() {
    let mut config = EngineConfig::default();
    config.settings.insert("currency".to_string(), json!("KRW"));
    config.settings.insert("locale".to_string(), json!("en"));

    let context = ActivityContext::builder()
        .config(config)
        .aspect(AspectRule::new("i18n", Joinpoint::Translet).setting("locale", "ko"))
        .translet(
            TransletRule::new("prices")
                .action(Executable::echo("locale", "%{locale}"))
                .action(Executable::echo("currency", "%{currency}"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("prices").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(body_json(&activity), json!({ "locale": "ko", "currency": "KRW" }));
    assert_eq!(activity.setting("locale"), Some(json!("ko")));
}

// =============================================================================
// RESULT TREE
// =============================================================================

#[test]
fn named_contents_build_a_nested_tree() {
    let context = ActivityContext::builder()
        .translet(
            TransletRule::new("home")
                .content(
                    ContentList::named("page")
                        .list(ActionList::named("header").action(Executable::echo("title", "Home")))
                        .list(
                            ActionList::named("body")
                                .action(Executable::echo("text", "hi"))
                                .action(Executable::echo("secret", "x").hidden(true)),
                        )
                        .list(ActionList::named("internal").hidden(true).action(Executable::echo("token", 1))),
                )
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("home").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    let result = activity.process_result().expect("process result");
    assert_eq!(result.name(), Some("page"));
    assert_eq!(result.contents().len(), 3);
    assert_eq!(activity.result_value("secret"), None);
    assert_eq!(activity.result_value("token"), None);
    assert_eq!(
        body_json(&activity),
        json!({ "header": { "title": "Home" }, "body": { "text": "hi" } })
    );
}

#[test]
fn headers_action_writes_evaluated_headers() {
    let context = ActivityContext::builder()
        .translet(
            TransletRule::new("traced")
                .action(Executable::headers([("X-Trace", "${trace}")]))
                .response(Response::text("ok")),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.request_mut().set_parameter("trace", "abc");
    activity.ready("traced").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(activity.response_adapter().header("x-trace"), Some("abc"));
    assert_eq!(activity.response_adapter().body(), Some("ok"));
}

// =============================================================================
// REQUEST
// =============================================================================

#[test]
fn request_resolution_failures() {
    let context = ActivityContext::builder()
        .translet(
            TransletRule::new("search")
                .method(MethodType::Get)
                .mandatory("q")
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    assert!(matches!(activity.perform(), Err(ActivityError::NotReady)));
    assert!(matches!(
        activity.ready("nowhere"),
        Err(ActivityError::TransletNotFound(_))
    ));
    assert!(matches!(
        activity.ready_with_method("search", MethodType::Post),
        Err(ActivityError::MethodNotAllowed { .. })
    ));

    let mut activity = context.new_activity();
    activity.ready("search").expect("Failed to ready");
    match activity.perform() {
        Err(ActivityError::Request(inner)) => {
            assert!(matches!(*inner, ActivityError::MissingParameters(ref p) if p == &["q".to_string()]))
        }
        other => panic!("expected request failure, got {other:?}"),
    }
}

#[test]
fn path_variables_and_pattern_advice() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .bean("audit", RecordingBean::new("audit").with_log(&log))
        .aspect(
            AspectRule::new("audit", Joinpoint::Content)
                .pointcut(Pointcut::new(["/users/**"]))
                .advice_bean(BeanRef::id("audit"))
                .before(Executable::invoke("check")),
        )
        .translet(
            TransletRule::new("/users/${id}/@{tab}")
                .method(MethodType::Get)
                .action(Executable::echo("user", "${id}"))
                .action(Executable::echo("tab", "@{tab}"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("/users/42/orders").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(activity.request().parameter("id"), Some("42"));
    assert_eq!(body_json(&activity), json!({ "user": "42", "tab": "orders" }));
    assert_eq!(log.entries(), vec!["audit.check"]);
}

#[test]
fn request_scope_is_destroyed_once_after_failure() {
    let destroyed = Arc::new(AtomicBool::new(false));
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .request_handler(ScopeStamp(Arc::clone(&destroyed)))
        .bean("guard", RecordingBean::new("guard").with_log(&log))
        .bean("worker", RecordingBean::new("worker").with_log(&log).fails("run", "IllegalState", "boom"))
        .aspect(
            AspectRule::new("request-guard", Joinpoint::Request)
                .advice_bean(BeanRef::id("guard"))
                .finally(Executable::invoke("finally")),
        )
        .translet(
            TransletRule::new("broken")
                .action(Executable::bean(BeanRef::id("worker"), "run").with_id("out"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("broken").expect("Failed to ready");
    let err = activity.perform().expect_err("content failure should propagate");

    match &err {
        ActivityError::Content(inner) => {
            assert!(matches!(**inner, ActivityError::ActionExecution { .. }))
        }
        other => panic!("expected content failure, got {other:?}"),
    }
    assert_eq!(err.root_cause(), "IllegalState: boom");
    assert_eq!(log.entries(), vec!["guard.finally", "worker.run"]);
    assert!(destroyed.load(Ordering::SeqCst));
    assert!(!activity.is_activity_ended());
    assert!(activity.response_adapter().body().is_none());
    assert!(matches!(
        activity.raised_exception(),
        Some(ActivityError::ActionExecution { .. })
    ));

    activity.finish();
    assert!(destroyed.load(Ordering::SeqCst));
}

#[test]
fn first_raised_exception_wins() {
    let context = ActivityContext::builder().build().expect("Failed to build context");
    let mut activity = context.new_activity();

    activity.set_raised_exception(&ActivityError::NotReady);
    activity.set_raised_exception(&ActivityError::BeanNotFound("late".into()));

    assert!(activity.is_exception_raised());
    assert!(matches!(activity.raised_exception(), Some(ActivityError::NotReady)));
}

// =============================================================================
// EXCEPTION RESOLUTION
// =============================================================================

fn failing_order(declared: Response, notifier: RecordingBean) -> Arc<ActivityContext> {
    ActivityContext::builder()
        .bean("worker", RecordingBean::new("worker").fails("run", "IllegalState", "boom"))
        .bean("notifier", notifier)
        .translet(
            TransletRule::new("order")
                .action(Executable::echo("partial", "yes"))
                .action(Executable::bean(BeanRef::id("worker"), "run").with_id("order"))
                .response(declared)
                .encoding("utf-8")
                .exception(
                    ExceptionHandlingRule::new()
                        .on("IllegalState")
                        .action(Executable::bean(BeanRef::id("notifier"), "notify"))
                        .respond(Response::json().with_actions(
                            ActionList::new().action(Executable::echo("error", "failed")),
                        ))
                        .respond(Response::text("service unavailable")),
                ),
        )
        .build()
        .expect("Failed to build context")
}

#[test]
fn exception_response_follows_json_content_type() {
    let notifier = RecordingBean::new("notifier");
    let context = failing_order(Response::json(), notifier.clone());

    let mut activity = context.new_activity();
    activity.ready("order").expect("Failed to ready");
    activity.perform().expect("resolved exceptions end normally");

    assert!(activity.is_activity_ended());
    assert!(activity.is_exception_raised());
    assert_eq!(activity.result_value("partial"), None);
    assert_eq!(activity.response_adapter().body(), Some(r#"{"error":"failed"}"#));
    assert_eq!(activity.response_adapter().content_type(), Some("application/json"));
    assert_eq!(activity.response_adapter().encoding(), Some("utf-8"));
    assert_eq!(notifier.calls(), vec!["notifier.notify"]);
}

#[test]
fn exception_response_follows_text_content_type() {
    let context = failing_order(Response::text("@{order}"), RecordingBean::new("notifier"));

    let mut activity = context.new_activity();
    activity.ready("order").expect("Failed to ready");
    activity.perform().expect("resolved exceptions end normally");

    assert_eq!(activity.response_adapter().body(), Some("service unavailable"));
    assert_eq!(activity.response_adapter().content_type(), Some("text/plain"));
}

#[test]
fn aspect_exception_rules_resolve_inside_their_phase() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .bean("worker", RecordingBean::new("worker").fails("run", "IllegalState", "boom"))
        .bean("logger", RecordingBean::new("logger").with_log(&log))
        .aspect(
            AspectRule::new("guard", Joinpoint::Content).exception(
                ExceptionHandlingRule::new().respond_by_default(Response::text("guarded")),
            ),
        )
        .aspect(
            AspectRule::new("log", Joinpoint::Translet)
                .advice_bean(BeanRef::id("logger"))
                .after(Executable::invoke("after")),
        )
        .translet(
            TransletRule::new("guarded")
                .action(Executable::bean(BeanRef::id("worker"), "run"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("guarded").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(activity.response_adapter().body(), Some("guarded"));
    assert_eq!(log.entries(), vec!["logger.after"]);
}

#[test]
fn terminated_activity_skips_the_rest_without_raising() {
    let log = CallLog::new();
    let context = ActivityContext::builder()
        .bean("gate", RecordingBean::new("gate").with_log(&log).terminates("check", "closed"))
        .bean("worker", RecordingBean::new("worker").with_log(&log))
        .translet(
            TransletRule::new("gated")
                .action(Executable::bean(BeanRef::id("gate"), "check"))
                .action(Executable::bean(BeanRef::id("worker"), "run"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("gated").expect("Failed to ready");
    let err = activity.perform().expect_err("termination is reported");

    assert!(matches!(err, ActivityError::Terminated(ref reason) if reason == "closed"));
    assert!(activity.is_activity_ended());
    assert!(!activity.is_exception_raised());
    assert_eq!(log.entries(), vec!["gate.check"]);
    assert!(activity.response_adapter().body().is_none());
}

// =============================================================================
// RESPONSES
// =============================================================================

#[test]
fn forward_carries_the_process_result() {
    let context = ActivityContext::builder()
        .translet(
            TransletRule::new("a")
                .action(Executable::echo("seed", "from-a"))
                .response(Response::forward("b").with_attribute("origin", "@{seed}")),
        )
        .translet(
            TransletRule::new("b")
                .action(Executable::echo("x", "from-b"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("a").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(activity.translet_name(), Some("b"));
    assert_eq!(activity.result_value("x"), Some(&json!("from-b")));
    assert_eq!(activity.result_value("seed"), Some(&json!("from-a")));
    assert_eq!(activity.request().attribute("origin"), Some(&json!("from-a")));
    assert!(activity.is_activity_ended());
    assert_eq!(body_json(&activity), json!({ "seed": "from-a", "x": "from-b" }));
}

#[test]
fn forward_target_shadows_colliding_ids() {
    let context = ActivityContext::builder()
        .translet(
            TransletRule::new("a")
                .action(Executable::echo("x", "from-a"))
                .action(Executable::echo("kept", 1))
                .response(Response::forward("b")),
        )
        .translet(
            TransletRule::new("b")
                .action(Executable::echo("x", "from-b"))
                .action(Executable::echo("seen", "@{x}"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("a").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(activity.result_value("x"), Some(&json!("from-b")));
    assert_eq!(activity.result_value("seen"), Some(&json!("from-b")));
    assert_eq!(activity.result_value("kept"), Some(&json!(1)));
    assert_eq!(
        body_json(&activity),
        json!({ "x": "from-b", "kept": 1, "seen": "from-b" })
    );
}

#[test]
fn forward_loops_stop_at_the_configured_depth() {
    let config = EngineConfig {
        max_forward_depth: 3,
        ..EngineConfig::default()
    };
    let context = ActivityContext::builder()
        .config(config)
        .translet(TransletRule::new("loop").response(Response::forward("loop")))
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("loop").expect("Failed to ready");

    assert!(matches!(
        activity.perform(),
        Err(ActivityError::ForwardDepthExceeded { max: 3, .. })
    ));
}

#[test]
fn redirect_replicates_the_declared_response_unless_immediate() {
    let context = ActivityContext::builder()
        .bean("router", Router)
        .translet(
            TransletRule::new("login/soft")
                .action(Executable::bean(BeanRef::id("router"), "soft"))
                .response(Response::redirect("/home").with_parameter("from", "${page}")),
        )
        .translet(
            TransletRule::new("login/hard")
                .action(Executable::bean(BeanRef::id("router"), "hard"))
                .response(Response::redirect("/home").with_parameter("from", "${page}")),
        )
        .build()
        .expect("Failed to build context");

    for (name, expected) in [("login/soft", "/welcome?from=intro"), ("login/hard", "/welcome")] {
        let mut activity = context.new_activity();
        activity.request_mut().set_parameter("page", "intro");
        activity.ready(name).expect("Failed to ready");
        activity.perform().expect("Failed to perform");
        assert_eq!(activity.response_adapter().redirect_location(), Some(expected), "{name}");
        assert!(activity.is_activity_ended());
    }
}

#[test]
fn custom_renderer_and_view_dispatcher() {
    let context = ActivityContext::builder()
        .renderer("upper", Upper)
        .dispatcher(Views)
        .translet(
            TransletRule::new("shout")
                .action(Executable::echo("w", "hi"))
                .response(Response::render("upper").with_content_type("text/shout")),
        )
        .translet(
            TransletRule::new("page")
                .action(Executable::echo("n", 1))
                .response(Response::dispatch("home")),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("shout").expect("Failed to ready");
    activity.perform().expect("Failed to perform");
    assert_eq!(activity.response_adapter().body(), Some(r#"{"W":"HI"}"#));
    assert_eq!(activity.response_adapter().content_type(), Some("text/shout"));

    let mut activity = context.new_activity();
    activity.ready("page").expect("Failed to ready");
    activity.perform().expect("Failed to perform");
    assert_eq!(activity.response_adapter().body(), Some(r#"<home>{"n":1}"#));
    assert_eq!(activity.response_adapter().dispatched_view(), Some("home"));
}

#[test]
fn dispatch_without_dispatcher_fails_in_response_phase() {
    let context = ActivityContext::builder()
        .translet(TransletRule::new("page").response(Response::dispatch("home")))
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("page").expect("Failed to ready");
    match activity.perform() {
        Err(ActivityError::Response(inner)) => assert!(matches!(*inner, ActivityError::DispatcherNotFound)),
        other => panic!("expected response failure, got {other:?}"),
    }
}

// =============================================================================
// NESTED ACTIVITIES
// =============================================================================

#[test]
fn include_embeds_the_nested_result() {
    let context = ActivityContext::builder()
        .translet(
            TransletRule::new("profile")
                .action(Executable::echo("name", "@{who}"))
                .response(Response::text("never rendered")),
        )
        .translet(
            TransletRule::new("page")
                .action(
                    Executable::include("profile")
                        .with_id("profile")
                        .with_attribute("who", "kim"),
                )
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("page").expect("Failed to ready");
    activity.perform().expect("Failed to perform");

    assert_eq!(body_json(&activity), json!({ "profile": { "name": "kim" } }));
    assert_eq!(activity.request().attribute("who"), None);
}

#[test]
fn recursive_include_stops_at_the_configured_depth() {
    let config = EngineConfig {
        max_include_depth: 2,
        ..EngineConfig::default()
    };
    let context = ActivityContext::builder()
        .config(config)
        .translet(TransletRule::new("recurse").action(Executable::include("recurse").with_id("inner")))
        .build()
        .expect("Failed to build context");

    let mut activity = context.new_activity();
    activity.ready("recurse").expect("Failed to ready");
    let err = activity.perform().expect_err("include depth must be bounded");

    assert!(err
        .chain_names()
        .contains(&"IncludeDepthExceeded".to_string()));
}
