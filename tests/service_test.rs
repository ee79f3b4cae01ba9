use std::sync::Arc;

use activity_engine::clients::{TransletClient, Translator};
use activity_engine::framework::mock::{MockService, RecordingBean};
use activity_engine::framework::{ActivityContext, ActivityError, BeanRef, Executable, Response};
use activity_engine::lifecycle::{ServiceError, TransletOutcome, TransletRequest, TransletService, TransletSystem};
use activity_engine::model::{MethodType, TransletRule};
use serde_json::json;

fn shop() -> Arc<ActivityContext> {
    ActivityContext::builder()
        .bean("gate", RecordingBean::new("gate").terminates("check", "maintenance"))
        .translet(
            TransletRule::new("greet")
                .action(Executable::echo("msg", "hello ${name:guest}"))
                .response(Response::json()),
        )
        .translet(
            TransletRule::new("order")
                .method(MethodType::Post)
                .mandatory("qty")
                .action(Executable::echo("qty", "${qty}"))
                .response(Response::forward("order/done")),
        )
        .translet(
            TransletRule::new("order/done")
                .method(MethodType::Post)
                .action(Executable::echo("done", true))
                .response(Response::json()),
        )
        .translet(
            TransletRule::new("closed")
                .action(Executable::bean(BeanRef::id("gate"), "check"))
                .response(Response::json()),
        )
        .build()
        .expect("Failed to build context")
}

/// End-to-end: requests travel through the channel and come back rendered.
#[tokio::test]
async fn test_translet_system_round_trip() {
    let system = TransletSystem::new(shop());

    let outcome = system
        .client
        .translate(TransletRequest::new("greet").parameter("name", "kim"))
        .await
        .expect("Failed to translate");
    assert_eq!(outcome.translet_name, "greet");
    assert_eq!(outcome.result, json!({ "msg": "hello kim" }));
    assert_eq!(outcome.response.body(), Some(r#"{"msg":"hello kim"}"#));
    assert!(outcome.ended);

    // Forwarded requests report the translet that finally answered.
    let outcome = system
        .client
        .post("order", vec![("qty".to_string(), "3".to_string())])
        .await
        .expect("Failed to post order");
    assert_eq!(outcome.translet_name, "order/done");
    assert_eq!(outcome.result, json!({ "qty": "3", "done": true }));

    system.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_engine_errors_reach_the_caller() {
    let system = TransletSystem::new(shop());

    let err = system.client.get("nowhere").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Activity(ActivityError::TransletNotFound(ref name)) if name == "nowhere"
    ));

    let err = system.client.get("order").await.unwrap_err();
    assert!(matches!(err, ServiceError::Activity(ActivityError::MethodNotAllowed { .. })));

    let err = system
        .client
        .translate(TransletRequest::new("order").method(MethodType::Post))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Activity(ActivityError::Request(_))));

    system.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_terminated_activity_is_a_normal_outcome() {
    let system = TransletSystem::new(shop());

    let outcome = system.client.get("closed").await.expect("Termination is not an error");
    assert!(outcome.ended);
    assert!(outcome.response.body().is_none());

    system.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_fetch_skips_the_response() {
    let system = TransletSystem::new(shop());

    let outcome = system
        .client
        .translate(TransletRequest::new("greet").without_response())
        .await
        .expect("Failed to translate");
    assert_eq!(outcome.result, json!({ "msg": "hello guest" }));
    assert!(outcome.response.body().is_none());
    assert!(!outcome.ended);

    let value = system.client.fetch("greet").await.expect("Failed to fetch");
    assert_eq!(value, json!({ "msg": "hello guest" }));

    system.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_concurrent_requests() {
    let system = TransletSystem::new(shop());

    let mut handles = Vec::new();
    for i in 0..16 {
        let client = system.client.clone();
        handles.push(tokio::spawn(async move {
            client
                .translate(TransletRequest::new("greet").parameter("name", format!("user{i}")))
                .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle
            .await
            .expect("Task panicked")
            .expect("Failed to translate");
        assert_eq!(outcome.result, json!({ "msg": format!("hello user{i}") }));
    }

    system.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_closed_service_is_reported() {
    let (service, client) = TransletService::new(shop());
    drop(service);

    assert!(client.is_closed());
    let err = client.get("greet").await.unwrap_err();
    assert!(matches!(err, ServiceError::ServiceClosed));
}

/// Callers written against `Translator` can be tested without an engine.
struct Greeter {
    client: TransletClient,
}

impl Translator for Greeter {
    fn inner(&self) -> &TransletClient {
        &self.client
    }
}

#[tokio::test]
async fn test_translator_against_mock_service() {
    let mut mock = MockService::new();
    mock.expect_translate("greet").return_ok(TransletOutcome {
        translet_name: "greet".to_string(),
        result: json!({ "msg": "hello mock" }),
        ended: true,
        ..TransletOutcome::default()
    });
    mock.expect_translate("order")
        .return_err(ServiceError::Activity(ActivityError::NotReady));

    let greeter = Greeter { client: mock.client() };

    let value = greeter.fetch("greet").await.expect("Failed to fetch");
    assert_eq!(value, json!({ "msg": "hello mock" }));

    let err = greeter
        .post("order", vec![("qty".to_string(), "1".to_string())])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Activity(ActivityError::NotReady)));

    mock.verify();
}
