//! # Activity Engine Demo
//!
//! Builds a small shop context, starts a [`TransletSystem`] and sends it a
//! few requests:
//! 1.  A plain JSON translet.
//! 2.  A checkout that forwards to a confirmation translet.
//! 3.  A checkout that fails and is answered by an exception rule.

use activity_engine::clients::Translator;
use activity_engine::framework::{
    ActionOutcome, ActivityContext, Bean, BeanError, BeanRef, Executable, Joinpoint, Response, Translet,
};
use activity_engine::lifecycle::{setup_tracing, TransletRequest, TransletSystem};
use activity_engine::model::{ActionList, AspectRule, ExceptionHandlingRule, MethodType, Pointcut, TransletRule};
use serde_json::{json, Value};
use tracing::{error, info, Instrument};

struct Cart;

impl Bean for Cart {
    fn invoke(&self, method: &str, _args: &[Value], translet: &mut Translet<'_>) -> Result<ActionOutcome, BeanError> {
        let quantity: u64 = translet
            .parameter("qty")
            .unwrap_or("1")
            .parse()
            .map_err(|_| BeanError::failed("InvalidQuantity", "qty is not a number"))?;
        match method {
            "total" => Ok(ActionOutcome::value(quantity * 25)),
            "checkout" if quantity > 10 => Err(BeanError::failed("OutOfStock", format!("only 10 left, {quantity} requested"))),
            "checkout" => Ok(ActionOutcome::value(json!({ "id": "order_1", "quantity": quantity }))),
            other => Err(BeanError::failed("NoSuchMethod", other)),
        }
    }
}

struct Audit;

impl Bean for Audit {
    fn invoke(&self, method: &str, _args: &[Value], translet: &mut Translet<'_>) -> Result<ActionOutcome, BeanError> {
        info!(translet = %translet.name(), advice = method, "Audit");
        Ok(ActionOutcome::NoResult)
    }
}

fn build_context() -> Result<std::sync::Arc<ActivityContext>, activity_engine::framework::ActivityError> {
    ActivityContext::builder()
        .bean("cart", Cart)
        .bean("audit", Audit)
        .aspect(
            AspectRule::new("audit", Joinpoint::Translet)
                .pointcut(Pointcut::new(["cart/**"]))
                .advice_bean(BeanRef::id("audit"))
                .before(Executable::invoke("begin"))
                .finally(Executable::invoke("end")),
        )
        .translet(
            TransletRule::new("cart/total")
                .action(Executable::bean(BeanRef::id("cart"), "total").with_id("total"))
                .response(Response::json()),
        )
        .translet(
            TransletRule::new("cart/checkout")
                .method(MethodType::Post)
                .mandatory("qty")
                .action(Executable::bean(BeanRef::id("cart"), "checkout").with_id("order"))
                .response(Response::forward("cart/confirm").with_content_type("application/json"))
                .exception(
                    ExceptionHandlingRule::new().on("OutOfStock").respond(
                        Response::json().with_actions(
                            ActionList::new().action(Executable::echo("error", "out of stock")),
                        ),
                    ),
                ),
        )
        .translet(
            TransletRule::new("cart/confirm")
                .method(MethodType::Post)
                .action(Executable::echo("confirmed", json!(true)))
                .response(Response::json_pretty()),
        )
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();

    info!("Starting activity engine demo");
    let system = TransletSystem::new(build_context()?);

    let span = tracing::info_span!("total");
    let outcome = async {
        system
            .client
            .translate(TransletRequest::new("cart/total").parameter("qty", "4"))
            .await
    }
    .instrument(span)
    .await?;
    info!(body = ?outcome.response.body(), "Total computed");

    let span = tracing::info_span!("checkout");
    let outcome = async {
        system
            .client
            .post("cart/checkout", vec![("qty".to_string(), "3".to_string())])
            .await
    }
    .instrument(span)
    .await?;
    info!(performed = %outcome.translet_name, body = ?outcome.response.body(), "Checkout confirmed");

    let span = tracing::info_span!("checkout_rejected");
    let rejected = async {
        system
            .client
            .post("cart/checkout", vec![("qty".to_string(), "99".to_string())])
            .await
    }
    .instrument(span)
    .await;
    match rejected {
        Ok(outcome) => info!(body = ?outcome.response.body(), "Checkout answered by exception rule"),
        Err(e) => error!(error = %e, "Checkout failed"),
    }

    system.shutdown().await?;
    info!("Demo completed successfully");
    Ok(())
}
