//! Pipelines built from configuration, end to end.

use std::time::Duration;

use http::StatusCode;
use serde_json::Value;
use strata::prelude::*;
use strata::pipeline::stages::REQUEST_ID_HEADER;
use strata_test::{Journal, Probe, TestRequest, TestResponse};

async fn run(pipeline: &Pipeline, ctx: Context) -> (Execution, TestResponse) {
    let mut execution = pipeline.execute(ctx).await;
    let response = execution
        .context_mut()
        .take_response()
        .expect("execution should produce a response");
    (execution, TestResponse::from_response(response).await.unwrap())
}

#[tokio::test]
async fn rejection_is_rendered_with_request_id_header() {
    let journal = Journal::new();
    let pipeline = strata::pipeline_builder(&StrataConfig::default())
        .stage(Probe::new("auth", &journal).reject(Rejection::forbidden("admins only")))
        .stage(Probe::new("handler", &journal))
        .build()
        .unwrap();

    let ctx = TestRequest::get("/admin").into_context().unwrap();
    let request_id = ctx.request_id().to_string();
    let (execution, response) = run(&pipeline, ctx).await;

    assert!(execution.outcome().is_completed());
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.header(REQUEST_ID_HEADER).unwrap().to_str().unwrap(),
        request_id
    );

    let body: Value = response.json().unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(body["error"]["message"], "admins only");
    assert_eq!(body["error"]["request_id"], request_id.as_str());

    assert!(!journal.contains("handler.before"));
    assert_eq!(journal.entries(), vec!["auth.before", "auth.after"]);
}

#[tokio::test]
async fn internal_errors_follow_the_preset() {
    for (config, expected) in [
        (StrataConfig::production(), "An internal error occurred"),
        (StrataConfig::development(), "pool exhausted"),
    ] {
        let journal = Journal::new();
        let pipeline = strata::pipeline_builder(&config)
            .stage(Probe::new("db", &journal).fail_before("pool exhausted"))
            .build()
            .unwrap();

        let ctx = TestRequest::get("/orders").into_context().unwrap();
        let (execution, response) = run(&pipeline, ctx).await;

        assert!(execution.outcome().is_completed());
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json().unwrap();
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], expected);
    }
}

#[tokio::test]
async fn recovered_error_is_recorded_on_the_context() {
    let journal = Journal::new();
    let pipeline = strata::pipeline_builder(&StrataConfig::default())
        .stage(Probe::new("payments", &journal).fail_before("card declined"))
        .build()
        .unwrap();

    let ctx = TestRequest::post("/checkout").into_context().unwrap();
    let execution = pipeline.execute(ctx).await;

    let normalized = execution
        .context()
        .get_extension::<NormalizedError>()
        .expect("boundary should record the normalized error");
    assert_eq!(normalized.stage, "payments");
    assert!(normalized.was_internal);
}

#[tokio::test]
async fn spent_deadline_terminates_with_gateway_timeout() {
    let mut config = StrataConfig::default();
    config.pipeline.deadline_ms = Some(5);

    let journal = Journal::new();
    let pipeline = strata::pipeline_builder(&config)
        .stage(Probe::new("handler", &journal).respond(StatusCode::OK))
        .build()
        .unwrap();

    let ctx = TestRequest::get("/slow").into_context().unwrap();
    tokio::time::sleep(Duration::from_millis(25)).await;
    let (execution, response) = run(&pipeline, ctx).await;

    assert!(execution.outcome().is_terminated());
    response.assert_status(StatusCode::GATEWAY_TIMEOUT);
    assert!(response.header(REQUEST_ID_HEADER).is_some());
    assert!(journal.is_empty());
}

#[tokio::test]
async fn trusted_incoming_request_id_is_echoed() {
    const INCOMING: &str = "01890a5d-ac96-774b-bcce-b302099a8057";

    let mut config = StrataConfig::default();
    config.pipeline.trust_incoming_request_id = true;

    let journal = Journal::new();
    let pipeline = strata::pipeline_builder(&config)
        .stage(Probe::new("handler", &journal).respond(StatusCode::OK))
        .build()
        .unwrap();

    let ctx = TestRequest::get("/")
        .header(REQUEST_ID_HEADER, INCOMING)
        .into_context()
        .unwrap();
    let (execution, response) = run(&pipeline, ctx).await;

    assert_eq!(execution.context().request_id().to_string(), INCOMING);
    assert_eq!(
        response.header(REQUEST_ID_HEADER).unwrap().to_str().unwrap(),
        INCOMING
    );
}

#[tokio::test]
async fn recorded_trace_follows_configuration() {
    let mut config = StrataConfig::default();
    config.pipeline.record_trace = true;

    let journal = Journal::new();
    let pipeline = strata::pipeline_builder(&config)
        .stage(Probe::new("handler", &journal).respond(StatusCode::NO_CONTENT))
        .build()
        .unwrap();

    let execution = pipeline
        .execute(TestRequest::get("/").into_context().unwrap())
        .await;

    let trace = execution.trace().expect("trace should be recorded");
    assert!(trace.iter().any(|event| event.stage == "handler"));
}

#[test]
fn configured_limit_rejects_extra_stages() {
    let mut config = StrataConfig::default();
    config.pipeline.max_stages = Some(3);

    let journal = Journal::new();
    let result = strata::pipeline_builder(&config)
        .stage(Probe::new("handler", &journal))
        .build();

    assert!(matches!(
        result,
        Err(ConfigurationError::TooManyStages { max: 3, .. })
    ));
}
