//! Error boundaries: recovery, re-raising and unwinding order.

use http::StatusCode;
use strata_core::Rejection;
use strata_pipeline::stages::{ErrorBoundary, NormalizedError};
use strata_pipeline::{Context, Outcome, Phase, Pipeline};
use strata_test::{Journal, Probe, TestRequest, TestResponse, TrapMode};

fn context() -> Context {
    TestRequest::get("/orders").into_context().unwrap()
}

#[tokio::test]
async fn test_trap_recovers_and_unwinds_normally() {
    let journal = Journal::new();
    let pipeline = Pipeline::builder("recover")
        .stage(Probe::new("outer", &journal))
        .stage(Probe::new("boundary", &journal).trap(TrapMode::Recover))
        .stage(Probe::new("mid", &journal))
        .stage(Probe::new("handler", &journal).fail_before("db down"))
        .stage(Probe::new("never", &journal))
        .build()
        .unwrap();

    let execution = pipeline.execute(context()).await;

    assert!(execution.outcome().is_completed());
    assert_eq!(
        journal.entries(),
        [
            "outer.before",
            "boundary.before",
            "mid.before",
            "handler.before",
            "handler.after",
            "mid.after",
            "boundary.recover",
            "outer.after",
        ]
    );

    let response = execution.into_context().take_response().unwrap();
    let response = TestResponse::from_response(response).await.unwrap();
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().unwrap(), "recovered handler");
}

#[tokio::test]
async fn test_reraise_reaches_enclosing_trap() {
    let journal = Journal::new();
    let pipeline = Pipeline::builder("reraise")
        .stage(Probe::new("outer", &journal).trap(TrapMode::Recover))
        .stage(Probe::new("inner", &journal).trap(TrapMode::Reraise))
        .stage(Probe::new("handler", &journal).fail_before("boom"))
        .build()
        .unwrap();

    let execution = pipeline.execute(context()).await;

    assert!(execution.outcome().is_completed());
    assert_eq!(
        journal.entries(),
        [
            "outer.before",
            "inner.before",
            "handler.before",
            "handler.after",
            "inner.recover",
            "outer.recover",
        ]
    );
}

#[tokio::test]
async fn test_reraise_without_enclosing_trap_faults() {
    let journal = Journal::new();
    let pipeline = Pipeline::builder("reraise-out")
        .stage(Probe::new("outer", &journal))
        .stage(Probe::new("inner", &journal).trap(TrapMode::Reraise))
        .stage(Probe::new("handler", &journal).fail_before("boom"))
        .build()
        .unwrap();

    let execution = pipeline.execute(context()).await;

    let error = execution.outcome().error().unwrap();
    assert_eq!(error.stage(), "handler");
    assert_eq!(error.phase(), Phase::Before);
    // The re-raised fault has no trap left: `outer` does not unwind.
    assert_eq!(
        journal.entries(),
        [
            "outer.before",
            "inner.before",
            "handler.before",
            "handler.after",
            "inner.recover",
        ]
    );
}

#[tokio::test]
async fn test_trap_registered_after_failure_is_not_entered() {
    let journal = Journal::new();
    let pipeline = Pipeline::builder("late-trap")
        .stage(Probe::new("handler", &journal).fail_before("boom"))
        .stage(Probe::new("boundary", &journal).trap(TrapMode::Recover))
        .build()
        .unwrap();

    let execution = pipeline.execute(context()).await;

    assert!(execution.outcome().is_faulted());
    assert_eq!(journal.entries(), ["handler.before"]);
}

#[tokio::test]
async fn test_after_failure_is_caught() {
    let journal = Journal::new();
    let pipeline = Pipeline::builder("after-failure")
        .stage(Probe::new("boundary", &journal).trap(TrapMode::Recover))
        .stage(Probe::new("compress", &journal).fail_after("encoder crashed"))
        .stage(Probe::new("handler", &journal))
        .build()
        .unwrap();

    let execution = pipeline.execute(context()).await;

    assert!(execution.outcome().is_completed());
    assert_eq!(
        journal.entries(),
        [
            "boundary.before",
            "compress.before",
            "handler.before",
            "handler.after",
            "compress.after",
            "boundary.recover",
        ]
    );
}

#[tokio::test]
async fn test_secondary_failure_keeps_original_fault() {
    let journal = Journal::new();
    let pipeline = Pipeline::builder("secondary")
        .stage(Probe::new("outer", &journal).trap(TrapMode::Reraise))
        .stage(Probe::new("noisy", &journal).fail_after("secondary"))
        .stage(Probe::new("handler", &journal).fail_before("primary"))
        .build()
        .unwrap();

    let error = pipeline
        .execute(context())
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(error.stage(), "handler");
    assert_eq!(error.cause().to_string(), "primary");
    assert!(journal.contains("noisy.after"));
    assert!(journal.contains("outer.recover"));
}

#[tokio::test]
async fn test_trap_does_not_catch_its_own_before_failure() {
    let journal = Journal::new();
    let pipeline = Pipeline::builder("self")
        .stage(Probe::new("outer", &journal))
        .stage(
            Probe::new("boundary", &journal)
                .trap(TrapMode::Recover)
                .fail_before("misconfigured"),
        )
        .stage(Probe::new("handler", &journal))
        .build()
        .unwrap();

    let execution = pipeline.execute(context()).await;

    match execution.outcome() {
        Outcome::Faulted(error) => {
            assert_eq!(error.stage(), "boundary");
            assert_eq!(error.phase(), Phase::Before);
        }
        other => panic!("expected a fault, got {other:?}"),
    }
    assert_eq!(journal.entries(), ["outer.before", "boundary.before"]);
}

#[tokio::test]
async fn test_failed_trap_unwinds_to_enclosing_trap() {
    let journal = Journal::new();
    let pipeline = Pipeline::builder("nested-self")
        .stage(Probe::new("outer", &journal).trap(TrapMode::Recover))
        .stage(
            Probe::new("boundary", &journal)
                .trap(TrapMode::Recover)
                .fail_before("misconfigured"),
        )
        .stage(Probe::new("handler", &journal))
        .build()
        .unwrap();

    let execution = pipeline.execute(context()).await;

    assert!(execution.outcome().is_completed());
    assert_eq!(
        journal.entries(),
        [
            "outer.before",
            "boundary.before",
            "boundary.after",
            "outer.recover",
        ]
    );
}

#[tokio::test]
async fn test_error_boundary_renders_rejection() {
    let journal = Journal::new();
    let pipeline = Pipeline::builder("boundary")
        .stage(ErrorBoundary::new())
        .stage(Probe::new("auth", &journal).reject(Rejection::unauthorized("token expired")))
        .build()
        .unwrap();

    let execution = pipeline.execute(context()).await;
    assert!(matches!(execution.outcome(), Outcome::Completed));

    let mut ctx = execution.into_context();
    let normalized = ctx.get_extension::<NormalizedError>().unwrap().clone();
    assert_eq!(normalized.stage, "auth");
    assert_eq!(normalized.code, "UNAUTHORIZED");

    let response = TestResponse::from_response(ctx.take_response().unwrap())
        .await
        .unwrap();
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["error"]["message"], "token expired");
    assert_eq!(body["error"]["request_id"], ctx.request_id().to_string());
}

#[tokio::test]
async fn test_error_boundary_hides_internal_failures() {
    let journal = Journal::new();
    let pipeline = Pipeline::builder("boundary")
        .stage(ErrorBoundary::new())
        .stage(Probe::new("handler", &journal).fail_before("password=hunter2"))
        .build()
        .unwrap();

    let ctx = pipeline.execute(context()).await.into_result().unwrap();
    let response = TestResponse::from_response(ctx.into_parts().1.unwrap())
        .await
        .unwrap();

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"]["message"], "An internal error occurred");
}
