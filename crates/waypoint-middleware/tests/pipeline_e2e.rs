//! End-to-end tests for chain resolution, onion dispatch and terminate hooks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderValue, Method, StatusCode};
use parking_lot::Mutex;
use waypoint_core::{
    empty_request, BoxFuture, HandlerError, HandlerResult, IntoResponse, Request, RequestContext,
    Response,
};
use waypoint_middleware::{
    Chain, ChainEntry, Completion, Dispatch, Endpoint, Middleware, MiddlewareDescriptor,
    MiddlewareRegistry, Next, RequestHead, TerminateHookError,
};

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Hook {
    None,
    Ok,
    Fails,
    Panics,
}

/// Records before/after/terminate events under a label.
struct Recorder {
    label: &'static str,
    log: Log,
    short_circuit: bool,
    hook: Hook,
}

impl Recorder {
    fn new(label: &'static str, log: &Log) -> Self {
        Self {
            label,
            log: Arc::clone(log),
            short_circuit: false,
            hook: Hook::None,
        }
    }

    fn short_circuit(mut self) -> Self {
        self.short_circuit = true;
        self
    }

    fn hook(mut self, hook: Hook) -> Self {
        self.hook = hook;
        self
    }

    fn push(&self, event: &str) {
        self.log.lock().push(format!("{}-{event}", self.label));
    }
}

impl Middleware for Recorder {
    fn name(&self) -> &'static str {
        self.label
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        _args: &'a [String],
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult<Response>> {
        Box::pin(async move {
            self.push("before");
            if self.short_circuit {
                return Ok(StatusCode::FORBIDDEN.into_response());
            }
            let result = next.run(ctx, request).await;
            self.push("after");
            result
        })
    }

    fn terminable(&self) -> bool {
        self.hook != Hook::None
    }

    fn terminate<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        completion: &'a Completion,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.push(&format!("terminate-{}", completion.status.as_u16()));
            match self.hook {
                Hook::Fails => anyhow::bail!("{} hook failed", self.label),
                Hook::Panics => panic!("{} hook panicked", self.label),
                Hook::None | Hook::Ok => Ok(()),
            }
        })
    }
}

fn chain_of(middleware: Vec<Recorder>) -> Chain {
    Chain::from_entries(
        middleware
            .into_iter()
            .map(|m| ChainEntry::new(m.label, Vec::new(), Arc::new(m)))
            .collect(),
    )
}

fn recording_endpoint(log: &Log) -> Endpoint {
    let log = Arc::clone(log);
    Endpoint::new(move |_ctx, _req| {
        Box::pin(async move {
            log.lock().push("H".to_string());
            Ok("handled".into_response())
        })
    })
}

fn request() -> Request {
    empty_request(Method::GET, "/orders/7")
}

async fn run_and_terminate(dispatch: &Dispatch, ctx: &mut RequestContext) -> Response {
    let response = dispatch
        .run(ctx, request(), Endpoint::new(|_ctx, _req| Box::pin(async { Ok("ok".into_response()) })))
        .await
        .unwrap();
    let mut completion = Completion::new(RequestHead::from_request(&request()), &response);
    completion.delivered = true;
    dispatch.terminate_hooks().run(ctx, &completion).await;
    response
}

// ============================================================================
// Onion execution
// ============================================================================

#[tokio::test]
async fn test_before_after_order() {
    let log = new_log();
    let dispatch = Dispatch::new(chain_of(vec![Recorder::new("A", &log), Recorder::new("B", &log)]));

    let mut ctx = RequestContext::new();
    let response = dispatch
        .run(&mut ctx, request(), recording_endpoint(&log))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(entries(&log), ["A-before", "B-before", "H", "B-after", "A-after"]);
    assert_eq!(dispatch.entered(), 2);
}

#[tokio::test]
async fn test_short_circuit_skips_inner() {
    let log = new_log();
    let dispatch = Dispatch::new(chain_of(vec![
        Recorder::new("A", &log),
        Recorder::new("B", &log).short_circuit(),
        Recorder::new("C", &log),
    ]));

    let mut ctx = RequestContext::new();
    let response = dispatch
        .run(&mut ctx, request(), recording_endpoint(&log))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(entries(&log), ["A-before", "B-before", "A-after"]);
    assert_eq!(dispatch.entered(), 2);
}

#[tokio::test]
async fn test_after_logic_mutates_response() {
    let stamp = waypoint_middleware::from_fn("stamp", |ctx, request, _args, next| {
        Box::pin(async move {
            let mut response = next.run(ctx, request).await?;
            response
                .headers_mut()
                .insert("x-stamped", HeaderValue::from_static("yes"));
            Ok(response)
        })
    });
    let dispatch = Dispatch::new(Chain::from_entries(vec![ChainEntry::new(
        "stamp",
        Vec::new(),
        Arc::new(stamp),
    )]));

    let mut ctx = RequestContext::new();
    let response = dispatch
        .run(&mut ctx, request(), recording_endpoint(&new_log()))
        .await
        .unwrap();
    assert_eq!(response.headers()["x-stamped"], "yes");
}

#[tokio::test]
async fn test_error_skips_question_mark_after_logic() {
    let log = new_log();
    let after = Arc::clone(&log);
    let strict = waypoint_middleware::from_fn("strict", move |ctx, request, _args, next| {
        let after = Arc::clone(&after);
        Box::pin(async move {
            let response = next.run(ctx, request).await?;
            after.lock().push("strict-after".to_string());
            Ok(response)
        })
    });
    let dispatch = Dispatch::new(Chain::from_entries(vec![ChainEntry::new(
        "strict",
        Vec::new(),
        Arc::new(strict),
    )]));
    let failing = Endpoint::new(|_ctx, _req| Box::pin(async { Err(HandlerError::with_status(StatusCode::CONFLICT, "taken")) }));

    let mut ctx = RequestContext::new();
    let err = dispatch.run(&mut ctx, request(), failing).await.unwrap_err();

    assert_eq!(err.status_code(), StatusCode::CONFLICT);
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_middleware_can_recover_from_error() {
    let recover = waypoint_middleware::from_fn("recover", |ctx, request, _args, next| {
        Box::pin(async move {
            match next.run(ctx, request).await {
                Err(err) if err.status_code() == StatusCode::NOT_FOUND => {
                    Ok((StatusCode::GONE, "gone").into_response())
                }
                other => other,
            }
        })
    });
    let dispatch = Dispatch::new(Chain::from_entries(vec![ChainEntry::new(
        "recover",
        Vec::new(),
        Arc::new(recover),
    )]));
    let missing = Endpoint::new(|_ctx, _req| Box::pin(async { Err(HandlerError::not_found("no order")) }));

    let mut ctx = RequestContext::new();
    let response = dispatch.run(&mut ctx, request(), missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn test_args_reach_handle() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&seen);
    let throttle = waypoint_middleware::from_fn("throttle", move |ctx, request, args, next| {
        sink.lock().extend(args.iter().cloned());
        Box::pin(async move { next.run(ctx, request).await })
    });

    let mut registry = MiddlewareRegistry::new();
    registry.alias("throttle", MiddlewareDescriptor::singleton(throttle));
    let chain = registry.resolve(&["throttle:60,1"], &[] as &[&str]).unwrap();

    let mut ctx = RequestContext::new();
    Dispatch::new(chain.instantiate())
        .run(&mut ctx, request(), recording_endpoint(&new_log()))
        .await
        .unwrap();

    assert_eq!(*seen.lock(), ["60", "1"]);
}

#[tokio::test]
async fn test_context_flows_to_endpoint() {
    let tag = waypoint_middleware::from_fn("tag", |ctx, request, _args, next| {
        ctx.insert_extension(String::from("tenant-42"));
        Box::pin(async move { next.run(ctx, request).await })
    });
    let dispatch = Dispatch::new(Chain::from_entries(vec![ChainEntry::new(
        "tag",
        Vec::new(),
        Arc::new(tag),
    )]));
    let echo = Endpoint::new(|ctx, _req| {
        Box::pin(async move {
            let tenant = ctx.extension::<String>().cloned().unwrap_or_default();
            Ok(tenant.into_response())
        })
    });

    let mut ctx = RequestContext::new();
    dispatch.run(&mut ctx, request(), echo).await.unwrap();
    assert_eq!(ctx.extension::<String>().map(String::as_str), Some("tenant-42"));
}

// ============================================================================
// Terminate hooks
// ============================================================================

#[tokio::test]
async fn test_terminate_runs_in_entry_order() {
    let log = new_log();
    let dispatch = Dispatch::new(chain_of(vec![
        Recorder::new("A", &log).hook(Hook::Ok),
        Recorder::new("B", &log),
        Recorder::new("C", &log).hook(Hook::Ok),
    ]));

    let mut ctx = RequestContext::new();
    run_and_terminate(&dispatch, &mut ctx).await;

    let events = entries(&log);
    assert_eq!(&events[events.len() - 2..], ["A-terminate-200", "C-terminate-200"]);
    assert_eq!(dispatch.terminate_hooks().names(), ["A", "C"]);
}

#[tokio::test]
async fn test_terminate_failure_is_isolated() {
    let log = new_log();
    let dispatch = Dispatch::new(chain_of(vec![
        Recorder::new("A", &log).hook(Hook::Fails),
        Recorder::new("B", &log).hook(Hook::Ok),
    ]));

    let mut ctx = RequestContext::new();
    let response = dispatch
        .run(&mut ctx, request(), recording_endpoint(&log))
        .await
        .unwrap();
    let completion = Completion::new(RequestHead::from_request(&request()), &response);
    let report = dispatch.terminate_hooks().run(&ctx, &completion).await;

    assert_eq!(report.ran(), 2);
    assert_eq!(report.failures().len(), 1);
    assert!(matches!(
        &report.failures()[0],
        TerminateHookError::Failed { middleware, .. } if middleware == "A"
    ));
    assert!(entries(&log).contains(&"B-terminate-200".to_string()));
}

#[tokio::test]
async fn test_terminate_panic_is_isolated() {
    let log = new_log();
    let dispatch = Dispatch::new(chain_of(vec![
        Recorder::new("A", &log).hook(Hook::Panics),
        Recorder::new("B", &log).hook(Hook::Ok),
    ]));

    let mut ctx = RequestContext::new();
    let response = dispatch
        .run(&mut ctx, request(), recording_endpoint(&log))
        .await
        .unwrap();
    let completion = Completion::new(RequestHead::from_request(&request()), &response);
    let report = dispatch.terminate_hooks().run(&ctx, &completion).await;

    assert!(!report.is_clean());
    match &report.failures()[0] {
        TerminateHookError::Panicked { middleware, message } => {
            assert_eq!(middleware, "A");
            assert_eq!(message, "A hook panicked");
        }
        other => panic!("unexpected failure: {other}"),
    }
    assert!(entries(&log).contains(&"B-terminate-200".to_string()));
}

#[tokio::test]
async fn test_terminate_skips_middleware_never_entered() {
    let log = new_log();
    let dispatch = Dispatch::new(chain_of(vec![
        Recorder::new("A", &log).hook(Hook::Ok),
        Recorder::new("B", &log).hook(Hook::Ok).short_circuit(),
        Recorder::new("C", &log).hook(Hook::Ok),
    ]));

    let mut ctx = RequestContext::new();
    let response = run_and_terminate(&dispatch, &mut ctx).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(dispatch.terminate_hooks().names(), ["A", "B"]);
    assert!(!entries(&log).iter().any(|e| e.starts_with("C-")));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_request_keeps_entered_hooks() {
    let log = new_log();
    let dispatch = Dispatch::new(chain_of(vec![
        Recorder::new("A", &log).hook(Hook::Ok),
        Recorder::new("B", &log).hook(Hook::Ok),
    ]));
    let slow = Endpoint::new(|_ctx, _req| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".into_response())
        })
    });

    let mut ctx = RequestContext::new();
    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        dispatch.run(&mut ctx, request(), slow),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(entries(&log), ["A-before", "B-before"]);
    assert_eq!(dispatch.terminate_hooks().names(), ["A", "B"]);
}

// ============================================================================
// Instance lifetimes
// ============================================================================

static NEXT_INSTANCE: AtomicUsize = AtomicUsize::new(0);

/// Tags every event with the id of the instance that produced it.
struct Numbered {
    id: usize,
    log: Log,
}

impl Middleware for Numbered {
    fn name(&self) -> &'static str {
        "numbered"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        _args: &'a [String],
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult<Response>> {
        self.log.lock().push(format!("handle-{}", self.id));
        Box::pin(async move { next.run(ctx, request).await })
    }

    fn terminable(&self) -> bool {
        true
    }

    fn terminate<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _completion: &'a Completion,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        self.log.lock().push(format!("terminate-{}", self.id));
        Box::pin(async { Ok(()) })
    }
}

fn numbered(log: &Log) -> Numbered {
    Numbered {
        id: NEXT_INSTANCE.fetch_add(1, Ordering::SeqCst),
        log: Arc::clone(log),
    }
}

#[tokio::test]
async fn test_per_request_instance_shared_by_handle_and_terminate() {
    let log = new_log();
    let factory_log = Arc::clone(&log);
    let mut registry = MiddlewareRegistry::new();
    registry.alias(
        "numbered",
        MiddlewareDescriptor::per_request(move || numbered(&factory_log)),
    );
    let resolved = registry.resolve(&["numbered"], &[] as &[&str]).unwrap();

    for _ in 0..2 {
        let dispatch = Dispatch::new(resolved.instantiate());
        let mut ctx = RequestContext::new();
        run_and_terminate(&dispatch, &mut ctx).await;
    }

    let events = entries(&log);
    assert_eq!(events.len(), 4);
    let id = |event: &str| event.rsplit('-').next().unwrap().to_string();
    assert_eq!(id(&events[0]), id(&events[1]));
    assert_eq!(id(&events[2]), id(&events[3]));
    assert_ne!(id(&events[0]), id(&events[2]));
}

#[tokio::test]
async fn test_singleton_shared_across_requests() {
    let log = new_log();
    let mut registry = MiddlewareRegistry::new();
    registry.alias("numbered", MiddlewareDescriptor::singleton(numbered(&log)));
    let resolved = registry.resolve(&["numbered"], &[] as &[&str]).unwrap();

    for _ in 0..2 {
        let dispatch = Dispatch::new(resolved.instantiate());
        let mut ctx = RequestContext::new();
        run_and_terminate(&dispatch, &mut ctx).await;
    }

    let events = entries(&log);
    let first = events[0].rsplit('-').next().unwrap();
    assert!(events.iter().all(|e| e.ends_with(&format!("-{first}"))));
}

// ============================================================================
// Resolution feeding dispatch
// ============================================================================

#[tokio::test]
async fn test_resolved_groups_and_priority_drive_order() {
    let log = new_log();
    let mut registry = MiddlewareRegistry::new();
    for label in ["session", "csrf", "auth", "trim"] {
        registry.alias(label, MiddlewareDescriptor::singleton(Recorder::new(label, &log)));
    }
    registry
        .group("web", ["session", "csrf"])
        .global(["trim"])
        .priority(["session", "auth"]);

    let resolved = registry.resolve(&["auth", "web", "auth"], &["csrf"]).unwrap();
    assert_eq!(resolved.names(), ["trim", "session", "auth"]);

    let dispatch = Dispatch::new(resolved.instantiate());
    let mut ctx = RequestContext::new();
    dispatch
        .run(&mut ctx, request(), recording_endpoint(&log))
        .await
        .unwrap();

    assert_eq!(
        entries(&log),
        [
            "trim-before",
            "session-before",
            "auth-before",
            "H",
            "auth-after",
            "session-after",
            "trim-after",
        ]
    );
}
