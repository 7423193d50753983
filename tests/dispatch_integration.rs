//! End-to-end dispatch tests with fake provider clients.
//!
//! Run with: cargo test --test dispatch_integration

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use push_dispatch_service::config::{
    ApnsConfig, LogConfig, OtelConfig, PayloadConfig, RedisConfig, ServerConfig, Settings,
};
use push_dispatch_service::notification::{
    Channel, DeliveryError, DeliveryReporter, DeliveryStatus, DispatchOutcome, FirebaseMessage,
    NotificationDispatcher, NotificationEvent, PayloadOptions, TopicPublish, INTERNAL_ERROR_REASON,
};
use push_dispatch_service::providers::{
    AdapterRegistry, ApnsClient, ApnsClientError, ApnsNotification, ApnsResponse, AppleAdapter,
    FirebaseAdapter, FirebaseClient, FirebaseClientError,
};
use push_dispatch_service::server::{create_app, AppState};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Reported {
    DecodeFailed,
    UnknownChannel(String),
    Delivered(Channel, String),
    Failed(Channel, DeliveryError),
}

#[derive(Default)]
struct RecordingReporter {
    records: Mutex<Vec<Reported>>,
}

impl RecordingReporter {
    fn records(&self) -> Vec<Reported> {
        self.records.lock().unwrap().clone()
    }
}

impl DeliveryReporter for RecordingReporter {
    fn decode_failed(&self, _raw: &str, _error: &serde_json::Error) {
        self.records.lock().unwrap().push(Reported::DecodeFailed);
    }

    fn unknown_channel(&self, event: &NotificationEvent) {
        self.records
            .lock()
            .unwrap()
            .push(Reported::UnknownChannel(event.channel.clone()));
    }

    fn delivered(&self, channel: Channel, event: &NotificationEvent) {
        self.records
            .lock()
            .unwrap()
            .push(Reported::Delivered(channel, event.device_token.clone()));
    }

    fn failed(&self, channel: Channel, _event: &NotificationEvent, error: &DeliveryError) {
        self.records
            .lock()
            .unwrap()
            .push(Reported::Failed(channel, error.clone()));
    }
}

#[derive(Clone, Copy)]
enum ApnsBehavior {
    Sent,
    Rejected(u16, &'static str),
    Stall,
}

struct FakeApns {
    behavior: ApnsBehavior,
    pushes: Mutex<Vec<ApnsNotification>>,
}

impl FakeApns {
    fn new(behavior: ApnsBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            pushes: Mutex::new(Vec::new()),
        })
    }

    fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }
}

#[async_trait]
impl ApnsClient for FakeApns {
    async fn push(&self, notification: &ApnsNotification) -> Result<ApnsResponse, ApnsClientError> {
        self.pushes.lock().unwrap().push(notification.clone());
        match self.behavior {
            ApnsBehavior::Sent => Ok(ApnsResponse {
                status_code: 200,
                apns_id: "apns-id-ok".to_string(),
                reason: String::new(),
            }),
            ApnsBehavior::Rejected(status_code, reason) => Ok(ApnsResponse {
                status_code,
                apns_id: "apns-id-rejected".to_string(),
                reason: reason.to_string(),
            }),
            ApnsBehavior::Stall => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!("stalled push should be abandoned")
            }
        }
    }
}

struct FakeFirebase(Result<String, String>);

#[async_trait]
impl FirebaseClient for FakeFirebase {
    async fn send(&self, _message: &FirebaseMessage) -> Result<String, FirebaseClientError> {
        self.0.clone().map_err(FirebaseClientError)
    }
}

// ============================================================================
// Helpers
// ============================================================================

const APPLE_EVENT: &str =
    r#"{"channel":"apple","device_token":"abc123","data":{"message":"hello","data":{"type":"chat"}}}"#;

fn apple_dispatcher(
    apns: Arc<FakeApns>,
    timeout: Duration,
) -> (NotificationDispatcher, Arc<RecordingReporter>) {
    let adapter = AppleAdapter::new(apns, "com.example.app", PayloadOptions::default(), timeout);
    let registry = AdapterRegistry::new().with_adapter(Channel::Apple, Arc::new(adapter));
    let reporter = Arc::new(RecordingReporter::default());
    let dispatcher = NotificationDispatcher::with_reporter(registry, reporter.clone());
    (dispatcher, reporter)
}

fn test_settings() -> Settings {
    Settings {
        server: ServerConfig::default(),
        apns: ApnsConfig {
            key_path: "./apns.p8".to_string(),
            key_id: "KEYID".to_string(),
            team_id: "TEAMID".to_string(),
            topic: "com.example.app".to_string(),
            production: false,
            timeout_ms: 1000,
        },
        payload: PayloadConfig::default(),
        redis: RedisConfig {
            enabled: false,
            ..RedisConfig::default()
        },
        otel: OtelConfig::default(),
        log: LogConfig::default(),
    }
}

// ============================================================================
// Dispatch scenarios
// ============================================================================

#[tokio::test]
async fn test_apple_sent_reports_delivered() {
    let apns = FakeApns::new(ApnsBehavior::Sent);
    let (dispatcher, reporter) = apple_dispatcher(apns.clone(), Duration::from_secs(1));

    let outcome = dispatcher
        .dispatch(&CancellationToken::new(), &TopicPublish::wrap(APPLE_EVENT))
        .await;

    assert_eq!(outcome, DispatchOutcome::Delivered { channel: Channel::Apple });
    assert_eq!(
        reporter.records(),
        vec![Reported::Delivered(Channel::Apple, "abc123".to_string())]
    );

    let pushes = apns.pushes.lock().unwrap();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].payload.aps.alert, "hello");
    assert_eq!(pushes[0].payload.aps.sound, "default");
    assert_eq!(pushes[0].payload.data["type"], "chat");
}

#[tokio::test]
async fn test_apple_rejection_reports_provider_fields() {
    let apns = FakeApns::new(ApnsBehavior::Rejected(410, "Unregistered"));
    let (dispatcher, reporter) = apple_dispatcher(apns, Duration::from_secs(1));

    let outcome = dispatcher
        .dispatch(&CancellationToken::new(), &TopicPublish::wrap(APPLE_EVENT))
        .await;

    let expected = DeliveryError {
        status: DeliveryStatus::Fail,
        code: "410".to_string(),
        reason: "Unregistered".to_string(),
        message: "apns-id-rejected".to_string(),
    };
    assert_eq!(
        outcome,
        DispatchOutcome::Failed {
            channel: Channel::Apple,
            error: expected.clone(),
        }
    );
    assert_eq!(reporter.records(), vec![Reported::Failed(Channel::Apple, expected)]);
}

#[tokio::test]
async fn test_apple_timeout_is_transport_failure() {
    let apns = FakeApns::new(ApnsBehavior::Stall);
    let (dispatcher, reporter) = apple_dispatcher(apns, Duration::from_millis(20));

    dispatcher
        .dispatch(&CancellationToken::new(), &TopicPublish::wrap(APPLE_EVENT))
        .await;

    match reporter.records().as_slice() {
        [Reported::Failed(Channel::Apple, error)] => {
            assert_eq!(error.code, "500");
            assert_eq!(error.reason, INTERNAL_ERROR_REASON);
            assert_eq!(error.message, "context deadline exceeded");
        }
        other => panic!("unexpected records: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancelled_dispatch_returns_promptly() {
    let apns = FakeApns::new(ApnsBehavior::Stall);
    let (dispatcher, reporter) = apple_dispatcher(apns, Duration::from_secs(60));
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.dispatch(&cancel, &TopicPublish::wrap(APPLE_EVENT)),
    )
    .await;
    assert!(outcome.is_ok(), "dispatch did not return after cancellation");

    match reporter.records().as_slice() {
        [Reported::Failed(Channel::Apple, error)] => {
            assert!(error.is_transport());
            assert_eq!(error.message, "context canceled");
        }
        other => panic!("unexpected records: {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_channel_skips_delivery() {
    let apns = FakeApns::new(ApnsBehavior::Sent);
    let (dispatcher, reporter) = apple_dispatcher(apns.clone(), Duration::from_secs(1));

    let outcome = dispatcher
        .dispatch(
            &CancellationToken::new(),
            &TopicPublish::wrap(r#"{"channel":"sms","device_token":"abc123"}"#),
        )
        .await;

    assert_eq!(
        outcome,
        DispatchOutcome::UnknownChannel {
            channel: "sms".to_string()
        }
    );
    assert_eq!(reporter.records(), vec![Reported::UnknownChannel("sms".to_string())]);
    assert_eq!(apns.push_count(), 0);
}

#[tokio::test]
async fn test_channel_match_is_case_sensitive() {
    let apns = FakeApns::new(ApnsBehavior::Sent);
    let (dispatcher, reporter) = apple_dispatcher(apns.clone(), Duration::from_secs(1));

    dispatcher
        .dispatch(
            &CancellationToken::new(),
            &TopicPublish::wrap(r#"{"channel":"Apple","device_token":"abc123"}"#),
        )
        .await;

    assert_eq!(reporter.records(), vec![Reported::UnknownChannel("Apple".to_string())]);
    assert_eq!(apns.push_count(), 0);
}

#[tokio::test]
async fn test_undecodable_notification_reports_once() {
    let apns = FakeApns::new(ApnsBehavior::Sent);
    let (dispatcher, reporter) = apple_dispatcher(apns.clone(), Duration::from_secs(1));
    let cancel = CancellationToken::new();

    let outcome = dispatcher.dispatch(&cancel, &TopicPublish::wrap("{not json")).await;
    assert_eq!(outcome, DispatchOutcome::DecodeFailed);

    let outcome = dispatcher.dispatch_bytes(&cancel, b"\xff\xfe").await;
    assert_eq!(outcome, DispatchOutcome::DecodeFailed);

    assert_eq!(
        reporter.records(),
        vec![Reported::DecodeFailed, Reported::DecodeFailed]
    );
    assert_eq!(apns.push_count(), 0);
}

#[tokio::test]
async fn test_missing_fields_still_route() {
    let apns = FakeApns::new(ApnsBehavior::Sent);
    let (dispatcher, _reporter) = apple_dispatcher(apns.clone(), Duration::from_secs(1));

    let outcome = dispatcher
        .dispatch(&CancellationToken::new(), &TopicPublish::wrap(r#"{"channel":"apple"}"#))
        .await;

    assert_eq!(outcome, DispatchOutcome::Delivered { channel: Channel::Apple });
    let pushes = apns.pushes.lock().unwrap();
    assert_eq!(pushes[0].device_token, "");
    assert_eq!(pushes[0].payload.aps.alert, "");
    assert!(pushes[0].payload.data.is_empty());
}

#[tokio::test]
async fn test_google_routes_through_registered_firebase_adapter() {
    let firebase = FirebaseAdapter::new(Arc::new(FakeFirebase(Err(
        "http error status: 404; reason: app instance has been unregistered; code: registration-token-not-registered; details: Requested entity was not found."
            .to_string(),
    ))));
    let registry = AdapterRegistry::new().with_adapter(Channel::Google, Arc::new(firebase));
    let reporter = Arc::new(RecordingReporter::default());
    let dispatcher = NotificationDispatcher::with_reporter(registry, reporter.clone());

    dispatcher
        .dispatch(
            &CancellationToken::new(),
            &TopicPublish::wrap(r#"{"channel":"google","device_token":"fcm-1","data":{"message":"hi"}}"#),
        )
        .await;

    match reporter.records().as_slice() {
        [Reported::Failed(Channel::Google, error)] => {
            assert_eq!(error.code, "404");
            assert_eq!(error.reason, "registration-token-not-registered");
            assert_eq!(error.message, "Requested entity was not found.");
        }
        other => panic!("unexpected records: {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_dispatches_are_independent() {
    let apns = FakeApns::new(ApnsBehavior::Sent);
    let (dispatcher, reporter) = apple_dispatcher(apns.clone(), Duration::from_secs(1));
    let dispatcher = Arc::new(dispatcher);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let json = format!(r#"{{"channel":"apple","device_token":"dev-{}"}}"#, i);
                dispatcher
                    .dispatch(&CancellationToken::new(), &TopicPublish::wrap(json))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered { channel: Channel::Apple });
    }

    assert_eq!(reporter.records().len(), 16);
    assert_eq!(apns.push_count(), 16);
    assert_eq!(dispatcher.stats().delivered, 16);
}

// ============================================================================
// HTTP surface
// ============================================================================

struct TestApp {
    router: axum::Router,
    state: AppState,
    dispatcher: Arc<NotificationDispatcher>,
    reporter: Arc<RecordingReporter>,
}

fn test_app_with_timeout(apns: Arc<FakeApns>, timeout: Duration) -> TestApp {
    let (dispatcher, reporter) = apple_dispatcher(apns, timeout);
    let dispatcher = Arc::new(dispatcher);
    let state = AppState::new(test_settings(), dispatcher.clone());
    TestApp {
        router: create_app(state.clone()),
        state,
        dispatcher,
        reporter,
    }
}

fn test_app(apns: Arc<FakeApns>) -> TestApp {
    test_app_with_timeout(apns, Duration::from_secs(1))
}

fn pubsub_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/pubsub")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_pubsub_push_dispatches_and_acknowledges() {
    let apns = FakeApns::new(ApnsBehavior::Sent);
    let app = test_app(apns.clone());

    let envelope = serde_json::to_string(&TopicPublish::wrap(APPLE_EVENT)).unwrap();
    let response = app.router.oneshot(pubsub_request(envelope)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    app.state.drain(Duration::from_secs(5)).await;
    assert_eq!(apns.push_count(), 1);
    assert_eq!(app.dispatcher.stats().delivered, 1);
}

#[tokio::test]
async fn test_pubsub_push_acknowledges_garbage() {
    let apns = FakeApns::new(ApnsBehavior::Sent);
    let app = test_app(apns.clone());

    let response = app
        .router
        .oneshot(pubsub_request("definitely not an envelope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    app.state.drain(Duration::from_secs(5)).await;
    assert_eq!(apns.push_count(), 0);
    assert_eq!(app.dispatcher.stats().decode_failed, 1);
}

#[tokio::test]
async fn test_pubsub_dispatch_outlives_dropped_request() {
    let apns = FakeApns::new(ApnsBehavior::Stall);
    let app = test_app_with_timeout(apns.clone(), Duration::from_millis(200));

    let envelope = serde_json::to_string(&TopicPublish::wrap(APPLE_EVENT)).unwrap();
    let request = app.router.oneshot(pubsub_request(envelope));
    // The caller gives up before the provider call resolves.
    let _ = tokio::time::timeout(Duration::from_millis(50), request).await;

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(apns.push_count(), 1);
    match app.reporter.records().as_slice() {
        [Reported::Failed(Channel::Apple, error)] => {
            assert!(error.is_transport());
            assert_eq!(error.message, "context deadline exceeded");
        }
        other => panic!("unexpected records: {:?}", other),
    }
}

#[tokio::test]
async fn test_drain_deadline_cancels_stalled_pubsub_dispatch() {
    let apns = FakeApns::new(ApnsBehavior::Stall);
    let app = test_app_with_timeout(apns, Duration::from_secs(60));

    let envelope = serde_json::to_string(&TopicPublish::wrap(APPLE_EVENT)).unwrap();
    let response = app.router.oneshot(pubsub_request(envelope)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    tokio::time::timeout(Duration::from_secs(5), app.state.drain(Duration::from_millis(50)))
        .await
        .expect("drain should finish once the deadline cancels the dispatch");

    match app.reporter.records().as_slice() {
        [Reported::Failed(Channel::Apple, error)] => {
            assert_eq!(error.message, "context canceled");
        }
        other => panic!("unexpected records: {:?}", other),
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(FakeApns::new(ApnsBehavior::Sent));

    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["apns_endpoint"], "https://api.sandbox.push.apple.com");
    assert_eq!(body["redis_enabled"], false);
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_stats_endpoint() {
    let app = test_app(FakeApns::new(ApnsBehavior::Sent));
    app.dispatcher
        .dispatch(&CancellationToken::new(), &TopicPublish::wrap(r#"{"channel":"sms"}"#))
        .await;

    let response = app
        .router
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["notifications"]["total"], 1);
    assert_eq!(body["notifications"]["unknown_channel"], 1);
    assert_eq!(body["routes"][0]["channel"], "apple");
    assert_eq!(body["routes"][0]["adapter"], "apns");
    assert_eq!(body["routes"][1]["adapter"], "noop");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = test_app(FakeApns::new(ApnsBehavior::Sent));

    let response = app
        .router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
}
