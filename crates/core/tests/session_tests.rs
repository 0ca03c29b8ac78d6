//! End-to-end session behaviour against a real HTTP server

#![cfg(feature = "client")]

use keeper_core::testing::{ManualClock, MemoryCookieJar, RecordingNavigator, token_expiring_at};
use keeper_core::{
    ApiRequest, EscalationState, HeartbeatOutcome, ModalDialog, ModalPresenter, NavigationDecision,
    Navigator, ReqwestTransport, Session, SessionConfig,
};
use mockall::mock;
use serde_json::json;
use std::rc::Rc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mock! {
    pub Navigator {}

    impl Navigator for Navigator {
        fn redirect(&self, url: &str);
    }
}

mock! {
    pub ModalPresenter {}

    impl ModalPresenter for ModalPresenter {
        fn is_available(&self) -> bool;
        fn open(&self, dialog: ModalDialog);
        fn close(&self);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Fixture {
    session: Session,
    clock: Rc<ManualClock>,
    cookies: Rc<MemoryCookieJar>,
}

fn fixture(
    server: &MockServer,
    navigator: Rc<dyn Navigator>,
    modal: Option<Rc<dyn ModalPresenter>>,
) -> Fixture {
    init_tracing();
    let config = SessionConfig {
        origin: Some(server.uri()),
        ..SessionConfig::default()
    };
    let clock = Rc::new(ManualClock::default());
    let cookies = Rc::new(MemoryCookieJar::with_cookies(&[("XSRF-TOKEN", "csrf-e2e")]));

    let mut builder = Session::builder(config)
        .transport(Rc::new(ReqwestTransport::new().unwrap()))
        .cookies(cookies.clone())
        .clock(clock.clone())
        .navigator(navigator);
    if let Some(modal) = modal {
        builder = builder.modal(modal);
    }

    Fixture {
        session: builder.build().unwrap(),
        clock,
        cookies,
    }
}

#[tokio::test]
async fn test_401_renews_and_retries_with_fresh_credential() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"visits": 42})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("x-csrf-token", "csrf-e2e"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "fresh", "token_type": "bearer"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fx = fixture(&server, Rc::new(RecordingNavigator::default()), None);
    fx.session.store().set("stale");

    let stats: serde_json::Value = fx.session.client().get_json("/admin/stats").await.unwrap();

    assert_eq!(stats["visits"], 42);
    assert_eq!(fx.session.store().get().unwrap().as_str(), "fresh");
    assert_eq!(fx.session.failures().escalation_count(), 0);
}

// Scenario: concurrent 401s with a valid stored credential
#[tokio::test]
async fn test_concurrent_401s_trigger_one_renewal() {
    let server = MockServer::start().await;

    Mock::given(path("/admin/data"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(path("/admin/data"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "fresh"}))
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fx = fixture(&server, Rc::new(RecordingNavigator::default()), None);
    fx.session.store().set("stale");
    let client = fx.session.client();

    let (first, second) = futures::join!(
        client.send(ApiRequest::get("/admin/data")),
        client.send(ApiRequest::get("/admin/data"))
    );

    assert!(first.is_ok() && second.is_ok());
    assert_eq!(fx.session.coordinator().renewal_count(), 1);
    assert_eq!(fx.session.store().get().unwrap().as_str(), "fresh");
    assert_eq!(fx.session.failures().escalation_count(), 0);
    server.verify().await;
}

// Scenario: expired credential, active user, heartbeat renews
#[tokio::test]
async fn test_heartbeat_renews_past_expiry_credential() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "renewed"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut navigator = MockNavigator::new();
    navigator.expect_redirect().never();
    let fx = fixture(&server, Rc::new(navigator), None);
    fx.session
        .store()
        .set(token_expiring_at(fx.clock.now_secs() - 30).as_str());

    let outcome = fx.session.activity().heartbeat().await;

    assert_eq!(outcome, HeartbeatOutcome::Renewed);
    assert_eq!(fx.session.store().get().unwrap().as_str(), "renewed");
    assert_eq!(fx.session.failures().escalation_count(), 0);
}

// Scenario: renewal endpoint fails with a server error
#[tokio::test]
async fn test_renewal_server_error_logs_out_and_redirects() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("x-csrf-token", "csrf-e2e"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Logged out"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut navigator = MockNavigator::new();
    navigator
        .expect_redirect()
        .withf(|url| url == "/login?auth=expired")
        .times(1)
        .return_const(());
    let fx = fixture(&server, Rc::new(navigator), None);
    fx.cookies.set("ui_theme", "dark");
    fx.session
        .store()
        .set(token_expiring_at(fx.clock.now_secs() + 5).as_str());

    let outcome = fx.session.activity().heartbeat().await;

    assert_eq!(outcome, HeartbeatOutcome::Failed);
    assert!(fx.session.store().get().is_none());
    assert_eq!(fx.cookies.get("ui_theme"), None);
    assert_eq!(fx.cookies.get("XSRF-TOKEN").as_deref(), Some("csrf-e2e"));
    assert_eq!(fx.session.failures().state(), EscalationState::Idle);
}

#[tokio::test]
async fn test_unrecoverable_401_opens_one_modal() {
    let server = MockServer::start().await;

    Mock::given(path("/admin/orders"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Not authenticated"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut modal = MockModalPresenter::new();
    modal.expect_is_available().return_const(true);
    modal
        .expect_open()
        .withf(|dialog| dialog.title == "Session expired" && dialog.confirm_label == "Log in again")
        .times(1)
        .return_const(());
    modal.expect_close().never();

    let fx = fixture(&server, Rc::new(RecordingNavigator::default()), Some(Rc::new(modal)));
    fx.session.store().set("stale");
    let client = fx.session.client();

    let (a, b) = futures::join!(
        client.send(ApiRequest::get("/admin/orders")),
        client.send(ApiRequest::post("/admin/orders"))
    );

    assert_eq!(a.unwrap().status, http::StatusCode::UNAUTHORIZED);
    assert_eq!(b.unwrap().status, http::StatusCode::UNAUTHORIZED);
    assert_eq!(fx.session.failures().escalation_count(), 1);
    assert_eq!(fx.session.failures().state(), EscalationState::Escalating);
}

#[tokio::test]
async fn test_forbidden_detail_reaches_modal() {
    let server = MockServer::start().await;

    Mock::given(path("/admin/settings"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"error_details": "Missing right: settings.write"})),
        )
        .mount(&server)
        .await;
    Mock::given(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut modal = MockModalPresenter::new();
    modal.expect_is_available().return_const(true);
    modal
        .expect_open()
        .withf(|dialog| {
            dialog.title == "Access denied" && dialog.message == "Missing right: settings.write"
        })
        .times(1)
        .return_const(());

    let fx = fixture(&server, Rc::new(RecordingNavigator::default()), Some(Rc::new(modal)));
    fx.session.store().set("valid");

    let err = fx
        .session
        .client()
        .post_json::<_, serde_json::Value>("/admin/settings", &json!({"theme": "dark"}))
        .await
        .unwrap_err();

    assert!(matches!(err, keeper_core::ClientError::Forbidden(_)));
    assert!(fx.session.store().get().is_some());
}

#[tokio::test]
async fn test_protected_navigation_waits_for_renewal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "nav"})))
        .expect(1)
        .mount(&server)
        .await;

    let fx = fixture(&server, Rc::new(RecordingNavigator::default()), None);
    fx.session
        .store()
        .set(token_expiring_at(fx.clock.now_secs() + 20).as_str());

    assert_eq!(
        fx.session.activity().guard_navigation("/login").await,
        NavigationDecision::Proceed
    );
    assert_eq!(
        fx.session.activity().guard_navigation("/admin/menus").await,
        NavigationDecision::Proceed
    );
    assert_eq!(fx.session.store().get().unwrap().as_str(), "nav");
}
