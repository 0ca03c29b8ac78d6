//! In-memory collaborators for exercising a session without a browser

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::task::Poll;
use url::Url;

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::context::SessionContext;
use crate::cookies::CookieJar;
use crate::error::TransportError;
use crate::failure::{ModalDialog, ModalPresenter, Navigator, Notifier, ToastLevel, UiCollaborators};
use crate::session::Session;
use crate::store::TokenStore;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

/// Origin the harness pretends to be served from
pub const TEST_ORIGIN: &str = "https://admin.test";

/// Unsigned JWT-shaped token whose `exp` claim is `exp`
pub fn token_expiring_at(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"admin","exp":{exp}}}"#));
    format!("{header}.{payload}.signature")
}

/// JSON response with the given status
pub fn json_response(status: StatusCode, body: &str) -> ApiResponse {
    let mut response = ApiResponse::new(status, Bytes::copy_from_slice(body.as_bytes()));
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Cell::new(1_700_000_000_000),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn now_ms(&self) -> u64 {
        self.now.get()
    }

    pub fn now_secs(&self) -> i64 {
        i64::try_from(self.now.get() / 1000).unwrap_or(i64::MAX)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Cookie jar backed by an ordered list
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: RefCell<Vec<(String, String)>>,
}

impl MemoryCookieJar {
    pub fn with_cookies(cookies: &[(&str, &str)]) -> Self {
        let jar = Self::default();
        for (name, value) in cookies {
            jar.set(name, value);
        }
        jar
    }

    pub fn set(&self, name: &str, value: &str) {
        let mut cookies = self.cookies.borrow_mut();
        match cookies.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => cookies.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        CookieJar::get(self, name)
    }
}

impl CookieJar for MemoryCookieJar {
    fn cookie_string(&self) -> String {
        self.cookies
            .borrow()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn expire(&self, name: &str) {
        self.cookies.borrow_mut().retain(|(key, _)| key != name);
    }
}

/// Navigator that records every redirect
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: RefCell<Vec<String>>,
}

impl RecordingNavigator {
    pub fn visited(&self) -> Vec<String> {
        self.visited.borrow().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, url: &str) {
        self.visited.borrow_mut().push(url.to_string());
    }
}

/// Modal that holds the open dialog until the test answers it
#[derive(Debug, Default)]
pub struct ScriptedModal {
    unavailable: Cell<bool>,
    open: RefCell<Option<ModalDialog>>,
    shown: RefCell<Vec<(String, String)>>,
    closes: Cell<usize>,
}

impl ScriptedModal {
    pub fn set_available(&self, available: bool) {
        self.unavailable.set(!available);
    }

    pub fn titles(&self) -> Vec<String> {
        self.shown.borrow().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.shown.borrow().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn is_open(&self) -> bool {
        self.open.borrow().is_some()
    }

    pub fn close_count(&self) -> usize {
        self.closes.get()
    }

    /// Press the primary button
    pub fn confirm(&self) {
        let dialog = self.open.borrow_mut().take();
        if let Some(dialog) = dialog {
            (dialog.on_confirm)();
        }
    }

    /// Press the secondary button
    pub fn cancel(&self) {
        let dialog = self.open.borrow_mut().take();
        if let Some(dialog) = dialog {
            (dialog.on_cancel)();
        }
    }
}

impl ModalPresenter for ScriptedModal {
    fn is_available(&self) -> bool {
        !self.unavailable.get()
    }

    fn open(&self, dialog: ModalDialog) {
        self.shown
            .borrow_mut()
            .push((dialog.title.clone(), dialog.message.clone()));
        *self.open.borrow_mut() = Some(dialog);
    }

    fn close(&self) {
        self.closes.set(self.closes.get() + 1);
        self.open.borrow_mut().take();
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    toasts: RefCell<Vec<(ToastLevel, String)>>,
}

impl RecordingNotifier {
    pub fn toasts(&self) -> Vec<(ToastLevel, String)> {
        self.toasts.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        self.toasts.borrow_mut().push((level, message.to_string()));
    }
}

type Handler = Rc<dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError>>;

enum Route {
    /// Responses served in order; the last one repeats
    Sequence(VecDeque<ApiResponse>),
    Handler(Handler),
    Fail(String),
}

/// Transport answering from per-path scripts.
///
/// Every request is recorded when sent and suspends once before answering,
/// so concurrent callers interleave the way real network calls do. Paths
/// without a script answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: RefCell<HashMap<String, Route>>,
    sent: RefCell<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_to(&self, path: &str, response: ApiResponse) {
        self.respond_with_sequence(path, vec![response]);
    }

    pub fn respond_with_sequence(&self, path: &str, responses: Vec<ApiResponse>) {
        self.routes
            .borrow_mut()
            .insert(path.to_string(), Route::Sequence(responses.into()));
    }

    pub fn respond_with<F>(&self, path: &str, handler: F)
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + 'static,
    {
        self.routes
            .borrow_mut()
            .insert(path.to_string(), Route::Handler(Rc::new(handler)));
    }

    pub fn fail(&self, path: &str, message: &str) {
        self.routes
            .borrow_mut()
            .insert(path.to_string(), Route::Fail(message.to_string()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.sent.borrow().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.sent
            .borrow()
            .iter()
            .filter(|request| path_of(&request.url) == path)
            .cloned()
            .collect()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    fn answer(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = path_of(&request.url);
        let handler = {
            let mut routes = self.routes.borrow_mut();
            match routes.get_mut(&path) {
                None => return Ok(ApiResponse::new(StatusCode::NOT_FOUND, Bytes::new())),
                Some(Route::Fail(message)) => return Err(TransportError::Request(message.clone())),
                Some(Route::Sequence(responses)) => {
                    let next = if responses.len() > 1 {
                        responses.pop_front()
                    } else {
                        responses.front().cloned()
                    };
                    return Ok(next
                        .unwrap_or_else(|| ApiResponse::new(StatusCode::NOT_FOUND, Bytes::new())));
                }
                Some(Route::Handler(handler)) => Rc::clone(handler),
            }
        };
        handler(request)
    }
}

#[async_trait(?Send)]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.sent.borrow_mut().push(request.clone());
        yield_now().await;
        self.answer(&request)
    }
}

fn path_of(url: &str) -> String {
    Url::parse(url).map_or_else(|_| url.to_string(), |url| url.path().to_string())
}

async fn yield_now() {
    let mut yielded = false;
    futures::future::poll_fn(|cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await;
}

/// Every collaborator of a session, shared with the test for inspection
pub struct Harness {
    pub config: SessionConfig,
    pub clock: Rc<ManualClock>,
    pub cookies: Rc<MemoryCookieJar>,
    pub store: TokenStore,
    pub transport: Rc<ScriptedTransport>,
    pub navigator: Rc<RecordingNavigator>,
    pub modal: Rc<ScriptedModal>,
    pub notifier: Rc<RecordingNotifier>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let config = SessionConfig {
            origin: Some(TEST_ORIGIN.to_string()),
            ..SessionConfig::default()
        };
        let store = TokenStore::in_memory();
        Self {
            config,
            clock: Rc::new(ManualClock::default()),
            cookies: Rc::new(MemoryCookieJar::default()),
            store,
            transport: Rc::new(ScriptedTransport::new()),
            navigator: Rc::new(RecordingNavigator::default()),
            modal: Rc::new(ScriptedModal::default()),
            notifier: Rc::new(RecordingNotifier::default()),
        }
    }

    pub fn ctx(&self) -> SessionContext {
        SessionContext {
            config: Rc::new(self.config.clone()),
            origin: self.config.origin.as_deref().and_then(|origin| Url::parse(origin).ok()),
            transport: self.transport.clone(),
            cookies: self.cookies.clone(),
            clock: self.clock.clone(),
            store: self.store.clone(),
        }
    }

    pub fn ui(&self) -> UiCollaborators {
        UiCollaborators {
            navigator: self.navigator.clone(),
            modal: Some(self.modal.clone()),
            notifier: Some(self.notifier.clone()),
        }
    }

    /// A fresh session over the harness collaborators
    pub fn session(&self) -> Session {
        Session::from_parts(self.ctx(), self.ui())
    }
}
