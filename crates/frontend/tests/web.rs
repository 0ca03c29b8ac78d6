//! Browser binding tests, run with `wasm-pack test --headless --firefox`

#![cfg(target_arch = "wasm32")]

use gloo::events::{EventListener, EventListenerOptions, EventListenerPhase};
use gloo::timers::future::TimeoutFuture;
use http::StatusCode;
use keeper_core::cookies::CookieJar;
use keeper_core::store::TokenStore;
use keeper_core::testing::{Harness, json_response, token_expiring_at};
use keeper_core::{CredentialStorage, ModalPresenter};
use keeper_frontend::listeners::SessionListeners;
use keeper_frontend::{BrowserSessionStorage, DocumentCookieJar, YewModalPresenter};
use std::cell::Cell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::{Document, Event, EventInit, HtmlAnchorElement, HtmlFormElement, MouseEvent, MouseEventInit};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn test_session_storage_round_trip() {
    let storage = BrowserSessionStorage::open().unwrap();
    storage.set_item("keeper.test", "value");
    assert_eq!(storage.get_item("keeper.test").as_deref(), Some("value"));
    storage.remove_item("keeper.test");
    assert_eq!(storage.get_item("keeper.test"), None);
}

#[wasm_bindgen_test]
fn test_token_store_over_session_storage() {
    let store = TokenStore::new(Rc::new(BrowserSessionStorage::open().unwrap()), "keeper.store");
    store.set("abc");
    assert_eq!(store.get().unwrap().as_str(), "abc");
    store.clear();
    assert!(store.is_empty());
}

#[wasm_bindgen_test]
fn test_document_cookie_read_and_expire() {
    let jar = DocumentCookieJar::new().unwrap();
    jar.expire("keeper_probe");

    let document: web_sys::HtmlDocument = wasm_bindgen::JsCast::unchecked_into(
        web_sys::window().unwrap().document().unwrap(),
    );
    document.set_cookie("keeper_probe=hello%20world; path=/").unwrap();

    assert_eq!(jar.get("keeper_probe").as_deref(), Some("hello world"));
    jar.expire("keeper_probe");
    assert_eq!(jar.get("keeper_probe"), None);
}

#[wasm_bindgen_test]
fn test_modal_unavailable_without_host() {
    assert!(!YewModalPresenter.is_available());
}

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

/// Harness whose session origin is the test page, holding a credential
/// expiring `expires_in` seconds from now
fn page_harness(expires_in: i64) -> Harness {
    let mut harness = Harness::new();
    harness.config.origin = Some(web_sys::window().unwrap().location().origin().unwrap());
    harness
        .store
        .set(token_expiring_at(harness.clock.now_secs() + expires_in).as_str());
    harness
}

fn attach(harness: &Harness) -> SessionListeners {
    let session = Rc::new(harness.session());
    SessionListeners::attach(&document(), &session, harness.navigator.clone())
}

/// Records whether the default action was already prevented when the event
/// bubbled back to the document, then prevents it so the page stays put.
fn default_prevented_recorder(name: &'static str) -> (EventListener, Rc<Cell<Option<bool>>>) {
    let seen = Rc::new(Cell::new(None));
    let recorded = Rc::clone(&seen);
    let options = EventListenerOptions {
        phase: EventListenerPhase::Bubble,
        passive: false,
    };
    let listener = EventListener::new_with_options(&document(), name, options, move |event| {
        recorded.set(Some(event.default_prevented()));
        event.prevent_default();
    });
    (listener, seen)
}

fn mounted_link(href: &str) -> HtmlAnchorElement {
    let anchor: HtmlAnchorElement = document().create_element("a").unwrap().unchecked_into();
    anchor.set_href(href);
    anchor.set_text_content(Some("menus"));
    document().body().unwrap().append_child(&anchor).unwrap();
    anchor
}

fn mounted_form(action: &str) -> HtmlFormElement {
    let form: HtmlFormElement = document().create_element("form").unwrap().unchecked_into();
    form.set_action(action);
    form.set_method("post");
    document().body().unwrap().append_child(&form).unwrap();
    form
}

fn click(anchor: &HtmlAnchorElement) {
    let init = MouseEventInit::new();
    init.set_bubbles(true);
    init.set_cancelable(true);
    let event = MouseEvent::new_with_mouse_event_init_dict("click", &init).unwrap();
    anchor.dispatch_event(&event).unwrap();
}

fn submit(form: &HtmlFormElement) {
    let init = EventInit::new();
    init.set_bubbles(true);
    init.set_cancelable(true);
    let event = Event::new_with_event_init_dict("submit", &init).unwrap();
    form.dispatch_event(&event).unwrap();
}

#[wasm_bindgen_test]
async fn test_protected_link_waits_for_renewal_then_proceeds() {
    let harness = page_harness(10);
    harness.transport.respond_to(
        "/auth/refresh",
        json_response(StatusCode::OK, r#"{"access_token":"renewed"}"#),
    );
    let _listeners = attach(&harness);
    let (_recorder, prevented) = default_prevented_recorder("click");
    let anchor = mounted_link("/admin/menus");

    click(&anchor);
    TimeoutFuture::new(50).await;

    assert_eq!(prevented.get(), Some(true));
    assert_eq!(harness.transport.calls_to("/auth/refresh"), 1);
    assert_eq!(harness.store.get().unwrap().as_str(), "renewed");
    assert_eq!(harness.navigator.visited(), vec![anchor.href()]);
    anchor.remove();
}

#[wasm_bindgen_test]
async fn test_protected_form_is_blocked_when_renewal_fails() {
    let harness = page_harness(10);
    harness.transport.respond_to(
        "/auth/refresh",
        json_response(StatusCode::INTERNAL_SERVER_ERROR, "{}"),
    );
    let _listeners = attach(&harness);
    let (_recorder, prevented) = default_prevented_recorder("submit");
    let form = mounted_form("/admin/settings");

    submit(&form);
    TimeoutFuture::new(50).await;

    assert_eq!(prevented.get(), Some(true));
    assert_eq!(harness.transport.calls_to("/auth/refresh"), 1);
    assert!(harness.store.get().is_none());
    assert_eq!(harness.modal.titles(), vec!["Session expired".to_string()]);
    form.remove();
}

#[wasm_bindgen_test]
async fn test_fresh_credential_leaves_navigation_alone() {
    let harness = page_harness(3_600);
    let _listeners = attach(&harness);
    let (_click_recorder, click_prevented) = default_prevented_recorder("click");
    let (_submit_recorder, submit_prevented) = default_prevented_recorder("submit");
    let anchor = mounted_link("/admin/menus");
    let form = mounted_form("/admin/settings");

    click(&anchor);
    submit(&form);
    TimeoutFuture::new(20).await;

    assert_eq!(click_prevented.get(), Some(false));
    assert_eq!(submit_prevented.get(), Some(false));
    assert_eq!(harness.transport.calls_to("/auth/refresh"), 0);
    assert!(harness.navigator.visited().is_empty());
    anchor.remove();
    form.remove();
}

#[wasm_bindgen_test]
async fn test_unprotected_link_is_not_held() {
    let harness = page_harness(10);
    let _listeners = attach(&harness);
    let (_recorder, prevented) = default_prevented_recorder("click");
    let anchor = mounted_link("/login");

    click(&anchor);
    TimeoutFuture::new(20).await;

    assert_eq!(prevented.get(), Some(false));
    assert_eq!(harness.transport.calls_to("/auth/refresh"), 0);
    anchor.remove();
}
