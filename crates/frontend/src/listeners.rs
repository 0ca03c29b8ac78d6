//! DOM wiring for the activity monitor
//!
//! Interaction events feed the idle tracker, an interval drives the
//! heartbeat, and capture-phase click/submit listeners hold protected
//! navigations until a renewal settles.

use gloo::events::{EventListener, EventListenerOptions, EventListenerPhase};
use gloo::timers::callback::Interval;
use keeper_core::paths::Target;
use keeper_core::{Navigator, NavigationDecision, Session};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Element, Event, HtmlAnchorElement, HtmlFormElement, MouseEvent, VisibilityState,
};

/// Events that count as user activity
pub const ACTIVITY_EVENTS: [&str; 6] = [
    "pointerdown",
    "pointermove",
    "keydown",
    "scroll",
    "touchstart",
    "wheel",
];

/// Live listeners and timer; dropping this detaches everything
pub struct SessionListeners {
    _activity: Vec<EventListener>,
    _navigation: Vec<EventListener>,
    _heartbeat: Interval,
}

impl SessionListeners {
    pub fn attach(
        document: &Document,
        session: &Rc<Session>,
        navigator: Rc<dyn Navigator>,
    ) -> Self {
        let passive = EventListenerOptions {
            phase: EventListenerPhase::Capture,
            passive: true,
        };
        let mut activity: Vec<EventListener> = ACTIVITY_EVENTS
            .iter()
            .map(|&name| {
                let session = Rc::clone(session);
                EventListener::new_with_options(document, name, passive, move |_| {
                    session.activity().record_interaction();
                })
            })
            .collect();
        // Coming back to the tab counts, hiding it does not
        activity.push({
            let session = Rc::clone(session);
            let watched = document.clone();
            EventListener::new(document, "visibilitychange", move |_| {
                if watched.visibility_state() == VisibilityState::Visible {
                    session.activity().record_interaction();
                }
            })
        });

        let intercept = EventListenerOptions {
            phase: EventListenerPhase::Capture,
            passive: false,
        };
        let navigation = vec![
            {
                let session = Rc::clone(session);
                let navigator = Rc::clone(&navigator);
                EventListener::new_with_options(document, "click", intercept, move |event| {
                    on_click(&session, &navigator, event);
                })
            },
            {
                let session = Rc::clone(session);
                EventListener::new_with_options(document, "submit", intercept, move |event| {
                    on_submit(&session, event);
                })
            },
        ];

        let interval_ms = u32::try_from(session.config().timing.heartbeat_interval_ms)
            .unwrap_or(u32::MAX);
        let heartbeat = {
            let session = Rc::clone(session);
            Interval::new(interval_ms, move || {
                let session = Rc::clone(&session);
                spawn_local(async move {
                    let outcome = session.activity().heartbeat().await;
                    tracing::trace!(?outcome, "heartbeat");
                });
            })
        };

        tracing::debug!(interval_ms, "session listeners attached");
        Self {
            _activity: activity,
            _navigation: navigation,
            _heartbeat: heartbeat,
        }
    }
}

/// Same-origin path of `href`, or `None` for links we leave alone
fn same_origin_path(session: &Session, href: &str) -> Option<String> {
    let target = Target::resolve(href, session.context().origin.as_ref()).ok()?;
    target.same_origin.then(|| target.path().to_string())
}

fn on_click(session: &Rc<Session>, navigator: &Rc<dyn Navigator>, event: &Event) {
    let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
        return;
    };
    // Let the browser handle new-tab and modified clicks
    if event.default_prevented()
        || mouse.button() != 0
        || mouse.ctrl_key()
        || mouse.meta_key()
        || mouse.shift_key()
        || mouse.alt_key()
    {
        return;
    }

    let Some(anchor) = event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .and_then(|element| element.closest("a[href]").ok().flatten())
        .and_then(|element| element.dyn_into::<HtmlAnchorElement>().ok())
    else {
        return;
    };
    let opens_elsewhere = !anchor.target().is_empty() && anchor.target() != "_self";
    if opens_elsewhere || anchor.has_attribute("download") {
        return;
    }

    let href = anchor.href();
    let Some(path) = same_origin_path(session, &href) else {
        return;
    };
    if !session.activity().navigation_requires_renewal(&path) {
        return;
    }

    event.prevent_default();
    let session = Rc::clone(session);
    let navigator = Rc::clone(navigator);
    spawn_local(async move {
        if session.activity().guard_navigation(&path).await == NavigationDecision::Proceed {
            navigator.redirect(&href);
        }
    });
}

fn on_submit(session: &Rc<Session>, event: &Event) {
    if event.default_prevented() {
        return;
    }
    let Some(form) = event
        .target()
        .and_then(|target| target.dyn_into::<HtmlFormElement>().ok())
    else {
        return;
    };

    let action = form.action();
    let Some(path) = same_origin_path(session, &action) else {
        return;
    };
    if !session.activity().navigation_requires_renewal(&path) {
        return;
    }

    event.prevent_default();
    let session = Rc::clone(session);
    spawn_local(async move {
        if session.activity().guard_navigation(&path).await == NavigationDecision::Proceed {
            // Programmatic submit() does not fire another submit event
            if let Err(e) = form.submit() {
                tracing::warn!(error = ?e, "form resubmission failed");
            }
        }
    });
}
