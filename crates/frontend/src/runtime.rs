//! Installing the session manager on a page

use keeper_core::store::MemoryStorage;
use keeper_core::{CredentialStorage, Navigator, Session, SessionConfig};
use std::rc::Rc;

use crate::context::SessionHandle;
use crate::cookies::DocumentCookieJar;
use crate::error::{FrontendError, Result};
use crate::listeners::SessionListeners;
use crate::navigator::{LocationNavigator, page_origin};
use crate::storage::BrowserSessionStorage;
use crate::ui::{YewModalPresenter, YewNotifier};

/// Id of the optional `<script type="application/json">` holding configuration
pub const CONFIG_ELEMENT_ID: &str = "keeper-config";

/// A session running on the current page
pub struct KeeperRuntime {
    session: SessionHandle,
    _listeners: SessionListeners,
}

impl KeeperRuntime {
    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }
}

/// Read configuration embedded in the page, or the defaults when absent
///
/// # Errors
///
/// Returns an error if the embedded document is invalid
pub fn config_from_document() -> Result<SessionConfig> {
    let text = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(CONFIG_ELEMENT_ID))
        .and_then(|element| element.text_content())
        .filter(|text| !text.trim().is_empty());

    match text {
        Some(text) => Ok(SessionConfig::from_json_str(&text)?),
        None => Ok(SessionConfig::default()),
    }
}

/// Build the tab's session over the browser collaborators and start the
/// activity listeners and heartbeat.
///
/// The page origin is taken from `window.location` unless configured.
///
/// # Errors
///
/// Returns an error outside a browser document or if the session cannot be
/// assembled
pub fn install(mut config: SessionConfig) -> Result<KeeperRuntime> {
    let document = web_sys::window()
        .ok_or(FrontendError::NoWindow)?
        .document()
        .ok_or(FrontendError::NoDocument)?;

    if config.origin.is_none() {
        config.origin = page_origin();
    }

    let storage: Rc<dyn CredentialStorage> = match BrowserSessionStorage::open() {
        Some(storage) => Rc::new(storage),
        None => {
            tracing::warn!("session storage unavailable, keeping credential in memory");
            Rc::new(MemoryStorage::new())
        }
    };
    let navigator: Rc<dyn Navigator> = Rc::new(LocationNavigator);

    let session = Session::builder(config)
        .storage(storage)
        .cookies(Rc::new(DocumentCookieJar::new()?))
        .navigator(Rc::clone(&navigator))
        .modal(Rc::new(YewModalPresenter))
        .notifier(Rc::new(YewNotifier::default()))
        .build()?;
    let session = Rc::new(session);

    let listeners = SessionListeners::attach(&document, &session, navigator);
    tracing::info!(
        authenticated = !session.store().is_empty(),
        "session manager installed"
    );

    Ok(KeeperRuntime {
        session: SessionHandle(session),
        _listeners: listeners,
    })
}
