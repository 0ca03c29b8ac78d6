//! Session assembly
//!
//! One [`Session`] per browser tab owns the five components and wires them to
//! the same context, so every request, heartbeat and navigation guard shares a
//! single credential store and a single renewal slot.

use std::rc::Rc;
use url::Url;

use crate::activity::ActivityMonitor;
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::context::SessionContext;
use crate::cookies::CookieJar;
use crate::error::SessionError;
use crate::failure::{ModalPresenter, Navigator, Notifier, SessionFailureHandler, UiCollaborators};
use crate::refresh::RefreshCoordinator;
use crate::request::AuthenticatedClient;
use crate::store::{CredentialStorage, MemoryStorage, TokenStore};
use crate::transport::HttpTransport;

pub struct Session {
    ctx: SessionContext,
    coordinator: Rc<RefreshCoordinator>,
    failures: Rc<SessionFailureHandler>,
    client: AuthenticatedClient,
    activity: ActivityMonitor,
}

impl Session {
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Wire the components over an already assembled context
    pub fn from_parts(ctx: SessionContext, ui: UiCollaborators) -> Self {
        let coordinator = Rc::new(RefreshCoordinator::new(ctx.clone()));
        let failures = Rc::new(SessionFailureHandler::new(ctx.clone(), ui));
        let client =
            AuthenticatedClient::new(ctx.clone(), Rc::clone(&coordinator), Rc::clone(&failures));
        let activity =
            ActivityMonitor::new(ctx.clone(), Rc::clone(&coordinator), Rc::clone(&failures));

        Self {
            ctx,
            coordinator,
            failures,
            client,
            activity,
        }
    }

    pub const fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub const fn activity(&self) -> &ActivityMonitor {
        &self.activity
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn failures(&self) -> &SessionFailureHandler {
        &self.failures
    }

    pub const fn store(&self) -> &TokenStore {
        &self.ctx.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.ctx.config
    }

    pub const fn context(&self) -> &SessionContext {
        &self.ctx
    }
}

/// Builder for [`Session`].
///
/// Cookies and a navigator are always required. The transport defaults to
/// [`crate::transport::ReqwestTransport`] when the `client` feature is on,
/// storage to an in-memory map and the clock to [`SystemClock`].
pub struct SessionBuilder {
    config: SessionConfig,
    transport: Option<Rc<dyn HttpTransport>>,
    storage: Option<Rc<dyn CredentialStorage>>,
    cookies: Option<Rc<dyn CookieJar>>,
    clock: Option<Rc<dyn Clock>>,
    navigator: Option<Rc<dyn Navigator>>,
    modal: Option<Rc<dyn ModalPresenter>>,
    notifier: Option<Rc<dyn Notifier>>,
}

impl SessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            transport: None,
            storage: None,
            cookies: None,
            clock: None,
            navigator: None,
            modal: None,
            notifier: None,
        }
    }

    #[must_use]
    pub fn transport(mut self, transport: Rc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn storage(mut self, storage: Rc<dyn CredentialStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn cookies(mut self, cookies: Rc<dyn CookieJar>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn navigator(mut self, navigator: Rc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    #[must_use]
    pub fn modal(mut self, modal: Rc<dyn ModalPresenter>) -> Self {
        self.modal = Some(modal);
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Rc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validate the configuration and assemble the session
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` if the configuration is invalid, a required
    /// collaborator is missing or the default transport cannot be created
    pub fn build(self) -> Result<Session, SessionError> {
        self.config.validate()?;

        let origin = self
            .config
            .origin
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| config::ConfigError::Message(format!("origin: invalid URL - {e}")))?;
        let cookies = self.cookies.ok_or(SessionError::Missing("cookies"))?;
        let navigator = self.navigator.ok_or(SessionError::Missing("navigator"))?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };
        let storage = self
            .storage
            .unwrap_or_else(|| Rc::new(MemoryStorage::new()));
        let clock = self.clock.unwrap_or_else(|| Rc::new(SystemClock));

        let store = TokenStore::new(storage, self.config.storage_key.as_str());
        info!(
            origin = ?origin.as_ref().map(Url::as_str),
            modal = self.modal.is_some(),
            "session assembled"
        );

        let ctx = SessionContext {
            config: Rc::new(self.config),
            origin,
            transport,
            cookies,
            clock,
            store,
        };
        let ui = UiCollaborators {
            navigator,
            modal: self.modal,
            notifier: self.notifier,
        };
        Ok(Session::from_parts(ctx, ui))
    }
}

#[cfg(feature = "client")]
fn default_transport() -> Result<Rc<dyn HttpTransport>, SessionError> {
    Ok(Rc::new(crate::transport::ReqwestTransport::new()?))
}

#[cfg(not(feature = "client"))]
fn default_transport() -> Result<Rc<dyn HttpTransport>, SessionError> {
    Err(SessionError::Missing("transport"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, ManualClock, MemoryCookieJar, RecordingNavigator, ScriptedTransport};

    #[test]
    fn test_builder_requires_cookies_and_navigator() {
        let err = Session::builder(SessionConfig::default())
            .transport(Rc::new(ScriptedTransport::new()))
            .navigator(Rc::new(RecordingNavigator::default()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Missing("cookies")));

        let err = Session::builder(SessionConfig::default())
            .transport(Rc::new(ScriptedTransport::new()))
            .cookies(Rc::new(MemoryCookieJar::default()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Missing("navigator")));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = SessionConfig::default();
        config.endpoints.renew = "auth/refresh".to_string();

        let err = Session::builder(config)
            .transport(Rc::new(ScriptedTransport::new()))
            .cookies(Rc::new(MemoryCookieJar::default()))
            .navigator(Rc::new(RecordingNavigator::default()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Configuration(_)));
    }

    #[test]
    fn test_builder_uses_configured_storage_key() {
        let storage = Rc::new(MemoryStorage::new());
        let mut config = SessionConfig::default();
        config.storage_key = "custom.key".to_string();

        let session = Session::builder(config)
            .transport(Rc::new(ScriptedTransport::new()))
            .storage(storage.clone())
            .cookies(Rc::new(MemoryCookieJar::default()))
            .clock(Rc::new(ManualClock::default()))
            .navigator(Rc::new(RecordingNavigator::default()))
            .build()
            .unwrap();

        session.store().set("abc");
        assert_eq!(storage.get_item("custom.key").as_deref(), Some("abc"));
        assert!(session.context().origin.is_none());
    }

    #[test]
    fn test_components_share_one_store() {
        let harness = Harness::new();
        let session = harness.session();

        harness.store.set("shared");
        assert_eq!(session.store().get().unwrap().as_str(), "shared");
        assert_eq!(
            session.context().origin.as_ref().map(Url::as_str),
            Some("https://admin.test/")
        );
    }
}
