//! Terminal failure escalation
//!
//! A two-state machine (`Idle`, `Escalating`) that turns an expired session or
//! a forbidden request into exactly one user-facing decision per episode.
//! Triggers arriving while an episode is open are absorbed. This component
//! never renews.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::context::SessionContext;
use crate::cookies;
use crate::transport::ApiRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscalationState {
    #[default]
    Idle,
    Escalating,
}

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Two-button decision handed to the modal collaborator
pub struct ModalDialog {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    pub cancel_label: String,
    pub on_confirm: Box<dyn FnOnce()>,
    pub on_cancel: Box<dyn FnOnce()>,
}

impl fmt::Debug for ModalDialog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalDialog")
            .field("title", &self.title)
            .field("message", &self.message)
            .field("confirm_label", &self.confirm_label)
            .field("cancel_label", &self.cancel_label)
            .finish_non_exhaustive()
    }
}

/// Modal UI collaborator
pub trait ModalPresenter {
    /// Whether a modal can be shown right now (e.g. its host is mounted)
    fn is_available(&self) -> bool {
        true
    }

    fn open(&self, dialog: ModalDialog);

    fn close(&self);
}

/// Toast UI collaborator
pub trait Notifier {
    fn notify(&self, level: ToastLevel, message: &str);
}

/// Full-page navigation
pub trait Navigator {
    fn redirect(&self, url: &str);
}

/// UI collaborators consumed by the failure handler
#[derive(Clone)]
pub struct UiCollaborators {
    pub navigator: Rc<dyn Navigator>,
    pub modal: Option<Rc<dyn ModalPresenter>>,
    pub notifier: Option<Rc<dyn Notifier>>,
}

/// Append `auth=<flag>` to a URL the way the server's error redirects do
pub fn with_auth_flag(url: &str, flag: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}auth={flag}")
}

pub struct SessionFailureHandler {
    ctx: SessionContext,
    ui: UiCollaborators,
    state: Rc<Cell<EscalationState>>,
    episodes: Cell<u64>,
}

impl SessionFailureHandler {
    pub fn new(ctx: SessionContext, ui: UiCollaborators) -> Self {
        Self {
            ctx,
            ui,
            state: Rc::new(Cell::new(EscalationState::Idle)),
            episodes: Cell::new(0),
        }
    }

    pub fn state(&self) -> EscalationState {
        self.state.get()
    }

    /// Number of escalation episodes opened so far
    pub fn escalation_count(&self) -> u64 {
        self.episodes.get()
    }

    /// Escalate an unrecoverable session.
    ///
    /// Clears the local credential and readable cookies, logs out on the
    /// server, then asks the user to log in again or go home. Falls back to an
    /// immediate redirect to the login page without a modal.
    pub async fn expired(&self) {
        if !self.begin("expired") {
            return;
        }

        self.ctx.store.clear();
        cookies::clear_readable(self.ctx.cookies.as_ref(), &self.ctx.config.cookies.preserved);
        self.logout().await;

        let config = &self.ctx.config;
        let Some(modal) = self.available_modal() else {
            self.ui
                .navigator
                .redirect(&with_auth_flag(&config.login_url, "expired"));
            self.state.set(EscalationState::Idle);
            return;
        };

        modal.open(ModalDialog {
            title: "Session expired".to_string(),
            message: "Your session has expired. Please log in again to continue.".to_string(),
            confirm_label: "Log in again".to_string(),
            cancel_label: "Go home".to_string(),
            on_confirm: self.resolution(&modal, Some(config.login_url.clone())),
            on_cancel: self.resolution(&modal, Some(config.home_url.clone())),
        });
    }

    /// Escalate a forbidden request with the server-supplied detail.
    ///
    /// Session state is left alone: acknowledging simply closes the decision.
    pub fn forbidden(&self, detail: impl Into<String>) {
        let detail = detail.into();
        if !self.begin("forbidden") {
            return;
        }

        let config = &self.ctx.config;
        let Some(modal) = self.available_modal() else {
            if let Some(notifier) = &self.ui.notifier {
                notifier.notify(ToastLevel::Warning, &detail);
            } else {
                self.ui
                    .navigator
                    .redirect(&with_auth_flag(&config.home_url, "forbidden"));
            }
            self.state.set(EscalationState::Idle);
            return;
        };

        modal.open(ModalDialog {
            title: "Access denied".to_string(),
            message: detail,
            confirm_label: "OK".to_string(),
            cancel_label: "Go to dashboard".to_string(),
            on_confirm: self.resolution(&modal, None),
            on_cancel: self.resolution(&modal, Some(config.home_url.clone())),
        });
    }

    // Check-then-set with no suspension point in between.
    fn begin(&self, kind: &'static str) -> bool {
        if self.state.get() == EscalationState::Escalating {
            debug!(kind, "escalation already open, absorbing");
            return false;
        }
        self.state.set(EscalationState::Escalating);
        self.episodes.set(self.episodes.get() + 1);
        info!(kind, "escalating session failure");
        true
    }

    fn available_modal(&self) -> Option<Rc<dyn ModalPresenter>> {
        self.ui
            .modal
            .as_ref()
            .filter(|modal| modal.is_available())
            .map(Rc::clone)
    }

    fn resolution(
        &self,
        modal: &Rc<dyn ModalPresenter>,
        destination: Option<String>,
    ) -> Box<dyn FnOnce()> {
        let state = Rc::clone(&self.state);
        let modal = Rc::clone(modal);
        let navigator = Rc::clone(&self.ui.navigator);
        Box::new(move || {
            modal.close();
            state.set(EscalationState::Idle);
            if let Some(url) = destination {
                navigator.redirect(&url);
            }
        })
    }

    async fn logout(&self) {
        let target = match self.ctx.resolve(&self.ctx.config.endpoints.logout) {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "cannot resolve logout endpoint");
                return;
            }
        };
        let mut request = ApiRequest::post(target.url.as_str());
        self.ctx.attach_csrf(&mut request.headers);

        match self.ctx.transport.send(request).await {
            Ok(response) => debug!(status = response.status.as_u16(), "server logout"),
            Err(e) => debug!(error = %e, "server logout failed, ignoring"),
        }
    }
}
