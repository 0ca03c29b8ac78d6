//! Keeper session core
//!
//! Keeps a browser tab's access credential alive: a tab-scoped token store, a
//! single-flight renewal coordinator, an authenticated request wrapper that
//! renews and retries on 401, an activity monitor for proactive renewal and a
//! failure handler presenting expired/forbidden outcomes once per episode.
//!
//! Everything here is single-threaded and platform independent; the browser
//! bindings live in `keeper-frontend`.

#[macro_use]
extern crate tracing;

pub mod activity;
pub mod clock;
pub mod config;
pub mod context;
pub mod cookies;
pub mod credential;
pub mod error;
pub mod failure;
pub mod paths;
pub mod refresh;
pub mod request;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(any(test, feature = "tests"))]
pub mod testing;

pub use activity::{ActivityMonitor, HeartbeatOutcome, NavigationDecision};
pub use crate::config::SessionConfig;
pub use credential::AccessCredential;
pub use error::{ClientError, RenewalFailure, SessionError, TransportError};
pub use failure::{
    EscalationState, ModalDialog, ModalPresenter, Navigator, Notifier, SessionFailureHandler,
    ToastLevel,
};
pub use refresh::{PendingRenewal, RefreshCoordinator};
pub use request::AuthenticatedClient;
pub use session::{Session, SessionBuilder};
pub use store::{CredentialStorage, TokenStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport};

#[cfg(feature = "client")]
pub use transport::ReqwestTransport;
