//! Browser bindings for the Keeper session manager
//!
//! Supplies the `sessionStorage`, `document.cookie` and `window.location`
//! collaborators, attaches activity and navigation listeners, and renders the
//! session modal and toasts with yew.
//!
//! ```ignore
//! keeper_frontend::init_logging(LevelFilter::INFO);
//! let runtime = keeper_frontend::install(keeper_frontend::config_from_document()?)?;
//! let items: Vec<Item> = runtime.session().client().get_json("/admin/items").await?;
//! ```

pub mod context;
pub mod cookies;
pub mod error;
pub mod listeners;
pub mod logging;
pub mod navigator;
pub mod runtime;
pub mod storage;
pub mod ui;

pub use context::{SessionHandle, SessionProvider, use_session};
pub use cookies::DocumentCookieJar;
pub use error::FrontendError;
pub use logging::init_logging;
pub use navigator::LocationNavigator;
pub use runtime::{KeeperRuntime, config_from_document, install};
pub use storage::BrowserSessionStorage;
pub use ui::{SessionUiHost, YewModalPresenter, YewNotifier};
