//! Full-page navigation through `window.location`

use keeper_core::Navigator;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocationNavigator;

impl Navigator for LocationNavigator {
    fn redirect(&self, url: &str) {
        let Some(window) = web_sys::window() else {
            tracing::warn!(url, "no window to navigate");
            return;
        };
        tracing::info!(url, "navigating");
        if let Err(e) = window.location().set_href(url) {
            tracing::warn!(url, error = ?e, "navigation failed");
        }
    }
}

/// The page origin (`scheme://host[:port]`), if there is a window
pub fn page_origin() -> Option<String> {
    web_sys::window().and_then(|w| w.location().origin().ok())
}
