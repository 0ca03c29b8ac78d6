//! `document.cookie` access

use keeper_core::cookies::CookieJar;
use wasm_bindgen::JsCast;
use web_sys::HtmlDocument;

use crate::error::{FrontendError, Result};

/// Cookie jar over the page's script-readable cookies
#[derive(Debug, Clone)]
pub struct DocumentCookieJar {
    document: HtmlDocument,
}

impl DocumentCookieJar {
    /// # Errors
    ///
    /// Returns an error outside an HTML document
    pub fn new() -> Result<Self> {
        let document = web_sys::window()
            .ok_or(FrontendError::NoWindow)?
            .document()
            .ok_or(FrontendError::NoDocument)?
            .dyn_into::<HtmlDocument>()
            .map_err(|_| FrontendError::NoDocument)?;
        Ok(Self { document })
    }

    fn write(&self, cookie: &str) {
        if let Err(e) = self.document.set_cookie(cookie) {
            tracing::debug!(error = ?e, "cookie write rejected");
        }
    }
}

impl CookieJar for DocumentCookieJar {
    fn cookie_string(&self) -> String {
        self.document.cookie().unwrap_or_default()
    }

    fn expire(&self, name: &str) {
        const EXPIRED: &str = "Thu, 01 Jan 1970 00:00:00 GMT";
        self.write(&format!("{name}=; expires={EXPIRED}; path=/"));
        // Cookies set without an explicit path live on the current one
        self.write(&format!("{name}=; expires={EXPIRED}"));
    }
}
