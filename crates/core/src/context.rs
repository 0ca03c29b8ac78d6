//! Dependencies shared by every session component

use http::header::{HeaderMap, HeaderName, HeaderValue};
use std::rc::Rc;
use url::Url;

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::cookies::CookieJar;
use crate::error::TransportError;
use crate::paths::Target;
use crate::store::TokenStore;
use crate::transport::HttpTransport;

/// Tab-wide singletons handed to each component by cheap clone
#[derive(Clone)]
pub struct SessionContext {
    pub config: Rc<SessionConfig>,
    pub origin: Option<Url>,
    pub transport: Rc<dyn HttpTransport>,
    pub cookies: Rc<dyn CookieJar>,
    pub clock: Rc<dyn Clock>,
    pub store: TokenStore,
}

impl SessionContext {
    /// Resolve a request URL against the page origin
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidUrl` if the URL cannot be parsed
    pub fn resolve(&self, raw: &str) -> Result<Target, TransportError> {
        Target::resolve(raw, self.origin.as_ref())
    }

    /// Current anti-forgery token, read fresh from the cookie
    pub fn csrf_token(&self) -> Option<String> {
        self.cookies
            .get(&self.config.cookies.csrf_cookie)
            .filter(|value| !value.is_empty())
    }

    /// Mirror the anti-forgery cookie into its header.
    ///
    /// Returns whether the header was attached.
    pub fn attach_csrf(&self, headers: &mut HeaderMap) -> bool {
        let Some(token) = self.csrf_token() else {
            return false;
        };
        let Ok(name) = HeaderName::from_bytes(self.config.cookies.csrf_header.as_bytes()) else {
            warn!(header = %self.config.cookies.csrf_header, "invalid anti-forgery header name");
            return false;
        };
        match HeaderValue::from_str(&token) {
            Ok(value) => {
                headers.insert(name, value);
                true
            }
            Err(_) => {
                warn!("anti-forgery cookie is not a valid header value");
                false
            }
        }
    }
}
