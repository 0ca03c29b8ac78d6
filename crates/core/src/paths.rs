//! Request target classification: origin, skippable paths, auth endpoints

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TransportError;

/// Paths whose failures never trigger renewal or escalation.
///
/// Rules apply to the URL path only; query string and fragment are ignored.
/// Prefixes match case-sensitively, suffixes case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipRules {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
}

impl Default for SkipRules {
    fn default() -> Self {
        Self {
            prefixes: vec![
                "/static/".to_string(),
                "/images/".to_string(),
                "/favicon.ico".to_string(),
            ],
            suffixes: [
                ".css", ".js", ".mjs", ".map", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp",
                ".ico", ".woff", ".woff2",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

impl SkipRules {
    /// Whether failures on `path` are passed through silently
    pub fn is_skippable(&self, path: &str) -> bool {
        let path = strip_query(path);
        if self.prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return true;
        }
        let lowered = path.to_ascii_lowercase();
        self.suffixes
            .iter()
            .any(|s| lowered.ends_with(&s.to_ascii_lowercase()))
    }
}

/// Drop `?query` and `#fragment` from a path or URL
pub fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

/// Whether `path` is one of `endpoints`, ignoring a trailing slash and query
pub fn is_auth_endpoint<'a>(path: &str, endpoints: impl IntoIterator<Item = &'a str>) -> bool {
    let path = strip_query(path);
    let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);
    endpoints.into_iter().any(|endpoint| endpoint == path)
}

/// Whether `path` sits under one of the protected prefixes.
///
/// `/admin` protects `/admin` and `/admin/users` but not `/administrator`.
pub fn is_protected<'a>(path: &str, prefixes: impl IntoIterator<Item = &'a String>) -> bool {
    let path = strip_query(path);
    prefixes.into_iter().any(|prefix| {
        let prefix = prefix.trim_end_matches('/');
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// A request target resolved against the page origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: Url,
    pub same_origin: bool,
}

impl Target {
    /// Resolve `raw` (absolute URL or origin-relative path).
    ///
    /// Without a configured origin only relative targets count as same-origin.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidUrl` when `raw` cannot be parsed
    pub fn resolve(raw: &str, origin: Option<&Url>) -> Result<Self, TransportError> {
        match Url::parse(raw) {
            Ok(url) => {
                let same_origin = origin.is_some_and(|o| o.origin() == url.origin());
                Ok(Self { url, same_origin })
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = match origin {
                    Some(origin) => origin.clone(),
                    None => Url::parse("http://localhost/")
                        .map_err(|e| TransportError::InvalidUrl(e.to_string()))?,
                };
                let url = base
                    .join(raw)
                    .map_err(|e| TransportError::InvalidUrl(format!("{raw}: {e}")))?;
                Ok(Self {
                    url,
                    same_origin: true,
                })
            }
            Err(e) => Err(TransportError::InvalidUrl(format!("{raw}: {e}"))),
        }
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }
}
