//! Client-readable cookie access
//!
//! Only cookies without `HttpOnly` are visible here. The server-managed
//! credential cookies can neither be read nor truly cleared from script, so
//! [`clear_readable`] is cosmetic: only the logout call ends the server session.

use percent_encoding::percent_decode_str;

/// Access to the cookies the page script can see
pub trait CookieJar {
    /// Raw `name=value; name2=value2` string, as `document.cookie` returns it
    fn cookie_string(&self) -> String;

    /// Expire a cookie for the current path and the site root
    fn expire(&self, name: &str);

    fn get(&self, name: &str) -> Option<String> {
        parse_cookies(&self.cookie_string())
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Split a `document.cookie` string into `(name, value)` pairs
pub fn parse_cookies(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), decode_component(value.trim())))
        })
        .collect()
}

/// Best-effort expiry of every readable cookie not in `preserved`.
///
/// Returns the names that were expired.
pub fn clear_readable(jar: &dyn CookieJar, preserved: &[String]) -> Vec<String> {
    let mut cleared = Vec::new();
    for (name, _) in parse_cookies(&jar.cookie_string()) {
        if preserved.iter().any(|keep| keep == &name) || cleared.contains(&name) {
            continue;
        }
        jar.expire(&name);
        cleared.push(name);
    }
    if !cleared.is_empty() {
        debug!(cookies = ?cleared, "expired readable cookies");
    }
    cleared
}

// Invalid sequences are kept verbatim
fn decode_component(value: &str) -> String {
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    percent_decode_str(value)
        .decode_utf8()
        .map_or_else(|_| value.to_string(), |decoded| decoded.into_owned())
}
