//! HTTP API handlers

pub mod assets;
pub mod auth;
pub mod health;

pub use assets::asset_routes;
pub use auth::auth_routes;
pub use health::health_routes;

use axum::http::{header, HeaderMap};

/// Cookie carrying the caller's enterprise id, set by the OAuth callback
pub const ENTERPRISE_COOKIE: &str = "entID";

/// Value of a request cookie, `None` when absent or empty
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; entID=100012345; lang=en"),
        );
        assert_eq!(
            cookie_value(&headers, ENTERPRISE_COOKIE).as_deref(),
            Some("100012345")
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_counts_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("entID="));
        assert_eq!(cookie_value(&headers, ENTERPRISE_COOKIE), None);
    }
}
