//! Token transport over a configurable request/response header.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// The session token sent by the client, if any.
///
/// Blank values count as absent.
pub fn read_token<'a>(headers: &'a HeaderMap, header: &str) -> Option<&'a str> {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Hand a rotated token back to the client under the same header name.
pub fn write_token(headers: &mut HeaderMap, header: &str, token: &str) {
    let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(header.as_bytes()),
        HeaderValue::from_str(token),
    ) else {
        tracing::warn!(header = %header, "Rotated token could not be written to response");
        return;
    };
    headers.insert(name, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_configured_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-keystone-token", HeaderValue::from_static(" abc "));
        assert_eq!(read_token(&headers, "x-keystone-token"), Some("abc"));
        assert_eq!(read_token(&headers, "authorization"), None);
    }

    #[test]
    fn blank_token_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert("x-keystone-token", HeaderValue::from_static("  "));
        assert_eq!(read_token(&headers, "x-keystone-token"), None);
    }

    #[test]
    fn writes_rotated_token() {
        let mut headers = HeaderMap::new();
        write_token(&mut headers, "x-keystone-token", "new-token");
        assert_eq!(headers.get("x-keystone-token").unwrap(), "new-token");
    }
}
