//! Extraction of the signed authentication fields from a request.

use axum::http::HeaderMap;

use crate::auth::error::AuthFailure;

/// Field names as they appear in the canonical string.
pub const ACCESS_KEY_HEADER_NAME: &str = "accessKey";
pub const NONCE_HEADER_NAME: &str = "nonce";
pub const TIMESTAMP_HEADER_NAME: &str = "timestamp";
pub const SIGN_HEADER_NAME: &str = "sign";

/// Header names are case-insensitive; these are the wire forms looked up.
pub const ACCESS_KEY_HEADER: &str = "accesskey";
pub const NONCE_HEADER: &str = "nonce";
pub const TIMESTAMP_HEADER: &str = "timestamp";
pub const SIGN_HEADER: &str = "sign";

/// The per-request authentication claim. Discarded after verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContext {
    pub access_key: String,
    pub nonce: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub signature: String,
    /// Request parameters covered by the signature, in arrival order.
    pub params: Vec<(String, String)>,
}

impl SignatureContext {
    /// Build the context from request headers and query parameters.
    ///
    /// Query parameters that collide with an auth field name are never signed.
    pub fn from_request(headers: &HeaderMap, query: &[(String, String)]) -> Result<Self, AuthFailure> {
        let access_key = required(headers, ACCESS_KEY_HEADER, "missing accessKey")?;
        let nonce = required(headers, NONCE_HEADER, "missing nonce")?;
        let timestamp = required(headers, TIMESTAMP_HEADER, "missing timestamp")?;
        let signature = required(headers, SIGN_HEADER, "missing sign")?;

        let timestamp = timestamp
            .parse::<i64>()
            .map_err(|_| AuthFailure::MalformedRequest("timestamp is not an integer"))?;

        let params = query
            .iter()
            .filter(|(k, _)| !is_auth_field(k))
            .cloned()
            .collect();

        Ok(Self {
            access_key: access_key.to_string(),
            nonce: nonce.to_string(),
            timestamp,
            signature: signature.to_string(),
            params,
        })
    }
}

fn required<'a>(headers: &'a HeaderMap, name: &str, missing: &'static str) -> Result<&'a str, AuthFailure> {
    let value = headers
        .get(name)
        .ok_or(AuthFailure::MalformedRequest(missing))?
        .to_str()
        .map_err(|_| AuthFailure::MalformedRequest("non-ascii auth header"))?
        .trim();
    if value.is_empty() {
        return Err(AuthFailure::MalformedRequest(missing));
    }
    Ok(value)
}

/// Whether a query parameter name collides with an auth field and is left out of the signature.
pub fn is_auth_field(name: &str) -> bool {
    [ACCESS_KEY_HEADER_NAME, NONCE_HEADER_NAME, TIMESTAMP_HEADER_NAME, SIGN_HEADER_NAME]
        .iter()
        .any(|field| field.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    fn full() -> HeaderMap {
        headers(&[("accesskey", "ak"), ("nonce", "n1"), ("timestamp", "1700000000"), ("sign", "abcd")])
    }

    #[test]
    fn test_extracts_all_fields() {
        let query = vec![("q".to_string(), "1".to_string()), ("Sign".to_string(), "x".to_string())];
        let ctx = SignatureContext::from_request(&full(), &query).unwrap();
        assert_eq!(ctx.access_key, "ak");
        assert_eq!(ctx.nonce, "n1");
        assert_eq!(ctx.timestamp, 1_700_000_000);
        assert_eq!(ctx.signature, "abcd");
        assert_eq!(ctx.params, vec![("q".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut map = HeaderMap::new();
        map.insert(axum::http::HeaderName::from_bytes(b"AccessKey").unwrap(), HeaderValue::from_static("ak"));
        map.insert("nonce", HeaderValue::from_static("n1"));
        map.insert("timestamp", HeaderValue::from_static("1"));
        map.insert("sign", HeaderValue::from_static("s"));
        assert!(SignatureContext::from_request(&map, &[]).is_ok());
    }

    #[test]
    fn test_missing_or_empty_header_is_malformed() {
        let mut map = full();
        map.remove("sign");
        let err = SignatureContext::from_request(&map, &[]).unwrap_err();
        assert_eq!(err, AuthFailure::MalformedRequest("missing sign"));

        let mut map = full();
        map.insert("nonce", HeaderValue::from_static(""));
        let err = SignatureContext::from_request(&map, &[]).unwrap_err();
        assert_eq!(err.reason(), "malformed-request");
    }

    #[test]
    fn test_non_numeric_timestamp_is_malformed() {
        let mut map = full();
        map.insert("timestamp", HeaderValue::from_static("yesterday"));
        let err = SignatureContext::from_request(&map, &[]).unwrap_err();
        assert_eq!(err.reason(), "malformed-request");
    }
}
