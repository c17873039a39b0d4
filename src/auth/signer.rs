//! Canonical request representation and HMAC-SHA256 signing.
//!
//! The canonical string is every `key=value` pair (the three signed auth
//! fields plus the request parameters) form-urlencoded, stably sorted by key
//! and joined with `&`. Signer and verifier must build it identically.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::form_urlencoded;

use crate::auth::context::{ACCESS_KEY_HEADER_NAME, NONCE_HEADER_NAME, TIMESTAMP_HEADER_NAME};

type HmacSha256 = Hmac<Sha256>;

/// Build the canonical string signed by clients.
pub fn canonical_string(access_key: &str, nonce: &str, timestamp: i64, params: &[(String, String)]) -> String {
    let timestamp = timestamp.to_string();
    let mut pairs: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 3);
    pairs.push((ACCESS_KEY_HEADER_NAME, access_key));
    pairs.push((NONCE_HEADER_NAME, nonce));
    pairs.push((TIMESTAMP_HEADER_NAME, &timestamp));
    pairs.extend(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    // Stable: repeated keys keep their arrival order.
    pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.extend_pairs(pairs);
    serializer.finish()
}

/// Raw HMAC-SHA256 digest of `message` under `secret`.
pub fn digest(secret: &[u8], message: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Produce the lowercase hex `sign` header value for a request.
pub fn sign(secret: &[u8], access_key: &str, nonce: &str, timestamp: i64, params: &[(String, String)]) -> String {
    hex::encode(digest(secret, &canonical_string(access_key, nonce, timestamp, params)))
}
