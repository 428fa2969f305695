use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `query_string` keyed with the API secret, hex encoded.
///
/// The query string must already contain the `timestamp` parameter and be
/// byte-identical to what is sent on the wire.
pub fn sign_request(secret: &str, query_string: &str) -> Result<String, ApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::InvalidRequest(format!("bad signing key: {}", e)))?;
    mac.update(query_string.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
