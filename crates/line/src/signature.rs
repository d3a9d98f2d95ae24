use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing X-Line-Signature header")]
    Missing,
    #[error("X-Line-Signature is not valid base64")]
    Malformed,
    #[error("X-Line-Signature does not match the request body")]
    Mismatch,
    #[error("channel secret cannot be used as an HMAC key")]
    InvalidSecret,
}

/// Checks `signature` against base64(HMAC-SHA256(channel_secret, body)).
///
/// `body` must be the raw request bytes exactly as received.
pub fn verify_signature(
    channel_secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), SignatureError> {
    let signature = signature.map(str::trim).filter(|value| !value.is_empty());
    let Some(signature) = signature else {
        return Err(SignatureError::Missing);
    };
    let expected = STANDARD.decode(signature).map_err(|_| SignatureError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(body);
    // constant-time comparison
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

/// Signature LINE would send for `body`. Used by tests and local tooling.
pub fn compute_signature(channel_secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(body);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::{compute_signature, verify_signature, SignatureError};

    const SECRET: &str = "channel-secret";
    const BODY: &[u8] = br#"{"destination":"U0","events":[]}"#;

    #[test]
    fn matching_signature_is_accepted() {
        let signature = compute_signature(SECRET, BODY).expect("sign");

        assert_eq!(verify_signature(SECRET, BODY, Some(&signature)), Ok(()));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let signature = compute_signature(SECRET, BODY).expect("sign");

        let result = verify_signature(SECRET, br#"{"destination":"U0","events":[{}]}"#, Some(&signature));

        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let signature = compute_signature("other-secret", BODY).expect("sign");

        assert_eq!(verify_signature(SECRET, BODY, Some(&signature)), Err(SignatureError::Mismatch));
    }

    #[test]
    fn missing_and_malformed_headers_are_distinguished() {
        assert_eq!(verify_signature(SECRET, BODY, None), Err(SignatureError::Missing));
        assert_eq!(verify_signature(SECRET, BODY, Some("  ")), Err(SignatureError::Missing));
        assert_eq!(
            verify_signature(SECRET, BODY, Some("not base64!")),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn known_vector_matches() {
        // echo -n 'hello' | openssl dgst -sha256 -hmac 'secret' -binary | base64
        assert_eq!(
            compute_signature("secret", b"hello").expect("sign"),
            "iKqz7ejTrflNJquQ07r9SiCDBww7zOnAFO4EpEOEfAs="
        );
    }
}
