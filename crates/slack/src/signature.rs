//! Slack request signing (`X-Slack-Signature`, `v0` scheme).

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

const VERSION: &str = "v0";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("request timestamp `{0}` is not a unix timestamp")]
    InvalidTimestamp(String),
    #[error("request timestamp is {age_secs}s away from now")]
    Stale { age_secs: i64 },
    #[error("signature mismatch")]
    Mismatch,
}

pub struct SignatureVerifier {
    signing_secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(signing_secret: SecretString) -> Self {
        Self { signing_secret }
    }

    /// Checks a request against its headers; `now` is unix seconds.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

        let sent_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_string()))?;
        let age_secs = now - sent_at;
        if age_secs.abs() > MAX_CLOCK_SKEW_SECS {
            return Err(SignatureError::Stale { age_secs });
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(|digest| hex::decode(digest).ok())
            .ok_or(SignatureError::Mismatch)?;

        let mac = self.mac(timestamp.trim(), body)?;
        mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(format!("{VERSION}:{timestamp}:").as_bytes());
        mac.update(body);
        Ok(mac)
    }
}

/// Produces the `X-Slack-Signature` value Slack would send for this request.
pub fn compute_signature(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let verifier = SignatureVerifier::new(SecretString::from(signing_secret.to_string()));
    match verifier.mac(timestamp, body) {
        Ok(mac) => format!("{VERSION}={}", hex::encode(mac.finalize().into_bytes())),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{compute_signature, SignatureError, SignatureVerifier};

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const NOW: i64 = 1_531_420_618;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SecretString::from(SECRET.to_string()))
    }

    #[test]
    fn matches_slack_documentation_example() {
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let signature = "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503";

        assert_eq!(compute_signature(SECRET, "1531420618", body), signature);
        assert_eq!(verifier().verify(Some("1531420618"), Some(signature), body, NOW), Ok(()));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let signature = compute_signature(SECRET, "1531420618", b"payload=original");

        let result =
            verifier().verify(Some("1531420618"), Some(&signature), b"payload=tampered", NOW);

        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn stale_request_is_rejected() {
        let signature = compute_signature(SECRET, "1531420618", b"body");

        let result = verifier().verify(Some("1531420618"), Some(&signature), b"body", NOW + 301);

        assert_eq!(result, Err(SignatureError::Stale { age_secs: 301 }));
    }

    #[test]
    fn missing_headers_are_reported() {
        assert_eq!(
            verifier().verify(None, Some("v0=00"), b"", NOW),
            Err(SignatureError::MissingHeader("x-slack-request-timestamp"))
        );
        assert_eq!(
            verifier().verify(Some("1531420618"), None, b"", NOW),
            Err(SignatureError::MissingHeader("x-slack-signature"))
        );
        assert!(matches!(
            verifier().verify(Some("yesterday"), Some("v0=00"), b"", NOW),
            Err(SignatureError::InvalidTimestamp(_))
        ));
    }
}
