//! Webhook adapter: signature check and `{event, instance, data}` framing.

use super::IngestError;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use hybridflow_core::{config::EvolutionConfig, event::Envelope};
use serde_json::Value;
use sha2::Sha256;

/// Headers that may carry the body signature, in lookup order.
pub const SIGNATURE_HEADERS: [&str; 2] = ["x-evolution-signature", "x-webhook-signature"];

/// Verify an HMAC-SHA256 signature over the raw body.
///
/// Accepts `sha256=<hex>` or bare hex. Comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let digest_hex = signature.trim();
    let digest_hex = digest_hex.strip_prefix("sha256=").unwrap_or(digest_hex);
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Hex HMAC-SHA256 of `body`, as a sender would put it in the header.
#[cfg(test)]
pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Check framing and signature, then parse the body into an envelope.
///
/// Signatures are enforced only once a non-default secret is configured.
pub fn admit(
    config: &EvolutionConfig,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Envelope, IngestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(IngestError::EmptyBody);
    }

    if config.signature_required() {
        let signature = SIGNATURE_HEADERS
            .iter()
            .find_map(|name| headers.get(*name))
            .and_then(|v| v.to_str().ok())
            .ok_or(IngestError::InvalidSignature)?;
        if !verify_signature(&config.webhook_secret, body, signature) {
            return Err(IngestError::InvalidSignature);
        }
    }

    parse_envelope(body)
}

/// Parse `{event, instance, data}`. A missing `data` reads as null.
pub fn parse_envelope(body: &[u8]) -> Result<Envelope, IngestError> {
    let mut payload: Value =
        serde_json::from_slice(body).map_err(|e| IngestError::InvalidJson(e.to_string()))?;

    let event = required_str(&payload, "event")?;
    let instance = required_str(&payload, "instance")?;
    let data = payload
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null);

    Ok(Envelope::new(&event, instance, data))
}

fn required_str(payload: &Value, field: &'static str) -> Result<String, IngestError> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or(IngestError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use hybridflow_core::event::EventKind;

    const BODY: &[u8] =
        br#"{"event":"messages.upsert","instance":"demo","data":{"key":{"id":"M1"}}}"#;

    fn secured() -> EvolutionConfig {
        EvolutionConfig {
            webhook_secret: "s3cret".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_verify_signature_formats() {
        let sig = sign("s3cret", BODY).unwrap();
        assert!(verify_signature("s3cret", BODY, &sig));
        assert!(verify_signature("s3cret", BODY, &format!("sha256={sig}")));
        assert!(!verify_signature("other", BODY, &sig));
        assert!(!verify_signature("s3cret", b"tampered", &sig));
        assert!(!verify_signature("s3cret", BODY, "not-hex"));
    }

    #[test]
    fn test_default_secret_skips_verification() {
        let config = EvolutionConfig::default();
        let envelope = admit(&config, &HeaderMap::new(), BODY).unwrap();
        assert_eq!(envelope.kind, EventKind::MessagesUpsert);
        assert_eq!(envelope.instance, "demo");
    }

    #[test]
    fn test_configured_secret_is_enforced() {
        let config = secured();
        assert_eq!(
            admit(&config, &HeaderMap::new(), BODY).unwrap_err(),
            IngestError::InvalidSignature
        );

        let mut headers = HeaderMap::new();
        headers.insert("x-webhook-signature", HeaderValue::from_static("sha256=00"));
        assert_eq!(
            admit(&config, &headers, BODY).unwrap_err(),
            IngestError::InvalidSignature
        );

        let mut headers = HeaderMap::new();
        let sig = format!("sha256={}", sign("s3cret", BODY).unwrap());
        headers.insert("x-evolution-signature", HeaderValue::from_str(&sig).unwrap());
        assert!(admit(&config, &headers, BODY).is_ok());
    }

    #[test]
    fn test_framing_errors() {
        let config = EvolutionConfig::default();
        let headers = HeaderMap::new();
        assert_eq!(admit(&config, &headers, b"").unwrap_err(), IngestError::EmptyBody);
        assert_eq!(admit(&config, &headers, b"  \n").unwrap_err(), IngestError::EmptyBody);
        assert!(matches!(
            admit(&config, &headers, b"{not json").unwrap_err(),
            IngestError::InvalidJson(_)
        ));
        assert_eq!(
            admit(&config, &headers, br#"{"instance":"demo"}"#).unwrap_err(),
            IngestError::MissingField("event")
        );
        assert_eq!(
            admit(&config, &headers, br#"{"event":"messages.upsert","instance":""}"#)
                .unwrap_err(),
            IngestError::MissingField("instance")
        );
    }

    #[test]
    fn test_missing_data_is_null() {
        let envelope = parse_envelope(br#"{"event":"CONNECTION_UPDATE","instance":"demo"}"#).unwrap();
        assert_eq!(envelope.kind, EventKind::ConnectionUpdate);
        assert!(envelope.data.is_null());
    }
}
