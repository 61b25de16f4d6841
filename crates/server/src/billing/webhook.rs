//! Payment provider webhook verification
//!
//! Header format: `Stripe-Signature: t=<unix seconds>,v1=<hex>`. The signed
//! payload is `"<t>." + raw body`, keyed with the endpoint secret. Checking and
//! decoding are done by `stripe::Webhook`; failures are mapped onto
//! [`Error::InvalidSignature`] and [`Error::InvalidPayload`].

use hmac::{Hmac, Mac};
use sha2::Sha256;
use stripe::{CheckoutSession, Event, EventType, Webhook, WebhookError};
use tracing::debug;

use crate::core::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Check the signature header against the raw body and decode the event.
///
/// Signatures older than five minutes are rejected.
pub fn verify_event(payload: &[u8], header: &str, secret: &str) -> Result<Event> {
    let payload = std::str::from_utf8(payload)
        .map_err(|_| Error::InvalidPayload("body is not UTF-8".to_string()))?;

    Webhook::construct_event(payload, header, secret).map_err(|err| match err {
        WebhookError::BadParse(e) => Error::InvalidPayload(e.to_string()),
        other => {
            debug!("Webhook verification failed: {}", other);
            Error::InvalidSignature
        }
    })
}

/// Wire name of an event type, e.g. `checkout.session.completed`
pub fn event_type_name(event_type: &EventType) -> String {
    match serde_json::to_value(event_type) {
        Ok(serde_json::Value::String(name)) => name,
        _ => format!("{:?}", event_type),
    }
}

/// User id tagged into the checkout session when it was created
pub fn checkout_user_id(session: &CheckoutSession) -> Result<i64> {
    let raw = session
        .metadata
        .as_ref()
        .and_then(|m| m.get("user_id"))
        .or(session.client_reference_id.as_ref())
        .ok_or_else(|| Error::InvalidPayload("missing metadata.user_id".to_string()))?;

    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidPayload(format!("bad metadata.user_id: {:?}", raw)))
}

/// Build a header the way the provider does; used by tests and local tooling
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Internal(format!("webhook signing key: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={},v1={}", timestamp, signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SECRET: &str = "whsec_test";

    fn customer_created() -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "object": "event",
            "api_version": null,
            "created": 1_700_000_000,
            "data": {
                "object": {
                    "id": "cus_1",
                    "object": "customer",
                    "created": 1_700_000_000,
                    "email": "a@b.com",
                    "livemode": false,
                    "metadata": {}
                }
            },
            "livemode": false,
            "pending_webhooks": 1,
            "request": { "id": null, "idempotency_key": null },
            "type": "customer.created"
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn accepts_a_fresh_valid_signature() {
        let body = customer_created();
        let header = sign_payload(&body, SECRET, Utc::now().timestamp()).unwrap();

        let event = verify_event(&body, &header, SECRET).unwrap();
        assert_eq!(event.id.to_string(), "evt_1");
        assert_eq!(event.type_, EventType::CustomerCreated);
        assert_eq!(event_type_name(&event.type_), "customer.created");
    }

    #[test]
    fn rejects_modified_body_wrong_secret_and_stale_timestamps() {
        let body = customer_created();
        let now = Utc::now().timestamp();
        let header = sign_payload(&body, SECRET, now).unwrap();

        let mut tampered = body.clone();
        tampered.extend_from_slice(b" ");
        assert!(matches!(
            verify_event(&tampered, &header, SECRET),
            Err(Error::InvalidSignature)
        ));
        assert!(matches!(
            verify_event(&body, &header, "whsec_other"),
            Err(Error::InvalidSignature)
        ));

        let stale = sign_payload(&body, SECRET, now - 301).unwrap();
        assert!(matches!(
            verify_event(&body, &stale, SECRET),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_malformed_headers() {
        let body = customer_created();
        for header in ["", "garbage", "t=abc,v1=00", "t=1", "v1=00"] {
            assert!(
                matches!(verify_event(&body, header, SECRET), Err(Error::InvalidSignature)),
                "{}",
                header
            );
        }
    }

    #[test]
    fn signed_non_events_are_invalid_payloads() {
        let bodies: [&[u8]; 2] = [b"not json", br#"{"hello":"world"}"#];
        for body in bodies {
            let header = sign_payload(body, SECRET, Utc::now().timestamp()).unwrap();
            assert!(matches!(
                verify_event(body, &header, SECRET),
                Err(Error::InvalidPayload(_))
            ));
        }
    }
}
