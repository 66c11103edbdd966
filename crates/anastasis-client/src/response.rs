//! typed response variants for the four provider endpoints of §4.B.
//! every variant carries the fields a caller needs to proceed without
//! re-parsing raw HTTP.

use anastasis_types::{PaymentSecret, ProviderConfig};

/// `GET /config`
#[derive(Debug, Clone)]
pub enum ConfigResult {
    Ok(ProviderConfig),
    Timeout,
    Malformed(String),
    /// a well-formed body arrived on a non-2xx status; carries the
    /// real HTTP status so callers (the catalog's `Offline` entry,
    /// §3) don't lose it.
    HttpError { status: u16 },
    TransportError(String),
}

/// `GET /policy/{account_pub}[?version=N]`
#[derive(Debug, Clone)]
pub enum PolicyGetResult {
    Ok {
        body: Vec<u8>,
        version: u32,
        signature: Vec<u8>,
    },
    NotModified,
    UnknownAccount,
    Gone,
    ServerError { http_status: u16 },
    TransportError(String),
}

/// `POST /policy/{account_pub}`
#[derive(Debug, Clone)]
pub enum PolicyPostResult {
    Ok { version: u32, expiration: u64 },
    Unchanged,
    PaymentRequired { pay_uri: String, payment_secret: PaymentSecret },
    TooLarge,
    ServerError { http_status: u16 },
    TransportError(String),
}

/// `GET /truth/{uuid}[?response=H&timeout_ms=T]`
#[derive(Debug, Clone)]
pub enum TruthGetResult {
    Ok { encrypted_key_share: Vec<u8> },
    ExternalInstructions(serde_json::Value),
    Redirect(String),
    PaymentRequired { pay_uri: String, payment_secret: PaymentSecret },
    ChallengeInstructions { body: Vec<u8>, mime: Option<String>, http_status: u16 },
    UnknownTruth,
    AuthTimeout,
    RateLimited,
    PreconditionFailed,
    ServerError { http_status: u16 },
    TransportError(String),
}

/// `POST /truth/{uuid}`
#[derive(Debug, Clone)]
pub enum TruthPostResult {
    Ok,
    PaymentRequired { pay_uri: String, payment_secret: PaymentSecret },
    Conflict,
    TooLarge,
    ServerError { http_status: u16 },
    TransportError(String),
}

/// parse a `taler[+http]://pay/<merchant-host>/<order-id>/...` URI and
/// extract the binary payment secret from its order-id (§6).
pub fn parse_payment_uri(uri: &str) -> Option<PaymentSecret> {
    let after_scheme = uri.splitn(2, "://").nth(1)?;
    let mut segments = after_scheme.splitn(3, '/').skip(1);
    segments.next()?; // merchant-host
    let order_id = segments.next()?;
    let bytes = anastasis_types::crockford::decode(order_id).ok()?;
    let arr: [u8; 32] = bytes.try_into().ok()?;
    Some(PaymentSecret(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_payment_uri() {
        let secret = PaymentSecret([7u8; 32]);
        let order_id = secret.to_crockford();
        let uri = format!("taler+http://pay/merchant.example/{order_id}/details");
        let parsed = parse_payment_uri(&uri).unwrap();
        assert_eq!(parsed.0, secret.0);
    }

    #[test]
    fn rejects_malformed_uri() {
        assert!(parse_payment_uri("not-a-uri").is_none());
    }
}
