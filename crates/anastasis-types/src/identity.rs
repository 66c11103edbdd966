//! identity attributes (spec §3): collected per country schema, used
//! only as KDF input, never persisted to a server.

use std::collections::BTreeMap;

/// a mapping from attribute name to string value. `BTreeMap` so that
/// serialization order — and therefore the KDF input bytes — is
/// deterministic regardless of insertion order.
pub type IdentityAttributes = BTreeMap<String, String>;

/// canonical byte encoding fed to `derive_user_identifier`: each
/// `key=value` pair newline-joined in sorted key order. deterministic
/// given a `BTreeMap`.
pub fn canonical_bytes(attrs: &IdentityAttributes) -> Vec<u8> {
    let mut buf = Vec::new();
    for (k, v) in attrs {
        buf.extend_from_slice(k.as_bytes());
        buf.push(b'=');
        buf.extend_from_slice(v.as_bytes());
        buf.push(b'\n');
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_bytes_independent_of_insertion_order() {
        let mut a = IdentityAttributes::new();
        a.insert("full_name".into(), "John Smith".into());
        a.insert("birthdate".into(), "2000-01-01".into());

        let mut b = IdentityAttributes::new();
        b.insert("birthdate".into(), "2000-01-01".into());
        b.insert("full_name".into(), "John Smith".into());

        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }
}
