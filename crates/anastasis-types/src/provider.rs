//! provider catalog entities (spec §3, §4.C).

use crate::method::MethodType;
use serde::{Deserialize, Serialize};

/// one method a provider offers, with its per-use fee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMethodFee {
    #[serde(rename = "type")]
    pub method_type: MethodType,
    pub usage_fee: Money,
}

/// a currency-tagged amount, serialized the way the original wire
/// protocol writes amounts: `"CURRENCY:value.fraction"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Money {
    pub currency: [u8; 12],
    pub currency_len: u8,
    /// value in the smallest unit (matching Taler's fixed-point amounts).
    pub value: u64,
    pub fraction: u32,
}

impl Money {
    pub fn zero(currency: &str) -> Self {
        let mut buf = [0u8; 12];
        let len = currency.len().min(12);
        buf[..len].copy_from_slice(&currency.as_bytes()[..len]);
        Self {
            currency: buf,
            currency_len: len as u8,
            value: 0,
            fraction: 0,
        }
    }

    pub fn currency_str(&self) -> &str {
        std::str::from_utf8(&self.currency[..self.currency_len as usize]).unwrap_or("")
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0 && self.fraction == 0
    }

    pub fn checked_add(&self, other: &Money) -> Option<Money> {
        if self.currency_str() != other.currency_str() {
            return None;
        }
        const FRACTION_BASE: u64 = 1_000_000;
        let total_fraction = self.fraction as u64 + other.fraction as u64;
        let carry = total_fraction / FRACTION_BASE;
        Some(Money {
            currency: self.currency,
            currency_len: self.currency_len,
            value: self.value.checked_add(other.value)?.checked_add(carry)?,
            fraction: (total_fraction % FRACTION_BASE) as u32,
        })
    }

    /// partial order: `self <= other` only when both are in the same
    /// currency; mixed currencies compare as incomparable, matching
    /// the planner's cost-comparator semantics (§4.H step 6).
    pub fn le_same_currency(&self, other: &Money) -> Option<bool> {
        if self.currency_str() != other.currency_str() {
            return None;
        }
        Some((self.value, self.fraction) <= (other.value, other.fraction))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}.{:06}", self.currency_str(), self.value, self.fraction)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let (currency, rest) = s.split_once(':').ok_or_else(|| {
            serde::de::Error::custom(format!("malformed amount: {s:?}"))
        })?;
        let (value, fraction) = rest.split_once('.').unwrap_or((rest, "0"));
        let value: u64 = value.parse().map_err(serde::de::Error::custom)?;
        let fraction: u32 = format!("{:0<6}", &fraction[..fraction.len().min(6)])
            .parse()
            .map_err(serde::de::Error::custom)?;
        let mut buf = [0u8; 12];
        let len = currency.len().min(12);
        buf[..len].copy_from_slice(&currency.as_bytes()[..len]);
        Ok(Money {
            currency: buf,
            currency_len: len as u8,
            value,
            fraction,
        })
    }
}

/// a single provider's `/config` answer, cached per session (§3, §4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: String,
    pub currency: String,
    pub business_name: String,
    pub methods: Vec<ProviderMethodFee>,
    pub storage_limit_in_megabytes: u32,
    pub annual_fee: Money,
    pub truth_upload_fee: Money,
    pub liability_limit: Money,
    pub salt: [u8; 32],
    /// `current:revision:age` version triple the server announces.
    pub version: VersionInfo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VersionInfo {
    pub current: u32,
    pub revision: u32,
    pub age: u32,
}

/// the implementation's own protocol version, compared against a
/// provider's announced `VersionInfo` to decide compatibility.
pub const CURRENT_PROTOCOL_VERSION: VersionInfo = VersionInfo {
    current: 1,
    revision: 0,
    age: 0,
};

impl VersionInfo {
    /// compatible if the provider's `current` matches ours, or is
    /// within `age` revisions behind (standard libtool-style check).
    pub fn compatible_with(&self, ours: &VersionInfo) -> bool {
        if self.current == ours.current {
            return true;
        }
        self.current < ours.current && (ours.current - self.current) <= self.age
    }
}

/// outcome of probing one provider's `/config` endpoint (§4.C).
#[derive(Debug, Clone)]
pub enum CatalogEntry {
    Ok(ProviderConfig),
    InvalidConfig { url: String, reason: String },
    Timeout { url: String },
    Offline { url: String, http_status: u16 },
}

impl CatalogEntry {
    pub fn url(&self) -> &str {
        match self {
            CatalogEntry::Ok(c) => &c.url,
            CatalogEntry::InvalidConfig { url, .. }
            | CatalogEntry::Timeout { url }
            | CatalogEntry::Offline { url, .. } => url,
        }
    }

    pub fn config(&self) -> Option<&ProviderConfig> {
        match self {
            CatalogEntry::Ok(c) => Some(c),
            _ => None,
        }
    }
}

/// an opaque 32-byte order identifier extracted from a `taler://pay/...`
/// URI (§3, §6); replayed via `Anastasis-Payment-Identifier` to claim
/// a paid write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaymentSecret(pub [u8; 32]);

impl PaymentSecret {
    pub fn to_crockford(&self) -> String {
        crate::crockford::encode(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_roundtrips() {
        let m = Money {
            currency: {
                let mut b = [0u8; 12];
                b[..3].copy_from_slice(b"KUD");
                b
            },
            currency_len: 3,
            value: 42,
            fraction: 500_000,
        };
        let s = serde_json::to_string(&m).unwrap();
        let back: Money = serde_json::from_str(&s).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn money_mixed_currency_is_incomparable() {
        let a = Money::zero("KUDOS");
        let b = Money::zero("EUR");
        assert_eq!(a.le_same_currency(&b), None);
    }

    #[test]
    fn version_compatibility() {
        let ours = CURRENT_PROTOCOL_VERSION;
        let theirs = VersionInfo { current: 0, revision: 3, age: 2 };
        assert!(theirs.compatible_with(&ours));
        let too_old = VersionInfo { current: 0, revision: 0, age: 0 };
        assert!(!too_old.compatible_with(&ours));
    }
}
