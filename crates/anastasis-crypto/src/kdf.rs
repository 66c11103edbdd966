//! key derivation: argon2id for the user identifier (stretching
//! low-entropy identity attributes against a per-provider salt), hkdf
//! for everything downstream of a 32-byte high-entropy secret.

use crate::error::{Error, Result};
use argon2::{Argon2, Params, Version};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// argon2id parameters, tuned the same way as the grounding repo's
/// PIN-stretch (16 MiB, 32 iterations, single lane) since identity
/// attributes are comparably low entropy to a PIN.
const ARGON2_M_COST: u32 = 16 * 1024;
const ARGON2_T_COST: u32 = 32;
const ARGON2_P_COST: u32 = 1;
const USER_ID_LEN: usize = 32;

/// `derive_user_identifier(attrs, provider_salt) -> id32` (§4.A).
///
/// domain-separates `attrs` from `provider_salt` by hashing the
/// canonical attribute bytes with a fixed domain prefix before
/// stretching, so the same attributes at two providers with
/// different salts produce unlinkable identifiers (§8 property 1).
pub fn derive_user_identifier(attrs_canonical: &[u8], provider_salt: &[u8; 32]) -> Result<[u8; 32]> {
    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(USER_ID_LEN))
        .map_err(|e| Error::KdfFailed(e.to_string()))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let mut password = Vec::with_capacity(attrs_canonical.len() + 32);
    password.extend_from_slice(b"anastasis:user-identifier:v1:");
    password.extend_from_slice(attrs_canonical);

    let mut out = [0u8; USER_ID_LEN];
    argon2
        .hash_password_into(&password, provider_salt, &mut out)
        .map_err(|e| Error::KdfFailed(e.to_string()))?;
    Ok(out)
}

/// expand a 32-byte high-entropy secret into a 32-byte key for a
/// given purpose, via hkdf-sha256. used for every key derived from
/// the user identifier, a truth key, or a recovered seed.
pub fn hkdf_expand_32(ikm: &[u8], info: &[u8]) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut out = [0u8; 32];
    hk.expand(info, &mut out)
        .map_err(|e| Error::KeyDerivationFailed(e.to_string()))?;
    Ok(out)
}

/// hmac-sha256 tag, truncated by the caller as needed.
pub fn hmac_sha256(key: &[u8], data: &[&[u8]]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    for d in data {
        mac.update(d);
    }
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn different_salts_give_unlinkable_identifiers() {
        let attrs = b"full_name=John Smith\nbirthdate=2000-01-01\n";
        let salt1 = [1u8; 32];
        let salt2 = [2u8; 32];
        let id1 = derive_user_identifier(attrs, &salt1).unwrap();
        let id2 = derive_user_identifier(attrs, &salt2).unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn same_inputs_are_deterministic() {
        let attrs = b"a=b\n";
        let salt = [3u8; 32];
        assert_eq!(
            derive_user_identifier(attrs, &salt).unwrap(),
            derive_user_identifier(attrs, &salt).unwrap()
        );
    }
}
