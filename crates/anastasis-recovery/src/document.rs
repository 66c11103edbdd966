//! download and decode the recovery document: §4.F steps 1-2.

use crate::error::RecoveryFailure;
use anastasis_types::RecoveryDocument;
use std::io::Read;

/// refuse to inflate more than this many plaintext bytes, as a
/// decompression-bomb guard; well above any realistic document.
const MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

/// decrypt, validate the length prefix, inflate, and parse one
/// recovery document's wire bytes (§3, §6).
pub fn decode_recovery_document(ciphertext: &[u8], id32: &[u8; 32]) -> Result<RecoveryDocument, RecoveryFailure> {
    let framed = anastasis_crypto::decrypt_recovery_document(id32, ciphertext)
        .map_err(|_| RecoveryFailure::BadCompression)?;

    if framed.len() < 4 {
        return Err(RecoveryFailure::BadCompression);
    }
    let declared_len = u32::from_be_bytes(framed[0..4].try_into().unwrap()) as usize;
    if declared_len > MAX_DOCUMENT_BYTES {
        return Err(RecoveryFailure::DocumentTooBig);
    }

    let mut decoder = flate2::read::DeflateDecoder::new(&framed[4..]);
    let mut plaintext = Vec::with_capacity(declared_len.min(MAX_DOCUMENT_BYTES));
    let mut limited = (&mut decoder).take((MAX_DOCUMENT_BYTES + 1) as u64);
    limited.read_to_end(&mut plaintext).map_err(|_| RecoveryFailure::BadCompression)?;
    if plaintext.len() > MAX_DOCUMENT_BYTES {
        return Err(RecoveryFailure::DocumentTooBig);
    }

    let value: serde_json::Value = serde_json::from_slice(&plaintext).map_err(|_| RecoveryFailure::NotJson)?;
    serde_json::from_value(value).map_err(|_| RecoveryFailure::MalformedJson)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn frame(json: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(json).unwrap();
        let compressed = encoder.finish().unwrap();
        let mut framed = Vec::new();
        framed.extend_from_slice(&(json.len() as u32).to_be_bytes());
        framed.extend_from_slice(&compressed);
        framed
    }

    #[test]
    fn round_trips_a_minimal_document() {
        let id32 = [7u8; 32];
        let doc = RecoveryDocument {
            secret_name: None,
            policies: vec![],
            escrow_methods: vec![],
            encrypted_core_secret: vec![1, 2, 3],
        };
        let json = serde_json::to_vec(&doc).unwrap();
        let framed = frame(&json);
        let ciphertext = anastasis_crypto::encrypt_recovery_document(&id32, &framed).unwrap();

        let decoded = decode_recovery_document(&ciphertext, &id32).unwrap();
        assert_eq!(decoded.encrypted_core_secret, doc.encrypted_core_secret);
    }

    #[test]
    fn rejects_ciphertext_from_a_different_identifier() {
        let id32 = [7u8; 32];
        let other = [8u8; 32];
        let framed = frame(b"{}");
        let ciphertext = anastasis_crypto::encrypt_recovery_document(&id32, &framed).unwrap();
        assert!(decode_recovery_document(&ciphertext, &other).is_err());
    }

    #[test]
    fn rejects_non_json_plaintext() {
        let id32 = [7u8; 32];
        let framed = frame(b"not json at all");
        let ciphertext = anastasis_crypto::encrypt_recovery_document(&id32, &framed).unwrap();
        assert_eq!(decode_recovery_document(&ciphertext, &id32), Err(RecoveryFailure::NotJson));
    }
}
