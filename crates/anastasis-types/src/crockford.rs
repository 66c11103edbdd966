//! crockford base32 encoding
//!
//! the wire protocol (see spec §6) encodes every byte string as
//! crockford base32 rather than the base64/hex the rest of the
//! ecosystem favors, so it gets its own small encoder/decoder instead
//! of pulling in a crate for a 32-symbol alphabet.

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// encode bytes as crockford base32, no padding.
pub fn encode(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits_in_buffer = 0u32;

    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits_in_buffer += 8;
        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let idx = (buffer >> bits_in_buffer) & 0x1f;
            out.push(ALPHABET[idx as usize] as char);
        }
    }
    if bits_in_buffer > 0 {
        let idx = (buffer << (5 - bits_in_buffer)) & 0x1f;
        out.push(ALPHABET[idx as usize] as char);
    }
    out
}

/// decode crockford base32 back into bytes.
///
/// accepts the common human transcription substitutions (`O`->`0`,
/// `I`/`L`->`1`) and is case-insensitive, matching what users actually
/// type when copying a payment order-id or recovery uuid by hand.
pub fn decode(s: &str) -> Result<Vec<u8>, DecodeError> {
    let mut buffer: u32 = 0;
    let mut bits_in_buffer = 0u32;
    let mut out = Vec::with_capacity(s.len() * 5 / 8 + 1);

    for ch in s.chars() {
        if ch == '-' || ch == ' ' {
            continue;
        }
        let normalized = match ch.to_ascii_uppercase() {
            'O' => '0',
            'I' | 'L' => '1',
            c => c,
        };
        let value = ALPHABET
            .iter()
            .position(|&c| c as char == normalized)
            .ok_or(DecodeError::InvalidChar(ch))? as u32;

        buffer = (buffer << 5) | value;
        bits_in_buffer += 5;
        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            out.push(((buffer >> bits_in_buffer) & 0xff) as u8);
        }
    }
    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid crockford base32 character: {0:?}")]
    InvalidChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_various_lengths() {
        for len in 0..40 {
            let data: Vec<u8> = (0..len as u8).collect();
            let encoded = encode(&data);
            let decoded = decode(&encoded).unwrap();
            assert_eq!(data, decoded, "len={len}");
        }
    }

    #[test]
    fn accepts_transcription_substitutions() {
        let data = b"hello world, this is a test payload";
        let encoded = encode(data);
        let messy: String = encoded
            .chars()
            .map(|c| if c == '0' { 'O' } else { c })
            .collect();
        assert_eq!(decode(&messy).unwrap(), data);
    }
}
