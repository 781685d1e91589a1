//! Text encodings used by the anonymity family.
//!
//! Short forms use lowercase, unpadded RFC 4648 base32. Long forms use base64
//! with the anonymity network's alphabet, which swaps `+/` for `-~`.

use base64::Engine;
use base64::alphabet::Alphabet;
use base64::engine::GeneralPurpose;
use base64::engine::general_purpose::PAD;
use data_encoding::BASE32_NOPAD;

const GARLIC_ALPHABET: Alphabet =
    match Alphabet::new("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-~") {
        Ok(alphabet) => alphabet,
        Err(_) => panic!("garlic base64 alphabet is valid"),
    };

const GARLIC_BASE64: GeneralPurpose = GeneralPurpose::new(&GARLIC_ALPHABET, PAD);

/// Encode bytes as lowercase unpadded base32.
pub fn base32_encode(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes).to_ascii_lowercase()
}

/// Decode lowercase (or uppercase) unpadded base32.
pub fn base32_decode(text: &str) -> Option<Vec<u8>> {
    BASE32_NOPAD.decode(text.to_ascii_uppercase().as_bytes()).ok()
}

/// Encode bytes with the anonymity network's base64 alphabet.
pub fn base64_encode(bytes: &[u8]) -> String {
    GARLIC_BASE64.encode(bytes)
}

/// Decode the anonymity network's base64 alphabet.
pub fn base64_decode(text: &str) -> Option<Vec<u8>> {
    GARLIC_BASE64.decode(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base32_known_vector() {
        assert_eq!(base32_encode(b"foobar"), "mzxw6ytboi");
        assert_eq!(base32_decode("mzxw6ytboi").unwrap(), b"foobar");
        assert_eq!(base32_decode("MZXW6YTBOI").unwrap(), b"foobar");
        assert_eq!(base32_encode(&[0u8; 32]), "a".repeat(52));
    }

    #[test]
    fn test_base64_uses_garlic_alphabet() {
        let encoded = base64_encode(&[0xfb, 0xff, 0xfe]);
        assert_eq!(encoded, "-~~-");
        assert_eq!(base64_decode(&encoded).unwrap(), vec![0xfb, 0xff, 0xfe]);
        assert!(base64_decode("+/+/").is_none());
    }

    #[test]
    fn test_base32_rejects_padding_and_junk() {
        assert!(base32_decode("mzxw6ytboi======").is_none());
        assert!(base32_decode("m1").is_none());
    }
}
