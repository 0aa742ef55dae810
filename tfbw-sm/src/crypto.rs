//! EncString handling for Secrets Manager fields.
//!
//! Every user-visible field (project names, secret keys, values and notes)
//! travels as an EncString of type 2, `2.{iv}|{data}|{mac}`:
//! AES-256-CBC with PKCS#7 padding, then HMAC-SHA256 over `iv || data`.
//! Keys are 64 bytes, `[enc_key: 32 | mac_key: 32]`.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::SmApiError;

type HmacSha256 = Hmac<Sha256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// 64-byte symmetric key (organisation key or token key).
pub type Key64 = Zeroizing<[u8; 64]>;

/// Decrypt the organisation key carried in the login `encrypted_payload`.
///
/// The payload decrypts to `{"encryptionKey":"<base64 64 bytes>"}`.
pub fn decrypt_org_key(encrypted_payload: &str, token_enc_key: &[u8; 64]) -> Result<Key64, SmApiError> {
    let payload_bytes = decrypt_enc_string(encrypted_payload, token_enc_key)?;

    #[derive(Deserialize)]
    struct Payload {
        #[serde(rename = "encryptionKey")]
        encryption_key: String,
    }

    let payload: Payload = serde_json::from_slice(&payload_bytes)
        .map_err(|e| SmApiError::Crypto(format!("payload JSON parse: {e}")))?;
    let encoded = Zeroizing::new(payload.encryption_key);

    let key_bytes = Zeroizing::new(
        B64.decode(encoded.as_bytes())
            .map_err(|e| SmApiError::Crypto(format!("org key base64: {e}")))?,
    );
    if key_bytes.len() != 64 {
        return Err(SmApiError::Crypto(format!(
            "org key must be 64 bytes, got {}",
            key_bytes.len()
        )));
    }

    let mut key = Zeroizing::new([0u8; 64]);
    key.copy_from_slice(&key_bytes);
    Ok(key)
}

pub fn decrypt_enc_string(enc: &str, key64: &[u8; 64]) -> Result<Zeroizing<Vec<u8>>, SmApiError> {
    let body = enc
        .strip_prefix("2.")
        .ok_or_else(|| SmApiError::Crypto("unsupported EncString type (expected '2.')".to_string()))?;

    let mut parts = body.split('|');
    let (Some(iv_b64), Some(data_b64), Some(mac_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SmApiError::Crypto(
            "EncString type 2 must have 3 pipe-separated parts".to_string(),
        ));
    };

    let iv = B64
        .decode(iv_b64)
        .map_err(|e| SmApiError::Crypto(format!("EncString IV base64: {e}")))?;
    let data = B64
        .decode(data_b64)
        .map_err(|e| SmApiError::Crypto(format!("EncString data base64: {e}")))?;
    let mac = B64
        .decode(mac_b64)
        .map_err(|e| SmApiError::Crypto(format!("EncString MAC base64: {e}")))?;

    if iv.len() != 16 {
        return Err(SmApiError::Crypto("EncString IV must be 16 bytes".to_string()));
    }
    if mac.len() != 32 {
        return Err(SmApiError::Crypto("EncString MAC must be 32 bytes".to_string()));
    }

    let (enc_key, mac_key) = key64.split_at(32);

    // MAC before decrypt.
    let mut hmac = HmacSha256::new_from_slice(mac_key)
        .map_err(|e| SmApiError::Crypto(format!("HMAC key: {e}")))?;
    hmac.update(&iv);
    hmac.update(&data);
    hmac.verify_slice(&mac)
        .map_err(|_| SmApiError::Crypto("EncString MAC verification failed".to_string()))?;

    let mut buf = Zeroizing::new(data);
    let plaintext = Aes256CbcDec::new_from_slices(enc_key, &iv)
        .map_err(|e| SmApiError::Crypto(format!("AES key/IV: {e}")))?
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| SmApiError::Crypto(format!("AES decrypt: {e}")))?;

    Ok(Zeroizing::new(plaintext.to_vec()))
}

/// Encrypt `plaintext` into a type-2 EncString with a fresh random IV.
pub fn encrypt_enc_string(plaintext: &[u8], key64: &[u8; 64]) -> Result<String, SmApiError> {
    use rand::RngCore;

    let mut iv = [0u8; 16];
    rand::rng().fill_bytes(&mut iv);
    encrypt_with_iv(plaintext, key64, &iv)
}

fn encrypt_with_iv(plaintext: &[u8], key64: &[u8; 64], iv: &[u8; 16]) -> Result<String, SmApiError> {
    let (enc_key, mac_key) = key64.split_at(32);

    let pad_len = 16 - (plaintext.len() % 16);
    let mut buf = Zeroizing::new(vec![0u8; plaintext.len() + pad_len]);
    buf[..plaintext.len()].copy_from_slice(plaintext);

    let ciphertext = Aes256CbcEnc::new_from_slices(enc_key, iv)
        .map_err(|e| SmApiError::Crypto(format!("AES key/IV: {e}")))?
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .map_err(|e| SmApiError::Crypto(format!("AES encrypt: {e}")))?
        .to_vec();

    let mut hmac = HmacSha256::new_from_slice(mac_key)
        .map_err(|e| SmApiError::Crypto(format!("HMAC key: {e}")))?;
    hmac.update(iv);
    hmac.update(&ciphertext);
    let mac = hmac.finalize().into_bytes();

    Ok(format!(
        "2.{}|{}|{}",
        B64.encode(iv),
        B64.encode(&ciphertext),
        B64.encode(mac)
    ))
}

/// Decrypt an optional EncString field; absent or empty yields `""`.
pub fn decrypt_field_opt(enc: Option<&str>, key64: &[u8; 64]) -> Result<Zeroizing<String>, SmApiError> {
    match enc {
        None | Some("") => Ok(Zeroizing::new(String::new())),
        Some(s) => {
            let bytes = decrypt_enc_string(s, key64)?;
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|e| SmApiError::Crypto(format!("UTF-8 decode: {e}")))?;
            Ok(Zeroizing::new(text))
        }
    }
}

pub fn decrypt_field(enc: &str, key64: &[u8; 64]) -> Result<String, SmApiError> {
    decrypt_field_opt(Some(enc), key64).map(|s| s.as_str().to_string())
}

/// HKDF-Expand (RFC 5869) with HMAC-SHA256.
pub(crate) fn hkdf_expand_sha256(
    prk: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, SmApiError> {
    use hkdf::Hkdf;

    let hk = Hkdf::<Sha256>::from_prk(prk)
        .map_err(|_| SmApiError::Crypto("invalid HKDF pseudo-random key".to_string()))?;
    let mut okm = Zeroizing::new(vec![0u8; length]);
    hk.expand(info, &mut okm)
        .map_err(|_| SmApiError::Crypto("HKDF output length too large".to_string()))?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_B64: &str =
        "hvBMMb1t79YssFZkpetYsM3deyVuQv4r88Uj9gvYe0+G8EwxvW3v1iywVmSl61iwzd17JW5C/ivzxSP2C9h7Tw==";
    const VECTOR: &str = "2.AQEBAQEBAQEBAQEBAQEBAQ==|kcArgC3nLK58WUYK6yyQ+w==|9HRDjijjSa2tyToYilyG3mvJvHKhw3ZqFE7tFVaQh8Q=";

    fn test_key() -> [u8; 64] {
        let bytes = B64.decode(KEY_B64).unwrap();
        let mut key = [0u8; 64];
        key.copy_from_slice(&bytes);
        key
    }

    #[test]
    fn decrypt_known_vector() {
        let plaintext = decrypt_enc_string(VECTOR, &test_key()).unwrap();
        assert_eq!(std::str::from_utf8(&plaintext).unwrap(), "EncryptMe!");
    }

    #[test]
    fn encrypt_with_fixed_iv_reproduces_vector() {
        let enc = encrypt_with_iv(b"EncryptMe!", &test_key(), &[1u8; 16]).unwrap();
        assert_eq!(enc, VECTOR);
    }

    #[test]
    fn encrypt_then_decrypt_with_random_iv() {
        let key = test_key();
        let a = encrypt_enc_string(b"same input", &key).unwrap();
        let b = encrypt_enc_string(b"same input", &key).unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt_field(&a, &key).unwrap(), "same input");
    }

    #[test]
    fn rejects_wrong_type_and_bad_mac() {
        let key = test_key();
        assert!(decrypt_enc_string("0.iv|data", &key).is_err());

        let bad_mac = B64.encode([0u8; 32]);
        let enc = format!("2.AQEBAQEBAQEBAQEBAQEBAQ==|kcArgC3nLK58WUYK6yyQ+w==|{bad_mac}");
        assert!(decrypt_enc_string(&enc, &key).is_err());
    }

    #[test]
    fn optional_field_absent_is_empty() {
        assert_eq!(decrypt_field_opt(None, &test_key()).unwrap().as_str(), "");
        assert_eq!(decrypt_field_opt(Some(""), &test_key()).unwrap().as_str(), "");
    }

    #[test]
    fn org_key_payload_round_trip() {
        let token_key = test_key();
        let org_key = [7u8; 64];
        let payload = format!(r#"{{"encryptionKey":"{}"}}"#, B64.encode(org_key));
        let enc = encrypt_enc_string(payload.as_bytes(), &token_key).unwrap();
        assert_eq!(*decrypt_org_key(&enc, &token_key).unwrap(), org_key);
    }
}
