//! AES-256-CBC decryption with an already-unwrapped LCP content key.

use std::io::Read;

use aes::Aes256;
use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use flate2::read::DeflateDecoder;

use super::lcp::{LCP_BASIC_PROFILE, LicenseDecryptor};
use crate::error::TransformError;
use crate::io::{ByteRange, ByteStream};
use crate::model::EncryptionDescriptor;

type Aes256CbcDec = cbc::Decryptor<Aes256>;

const BLOCK: usize = 16;

/// A [`LicenseDecryptor`] holding the raw content key.
///
/// Resources are laid out as a 16-byte IV followed by CBC ciphertext with
/// PKCS#7 padding. Ranges over uncompressed resources decrypt only the
/// blocks they cover.
pub struct ContentKeyDecryptor {
    key: Option<[u8; 32]>,
    profile: String,
}

impl ContentKeyDecryptor {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key: Some(key),
            profile: LCP_BASIC_PROFILE.to_string(),
        }
    }

    /// A decryptor whose license has not yielded a key yet.
    pub fn locked() -> Self {
        Self {
            key: None,
            profile: LCP_BASIC_PROFILE.to_string(),
        }
    }

    pub fn from_hex(key: &str) -> Result<Self, TransformError> {
        let bytes = hex::decode(key.trim())
            .map_err(|e| TransformError::InvalidKey(format!("content key: {e}")))?;
        let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            TransformError::InvalidKey(format!("content key is {} bytes, expected 32", b.len()))
        })?;
        Ok(Self::new(key))
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }
}

impl LicenseDecryptor for ContentKeyDecryptor {
    fn is_ready(&self) -> bool {
        self.key.is_some()
    }

    fn profile(&self) -> Option<&str> {
        Some(&self.profile)
    }

    fn decrypt(
        &self,
        stream: ByteStream,
        path: &str,
        descriptor: &EncryptionDescriptor,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, TransformError> {
        let failed = |reason: String| TransformError::DecryptionFailed {
            href: path.to_string(),
            reason,
        };
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| failed("content key not available".to_string()))?;

        let data = stream.read_to_vec()?;
        check_layout(&data).map_err(failed)?;

        if let (Some(range), false) = (range, descriptor.is_deflated()) {
            let plain = decrypt_range(key, &data, descriptor.original_length, range)
                .map_err(failed)?;
            return Ok(ByteStream::from_bytes(plain));
        }

        let mut plain = decrypt_all(key, &data).map_err(failed)?;
        if descriptor.is_deflated() {
            let mut inflated =
                Vec::with_capacity(descriptor.original_length.unwrap_or(0) as usize);
            DeflateDecoder::new(&plain[..])
                .read_to_end(&mut inflated)
                .map_err(|e| failed(format!("inflate: {e}")))?;
            plain = inflated;
        }

        let out = ByteStream::from_bytes(plain);
        Ok(match range {
            Some(range) => out.slice(range)?,
            None => out,
        })
    }
}

fn check_layout(data: &[u8]) -> Result<(), String> {
    if data.len() < 2 * BLOCK || data.len() % BLOCK != 0 {
        return Err(format!(
            "ciphertext of {} bytes is not IV plus whole blocks",
            data.len()
        ));
    }
    Ok(())
}

fn decrypt_all(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>, String> {
    let (iv, body) = data.split_at(BLOCK);
    let mut buf = body.to_vec();
    let len = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| e.to_string())?
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| "bad padding (wrong key?)".to_string())?
        .len();
    buf.truncate(len);
    Ok(buf)
}

/// Decrypt the CBC blocks `first..=last` (0-based, after the IV).
fn decrypt_blocks(key: &[u8; 32], data: &[u8], first: usize, last: usize) -> Result<Vec<u8>, String> {
    let iv = &data[first * BLOCK..(first + 1) * BLOCK];
    let mut buf = data[(first + 1) * BLOCK..(last + 2) * BLOCK].to_vec();
    Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| e.to_string())?
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| "block decryption failed".to_string())?;
    Ok(buf)
}

fn plaintext_len(key: &[u8; 32], data: &[u8]) -> Result<u64, String> {
    let blocks = data.len() / BLOCK - 1;
    let last = decrypt_blocks(key, data, blocks - 1, blocks - 1)?;
    let pad = last[BLOCK - 1] as usize;
    if pad == 0 || pad > BLOCK || last[BLOCK - pad..].iter().any(|&b| b as usize != pad) {
        return Err("bad padding (wrong key?)".to_string());
    }
    Ok((blocks * BLOCK - pad) as u64)
}

fn decrypt_range(
    key: &[u8; 32],
    data: &[u8],
    original_length: Option<u64>,
    range: ByteRange,
) -> Result<Vec<u8>, String> {
    let blocks = data.len() / BLOCK - 1;
    let length = match original_length {
        Some(length) if length <= (blocks * BLOCK) as u64 => length,
        _ => plaintext_len(key, data)?,
    };
    let (offset, count) = range.resolve(length).map_err(|e| e.to_string())?;

    let first = offset as usize / BLOCK;
    let last = (offset + count - 1) as usize / BLOCK;
    let plain = decrypt_blocks(key, data, first, last)?;

    let start = offset as usize - first * BLOCK;
    Ok(plain[start..start + count as usize].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;
    use std::io::Write;

    type Aes256CbcEnc = cbc::Encryptor<Aes256>;

    const KEY: [u8; 32] = [7u8; 32];
    const IV: [u8; 16] = [3u8; 16];

    fn encrypt(plain: &[u8]) -> Vec<u8> {
        let mut buf = plain.to_vec();
        let len = buf.len();
        buf.resize(len + BLOCK, 0);
        let ct = Aes256CbcEnc::new(&KEY.into(), &IV.into())
            .encrypt_padded_mut::<Pkcs7>(&mut buf, len)
            .unwrap()
            .to_vec();
        let mut out = IV.to_vec();
        out.extend_from_slice(&ct);
        out
    }

    fn text(len: usize) -> Vec<u8> {
        (0..len).map(|i| b'a' + (i % 26) as u8).collect()
    }

    fn descriptor() -> EncryptionDescriptor {
        EncryptionDescriptor::new(crate::transform::AES256_CBC)
    }

    #[test]
    fn test_full_decrypt() {
        let plain = text(100);
        let out = ContentKeyDecryptor::new(KEY)
            .decrypt(ByteStream::from_bytes(encrypt(&plain)), "a.xhtml", &descriptor(), None)
            .unwrap();
        assert_eq!(out.read_to_vec().unwrap(), plain);
    }

    #[test]
    fn test_range_decrypt_matches_full() {
        let plain = text(200);
        let decryptor = ContentKeyDecryptor::new(KEY);
        for (begin, end) in [(0, 0), (5, 40), (16, 31), (150, 199), (190, 500)] {
            let out = decryptor
                .decrypt(
                    ByteStream::from_bytes(encrypt(&plain)),
                    "a.mp3",
                    &descriptor(),
                    Some(ByteRange::new(begin, end)),
                )
                .unwrap();
            let end = (end as usize).min(plain.len() - 1);
            assert_eq!(out.read_to_vec().unwrap(), plain[begin as usize..=end]);
        }
    }

    #[test]
    fn test_deflated_resource() {
        let plain = text(5000);
        let mut deflate =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        deflate.write_all(&plain).unwrap();
        let compressed = deflate.finish().unwrap();

        let desc = descriptor()
            .with_compression(crate::model::CompressionKind::Deflate)
            .with_original_length(plain.len() as u64);
        let out = ContentKeyDecryptor::new(KEY)
            .decrypt(
                ByteStream::from_bytes(encrypt(&compressed)),
                "ch.xhtml",
                &desc,
                Some(ByteRange::new(4000, 4009)),
            )
            .unwrap();
        assert_eq!(out.read_to_vec().unwrap(), plain[4000..4010]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let ct = encrypt(&text(64));
        let result = ContentKeyDecryptor::new([9u8; 32]).decrypt(
            ByteStream::from_bytes(ct),
            "a.xhtml",
            &descriptor(),
            None,
        );
        assert!(matches!(result, Err(TransformError::DecryptionFailed { .. })));
    }

    #[test]
    fn test_locked_and_malformed() {
        let locked = ContentKeyDecryptor::locked();
        assert!(!locked.is_ready());
        assert!(
            locked
                .decrypt(ByteStream::from_bytes(encrypt(b"x")), "a", &descriptor(), None)
                .is_err()
        );

        let short = ContentKeyDecryptor::new(KEY).decrypt(
            ByteStream::from_bytes(vec![0; 20]),
            "a",
            &descriptor(),
            None,
        );
        assert!(matches!(short, Err(TransformError::DecryptionFailed { .. })));
    }

    #[test]
    fn test_from_hex() {
        let hex_key = "07".repeat(32);
        assert!(ContentKeyDecryptor::from_hex(&hex_key).unwrap().is_ready());
        assert!(matches!(
            ContentKeyDecryptor::from_hex("0707"),
            Err(TransformError::InvalidKey(_))
        ));
    }
}
