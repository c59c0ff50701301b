//! Font and asset de-obfuscation.
//!
//! Both the Adobe and the IDPF schemes XOR a fixed-size prefix of the
//! resource with a key derived from the publication identifier and leave
//! the rest alone, so one transformer covers both.

use std::io::{self, Read};

use super::{TransformContext, Transformer};
use crate::error::TransformError;
use crate::io::{ByteRange, ByteStream};
use crate::model::Link;

pub const ADOBE_OBFUSCATION: &str = "http://ns.adobe.com/pdf/enc#RC";
pub const IDPF_OBFUSCATION: &str = "http://www.idpf.org/2008/embedding";

const ADOBE_WINDOW: usize = 1024;
const IDPF_WINDOW: usize = 1040;

type KeyDerivation = fn(&str) -> Result<Vec<u8>, TransformError>;

/// XOR-prefix de-obfuscation, parameterized by algorithm URI, window
/// length, and key derivation.
pub struct XorObfuscation {
    name: &'static str,
    algorithm: &'static str,
    window: usize,
    derive_key: KeyDerivation,
}

impl XorObfuscation {
    /// Adobe scheme: 16-byte key from the `urn:uuid:` identifier, 1024-byte window.
    pub fn adobe() -> Self {
        Self {
            name: "adobe-obfuscation",
            algorithm: ADOBE_OBFUSCATION,
            window: ADOBE_WINDOW,
            derive_key: adobe_key,
        }
    }

    /// IDPF scheme: SHA-1 of the whitespace-stripped identifier, 1040-byte window.
    pub fn idpf() -> Self {
        Self {
            name: "idpf-obfuscation",
            algorithm: IDPF_OBFUSCATION,
            window: IDPF_WINDOW,
            derive_key: idpf_key,
        }
    }

    pub fn algorithm(&self) -> &'static str {
        self.algorithm
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn key_for(&self, identifier: &str) -> Result<Vec<u8>, TransformError> {
        (self.derive_key)(identifier)
    }
}

impl Transformer for XorObfuscation {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, _ctx: &TransformContext, resource: &Link) -> bool {
        resource
            .encryption
            .as_ref()
            .is_some_and(|e| e.algorithm == self.algorithm)
    }

    fn transform(
        &self,
        ctx: &TransformContext,
        _resource: &Link,
        stream: ByteStream,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, TransformError> {
        let key = self.key_for(ctx.identifier())?;
        let length = stream.len();
        let reader = XorPrefixReader {
            inner: stream.into_reader(),
            key,
            window: self.window as u64,
            position: 0,
        };
        let decoded = ByteStream::new(reader, length);

        Ok(match range {
            Some(range) => decoded.slice(range)?,
            None => decoded,
        })
    }
}

/// Adobe key: the identifier minus its `urn:uuid:` prefix, hyphens, and
/// whitespace, read as 16 raw bytes.
pub fn adobe_key(identifier: &str) -> Result<Vec<u8>, TransformError> {
    let trimmed = identifier.trim();
    let uuid = trimmed.strip_prefix("urn:uuid:").unwrap_or(trimmed);
    let hex_digits: String = uuid
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();

    let key = hex::decode(&hex_digits)
        .map_err(|e| TransformError::InvalidKey(format!("{identifier:?} is not a UUID: {e}")))?;
    if key.len() != 16 {
        return Err(TransformError::InvalidKey(format!(
            "{identifier:?} yields {} key bytes, expected 16",
            key.len()
        )));
    }
    Ok(key)
}

/// IDPF key: SHA-1 of the identifier with all XML whitespace removed.
pub fn idpf_key(identifier: &str) -> Result<Vec<u8>, TransformError> {
    let stripped: String = identifier
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\n' | '\r'))
        .collect();
    if stripped.is_empty() {
        return Err(TransformError::InvalidKey(
            "empty publication identifier".to_string(),
        ));
    }
    Ok(sha1_smol::Sha1::from(stripped.as_bytes()).digest().bytes().to_vec())
}

/// XOR the first `window` bytes of `data` with `key`, repeated. `data` is
/// taken to start at offset 0 of the resource.
pub fn xor_prefix(data: &mut [u8], key: &[u8], window: usize) {
    if key.is_empty() {
        return;
    }
    let end = data.len().min(window);
    for (i, byte) in data[..end].iter_mut().enumerate() {
        *byte ^= key[i % key.len()];
    }
}

/// Streams a resource while undoing the XOR mask on its prefix.
struct XorPrefixReader<R> {
    inner: R,
    key: Vec<u8>,
    window: u64,
    position: u64,
}

impl<R: Read> Read for XorPrefixReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if self.position < self.window && !self.key.is_empty() {
            let masked = (self.window - self.position).min(n as u64) as usize;
            for (i, byte) in buf[..masked].iter_mut().enumerate() {
                let offset = self.position as usize + i;
                *byte ^= self.key[offset % self.key.len()];
            }
        }
        self.position += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EncryptionDescriptor;
    use proptest::prelude::*;

    const UUID: &str = "urn:uuid:0bd8f3b4-7ad4-4b6e-9a3c-1f2e3d4c5b6a";

    fn font(algorithm: &str) -> Link {
        Link::new("OEBPS/fonts/a.otf", "font/otf")
            .with_encryption(EncryptionDescriptor::new(algorithm))
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_adobe_key_derivation() {
        let key = adobe_key(UUID).unwrap();
        assert_eq!(key.len(), 16);
        assert_eq!(key[0], 0x0b);
        assert_eq!(key[15], 0x6a);
        assert_eq!(adobe_key(" 0bd8f3b4-7ad4-4b6e-9a3c-1f2e3d4c5b6a ").unwrap(), key);
        assert!(matches!(adobe_key("isbn:123"), Err(TransformError::InvalidKey(_))));
    }

    #[test]
    fn test_idpf_key_strips_whitespace() {
        let a = idpf_key("urn:isbn:9780000000000").unwrap();
        let b = idpf_key(" urn:isbn:\t9780000000000\n").unwrap();
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);
        assert!(idpf_key(" \n").is_err());
    }

    #[test]
    fn test_idpf_key_matches_sha1() {
        // SHA-1("abc")
        assert_eq!(
            hex::encode(idpf_key("abc").unwrap()),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_supports_by_algorithm_only() {
        let ctx = TransformContext::default();
        assert!(XorObfuscation::adobe().supports(&ctx, &font(ADOBE_OBFUSCATION)));
        assert!(!XorObfuscation::adobe().supports(&ctx, &font(IDPF_OBFUSCATION)));
        assert!(XorObfuscation::idpf().supports(&ctx, &font(IDPF_OBFUSCATION)));
        assert!(!XorObfuscation::idpf().supports(&ctx, &Link::new("a.otf", "font/otf")));
    }

    #[test]
    fn test_adobe_decodes_without_license() {
        let original = sample(3000);
        let key = adobe_key(UUID).unwrap();
        let mut obfuscated = original.clone();
        xor_prefix(&mut obfuscated, &key, 1024);
        assert_ne!(obfuscated[..1024], original[..1024]);
        assert_eq!(obfuscated[1024..], original[1024..]);

        let ctx = TransformContext::new(UUID);
        let out = XorObfuscation::adobe()
            .transform(&ctx, &font(ADOBE_OBFUSCATION), ByteStream::from_bytes(obfuscated), None)
            .unwrap();
        assert_eq!(out.read_to_vec().unwrap(), original);
    }

    #[test]
    fn test_idpf_window_is_1040() {
        let original = sample(1100);
        let key = idpf_key(UUID).unwrap();
        let mut obfuscated = original.clone();
        xor_prefix(&mut obfuscated, &key, 1040);
        assert_ne!(obfuscated[1030..1040], original[1030..1040]);
        assert_eq!(obfuscated[1040..], original[1040..]);

        let ctx = TransformContext::new(UUID);
        let out = XorObfuscation::idpf()
            .transform(&ctx, &font(IDPF_OBFUSCATION), ByteStream::from_bytes(obfuscated), None)
            .unwrap();
        assert_eq!(out.read_to_vec().unwrap(), original);
    }

    #[test]
    fn test_range_after_deobfuscation() {
        let original = sample(2048);
        let key = adobe_key(UUID).unwrap();
        let mut obfuscated = original.clone();
        xor_prefix(&mut obfuscated, &key, 1024);

        let ctx = TransformContext::new(UUID);
        let out = XorObfuscation::adobe()
            .transform(
                &ctx,
                &font(ADOBE_OBFUSCATION),
                ByteStream::from_bytes(obfuscated),
                Some(ByteRange::new(1000, 1049)),
            )
            .unwrap();
        assert_eq!(out.read_to_vec().unwrap(), original[1000..1050]);
    }

    #[test]
    fn test_bad_identifier_fails() {
        let ctx = TransformContext::new("not-a-uuid");
        let result = XorObfuscation::adobe().transform(
            &ctx,
            &font(ADOBE_OBFUSCATION),
            ByteStream::from_bytes(vec![0; 10]),
            None,
        );
        assert!(matches!(result, Err(TransformError::InvalidKey(_))));
    }

    /// Feeds the reader one byte at a time to exercise window bookkeeping.
    struct Trickle(std::io::Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = buf.len().min(1);
            self.0.read(&mut buf[..end])
        }
    }

    #[test]
    fn test_streaming_matches_in_place() {
        let original = sample(1500);
        let key = adobe_key(UUID).unwrap();
        let mut expected = original.clone();
        xor_prefix(&mut expected, &key, 1024);

        let mut reader = XorPrefixReader {
            inner: Trickle(std::io::Cursor::new(original)),
            key,
            window: 1024,
            position: 0,
        };
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, expected);
    }

    proptest! {
        #[test]
        fn prop_xor_prefix_is_self_inverse(
            data in prop::collection::vec(any::<u8>(), 1024..4096),
            key in prop::collection::vec(any::<u8>(), 16..=16),
        ) {
            let mut buf = data.clone();
            xor_prefix(&mut buf, &key, 1024);
            prop_assert_eq!(&buf[1024..], &data[1024..]);
            xor_prefix(&mut buf, &key, 1024);
            prop_assert_eq!(buf, data);
        }
    }
}
