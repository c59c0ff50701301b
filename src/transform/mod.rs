//! Resource transform pipeline.
//!
//! A [`TransformPipeline`] holds an ordered list of [`Transformer`]s. For a
//! given resource every transformer that claims it is applied in
//! registration order, each consuming the previous one's output.
//! Resources nobody claims pass through untouched.

mod content_key;
mod lcp;
mod obfuscation;

pub use content_key::ContentKeyDecryptor;
pub use lcp::{
    AES256_CBC, LCP_BASIC_PROFILE, LCP_PROFILE_1_0, LCP_SCHEME, LcpTransformer, LicenseDecryptor,
};
pub use obfuscation::{
    ADOBE_OBFUSCATION, IDPF_OBFUSCATION, XorObfuscation, adobe_key, idpf_key, xor_prefix,
};

use std::fmt;
use std::sync::Arc;

use crate::error::TransformError;
use crate::io::{ByteRange, ByteStream};
use crate::model::{Link, Publication};

/// A content decoder that can be registered in a [`TransformPipeline`].
pub trait Transformer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this transformer applies to `resource`. Must be free of side
    /// effects; it is evaluated before anything is read.
    fn supports(&self, ctx: &TransformContext, resource: &Link) -> bool;

    /// Decode `stream`, the whole entry or the previous transformer's full
    /// output. With `range` set the result must be exactly that slice of the
    /// decoded bytes.
    fn transform(
        &self,
        ctx: &TransformContext,
        resource: &Link,
        stream: ByteStream,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, TransformError>;
}

/// Per-publication state transformers consult: the unique identifier that
/// obfuscation keys derive from, and the DRM license if one is open.
#[derive(Clone, Default)]
pub struct TransformContext {
    identifier: String,
    license: Option<Arc<dyn LicenseDecryptor>>,
}

impl TransformContext {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            license: None,
        }
    }

    pub fn for_publication(publication: &Publication) -> Self {
        Self::new(publication.identifier.clone())
    }

    pub fn with_license(mut self, license: Arc<dyn LicenseDecryptor>) -> Self {
        self.license = Some(license);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn license(&self) -> Option<&dyn LicenseDecryptor> {
        self.license.as_deref()
    }
}

impl fmt::Debug for TransformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformContext")
            .field("identifier", &self.identifier)
            .field("license_ready", &self.license().map(|l| l.is_ready()))
            .finish()
    }
}

/// Ordered registry of transformers.
///
/// Built once and shared; registration order is application order.
#[derive(Default)]
pub struct TransformPipeline {
    transformers: Vec<Box<dyn Transformer>>,
}

impl TransformPipeline {
    /// An empty pipeline: every resource passes through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adobe and IDPF font de-obfuscation followed by LCP decryption.
    pub fn with_builtins() -> Self {
        Self::new()
            .register(XorObfuscation::adobe())
            .register(XorObfuscation::idpf())
            .register(LcpTransformer::new())
    }

    pub fn register(mut self, transformer: impl Transformer + 'static) -> Self {
        self.push(Box::new(transformer));
        self
    }

    pub fn push(&mut self, transformer: Box<dyn Transformer>) {
        self.transformers.push(transformer);
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Registered transformer names, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    /// True if at least one transformer claims `resource`.
    pub fn supports(&self, ctx: &TransformContext, resource: &Link) -> bool {
        self.transformers.iter().any(|t| t.supports(ctx, resource))
    }

    /// Apply every transformer claiming `resource`, in registration order.
    ///
    /// `stream` must be the whole entry. Without any claiming transformer
    /// the stream comes back unchanged. Transformers before the last decode
    /// fully; the last one receives `range`. The first failure aborts the
    /// chain.
    pub fn try_stream(
        &self,
        ctx: &TransformContext,
        resource: &Link,
        stream: ByteStream,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, TransformError> {
        let chain: Vec<&dyn Transformer> = self
            .transformers
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| t.supports(ctx, resource))
            .collect();

        let Some(last) = chain.len().checked_sub(1) else {
            return Ok(stream);
        };

        let mut current = stream;
        for (i, transformer) in chain.into_iter().enumerate() {
            let stage_range = if i == last { range } else { None };
            tracing::debug!(
                transformer = transformer.name(),
                href = resource.href(),
                range = ?stage_range,
                "applying transformer"
            );
            current = transformer.transform(ctx, resource, current, stage_range)?;
        }
        Ok(current)
    }

    /// Like [`try_stream`](Self::try_stream), but a resource marked
    /// encrypted that no transformer claims is an error rather than a
    /// pass-through. A range on a plaintext resource is applied here.
    pub fn decode_stream(
        &self,
        ctx: &TransformContext,
        resource: &Link,
        stream: ByteStream,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, TransformError> {
        if !self.supports(ctx, resource) {
            if let Some(encryption) = &resource.encryption {
                return Err(TransformError::Unsupported {
                    href: resource.href().to_string(),
                    algorithm: encryption.algorithm.clone(),
                });
            }
            return match range {
                Some(range) => Ok(stream.slice(range)?),
                None => Ok(stream),
            };
        }
        self.try_stream(ctx, resource, stream, range)
    }
}

impl fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EncryptionDescriptor;

    /// Appends a marker byte; claims resources whose algorithm is "test".
    struct Append(&'static str, u8);

    impl Transformer for Append {
        fn name(&self) -> &'static str {
            self.0
        }

        fn supports(&self, _ctx: &TransformContext, resource: &Link) -> bool {
            resource
                .encryption
                .as_ref()
                .is_some_and(|e| e.algorithm == "test")
        }

        fn transform(
            &self,
            _ctx: &TransformContext,
            _resource: &Link,
            stream: ByteStream,
            range: Option<ByteRange>,
        ) -> Result<ByteStream, TransformError> {
            let mut data = stream.read_to_vec()?;
            data.push(self.1);
            let out = ByteStream::from_bytes(data);
            Ok(match range {
                Some(range) => out.slice(range)?,
                None => out,
            })
        }
    }

    struct Fail;

    impl Transformer for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn supports(&self, _ctx: &TransformContext, _resource: &Link) -> bool {
            true
        }

        fn transform(
            &self,
            _ctx: &TransformContext,
            resource: &Link,
            _stream: ByteStream,
            _range: Option<ByteRange>,
        ) -> Result<ByteStream, TransformError> {
            Err(TransformError::DecryptionFailed {
                href: resource.href().to_string(),
                reason: "boom".into(),
            })
        }
    }

    fn encrypted(algorithm: &str) -> Link {
        Link::new("OEBPS/res.bin", "application/octet-stream")
            .with_encryption(EncryptionDescriptor::new(algorithm))
    }

    #[test]
    fn test_plaintext_passes_through() {
        let pipeline = TransformPipeline::with_builtins();
        let ctx = TransformContext::new("urn:uuid:00000000-0000-0000-0000-000000000000");
        let link = Link::new("OEBPS/ch1.xhtml", "application/xhtml+xml");

        let out = pipeline
            .try_stream(&ctx, &link, ByteStream::from_bytes(b"plain".to_vec()), None)
            .unwrap();
        assert_eq!(out.read_to_vec().unwrap(), b"plain");
    }

    #[test]
    fn test_chain_applies_in_registration_order() {
        let pipeline = TransformPipeline::new()
            .register(Append("first", b'1'))
            .register(Append("second", b'2'));
        let ctx = TransformContext::default();

        let out = pipeline
            .try_stream(&ctx, &encrypted("test"), ByteStream::from_bytes(b"x".to_vec()), None)
            .unwrap();
        assert_eq!(out.read_to_vec().unwrap(), b"x12");
        assert_eq!(pipeline.names(), vec!["first", "second"]);
    }

    #[test]
    fn test_range_applies_to_final_output() {
        let pipeline = TransformPipeline::new()
            .register(Append("first", b'1'))
            .register(Append("second", b'2'));
        let ctx = TransformContext::default();

        let out = pipeline
            .try_stream(
                &ctx,
                &encrypted("test"),
                ByteStream::from_bytes(b"abc".to_vec()),
                Some(ByteRange::new(2, 4)),
            )
            .unwrap();
        assert_eq!(out.read_to_vec().unwrap(), b"c12");
    }

    #[test]
    fn test_failure_aborts_chain() {
        let pipeline = TransformPipeline::new()
            .register(Append("first", b'1'))
            .register(Fail);
        let result = pipeline.try_stream(
            &TransformContext::default(),
            &encrypted("test"),
            ByteStream::from_bytes(b"x".to_vec()),
            None,
        );
        assert!(matches!(result, Err(TransformError::DecryptionFailed { .. })));
    }

    #[test]
    fn test_decode_stream_rejects_unclaimed_encryption() {
        let pipeline = TransformPipeline::with_builtins();
        let ctx = TransformContext::new("id");
        let link = encrypted("http://example.com/unknown-cipher");

        assert!(!pipeline.supports(&ctx, &link));
        let lenient = pipeline
            .try_stream(&ctx, &link, ByteStream::from_bytes(b"x".to_vec()), None)
            .unwrap();
        assert_eq!(lenient.read_to_vec().unwrap(), b"x");

        let strict =
            pipeline.decode_stream(&ctx, &link, ByteStream::from_bytes(b"x".to_vec()), None);
        assert!(matches!(strict, Err(TransformError::Unsupported { .. })));
    }

    #[test]
    fn test_decode_stream_slices_plaintext() {
        let pipeline = TransformPipeline::with_builtins();
        let link = Link::new("a.txt", "text/plain");
        let out = pipeline
            .decode_stream(
                &TransformContext::default(),
                &link,
                ByteStream::from_bytes(b"0123456".to_vec()),
                Some(ByteRange::new(1, 2)),
            )
            .unwrap();
        assert_eq!(out.read_to_vec().unwrap(), b"12");
    }

    #[test]
    fn test_builtin_order() {
        assert_eq!(
            TransformPipeline::with_builtins().names(),
            vec!["adobe-obfuscation", "idpf-obfuscation", "lcp"]
        );
        assert!(TransformPipeline::new().is_empty());
    }
}
