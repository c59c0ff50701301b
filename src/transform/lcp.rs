//! Adapter between the pipeline and an external LCP license.

use super::{TransformContext, Transformer};
use crate::error::TransformError;
use crate::io::{ByteRange, ByteStream};
use crate::model::{EncryptionDescriptor, Link};

pub const LCP_SCHEME: &str = "http://readium.org/2014/01/lcp";
pub const AES256_CBC: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";
pub const LCP_BASIC_PROFILE: &str = "http://readium.org/lcp/basic-profile";
pub const LCP_PROFILE_1_0: &str = "http://readium.org/lcp/profile-1.0";

/// Decryption capability exposed by an opened license.
///
/// License acquisition and key exchange happen elsewhere; the pipeline
/// only asks whether a usable content key exists and hands streams over.
pub trait LicenseDecryptor: Send + Sync {
    /// True once the license is validated and the content key unwrapped.
    fn is_ready(&self) -> bool;

    /// Encryption profile declared by the license.
    fn profile(&self) -> Option<&str> {
        None
    }

    /// Decrypt the whole entry `stream` stored at `path`. With `range` set,
    /// return exactly that slice of the plaintext.
    fn decrypt(
        &self,
        stream: ByteStream,
        path: &str,
        descriptor: &EncryptionDescriptor,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, TransformError>;
}

/// Routes LCP-protected resources to the publication's license.
pub struct LcpTransformer {
    accepted_profiles: Vec<String>,
}

impl LcpTransformer {
    pub fn new() -> Self {
        Self {
            accepted_profiles: vec![LCP_BASIC_PROFILE.to_string(), LCP_PROFILE_1_0.to_string()],
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.accepted_profiles.push(profile.into());
        self
    }

    fn accepts(&self, descriptor: &EncryptionDescriptor, license: &dyn LicenseDecryptor) -> bool {
        let profile = descriptor.profile.as_deref().or(license.profile());
        descriptor.scheme.as_deref() == Some(LCP_SCHEME)
            && descriptor.algorithm == AES256_CBC
            && profile.is_some_and(|p| self.accepted_profiles.iter().any(|a| a == p))
    }
}

impl Default for LcpTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for LcpTransformer {
    fn name(&self) -> &'static str {
        "lcp"
    }

    fn supports(&self, ctx: &TransformContext, resource: &Link) -> bool {
        let (Some(descriptor), Some(license)) = (&resource.encryption, ctx.license()) else {
            return false;
        };
        license.is_ready() && self.accepts(descriptor, license)
    }

    fn transform(
        &self,
        ctx: &TransformContext,
        resource: &Link,
        stream: ByteStream,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, TransformError> {
        let unsupported = || TransformError::Unsupported {
            href: resource.href().to_string(),
            algorithm: resource
                .encryption
                .as_ref()
                .map(|e| e.algorithm.clone())
                .unwrap_or_default(),
        };
        let descriptor = resource.encryption.as_ref().ok_or_else(unsupported)?;
        let license = ctx.license().ok_or_else(unsupported)?;

        license.decrypt(stream, resource.path(), descriptor, range)
    }
}
