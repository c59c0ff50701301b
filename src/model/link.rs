use std::sync::OnceLock;

use super::sync::SyncNode;
use crate::util::{percent_decode, split_fragment};

/// How a resource was compressed before it was encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CompressionKind {
    #[default]
    None,
    Deflate,
}

impl CompressionKind {
    /// Map a zip-style compression method number (`0` stored, `8` deflate).
    pub fn from_method(method: u32) -> Option<Self> {
        match method {
            0 => Some(CompressionKind::None),
            8 => Some(CompressionKind::Deflate),
            _ => None,
        }
    }
}

/// Per-resource encryption or obfuscation metadata from the container.
///
/// Built once when the container metadata is parsed and never changed.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EncryptionDescriptor {
    /// URI naming the cipher or obfuscation scheme.
    pub algorithm: String,
    pub scheme: Option<String>,
    pub profile: Option<String>,
    pub compression: Option<CompressionKind>,
    /// Size of the resource before compression and encryption.
    pub original_length: Option<u64>,
}

impl EncryptionDescriptor {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            ..Default::default()
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_compression(mut self, compression: CompressionKind) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_original_length(mut self, length: u64) -> Self {
        self.original_length = Some(length);
        self
    }

    pub fn is_deflated(&self) -> bool {
        self.compression == Some(CompressionKind::Deflate)
    }
}

/// A byte-addressable asset inside the container.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Link {
    href: String,
    #[cfg_attr(feature = "serde", serde(skip))]
    href_decoded: OnceLock<String>,
    pub media_type: String,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub encryption: Option<EncryptionDescriptor>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub overlay: Option<SyncNode>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub duration: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub alternate_links: Vec<Link>,
}

impl Link {
    pub fn new(href: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            media_type: media_type.into(),
            ..Default::default()
        }
    }

    pub fn with_encryption(mut self, encryption: EncryptionDescriptor) -> Self {
        self.encryption = Some(encryption);
        self
    }

    pub fn with_overlay(mut self, overlay: SyncNode) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// The href as declared in the package.
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Replace the href. The decoded form is recomputed on next access.
    pub fn set_href(&mut self, href: impl Into<String>) {
        self.href = href.into();
        self.href_decoded = OnceLock::new();
    }

    /// The percent-decoded href, computed once and cached.
    pub fn href_decoded(&self) -> &str {
        self.href_decoded.get_or_init(|| percent_decode(&self.href))
    }

    /// The decoded href without any fragment.
    pub fn path(&self) -> &str {
        split_fragment(self.href_decoded()).0
    }

    /// True when the raw or decoded href (fragment ignored) names `href`.
    pub fn matches_href(&self, href: &str) -> bool {
        let wanted = split_fragment(href).0;
        split_fragment(&self.href).0 == wanted || self.path() == wanted
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.href == other.href
            && self.media_type == other.media_type
            && self.encryption == other.encryption
            && self.overlay == other.overlay
            && self.duration == other.duration
            && self.alternate_links == other.alternate_links
    }
}
