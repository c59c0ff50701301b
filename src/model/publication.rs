use super::link::Link;
use super::sync::SyncNode;
use crate::error::OverlayError;
use crate::overlay::OverlayLoader;

/// A loaded publication: its identifier plus the links the core looks
/// resources up in.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Publication {
    /// Package unique identifier. Obfuscation keys derive from it.
    pub identifier: String,
    /// Reading order.
    pub spine: Vec<Link>,
    /// Everything else in the manifest.
    pub resources: Vec<Link>,
}

impl Publication {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    /// All links, spine first.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.spine.iter().chain(self.resources.iter())
    }

    /// Find a link by raw or decoded href. Resources are searched before the
    /// spine, matching how SMIL documents are usually listed.
    pub fn find_link(&self, href: &str) -> Option<&Link> {
        self.resources
            .iter()
            .chain(self.spine.iter())
            .find(|link| link.matches_href(href))
    }

    pub fn find_link_mut(&mut self, href: &str) -> Option<&mut Link> {
        self.resources
            .iter_mut()
            .chain(self.spine.iter_mut())
            .find(|link| link.matches_href(href))
    }

    /// Spine items that carry a media overlay.
    pub fn narrated_spine(&self) -> impl Iterator<Item = &Link> {
        self.spine.iter().filter(|link| link.overlay.is_some())
    }

    /// Hydrate the media overlay of the link named by `href` and return it.
    ///
    /// Returns `Ok(None)` if no such link exists or it has no overlay. A
    /// failed load leaves the overlay un-initialized so it can be retried.
    pub fn media_overlay(
        &mut self,
        loader: &OverlayLoader,
        href: &str,
    ) -> Result<Option<&SyncNode>, OverlayError> {
        let Some(link) = self.find_link_mut(href) else {
            return Ok(None);
        };
        let Some(mut node) = link.overlay.take() else {
            return Ok(None);
        };

        let result = loader.ensure_loaded(link, &mut node);
        link.overlay = Some(node);
        result?;

        Ok(link.overlay.as_ref())
    }
}
