//! Lazy, memoized hydration of media-overlay trees.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::archive::Archive;
use crate::error::OverlayError;
use crate::model::{Link, Publication, SyncNode};
use crate::smil::{OverlayBuild, parse_overlay};
use crate::transform::{TransformContext, TransformPipeline};
use crate::util::split_fragment;

/// Fills in un-initialized [`SyncNode`] roots from their SMIL documents.
///
/// The loader itself holds no per-node state; the `initialized` flag on
/// each root is the memo. Callers hand over the node mutably, so one node
/// is never hydrated from two places at once.
pub struct OverlayLoader {
    archive: Arc<dyn Archive>,
    pipeline: Arc<TransformPipeline>,
    context: TransformContext,
    /// Encrypted links by raw and decoded path, overlays stripped.
    encrypted: HashMap<String, Link>,
}

impl OverlayLoader {
    pub fn new(
        archive: Arc<dyn Archive>,
        pipeline: Arc<TransformPipeline>,
        context: TransformContext,
    ) -> Self {
        Self {
            archive,
            pipeline,
            context,
            encrypted: HashMap::new(),
        }
    }

    /// Record the encryption descriptors of `publication`'s links so SMIL
    /// documents can be routed through the pipeline.
    pub fn with_publication(mut self, publication: &Publication) -> Self {
        for link in publication.resources.iter().chain(publication.spine.iter()) {
            if !link.is_encrypted() {
                continue;
            }
            let mut snapshot = link.clone();
            snapshot.overlay = None;
            for key in [split_fragment(link.href()).0, link.path()] {
                self.encrypted
                    .entry(key.to_string())
                    .or_insert_with(|| snapshot.clone());
            }
        }
        self
    }

    pub fn context(&self) -> &TransformContext {
        &self.context
    }

    /// Hydrate `node`, the overlay root of `resource`.
    ///
    /// Does nothing if the node is already initialized or has no SMIL path.
    /// On failure `node` is left untouched, so calling again retries.
    pub fn ensure_loaded(&self, resource: &Link, node: &mut SyncNode) -> Result<(), OverlayError> {
        if node.initialized {
            return Ok(());
        }
        let Some(smil_path) = node.smil_path.as_deref() else {
            return Ok(());
        };

        let bytes = self.read_document(resource, smil_path)?;
        let OverlayBuild { mut root, complete } = parse_overlay(&bytes, smil_path)?;
        debug!(
            resource = resource.href(),
            smil = smil_path,
            nodes = root.iter().count(),
            complete,
            "loaded media overlay"
        );

        root.initialized = complete;
        *node = root;
        Ok(())
    }

    fn read_document(&self, resource: &Link, smil_path: &str) -> Result<Vec<u8>, OverlayError> {
        let stream = self.archive.open_entry_stream(smil_path)?;

        let Some(owner) = self.owning_link(resource, smil_path) else {
            return Ok(stream.read_to_vec()?);
        };

        debug!(smil = smil_path, algorithm = ?owner.encryption.as_ref().map(|e| &e.algorithm), "decoding encrypted SMIL");
        let decoded = self
            .pipeline
            .decode_stream(&self.context, owner, stream, None)
            .map_err(OverlayError::DecryptionUnsupported)?;
        Ok(decoded.read_to_vec()?)
    }

    /// The encrypted link backing `smil_path`, if any.
    fn owning_link<'a>(&'a self, resource: &'a Link, smil_path: &str) -> Option<&'a Link> {
        if resource.is_encrypted() && resource.matches_href(smil_path) {
            return Some(resource);
        }
        self.encrypted.get(smil_path)
    }
}

impl fmt::Debug for OverlayLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayLoader")
            .field("pipeline", &self.pipeline)
            .field("context", &self.context)
            .field("encrypted", &self.encrypted.len())
            .finish()
    }
}
