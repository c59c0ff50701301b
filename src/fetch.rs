//! Direct content reads through the archive and transform pipeline.

use std::sync::Arc;

use crate::archive::Archive;
use crate::error::Result;
use crate::io::{ByteRange, ByteStream};
use crate::model::Link;
use crate::transform::{TransformContext, TransformPipeline};

/// Reads the decoded bytes of a publication's resources.
///
/// Plaintext links are served straight from the archive, ranges included.
/// Encrypted links are opened whole and decoded through the pipeline, which
/// slices the plaintext when a range is requested.
pub struct ResourceFetcher {
    archive: Arc<dyn Archive>,
    pipeline: Arc<TransformPipeline>,
    context: TransformContext,
}

impl ResourceFetcher {
    pub fn new(
        archive: Arc<dyn Archive>,
        pipeline: Arc<TransformPipeline>,
        context: TransformContext,
    ) -> Self {
        Self {
            archive,
            pipeline,
            context,
        }
    }

    pub fn archive(&self) -> &dyn Archive {
        self.archive.as_ref()
    }

    /// Open `link`, or `range` of it.
    pub fn read(&self, link: &Link, range: Option<ByteRange>) -> Result<ByteStream> {
        let path = link.path();

        if !link.is_encrypted() && !self.pipeline.supports(&self.context, link) {
            return match range {
                Some(range) => self.archive.open_entry_range(path, range),
                None => self.archive.open_entry_stream(path),
            };
        }

        let stream = self.archive.open_entry_stream(path)?;
        Ok(self
            .pipeline
            .decode_stream(&self.context, link, stream, range)?)
    }

    pub fn read_to_vec(&self, link: &Link, range: Option<ByteRange>) -> Result<Vec<u8>> {
        Ok(self.read(link, range)?.read_to_vec()?)
    }
}
