//! # folio
//!
//! Resource decoding and media-overlay synchronization for EPUB and DAISY
//! publications.
//!
//! ## Features
//!
//! - Zip and exploded-directory containers with href encoding fallback
//! - Ordered transform pipeline: Adobe and IDPF font de-obfuscation, LCP
//!   content decryption, byte-range reads through the whole chain
//! - SMIL 3.0 and DAISY 2/3 ingestion into a navigable [`SyncNode`] tree
//! - Lazy, memoized overlay hydration that is safe to retry
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use folio::{OverlayLoader, TransformContext, TransformPipeline, ZipContainer, open_publication};
//!
//! let archive = Arc::new(ZipContainer::open("book.epub").unwrap());
//! let mut publication = open_publication(archive.as_ref(), None).unwrap();
//!
//! let pipeline = Arc::new(TransformPipeline::with_builtins());
//! let context = TransformContext::for_publication(&publication);
//! let loader = OverlayLoader::new(archive, pipeline, context).with_publication(&publication);
//!
//! let href = publication.spine[0].href().to_string();
//! if let Some(overlay) = publication.media_overlay(&loader, &href).unwrap() {
//!     for node in overlay.clips() {
//!         println!("{:?} {:?}", node.text_ref, node.audio_ref);
//!     }
//! }
//! ```
//!
//! ## Reading Resources
//!
//! [`ResourceFetcher`] returns the decoded bytes of any link, decrypting or
//! de-obfuscating as its [`EncryptionDescriptor`] requires:
//!
//! ```
//! use std::sync::Arc;
//!
//! use folio::{ByteRange, Link, ResourceFetcher, TransformContext, TransformPipeline};
//! use folio::archive::Archive;
//!
//! fn first_kilobyte(archive: Arc<dyn Archive>, link: &Link) -> folio::Result<Vec<u8>> {
//!     let fetcher = ResourceFetcher::new(
//!         archive,
//!         Arc::new(TransformPipeline::with_builtins()),
//!         TransformContext::new("urn:uuid:0"),
//!     );
//!     fetcher.read_to_vec(link, Some(ByteRange::new(0, 1023)))
//! }
//! ```

pub mod archive;
pub mod error;
pub mod fetch;
pub mod io;
pub mod model;
pub mod overlay;
pub mod package;
pub mod smil;
pub mod transform;
pub(crate) mod util;

pub use archive::{Archive, DirectoryContainer, ZipContainer};
pub use error::{Error, OverlayError, Result, TransformError};
pub use fetch::ResourceFetcher;
pub use io::{ByteRange, ByteStream};
pub use model::{AudioClip, CompressionKind, EncryptionDescriptor, Link, Publication, SyncNode};
pub use overlay::OverlayLoader;
pub use package::open_publication;
pub use transform::{
    ContentKeyDecryptor, LcpTransformer, LicenseDecryptor, TransformContext, TransformPipeline,
    Transformer, XorObfuscation,
};
