//! Publication model: links, encryption metadata, and the narration tree.

mod link;
mod publication;
mod sync;

pub use link::{CompressionKind, EncryptionDescriptor, Link};
pub use publication::Publication;
pub use sync::{AudioClip, SyncNode, SyncNodeIter, roles};
