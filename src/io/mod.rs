//! Random-access byte sources and the streams handed to callers.

mod adapter;
mod byte_source;
mod stream;

pub use adapter::ByteSourceCursor;
pub use byte_source::{ByteSource, FileSource, MemorySource};
pub use stream::{ByteRange, ByteStream};
