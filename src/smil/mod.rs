//! SMIL ingestion: clock values, the typed document, and the tree builder.

mod builder;
mod clock;
mod document;

pub use builder::{OverlayBuild, build_sync_tree};
pub use clock::{ClockError, parse_clock_value};
pub use document::{AudioElement, GroupAttributes, Parallel, Sequence, SmilDocument, TimingGroup, parse_smil};

use crate::error::Result;
use crate::util::decode_xml;

/// Decode raw SMIL bytes and build the overlay tree rooted at `smil_path`.
pub fn parse_overlay(bytes: &[u8], smil_path: &str) -> Result<OverlayBuild> {
    let text = decode_xml(bytes);
    let document = parse_smil(&text)?;
    Ok(build_sync_tree(&document, smil_path))
}
