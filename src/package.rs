//! Minimal EPUB package assembly.
//!
//! Reads `META-INF/container.xml`, the OPF it points at, and
//! `META-INF/encryption.xml` when present, producing a [`Publication`] whose
//! links carry archive paths, encryption descriptors, and pending media
//! overlays.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::model::{CompressionKind, EncryptionDescriptor, Link, Publication, SyncNode};
use crate::transform::LCP_SCHEME;
use crate::util::{
    attribute_value as attribute, decode_xml, local_name, percent_decode, resolve_relative_path,
};

const CONTAINER_PATH: &str = "META-INF/container.xml";
const ENCRYPTION_PATH: &str = "META-INF/encryption.xml";

/// A manifest `<item>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    /// Manifest id of the item's SMIL document.
    pub media_overlay: Option<String>,
}

/// The parts of an OPF package document the core needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackageDocument {
    pub identifier: String,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<String>,
}

/// Assemble a publication from `archive`.
///
/// `lcp_profile` is the encryption profile declared by an open LCP license;
/// it is recorded on LCP-protected resources.
pub fn open_publication(archive: &dyn Archive, lcp_profile: Option<&str>) -> Result<Publication> {
    let container = archive.read_entry(CONTAINER_PATH)?;
    let opf_path = parse_container(&container)?;
    let opf = archive.read_entry(&opf_path)?;
    let package = parse_package(&decode_xml(&opf))?;

    let encryption = if archive.has_entry(ENCRYPTION_PATH) {
        parse_encryption(&decode_xml(&archive.read_entry(ENCRYPTION_PATH)?), lcp_profile)?
    } else {
        HashMap::new()
    };

    let path_of = |item: &ManifestItem| resolve_relative_path(&opf_path, &item.href);
    let by_id: HashMap<&str, &ManifestItem> =
        package.manifest.iter().map(|item| (item.id.as_str(), item)).collect();

    let to_link = |item: &ManifestItem| {
        let mut link = Link::new(path_of(item), item.media_type.clone());
        if let Some(descriptor) = encryption.get(link.path()) {
            link.encryption = Some(descriptor.clone());
        }
        if let Some(smil) = item.media_overlay.as_deref().and_then(|id| by_id.get(id).copied()) {
            link.overlay = Some(SyncNode::pending(percent_decode(&path_of(smil))));
        }
        link
    };

    let mut publication = Publication::new(package.identifier.clone());
    for idref in &package.spine {
        match by_id.get(idref.as_str()).copied() {
            Some(item) => publication.spine.push(to_link(item)),
            None => tracing::warn!(idref = %idref, "spine references unknown manifest item"),
        }
    }
    for item in &package.manifest {
        if !package.spine.contains(&item.id) {
            publication.resources.push(to_link(item));
        }
    }

    tracing::debug!(
        opf = %opf_path,
        spine = publication.spine.len(),
        resources = publication.resources.len(),
        encrypted = encryption.len(),
        "opened publication"
    );
    Ok(publication)
}

/// Find the OPF path in `META-INF/container.xml`.
pub fn parse_container(bytes: &[u8]) -> Result<String> {
    let content = decode_xml(bytes);
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::InvalidPackage(
        "no rootfile found in container.xml".to_string(),
    ))
}

/// Parse the unique identifier, manifest, and spine of an OPF document.
pub fn parse_package(content: &str) -> Result<PackageDocument> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut package = PackageDocument::default();
    let mut unique_id: Option<String> = None;
    let mut identifiers: Vec<(Option<String>, String)> = Vec::new();
    let mut current_identifier: Option<(Option<String>, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"identifier" => {
                current_identifier = Some((attribute(&e, b"id"), String::new()));
            }
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"package" => unique_id = attribute(&e, b"unique-identifier"),
                    b"item" => {
                        let (Some(id), Some(href)) = (attribute(&e, b"id"), attribute(&e, b"href"))
                        else {
                            continue;
                        };
                        package.manifest.push(ManifestItem {
                            id,
                            href,
                            media_type: attribute(&e, b"media-type").unwrap_or_default(),
                            media_overlay: attribute(&e, b"media-overlay"),
                        });
                    }
                    b"itemref" => {
                        if let Some(idref) = attribute(&e, b"idref") {
                            package.spine.push(idref);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if let Some((_, text)) = current_identifier.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if let Some((_, text)) = current_identifier.as_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    text.push(resolved);
                }
            }
            Event::End(e) => {
                if local_name(e.name().as_ref()) == b"identifier"
                    && let Some((id, text)) = current_identifier.take()
                {
                    identifiers.push((id, text.trim().to_string()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    package.identifier = identifiers
        .iter()
        .find(|(id, _)| id.is_some() && *id == unique_id)
        .or_else(|| identifiers.first())
        .map(|(_, value)| value.clone())
        .unwrap_or_default();

    Ok(package)
}

/// Parse `META-INF/encryption.xml` into descriptors keyed by decoded
/// archive path.
pub fn parse_encryption(
    content: &str,
    lcp_profile: Option<&str>,
) -> Result<HashMap<String, EncryptionDescriptor>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    #[derive(Default)]
    struct Pending {
        algorithm: Option<String>,
        path: Option<String>,
        lcp: bool,
        compression: Option<CompressionKind>,
        original_length: Option<u64>,
    }

    let mut descriptors = HashMap::new();
    let mut current: Option<Pending> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"EncryptedData" {
                    current = Some(Pending::default());
                    continue;
                }
                let Some(pending) = current.as_mut() else {
                    continue;
                };
                match local {
                    b"EncryptionMethod" => pending.algorithm = attribute(&e, b"Algorithm"),
                    b"CipherReference" => {
                        pending.path = attribute(&e, b"URI").map(|uri| percent_decode(&uri));
                    }
                    b"RetrievalMethod" => {
                        pending.lcp = attribute(&e, b"URI")
                            .is_some_and(|uri| uri.starts_with("license.lcpl#"));
                    }
                    b"Compression" => {
                        pending.compression = attribute(&e, b"Method")
                            .and_then(|m| m.trim().parse().ok())
                            .and_then(CompressionKind::from_method);
                        pending.original_length = attribute(&e, b"OriginalLength")
                            .and_then(|l| l.trim().parse().ok());
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                if local_name(e.name().as_ref()) != b"EncryptedData" {
                    continue;
                }
                let Some(pending) = current.take() else {
                    continue;
                };
                let (Some(algorithm), Some(path)) = (pending.algorithm, pending.path) else {
                    tracing::warn!("skipping EncryptedData without algorithm or cipher reference");
                    continue;
                };

                let mut descriptor = EncryptionDescriptor::new(algorithm);
                if pending.lcp {
                    descriptor = descriptor.with_scheme(LCP_SCHEME);
                    if let Some(profile) = lcp_profile {
                        descriptor = descriptor.with_profile(profile);
                    }
                }
                descriptor.compression = pending.compression;
                descriptor.original_length = pending.original_length;
                descriptors.insert(path, descriptor);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(descriptors)
}

/// Resolve a predefined XML entity or character reference.
fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}
