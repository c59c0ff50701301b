//! Text decoding, XML helpers, and archive path utilities.

use std::borrow::Cow;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use quick_xml::events::BytesStart;

/// Characters escaped when turning a declared href back into an encoded
/// archive entry name. `/` is kept so paths stay paths.
const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Decode bytes to a string, handling various encodings.
///
/// 1. UTF-8 first (BOM handled by encoding_rs)
/// 2. The hint encoding, usually from `<?xml encoding="..."?>`
/// 3. Windows-1252, common in older DAISY books
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Decode an XML document, honouring the encoding named in its declaration.
pub fn decode_xml(bytes: &[u8]) -> Cow<'_, str> {
    decode_text(bytes, extract_xml_encoding(bytes))
}

/// Extract the encoding name from an XML declaration, if any.
///
/// Only the first 100 bytes are inspected.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(100)];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let quote = *after_enc.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = after_enc[1..].iter().position(|&b| b == quote)? + 1;
    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

/// Extract local name from namespaced XML name (e.g., "epub:type" -> "type").
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Value of the attribute whose local name is `name`, with entities
/// unescaped. A value that fails to unescape is returned raw.
pub fn attribute_value(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == name)
        .map(|attr| {
            let raw = String::from_utf8_lossy(attr.value.as_ref());
            match quick_xml::escape::unescape(&raw) {
                Ok(Cow::Owned(value)) => value,
                _ => raw.into_owned(),
            }
        })
}

/// Percent-decode an href. Invalid UTF-8 sequences are replaced.
pub fn percent_decode(href: &str) -> String {
    percent_decode_str(href).decode_utf8_lossy().into_owned()
}

/// Percent-encode an archive path, leaving `/` intact.
pub fn percent_encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_ENCODE_SET).to_string()
}

/// Split a reference into its path and optional fragment.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    }
}

/// Resolve `relative` against the directory of the archive path `base`.
///
/// If base is "OEBPS/smil/ch01.smil" and relative is "../text/ch01.xhtml#p1",
/// the result is "OEBPS/text/ch01.xhtml#p1". Fragment-only references resolve
/// to `base#fragment`. A leading `/` means the container root.
pub fn resolve_relative_path(base: &str, relative: &str) -> String {
    if relative.contains("://") {
        return relative.to_string();
    }

    if relative.starts_with('#') {
        return format!("{}{}", split_fragment(base).0, relative);
    }

    let (path, fragment) = split_fragment(relative);

    let mut segments: Vec<&str> = Vec::new();
    if !path.starts_with('/') {
        let base_path = split_fragment(base).0;
        if let Some((dir, _file)) = base_path.rsplit_once('/') {
            segments.extend(dir.split('/').filter(|s| !s.is_empty()));
        }
    }

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    let mut resolved = segments.join("/");
    if let Some(fragment) = fragment {
        resolved.push('#');
        resolved.push_str(fragment);
    }
    resolved
}

/// Split a whitespace-separated token list, dropping duplicates while
/// keeping first-seen order.
pub fn unique_tokens(value: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in value.split_ascii_whitespace() {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}
