//! Recursive construction of a [`SyncNode`] tree from a [`SmilDocument`].

use tracing::{debug, warn};

use super::clock::parse_clock_value;
use super::document::{AudioElement, GroupAttributes, Parallel, Sequence, SmilDocument, TimingGroup};
use crate::error::{Error, Result};
use crate::model::{AudioClip, SyncNode, roles};
use crate::util::{percent_decode, resolve_relative_path, unique_tokens};

/// Result of building one overlay tree.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBuild {
    pub root: SyncNode,
    /// False when the document's image-only content left the root with
    /// nothing navigable. The tree is still returned but the root must stay
    /// un-initialized.
    pub complete: bool,
}

/// Build the overlay tree for the SMIL document stored at `smil_path`.
///
/// Text and audio references are resolved against the directory of
/// `smil_path`. Malformed timing groups below the body are skipped with a
/// warning; they never fail the whole tree.
pub fn build_sync_tree(document: &SmilDocument, smil_path: &str) -> OverlayBuild {
    let builder = TreeBuilder { smil_path };
    let body = &document.body;

    let mut root = SyncNode {
        smil_path: Some(smil_path.to_string()),
        ..Default::default()
    };
    root.add_role(roles::SECTION);
    builder.apply_group_roles(&mut root, &body.attrs, false);
    root.text_ref = body.text_ref.as_deref().map(|src| builder.resolve(src));
    root.duration = builder.clock(body.attrs.dur.as_deref(), "dur");
    root.total_elapsed_time = builder.clock(document.total_elapsed_time.as_deref(), "totalElapsedTime");

    let mut complete = true;
    if let [TimingGroup::Parallel(par)] = body.children.as_slice()
        && is_image_only(par)
    {
        debug!(smil = %smil_path, "overlay holds a single image-only timing group");
        let mut node = SyncNode {
            initialized: true,
            ..Default::default()
        };
        builder.apply_group_roles(&mut node, &par.attrs, false);
        node.duration = builder.clock(par.attrs.dur.as_deref(), "dur");
        root.children.push(node);
        complete = false;
    } else {
        root.children = builder.children(&body.children);
        if root.children.is_empty() && contains_image_only(&body.children) {
            debug!(smil = %smil_path, "overlay holds only image-only timing groups");
            complete = false;
        }
    }

    if root.duration.is_none()
        && let [only] = root.children.as_slice()
    {
        root.duration = only.duration;
    }

    OverlayBuild { root, complete }
}

struct TreeBuilder<'a> {
    smil_path: &'a str,
}

impl TreeBuilder<'_> {
    fn children(&self, groups: &[TimingGroup]) -> Vec<SyncNode> {
        let mut nodes = Vec::with_capacity(groups.len());
        for group in groups {
            match self.group(group) {
                Ok(Some(node)) => nodes.push(node),
                Ok(None) => {}
                Err(e) => {
                    warn!(smil = %self.smil_path, id = ?group_id(group), error = %e, "skipping timing group");
                }
            }
        }
        nodes
    }

    /// Build one timing group. `Ok(None)` means the group is dropped.
    fn group(&self, group: &TimingGroup) -> Result<Option<SyncNode>> {
        match group {
            TimingGroup::Sequence(seq) => Ok(self.sequence(seq)),
            TimingGroup::Parallel(par) => self.parallel(par),
        }
    }

    fn sequence(&self, seq: &Sequence) -> Option<SyncNode> {
        let mut node = SyncNode {
            initialized: true,
            ..Default::default()
        };
        node.add_role(roles::SECTION);
        self.apply_group_roles(&mut node, &seq.attrs, true);
        node.text_ref = seq.text_ref.as_deref().map(|src| self.resolve(src));
        node.duration = self.clock(seq.attrs.dur.as_deref(), "dur");
        node.children = self.children(&seq.children);

        if node.duration.is_none()
            && let [only] = node.children.as_slice()
        {
            node.duration = only.duration;
        }

        if node.is_empty_group() {
            debug!(smil = %self.smil_path, id = ?seq.attrs.id, "dropping empty sequence");
            return None;
        }
        Some(node)
    }

    fn parallel(&self, par: &Parallel) -> Result<Option<SyncNode>> {
        if is_image_only(par) {
            debug!(smil = %self.smil_path, id = ?par.attrs.id, "dropping image-only par");
            return Ok(None);
        }
        if par.text.is_none() && par.audio.is_empty() {
            return Err(Error::MalformedSync(
                "par has no text, audio, or image".to_string(),
            ));
        }

        let mut node = SyncNode {
            initialized: true,
            ..Default::default()
        };
        self.apply_group_roles(&mut node, &par.attrs, true);
        node.text_ref = par.text.as_deref().map(|src| self.resolve(src));
        node.audio_ref = self.audio_clip(&par.audio)?;
        node.duration = self.clock(par.attrs.dur.as_deref(), "dur");
        Ok(Some(node))
    }

    /// Collapse the leading run of clips on the same audio file into one
    /// clip spanning the first begin to the last end.
    fn audio_clip(&self, audio: &[AudioElement]) -> Result<Option<AudioClip>> {
        let Some(first) = audio.first() else {
            return Ok(None);
        };

        let run: Vec<&AudioElement> = audio.iter().take_while(|a| a.src == first.src).collect();
        if run.len() < audio.len() {
            debug!(
                smil = %self.smil_path,
                src = %first.src,
                ignored = audio.len() - run.len(),
                "par references more than one audio file"
            );
        }

        let clip_begin = match first.clip_begin.as_deref() {
            Some(value) => parse_clock_value(value)
                .map_err(|e| Error::MalformedSync(format!("clipBegin: {e}")))?,
            None => 0.0,
        };
        let clip_end = match run.last().and_then(|last| last.clip_end.as_deref()) {
            Some(value) => Some(
                parse_clock_value(value)
                    .map_err(|e| Error::MalformedSync(format!("clipEnd: {e}")))?,
            ),
            None => None,
        };

        Ok(Some(AudioClip::new(self.resolve(&first.src), clip_begin, clip_end)))
    }

    /// Add `epub:type` tokens and the class/customTest role.
    fn apply_group_roles(&self, node: &mut SyncNode, attrs: &GroupAttributes, classify: bool) {
        if let Some(types) = attrs.epub_type.as_deref() {
            for token in unique_tokens(types) {
                node.add_role(token);
            }
        }
        if classify && let Some(role) = classify_role(attrs) {
            node.add_role(role);
        }
    }

    fn resolve(&self, src: &str) -> String {
        resolve_relative_path(self.smil_path, &percent_decode(src))
    }

    /// Parse an optional clock attribute. Unparseable values are logged and
    /// treated as absent.
    fn clock(&self, value: Option<&str>, attribute: &str) -> Option<f64> {
        let value = value?;
        match parse_clock_value(value) {
            Ok(seconds) => Some(seconds),
            Err(e) => {
                warn!(smil = %self.smil_path, attribute, error = %e, "ignoring clock value");
                None
            }
        }
    }
}

fn is_image_only(par: &Parallel) -> bool {
    par.image.is_some() && par.text.is_none() && par.audio.is_empty()
}

fn contains_image_only(groups: &[TimingGroup]) -> bool {
    groups.iter().any(|group| match group {
        TimingGroup::Parallel(par) => is_image_only(par),
        TimingGroup::Sequence(seq) => contains_image_only(&seq.children),
    })
}

/// Role for a DAISY `class` or `customTest` value. `class` is consulted
/// first; when it names no known role, `customTest` still applies.
fn classify_role(attrs: &GroupAttributes) -> Option<&'static str> {
    [attrs.class.as_deref(), attrs.custom_test.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|value| {
            if value.contains("pagenum") {
                Some(roles::PAGEBREAK)
            } else if value.contains("note") {
                Some(roles::NOTE)
            } else if value.contains("sidebar") {
                Some(roles::SIDEBAR)
            } else if value.contains("annotation") {
                Some(roles::ANNOTATION)
            } else {
                None
            }
        })
}

fn group_id(group: &TimingGroup) -> Option<&str> {
    match group {
        TimingGroup::Sequence(seq) => seq.attrs.id.as_deref(),
        TimingGroup::Parallel(par) => par.attrs.id.as_deref(),
    }
}
