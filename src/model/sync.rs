/// Role tokens assigned during SMIL ingestion.
pub mod roles {
    pub const SECTION: &str = "section";
    pub const PAGEBREAK: &str = "pagebreak";
    pub const NOTE: &str = "note";
    pub const SIDEBAR: &str = "sidebar";
    pub const ANNOTATION: &str = "annotation";
}

/// A timed slice of an audio file.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AudioClip {
    /// Archive path of the audio file.
    pub path: String,
    /// Seconds.
    pub clip_begin: f64,
    pub clip_end: Option<f64>,
}

impl AudioClip {
    pub fn new(path: impl Into<String>, clip_begin: f64, clip_end: Option<f64>) -> Self {
        Self {
            path: path.into(),
            clip_begin,
            clip_end,
        }
    }

    /// Length of the clip, when the end is known.
    pub fn duration(&self) -> Option<f64> {
        self.clip_end.map(|end| (end - self.clip_begin).max(0.0))
    }

    /// Render as a media-fragment URI: `path#t=begin[,end]`.
    pub fn media_fragment(&self) -> String {
        match self.clip_end {
            Some(end) => format!("{}#t={},{}", self.path, self.clip_begin, end),
            None => format!("{}#t={}", self.path, self.clip_begin),
        }
    }
}

/// A node in a resource's media-overlay tree.
///
/// The root of each tree carries `smil_path` and is filled in lazily by
/// [`OverlayLoader`](crate::overlay::OverlayLoader); descendants are
/// fully resolved and carry no path.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SyncNode {
    pub initialized: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub smil_path: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub roles: Vec<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub text_ref: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub audio_ref: Option<AudioClip>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub duration: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub total_elapsed_time: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<SyncNode>,
}

impl SyncNode {
    /// An un-initialized root backed by the SMIL document at `smil_path`.
    pub fn pending(smil_path: impl Into<String>) -> Self {
        Self {
            smil_path: Some(smil_path.into()),
            ..Default::default()
        }
    }

    /// True for a timing group with nothing navigable in it (image-only).
    pub fn is_empty_group(&self) -> bool {
        self.audio_ref.is_none() && self.text_ref.is_none() && self.children.is_empty()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Append `role` unless already present.
    pub fn add_role(&mut self, role: impl Into<String>) {
        let role = role.into();
        if !self.has_role(&role) {
            self.roles.push(role);
        }
    }

    /// Depth-first pre-order walk over this node and its descendants.
    pub fn iter(&self) -> SyncNodeIter<'_> {
        SyncNodeIter { stack: vec![self] }
    }

    /// Nodes carrying an audio clip, in playback order.
    pub fn clips(&self) -> impl Iterator<Item = &SyncNode> {
        self.iter().filter(|node| node.audio_ref.is_some())
    }

    /// Nodes without children: the playable timing units.
    pub fn leaves(&self) -> impl Iterator<Item = &SyncNode> {
        self.iter().filter(|node| node.children.is_empty())
    }

    /// First node whose text reference equals `text_ref`.
    pub fn find_by_text(&self, text_ref: &str) -> Option<&SyncNode> {
        self.iter()
            .find(|node| node.text_ref.as_deref() == Some(text_ref))
    }
}

/// Depth-first iterator returned by [`SyncNode::iter`].
pub struct SyncNodeIter<'a> {
    stack: Vec<&'a SyncNode>,
}

impl<'a> Iterator for SyncNodeIter<'a> {
    type Item = &'a SyncNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(text: &str, audio: &str, begin: f64, end: f64) -> SyncNode {
        SyncNode {
            text_ref: Some(text.to_string()),
            audio_ref: Some(AudioClip::new(audio, begin, Some(end))),
            ..Default::default()
        }
    }

    #[test]
    fn test_pending_root() {
        let node = SyncNode::pending("OEBPS/ch1.smil");
        assert!(!node.initialized);
        assert_eq!(node.smil_path.as_deref(), Some("OEBPS/ch1.smil"));
        assert!(node.is_empty_group());
    }

    #[test]
    fn test_iter_is_preorder() {
        let mut section = SyncNode::default();
        section.add_role(roles::SECTION);
        section.children = vec![leaf("c.xhtml#a", "a.mp3", 0.0, 1.0), leaf("c.xhtml#b", "a.mp3", 1.0, 2.0)];
        let mut root = SyncNode::default();
        root.children = vec![section, leaf("c.xhtml#c", "a.mp3", 2.0, 3.0)];

        let texts: Vec<_> = root.clips().filter_map(|n| n.text_ref.as_deref()).collect();
        assert_eq!(texts, vec!["c.xhtml#a", "c.xhtml#b", "c.xhtml#c"]);
        assert_eq!(root.iter().count(), 5);
        assert_eq!(root.leaves().count(), 3);
        assert!(root.find_by_text("c.xhtml#b").is_some());
    }

    #[test]
    fn test_add_role_dedupes() {
        let mut node = SyncNode::default();
        node.add_role("note");
        node.add_role("note");
        assert_eq!(node.roles, vec!["note"]);
    }

    #[test]
    fn test_media_fragment() {
        assert_eq!(
            AudioClip::new("a/b.mp3", 1.5, Some(3.0)).media_fragment(),
            "a/b.mp3#t=1.5,3"
        );
        assert_eq!(AudioClip::new("b.mp3", 0.0, None).media_fragment(), "b.mp3#t=0");
        assert_eq!(AudioClip::new("b.mp3", 1.0, Some(3.5)).duration(), Some(2.5));
    }
}
