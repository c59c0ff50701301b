//! Typed SMIL documents and the XML parse step that produces them.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::util::{attribute_value as attribute, local_name};

/// A parsed SMIL document: its `<body>` plus the head metadata we use.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SmilDocument {
    pub body: Sequence,
    /// `dtb:totalElapsedTime` / `ncc:totalElapsedTime` from the head.
    pub total_elapsed_time: Option<String>,
}

/// A timing group in the body.
#[derive(Debug, Clone, PartialEq)]
pub enum TimingGroup {
    Sequence(Sequence),
    Parallel(Parallel),
}

/// Attributes shared by `<body>`, `<seq>`, and `<par>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupAttributes {
    pub id: Option<String>,
    /// Raw `epub:type` token list.
    pub epub_type: Option<String>,
    pub class: Option<String>,
    pub custom_test: Option<String>,
    pub dur: Option<String>,
}

/// `<seq>` (and `<body>`): children play one after another.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence {
    pub attrs: GroupAttributes,
    /// `epub:textref`, as written.
    pub text_ref: Option<String>,
    pub children: Vec<TimingGroup>,
}

/// `<par>`: a text fragment, its narration, and possibly an image.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parallel {
    pub attrs: GroupAttributes,
    pub text: Option<String>,
    /// Audio clips in document order. DAISY books may list several inside a
    /// nested `<seq>`.
    pub audio: Vec<AudioElement>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioElement {
    pub src: String,
    pub clip_begin: Option<String>,
    pub clip_end: Option<String>,
}

enum Frame {
    Seq(Sequence),
    /// A `<par>` and the depth of `<seq>` wrappers opened inside it.
    Par(Parallel, usize),
}

/// Parse SMIL markup into a [`SmilDocument`].
pub fn parse_smil(content: &str) -> Result<SmilDocument> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut total_elapsed_time = None;
    let mut body: Option<Sequence> = None;
    let mut stack: Vec<Frame> = Vec::new();
    let mut in_body = false;

    loop {
        let event = reader.read_event()?;
        let (element, is_empty) = match &event {
            Event::Start(e) => (Some(e), false),
            Event::Empty(e) => (Some(e), true),
            _ => (None, false),
        };

        if let Some(e) = element {
            let name = e.name();
            match local_name(name.as_ref()) {
                b"meta" if !in_body => {
                    let name = attribute(e, b"name");
                    if matches!(
                        name.as_deref(),
                        Some("dtb:totalElapsedTime") | Some("ncc:totalElapsedTime")
                    ) {
                        total_elapsed_time = attribute(e, b"content");
                    }
                }
                b"body" => {
                    let seq = read_sequence(e);
                    if is_empty {
                        body = Some(seq);
                    } else {
                        in_body = true;
                        stack.push(Frame::Seq(seq));
                    }
                }
                b"seq" if in_body => match stack.last_mut() {
                    Some(Frame::Par(_, nested)) => {
                        if !is_empty {
                            *nested += 1;
                        }
                    }
                    _ => {
                        let seq = read_sequence(e);
                        if is_empty {
                            push_child(&mut stack, TimingGroup::Sequence(seq));
                        } else {
                            stack.push(Frame::Seq(seq));
                        }
                    }
                },
                b"par" if in_body => {
                    let par = Parallel {
                        attrs: read_group_attributes(e),
                        ..Default::default()
                    };
                    if is_empty {
                        push_child(&mut stack, TimingGroup::Parallel(par));
                    } else {
                        stack.push(Frame::Par(par, 0));
                    }
                }
                b"text" if in_body => {
                    if let Some(Frame::Par(par, _)) = stack.last_mut() {
                        par.text = attribute(e, b"src");
                    }
                }
                b"img" if in_body => {
                    if let Some(Frame::Par(par, _)) = stack.last_mut() {
                        par.image = attribute(e, b"src");
                    }
                }
                b"audio" if in_body => {
                    if let Some(Frame::Par(par, _)) = stack.last_mut()
                        && let Some(src) = attribute(e, b"src")
                    {
                        par.audio.push(AudioElement {
                            src,
                            clip_begin: attribute(e, b"clipBegin")
                                .or_else(|| attribute(e, b"clip-begin")),
                            clip_end: attribute(e, b"clipEnd")
                                .or_else(|| attribute(e, b"clip-end")),
                        });
                    }
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::End(e) if in_body => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"seq" => {
                        if let Some(Frame::Par(_, nested)) = stack.last_mut()
                            && *nested > 0
                        {
                            *nested -= 1;
                        } else if let Some(Frame::Seq(seq)) = stack.pop() {
                            push_child(&mut stack, TimingGroup::Sequence(seq));
                        }
                    }
                    b"par" => {
                        if let Some(Frame::Par(par, _)) = stack.pop() {
                            push_child(&mut stack, TimingGroup::Parallel(par));
                        }
                    }
                    b"body" => {
                        in_body = false;
                        if let Some(Frame::Seq(seq)) = stack.pop() {
                            body = Some(seq);
                        }
                        stack.clear();
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let body = body.ok_or_else(|| Error::MalformedSync("document has no <body>".to_string()))?;
    Ok(SmilDocument {
        body,
        total_elapsed_time,
    })
}

fn push_child(stack: &mut [Frame], child: TimingGroup) {
    if let Some(Frame::Seq(parent)) = stack.last_mut() {
        parent.children.push(child);
    }
}

fn read_sequence(e: &BytesStart<'_>) -> Sequence {
    Sequence {
        attrs: read_group_attributes(e),
        text_ref: attribute(e, b"textref"),
        children: Vec::new(),
    }
}

fn read_group_attributes(e: &BytesStart<'_>) -> GroupAttributes {
    GroupAttributes {
        id: attribute(e, b"id"),
        epub_type: attribute(e, b"type"),
        class: attribute(e, b"class"),
        custom_test: attribute(e, b"customTest"),
        dur: attribute(e, b"dur"),
    }
}
