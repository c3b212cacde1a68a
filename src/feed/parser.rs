//! RSS item parser.
//!
//! Streams the document through `quick-xml` and collects every `<item>`
//! element at any depth, in document order. Only the first direct child of
//! each known tag is read, mirroring a `find(tag)` lookup on the element.
//! Anything that is not a well-formed XML document fails the whole parse;
//! there is no partial result.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::types::{FeedItem, ItemField};

const ITEM_TAG: &[u8] = b"item";

/// The document could not be read as well-formed XML.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Rejected by the XML reader (bad syntax, mismatched tags, unknown entities).
    #[error("malformed XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    /// Tokenized fine but is not a single well-formed document.
    #[error("malformed XML at byte {position}: {reason}")]
    Structure { position: u64, reason: &'static str },
}

/// Text being gathered for one item field.
struct Capture {
    field: ItemField,
    depth: usize,
    text: String,
    /// ElementTree-style `.text` stops at the first nested element.
    closed: bool,
}

struct OpenItem {
    depth: usize,
    slot: usize,
    item: FeedItem,
    seen: [bool; 6],
    capture: Option<Capture>,
}

impl OpenItem {
    fn new(depth: usize, slot: usize) -> Self {
        Self {
            depth,
            slot,
            item: FeedItem::new(),
            seen: [false; 6],
            capture: None,
        }
    }

    /// Claims `field` if it is the first direct child of that kind.
    fn claim(&mut self, field: ItemField) -> bool {
        let idx = field.index();
        if self.seen[idx] {
            return false;
        }
        self.seen[idx] = true;
        true
    }
}

/// Parses `raw` and returns the `<item>` elements it contains.
///
/// # Errors
///
/// [`ParseError`] if the text is not a well-formed XML document. A missing
/// child element is not an error; it simply reads as `None` on the item.
pub fn parse(raw: &str) -> Result<Vec<FeedItem>, ParseError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    // SEC-002: quick-xml 0.37 never expands <!ENTITY> declarations, so
    // references to them fail in `unescape()` instead of pulling in content.
    let mut reader = Reader::from_str(raw);

    let mut slots: Vec<Option<FeedItem>> = Vec::new();
    let mut open: Vec<OpenItem> = Vec::new();
    let mut depth: usize = 0;
    let mut root_closed = false;
    let mut buf = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| ParseError::Xml { position, source })?;

        match event {
            Event::Start(e) => {
                if root_closed {
                    return Err(structure(position, "junk after document element"));
                }
                check_attributes(&e, position)?;
                close_captures_at(&mut open, depth);
                depth += 1;
                let name = e.name();
                if name.as_ref() == ITEM_TAG {
                    slots.push(None);
                    open.push(OpenItem::new(depth, slots.len() - 1));
                } else if let Some(field) = ItemField::from_tag(name.as_ref()) {
                    if let Some(parent) = open.last_mut() {
                        if parent.depth + 1 == depth && parent.claim(field) {
                            parent.capture = Some(Capture {
                                field,
                                depth,
                                text: String::new(),
                                closed: false,
                            });
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if root_closed {
                    return Err(structure(position, "junk after document element"));
                }
                check_attributes(&e, position)?;
                close_captures_at(&mut open, depth);
                let name = e.name();
                if name.as_ref() == ITEM_TAG {
                    slots.push(Some(FeedItem::new()));
                } else if let Some(field) = ItemField::from_tag(name.as_ref()) {
                    if let Some(parent) = open.last_mut() {
                        if parent.depth == depth {
                            parent.claim(field);
                        }
                    }
                }
                if depth == 0 {
                    root_closed = true;
                }
            }
            Event::End(_) => {
                if depth == 0 {
                    return Err(structure(position, "unmatched end tag"));
                }
                if let Some(top) = open.last_mut() {
                    if top.capture.as_ref().is_some_and(|c| c.depth == depth) {
                        if let Some(capture) = top.capture.take() {
                            if !capture.text.is_empty() {
                                top.item.set(capture.field, capture.text);
                            }
                        }
                    }
                    if top.depth == depth {
                        if let Some(done) = open.pop() {
                            slots[done.slot] = Some(done.item);
                        }
                    }
                }
                depth -= 1;
                if depth == 0 {
                    root_closed = true;
                }
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|source| ParseError::Xml { position, source })?;
                if depth == 0 {
                    if !text.trim().is_empty() {
                        return Err(structure(position, "text outside the document element"));
                    }
                } else {
                    push_text(&mut open, depth, &text);
                }
            }
            Event::CData(e) => {
                if depth == 0 {
                    return Err(structure(position, "CDATA outside the document element"));
                }
                let text = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|source| ParseError::Xml { position, source: source.into() })?;
                push_text(&mut open, depth, &text);
            }
            Event::Eof => {
                if depth > 0 {
                    return Err(structure(position, "unclosed element at end of document"));
                }
                if !root_closed {
                    return Err(structure(position, "no element found"));
                }
                break;
            }
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }

    Ok(slots.into_iter().flatten().collect())
}

/// quick-xml only validates attributes as they are iterated; unquoted values,
/// bare names and duplicates surface here.
fn check_attributes(e: &BytesStart<'_>, position: u64) -> Result<(), ParseError> {
    for attr in e.attributes() {
        attr.map_err(|err| ParseError::Xml {
            position,
            source: err.into(),
        })?;
    }
    Ok(())
}

fn structure(position: u64, reason: &'static str) -> ParseError {
    ParseError::Structure { position, reason }
}

/// A child element opened inside a field at `depth` ends that field's text.
fn close_captures_at(open: &mut [OpenItem], depth: usize) {
    for item in open.iter_mut() {
        if let Some(capture) = item.capture.as_mut() {
            if capture.depth == depth {
                capture.closed = true;
            }
        }
    }
}

fn push_text(open: &mut [OpenItem], depth: usize, text: &str) {
    for item in open.iter_mut() {
        if let Some(capture) = item.capture.as_mut() {
            if capture.depth == depth && !capture.closed {
                capture.text.push_str(text);
            }
        }
    }
}
