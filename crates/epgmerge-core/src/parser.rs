//! Lenient XMLTV document parser.
//!
//! The parser walks quick-xml events and collects top-level `<channel>` and
//! `<programme>` elements into a [`Document`]. It is deliberately
//! forgiving: reader errors skip the damaged fragment and continue, stray
//! end tags are ignored, unclosed elements are closed at the end of input,
//! elements missing required attributes are dropped individually, and CDATA
//! sections are unwrapped to escaped text. A parse only fails when no root
//! element can be recovered at all.
//!
//! Captured values are kept in stored (escaped) form; see the note in
//! [`crate::types`].

use crate::types::{Channel, DisplayName, Document, Programme};
use crate::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

/// Parsed record under construction.
enum Rec {
    Channel(Channel),
    Programme(Programme),
}

/// Text-bearing child of the current record.
enum Field {
    DisplayName(Option<String>),
    Title,
    Desc,
    Category,
}

/// Event-walk state. The stack holds the local names of open elements, so
/// mismatched and missing end tags can be reconciled instead of derailing
/// depth tracking.
struct Walk {
    doc: Document,
    root_seen: bool,
    stack: Vec<Vec<u8>>,
    current: Option<Rec>,
    field: Option<Field>,
    text: String,
    skipped: usize,
    cdata_unwraps: usize,
}

impl Walk {
    fn new() -> Self {
        Self {
            doc: Document::default(),
            root_seen: false,
            stack: Vec::new(),
            current: None,
            field: None,
            text: String::new(),
            skipped: 0,
            cdata_unwraps: 0,
        }
    }

    fn open(&mut self, e: &BytesStart<'_>, self_closing: bool) {
        let elem_depth = self.stack.len() + 1;
        if elem_depth == 1 && !self.root_seen {
            self.root_seen = true;
            read_root_attributes(e, &mut self.doc);
        } else if elem_depth == 2 && self.root_seen {
            match begin_record(e) {
                Begin::Record(rec) => {
                    if self_closing {
                        finish_record(rec, &mut self.doc);
                    } else {
                        self.current = Some(rec);
                    }
                },
                Begin::Invalid => self.skipped += 1,
                Begin::Unknown => {},
            }
        } else if elem_depth == 3 {
            if let Some(rec) = self.current.as_mut() {
                self.text.clear();
                self.field = begin_child(e, rec);
            }
        }
        if !self_closing {
            self.stack.push(e.local_name().as_ref().to_vec());
        }
    }

    /// Closes the element currently on top of the stack.
    fn close_top(&mut self) {
        let closing_depth = self.stack.len();
        if closing_depth == 3 {
            if let Some(f) = self.field.take() {
                commit_field(self.current.as_mut(), f, std::mem::take(&mut self.text));
            }
        } else if closing_depth == 2 {
            if let Some(f) = self.field.take() {
                commit_field(self.current.as_mut(), f, std::mem::take(&mut self.text));
            }
            if let Some(rec) = self.current.take() {
                finish_record(rec, &mut self.doc);
            }
        }
        self.stack.pop();
    }

    /// Handles an end tag: pops to the matching open element, closing any
    /// unclosed children on the way; a tag that matches nothing open is a
    /// stray and is ignored.
    fn end(&mut self, name: &[u8]) {
        let Some(pos) = self.stack.iter().rposition(|n| n == name) else {
            return;
        };
        while self.stack.len() > pos {
            self.close_top();
        }
    }

    /// Closes everything still open at end of input.
    fn finish(&mut self) {
        while !self.stack.is_empty() {
            self.close_top();
        }
    }
}

/// Parses an XMLTV document, recovering as much structure as possible.
///
/// Returns `Err` only when the text yields no root element at all;
/// everything else degrades to skipped fragments and skipped records.
pub fn parse_document(xml: &str) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut walk = Walk::new();
    let mut recovered = 0usize;
    let mut last_error_pos = None;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => walk.open(&e, false),
            Ok(Event::Empty(e)) => walk.open(&e, true),
            Ok(Event::Text(e)) => {
                if walk.field.is_some() {
                    walk.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            },
            Ok(Event::CData(e)) => {
                if walk.field.is_some() {
                    let plain = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    walk.text.push_str(&quick_xml::escape::escape(&plain));
                    walk.cdata_unwraps += 1;
                }
            },
            Ok(Event::End(e)) => walk.end(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Ok(_) => {},
            Err(e) => {
                let pos = reader.buffer_position();
                recovered += 1;
                debug!("Recovered from XML error at byte {pos}: {e}");
                if last_error_pos == Some(pos) {
                    // The reader cannot advance past this point; keep what
                    // was recovered so far.
                    break;
                }
                last_error_pos = Some(pos);
            },
        }
        buf.clear();
    }
    walk.finish();

    if !walk.root_seen {
        return Err(Error::Parse(
            "no recoverable XML structure in source document".to_string(),
        ));
    }

    if recovered > 0 || walk.skipped > 0 || walk.cdata_unwraps > 0 {
        debug!(
            "Parsed with {} recovered fragments, {} skipped records, {} CDATA unwraps",
            recovered, walk.skipped, walk.cdata_unwraps
        );
    }
    Ok(walk.doc)
}

enum Begin {
    Record(Rec),
    Invalid,
    Unknown,
}

/// Starts a channel or programme record from its start tag, validating
/// required attributes.
fn begin_record(e: &BytesStart<'_>) -> Begin {
    match e.local_name().as_ref() {
        b"channel" => {
            let id = attr_value(e, b"id").unwrap_or_default();
            if id.is_empty() {
                debug!("Skipping channel without id attribute");
                return Begin::Invalid;
            }
            Begin::Record(Rec::Channel(Channel {
                id,
                display_names: Vec::new(),
                icons: Vec::new(),
            }))
        },
        b"programme" => {
            let channel = attr_value(e, b"channel").unwrap_or_default();
            let start = attr_value(e, b"start");
            let stop = attr_value(e, b"stop");
            let (Some(start), Some(stop)) = (start, stop) else {
                debug!("Skipping programme without start/stop attributes");
                return Begin::Invalid;
            };
            if channel.is_empty() {
                debug!("Skipping programme without channel attribute");
                return Begin::Invalid;
            }
            Begin::Record(Rec::Programme(Programme {
                channel,
                start,
                stop,
                title: None,
                desc: None,
                categories: Vec::new(),
                icon: None,
            }))
        },
        _ => Begin::Unknown,
    }
}

/// Handles a direct child element of the current record, returning the
/// text field it opens, if any. Icons carry their payload in attributes
/// and are committed immediately.
fn begin_child(e: &BytesStart<'_>, rec: &mut Rec) -> Option<Field> {
    match (e.local_name().as_ref(), &mut *rec) {
        (b"display-name", Rec::Channel(_)) => Some(Field::DisplayName(attr_value(e, b"lang"))),
        (b"icon", Rec::Channel(ch)) => {
            if let Some(src) = attr_value(e, b"src") {
                ch.icons.push(src);
            }
            None
        },
        (b"icon", Rec::Programme(p)) => {
            if p.icon.is_none() {
                p.icon = attr_value(e, b"src");
            }
            None
        },
        (b"title", Rec::Programme(_)) => Some(Field::Title),
        (b"desc", Rec::Programme(_)) => Some(Field::Desc),
        (b"category", Rec::Programme(_)) => Some(Field::Category),
        _ => None,
    }
}

/// Commits captured text into the current record when its field closes.
fn commit_field(rec: Option<&mut Rec>, field: Field, text: String) {
    let Some(rec) = rec else { return };
    match (rec, field) {
        (Rec::Channel(ch), Field::DisplayName(lang)) => {
            ch.display_names.push(DisplayName { name: text, lang });
        },
        (Rec::Programme(p), Field::Title) => {
            if p.title.is_none() {
                p.title = Some(text);
            }
        },
        (Rec::Programme(p), Field::Desc) => {
            if p.desc.is_none() {
                p.desc = Some(text);
            }
        },
        (Rec::Programme(p), Field::Category) => p.categories.push(text),
        _ => {},
    }
}

fn finish_record(rec: Rec, doc: &mut Document) {
    match rec {
        Rec::Channel(ch) => doc.channels.push(ch),
        Rec::Programme(p) => doc.programmes.push(p),
    }
}

fn read_root_attributes(e: &BytesStart<'_>, doc: &mut Document) {
    doc.generator_name = attr_value(e, b"generator-info-name");
    doc.generator_url = attr_value(e, b"generator-info-url");
    doc.generated_ts = attr_value(e, b"generated-ts");
}

/// Raw attribute value in stored (escaped) form, by local name.
fn attr_value(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .map(|attr| raw_value(&attr))
}

fn raw_value(attr: &Attribute<'_>) -> String {
    String::from_utf8_lossy(&attr.value).into_owned()
}
