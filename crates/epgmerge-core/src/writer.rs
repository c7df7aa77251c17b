//! Document assembly and serialization.
//!
//! The builder stamps provenance metadata and lays the merged state out in
//! output order; the serializer renders the tree with quick-xml. Stored
//! values are written verbatim (they are kept in escaped form; see
//! [`crate::types`]), so serialization never double-escapes. Output is
//! committed via a temp file and rename: a crashed run must not leave a
//! truncated guide at the destination.

use crate::config::GeneratorConfig;
use crate::merge::MergeState;
use crate::types::{Channel, Document, Programme};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use quick_xml::Writer;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use std::borrow::Cow;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use tracing::info;

/// Assembles the output document from the merged state.
///
/// The generation timestamp is rendered as a plain integer; this attribute
/// is exactly the kind of value the exponent repair pass exists to fix in
/// upstream feeds, so it must never be written in scientific notation.
#[must_use]
pub fn build_document(
    state: MergeState,
    generator: &GeneratorConfig,
    generated_at: DateTime<Utc>,
) -> Document {
    let (channels, programmes) = state.into_parts();
    Document {
        // Config values are plain text; convert to stored (escaped) form
        // at this boundary.
        generator_name: Some(quick_xml::escape::escape(&generator.name).into_owned()),
        generator_url: Some(quick_xml::escape::escape(&generator.url).into_owned()),
        generated_ts: Some(generated_at.timestamp().to_string()),
        channels,
        programmes,
    }
}

/// Serializes a document to XMLTV text with an XML declaration and
/// 2-space indentation.
pub fn to_xml(doc: &Document) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut tv = BytesStart::new("tv");
    if let Some(name) = &doc.generator_name {
        push_raw(&mut tv, "generator-info-name", name);
    }
    if let Some(url) = &doc.generator_url {
        push_raw(&mut tv, "generator-info-url", url);
    }
    if let Some(ts) = &doc.generated_ts {
        push_raw(&mut tv, "generated-ts", ts);
    }
    emit(&mut writer, Event::Start(tv))?;

    for channel in &doc.channels {
        write_channel(&mut writer, channel)?;
    }
    for programme in &doc.programmes {
        write_programme(&mut writer, programme)?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("tv")))?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_channel(writer: &mut Writer<Vec<u8>>, channel: &Channel) -> Result<()> {
    let mut elem = BytesStart::new("channel");
    push_raw(&mut elem, "id", &channel.id);
    emit(writer, Event::Start(elem))?;

    for display_name in &channel.display_names {
        let mut name_elem = BytesStart::new("display-name");
        if let Some(lang) = &display_name.lang {
            push_raw(&mut name_elem, "lang", lang);
        }
        emit(writer, Event::Start(name_elem))?;
        emit(
            writer,
            Event::Text(BytesText::from_escaped(display_name.name.as_str())),
        )?;
        emit(writer, Event::End(BytesEnd::new("display-name")))?;
    }
    for icon in &channel.icons {
        let mut icon_elem = BytesStart::new("icon");
        push_raw(&mut icon_elem, "src", icon);
        emit(writer, Event::Empty(icon_elem))?;
    }

    emit(writer, Event::End(BytesEnd::new("channel")))?;
    Ok(())
}

fn write_programme(writer: &mut Writer<Vec<u8>>, programme: &Programme) -> Result<()> {
    let mut elem = BytesStart::new("programme");
    push_raw(&mut elem, "start", &programme.start);
    push_raw(&mut elem, "stop", &programme.stop);
    push_raw(&mut elem, "channel", &programme.channel);
    emit(writer, Event::Start(elem))?;

    if let Some(title) = &programme.title {
        write_text_element(writer, "title", title)?;
    }
    if let Some(desc) = &programme.desc {
        write_text_element(writer, "desc", desc)?;
    }
    for category in &programme.categories {
        write_text_element(writer, "category", category)?;
    }
    if let Some(icon) = &programme.icon {
        let mut icon_elem = BytesStart::new("icon");
        push_raw(&mut icon_elem, "src", icon);
        emit(writer, Event::Empty(icon_elem))?;
    }

    emit(writer, Event::End(BytesEnd::new("programme")))?;
    Ok(())
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::from_escaped(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Storage(format!("Failed to serialize guide: {e}")))
}

/// Pushes an attribute whose value is already in stored (escaped) form,
/// bypassing quick-xml's own escaping.
fn push_raw(elem: &mut BytesStart<'_>, key: &str, value: &str) {
    elem.push_attribute(Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Borrowed(value.as_bytes()),
    });
}

/// Writes the serialized guide to its destination, optionally
/// gzip-compressed.
///
/// The parent directory is created if absent. Content lands in a sibling
/// temp file first and is renamed into place, so the destination path only
/// ever holds a complete guide. Any failure here is fatal to the run.
pub fn write_output(path: &Path, xml: &str, gzip: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    if gzip {
        let file = fs::File::create(&tmp_path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(xml.as_bytes())?;
        encoder.finish()?;
    } else {
        fs::write(&tmp_path, xml)?;
    }

    #[cfg(target_os = "windows")]
    if path.exists() {
        fs::remove_file(path)?;
    }

    fs::rename(&tmp_path, path)?;
    info!("Wrote merged guide to {}", path.display());
    Ok(())
}
