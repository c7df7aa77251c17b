//! Normalization passes over the assembled document.
//!
//! The passes run in a fixed order because later passes assume earlier
//! repairs: chronology (4) needs canonical offsets from (1), orphan
//! pruning (5) needs the full channel set, and the round trip (7) settles
//! whatever the serializer considers escaped. Each pass is independently
//! idempotent and never fatal: a value a pass cannot interpret is removed
//! or skipped, not escalated.

use crate::types::{Document, normalize_id, parse_timestamp};
use crate::writer::to_xml;
use crate::{parser, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Trailing UTC offset written with a colon and a possibly single-digit
/// hour (`+5:00`, `-05:30`).
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static TZ_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+-])(\d{1,2}):(\d{2})$").unwrap());

/// Timestamp emitted in scientific notation by a numeric-coercion defect
/// upstream, with an optional trailing UTC offset.
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static SCI_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+[eE][+-]\d+)(?:\s*([+-]\d{4}))?$").unwrap());

/// An ampersand, optionally already forming a character or entity
/// reference. Bare ones (no capture) need escaping.
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static ENTITY_OR_AMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&((?:[a-zA-Z]+|#x[0-9A-Fa-f]+|#[0-9]+);)?").unwrap());

/// Per-pass repair counts for one normalization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Timezone offsets rewritten to canonical form.
    pub timezone_fixes: usize,
    /// Scientific-notation timestamps re-rendered.
    pub exponent_fixes: usize,
    /// Bare ampersands escaped in attribute values.
    pub attribute_escapes: usize,
    /// Programmes removed for inverted or unparsable chronology.
    pub chronology_removed: usize,
    /// Programmes removed for unresolvable channel references.
    pub orphans_removed: usize,
    /// Bare ampersands escaped in text content.
    pub text_escapes: usize,
}

/// Runs all passes in order, ending with the serialize/re-parse round
/// trip, and logs each pass's repair count.
pub fn run(doc: &mut Document) -> Result<NormalizeReport> {
    let timezone_fixes = normalize_timezones(doc);
    info!("Applied {} timezone normalizations", timezone_fixes);

    let exponent_fixes = normalize_exponents(doc);
    info!("Converted {} scientific-notation timestamps", exponent_fixes);

    let attribute_escapes = escape_attribute_entities(doc);
    info!("Escaped {} ampersands in attribute values", attribute_escapes);

    let chronology_removed = fix_chronology(doc);
    info!("Removed {} inverted-time programmes", chronology_removed);

    let orphans_removed = prune_orphans(doc);
    info!("Pruned {} invalid programmes", orphans_removed);

    let text_escapes = escape_text_entities(doc);
    info!("Escaped {} ampersands in text nodes", text_escapes);

    round_trip(doc)?;

    Ok(NormalizeReport {
        timezone_fixes,
        exponent_fixes,
        attribute_escapes,
        chronology_removed,
        orphans_removed,
        text_escapes,
    })
}

/// Pass 1: rewrite `+5:00`-style offset suffixes to the canonical
/// zero-padded, colon-free form. Canonical values are untouched.
pub fn normalize_timezones(doc: &mut Document) -> usize {
    let mut fixes = 0;
    for programme in &mut doc.programmes {
        for value in [&mut programme.start, &mut programme.stop] {
            if let Some(fixed) = repair_timezone(value) {
                *value = fixed;
                fixes += 1;
            }
        }
    }
    fixes
}

fn repair_timezone(value: &str) -> Option<String> {
    let fixed = TZ_OFFSET.replace(value, |caps: &Captures<'_>| {
        let hour: u32 = caps[2].parse().unwrap_or(0);
        format!("{}{hour:02}{}", &caps[1], &caps[3])
    });
    if fixed == value {
        None
    } else {
        Some(fixed.into_owned())
    }
}

/// Pass 2: re-render scientific-notation timestamps as a 14-digit
/// zero-padded integer, preserving any trailing offset suffix.
pub fn normalize_exponents(doc: &mut Document) -> usize {
    let mut fixes = 0;
    for programme in &mut doc.programmes {
        for value in [&mut programme.start, &mut programme.stop] {
            if let Some(fixed) = repair_exponent(value) {
                *value = fixed;
                fixes += 1;
            }
        }
    }
    fixes
}

#[allow(clippy::cast_possible_truncation)]
fn repair_exponent(value: &str) -> Option<String> {
    let caps = SCI_TIMESTAMP.captures(value)?;
    let float: f64 = caps.get(1)?.as_str().parse().ok()?;
    let suffix = caps.get(2).map_or("", |m| m.as_str());
    let truncated = float.trunc() as i64;
    Some(format!("{truncated:014}{suffix}"))
}

/// Pass 3: escape bare ampersands in attribute values. CDATA unwrapping,
/// the other half of markup normalization, already happened at parse time.
pub fn escape_attribute_entities(doc: &mut Document) -> usize {
    let mut fixes = 0;
    for channel in &mut doc.channels {
        fixes += escape_in_place(&mut channel.id);
        for icon in &mut channel.icons {
            fixes += escape_in_place(icon);
        }
        for display_name in &mut channel.display_names {
            if let Some(lang) = &mut display_name.lang {
                fixes += escape_in_place(lang);
            }
        }
    }
    for programme in &mut doc.programmes {
        fixes += escape_in_place(&mut programme.channel);
        if let Some(icon) = &mut programme.icon {
            fixes += escape_in_place(icon);
        }
    }
    fixes
}

/// Pass 4: remove programmes whose chronology cannot be verified as
/// strictly increasing. Unparsable timestamps are removed defensively.
pub fn fix_chronology(doc: &mut Document) -> usize {
    let before = doc.programmes.len();
    doc.programmes.retain(|programme| {
        match (
            parse_timestamp(&programme.start),
            parse_timestamp(&programme.stop),
        ) {
            (Some(start), Some(stop)) if stop > start => true,
            (Some(_), Some(_)) => {
                debug!(
                    "Removing inverted programme: {} start {} stop {}",
                    programme.channel, programme.start, programme.stop
                );
                false
            },
            _ => {
                debug!(
                    "Removing programme with unverifiable chronology: {} start {} stop {}",
                    programme.channel, programme.start, programme.stop
                );
                false
            },
        }
    });
    before - doc.programmes.len()
}

/// Pass 5: remove programmes whose channel reference does not resolve to
/// a surviving channel, and rewrite resolvable references to the
/// canonical literal id so reference and id agree byte-for-byte.
pub fn prune_orphans(doc: &mut Document) -> usize {
    let canonical: HashMap<String, String> = doc
        .channels
        .iter()
        .map(|ch| (normalize_id(&ch.id), ch.id.clone()))
        .collect();

    let before = doc.programmes.len();
    doc.programmes.retain_mut(|programme| {
        let norm = normalize_id(&programme.channel);
        if let Some(id) = canonical.get(&norm) {
            if programme.channel != *id {
                programme.channel.clone_from(id);
            }
            true
        } else {
            info!(
                "Pruning programme {} / {} / {}",
                programme.start,
                programme.channel,
                programme.title.as_deref().unwrap_or("(no title)")
            );
            false
        }
    });
    before - doc.programmes.len()
}

/// Pass 6: escape bare ampersands in text content, covering the nodes
/// pass 3 does not touch.
pub fn escape_text_entities(doc: &mut Document) -> usize {
    let mut fixes = 0;
    for channel in &mut doc.channels {
        for display_name in &mut channel.display_names {
            fixes += escape_in_place(&mut display_name.name);
        }
    }
    for programme in &mut doc.programmes {
        if let Some(title) = &mut programme.title {
            fixes += escape_in_place(title);
        }
        if let Some(desc) = &mut programme.desc {
            fixes += escape_in_place(desc);
        }
        for category in &mut programme.categories {
            fixes += escape_in_place(category);
        }
    }
    fixes
}

/// Pass 7: serialize and re-parse once, so whatever the serializer
/// considers escaped is self-consistent before the write.
pub fn round_trip(doc: &mut Document) -> Result<()> {
    let xml = to_xml(doc)?;
    *doc = parser::parse_document(&xml)?;
    Ok(())
}

/// Escapes bare ampersands in a stored value, returning how many were
/// rewritten. Existing character and entity references are left alone, so
/// applying this twice changes nothing.
fn escape_in_place(value: &mut String) -> usize {
    let mut fixes = 0;
    let escaped = ENTITY_OR_AMP.replace_all(value, |caps: &Captures<'_>| {
        if caps.get(1).is_some() {
            caps[0].to_string()
        } else {
            fixes += 1;
            "&amp;".to_string()
        }
    });
    if fixes > 0 {
        let owned = escaped.into_owned();
        *value = owned;
    }
    fixes
}
