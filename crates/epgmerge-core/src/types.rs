//! Core data types for the merged guide.
//!
//! A note on escaping: every string held by these types is kept in *stored*
//! form, exactly as it appears between markup in an XMLTV document
//! (`A&amp;E`, not `A&E`). The parser captures values verbatim and the
//! writer emits them verbatim, so the normalization passes are the only
//! place escaping is ever changed. Identity comparisons go through
//! [`normalize_id`], which decodes entities before matching while the
//! stored id keeps its first-seen literal form.

use chrono::{DateTime, FixedOffset};

/// Timestamp grammar used by XMLTV `start`/`stop` attributes.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// A single display name of a channel, with an optional language tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName {
    /// Display name text in stored (escaped) form.
    pub name: String,
    /// Optional `lang` attribute carried through from the source.
    pub lang: Option<String>,
}

/// A channel definition from one source.
///
/// The `id` is the merge's uniqueness key. At most one channel per
/// normalized id survives into the output; the first-seen literal id is the
/// canonical spelling that programme references are rewritten to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Channel id in stored (escaped) form, first-seen spelling.
    pub id: String,
    /// Ordered display names; the first is primary.
    pub display_names: Vec<DisplayName>,
    /// Icon `src` URLs.
    pub icons: Vec<String>,
}

/// A broadcast instance referencing a [`Channel`] by id.
///
/// `start` and `stop` are held as raw strings because the repair passes
/// operate on the textual value (timezone colons, scientific notation);
/// they are parsed on demand via [`parse_timestamp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Programme {
    /// Channel reference in stored (escaped) form.
    pub channel: String,
    /// Start instant, `YYYYMMDDHHMMSS ±HHMM` once repaired.
    pub start: String,
    /// Stop instant, same grammar as `start`.
    pub stop: String,
    /// Programme title, if present.
    pub title: Option<String>,
    /// Programme description, if present.
    pub desc: Option<String>,
    /// Category labels, in document order.
    pub categories: Vec<String>,
    /// Icon `src` URL, if present.
    pub icon: Option<String>,
}

/// The assembled guide: root metadata, channels, programmes.
///
/// Channels are in first-seen order; programmes are grouped by channel in
/// ingestion order. The pipeline exclusively owns a `Document` for the
/// duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// `generator-info-name` root attribute.
    pub generator_name: Option<String>,
    /// `generator-info-url` root attribute.
    pub generator_url: Option<String>,
    /// `generated-ts` root attribute, seconds since epoch as an integer.
    pub generated_ts: Option<String>,
    /// Deduplicated channels, first-seen order.
    pub channels: Vec<Channel>,
    /// Surviving programmes, grouped by channel.
    pub programmes: Vec<Programme>,
}

impl Document {
    /// True when the document holds no channels and no programmes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.programmes.is_empty()
    }
}

/// Normalizes a channel identity for comparison.
///
/// Entity references are decoded (`&amp;` becomes `&`) and surrounding
/// whitespace is stripped, so ids that differ only by character-entity
/// encoding compare equal. Undecodable input falls back to the raw text;
/// identity matching must not fail on damaged sources.
#[must_use]
pub fn normalize_id(raw: &str) -> String {
    match quick_xml::escape::unescape(raw) {
        Ok(unescaped) => unescaped.trim().to_string(),
        Err(_) => raw.trim().to_string(),
    }
}

/// Parses an XMLTV timestamp (`YYYYMMDDHHMMSS ±HHMM`) into an instant.
///
/// Returns `None` for values that do not match the grammar; callers decide
/// whether that means "repair", "remove", or "keep".
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_id_decodes_entities() {
        assert_eq!(normalize_id("A&amp;E"), "A&E");
        assert_eq!(normalize_id("  A&amp;E  "), "A&E");
        assert_eq!(normalize_id("A&E"), "A&E");
    }

    #[test]
    fn normalize_id_matches_across_encodings() {
        assert_eq!(normalize_id("A&amp;E.us"), normalize_id("A&E.us"));
    }

    #[test]
    fn normalize_id_survives_damaged_input() {
        // A bare ampersand is not a valid entity; the raw text is kept.
        assert_eq!(normalize_id("A&E "), "A&E");
    }

    #[test]
    fn parse_timestamp_accepts_canonical_form() {
        let dt = parse_timestamp("20230507120000 +0000").expect("should parse");
        assert_eq!(dt.timestamp(), 1_683_460_800);
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("1.6834752e+09 +0000").is_none());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("not a time").is_none());
    }

    #[test]
    fn offsets_are_honored() {
        let east = parse_timestamp("20230507120000 +0500").expect("should parse");
        let utc = parse_timestamp("20230507070000 +0000").expect("should parse");
        assert_eq!(east.timestamp(), utc.timestamp());
    }
}
