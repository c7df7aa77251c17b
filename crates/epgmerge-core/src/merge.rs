//! Merge state and the per-source ingest collector.
//!
//! `MergeState` is an explicit value owned by the pipeline and threaded
//! through each ingest call, so merges are testable in isolation and in
//! sequence without ambient state. Source order is the priority signal:
//! the first source to define a channel id owns that identity, and the
//! first programme seen for a channel/start slot owns that slot.

use crate::types::{Channel, Document, Programme, normalize_id, parse_timestamp};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Accumulated merge state across all ingested sources.
#[derive(Default)]
pub struct MergeState {
    /// Deduplicated channels, first-seen order.
    channels: Vec<Channel>,
    /// Normalized id -> index into `channels`.
    seen: HashMap<String, usize>,
    /// Programme groups keyed by normalized channel ref, insertion order.
    groups: Vec<(String, Vec<Programme>)>,
    /// Normalized channel ref -> index into `groups`.
    group_index: HashMap<String, usize>,
    /// Per-group start-instant keys already taken.
    starts: HashMap<String, HashSet<String>>,
}

/// Per-source ingest counters, logged and carried into the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Channels added by this source.
    pub new_channels: usize,
    /// Channels dropped as duplicates of an earlier source.
    pub duplicate_channels: usize,
    /// Programmes kept from this source.
    pub programmes: usize,
    /// Programmes dropped because an earlier source took the start slot.
    pub collisions: usize,
    /// Programmes dropped by trim mode as already finished.
    pub trimmed: usize,
}

impl MergeState {
    /// Creates an empty merge state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct channels collected so far.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of programmes collected so far.
    #[must_use]
    pub fn programme_count(&self) -> usize {
        self.groups.iter().map(|(_, list)| list.len()).sum()
    }

    /// Ingests one source document, consuming it.
    ///
    /// `now` is the ingest wall-clock instant used by trim mode; passing it
    /// in keeps the collector deterministic under test.
    pub fn ingest(&mut self, doc: Document, now: DateTime<Utc>, trim: bool) -> IngestStats {
        let mut stats = IngestStats::default();

        for channel in doc.channels {
            let norm = normalize_id(&channel.id);
            if self.seen.contains_key(&norm) {
                debug!(
                    "Duplicate channel skipped: {} (normalized from {})",
                    norm, channel.id
                );
                stats.duplicate_channels += 1;
                continue;
            }
            self.seen.insert(norm, self.channels.len());
            self.channels.push(channel);
            stats.new_channels += 1;
        }

        for programme in doc.programmes {
            if trim && ended_before(&programme, now) {
                stats.trimmed += 1;
                continue;
            }

            let norm = normalize_id(&programme.channel);
            let key = start_key(&programme.start);
            let taken = self.starts.entry(norm.clone()).or_default();
            if !taken.insert(key) {
                debug!(
                    "Colliding programme skipped: {} @ {}",
                    programme.channel, programme.start
                );
                stats.collisions += 1;
                continue;
            }

            let idx = match self.group_index.get(&norm) {
                Some(&idx) => idx,
                None => {
                    let idx = self.groups.len();
                    self.group_index.insert(norm.clone(), idx);
                    self.groups.push((norm, Vec::new()));
                    idx
                },
            };
            self.groups[idx].1.push(programme);
            stats.programmes += 1;
        }

        info!(
            "Ingested source: {} new channels, {} duplicates, {} programmes",
            stats.new_channels, stats.duplicate_channels, stats.programmes
        );
        stats
    }

    /// Consumes the state into the deduplicated channel list and the
    /// flattened programme list, grouped by channel in ingestion order.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Channel>, Vec<Programme>) {
        let programmes = self
            .groups
            .into_iter()
            .flat_map(|(_, list)| list)
            .collect();
        (self.channels, programmes)
    }
}

/// True when the programme's stop instant parses and lies strictly before
/// `now`, compared as instants so the programme's own UTC offset is
/// honored. Unparsable stops are kept; trim must not eat repairable data.
fn ended_before(programme: &Programme, now: DateTime<Utc>) -> bool {
    parse_timestamp(&programme.stop).is_some_and(|stop| stop < now)
}

/// Collision key for a start value: the parsed instant when the value
/// parses, the raw trimmed text otherwise. Differently-written but equal
/// instants collide; garbage values collide only on exact text.
fn start_key(start: &str) -> String {
    parse_timestamp(start).map_or_else(|| start.trim().to_string(), |dt| dt.timestamp().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::DisplayName;

    fn channel(id: &str, name: &str) -> Channel {
        Channel {
            id: id.to_string(),
            display_names: vec![DisplayName {
                name: name.to_string(),
                lang: None,
            }],
            icons: Vec::new(),
        }
    }

    fn programme(channel: &str, start: &str, title: &str) -> Programme {
        Programme {
            channel: channel.to_string(),
            start: start.to_string(),
            stop: "20230507130000 +0000".to_string(),
            title: Some(title.to_string()),
            desc: None,
            categories: Vec::new(),
            icon: None,
        }
    }

    fn doc(channels: Vec<Channel>, programmes: Vec<Programme>) -> Document {
        Document {
            channels,
            programmes,
            ..Document::default()
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2023-05-07T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn first_seen_channel_wins() {
        let mut state = MergeState::new();

        let first = state.ingest(doc(vec![channel("x", "First")], vec![]), now(), false);
        assert_eq!(first.new_channels, 1);

        let second = state.ingest(doc(vec![channel("x", "Second")], vec![]), now(), false);
        assert_eq!(second.new_channels, 0);
        assert_eq!(second.duplicate_channels, 1);

        let (channels, _) = state.into_parts();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].display_names[0].name, "First");
    }

    #[test]
    fn entity_encoded_ids_are_one_identity() {
        let mut state = MergeState::new();
        state.ingest(doc(vec![channel("A&amp;E", "First")], vec![]), now(), false);
        let stats = state.ingest(doc(vec![channel("A&E", "Second")], vec![]), now(), false);

        assert_eq!(stats.duplicate_channels, 1);
        let (channels, _) = state.into_parts();
        assert_eq!(channels.len(), 1);
        // Stored id keeps its first-seen literal form.
        assert_eq!(channels[0].id, "A&amp;E");
    }

    #[test]
    fn start_collisions_keep_first_seen() {
        let mut state = MergeState::new();
        state.ingest(
            doc(
                vec![channel("x", "X")],
                vec![programme("x", "20230507120000 +0000", "First")],
            ),
            now(),
            false,
        );
        let stats = state.ingest(
            doc(
                vec![],
                vec![
                    programme("x", "20230507120000 +0000", "Second"),
                    programme("x", "20230507140000 +0000", "Later"),
                ],
            ),
            now(),
            false,
        );

        assert_eq!(stats.collisions, 1);
        assert_eq!(stats.programmes, 1);

        let (_, programmes) = state.into_parts();
        assert_eq!(programmes.len(), 2);
        assert_eq!(programmes[0].title.as_deref(), Some("First"));
        assert_eq!(programmes[1].title.as_deref(), Some("Later"));
    }

    #[test]
    fn equal_instants_collide_across_offsets() {
        let mut state = MergeState::new();
        state.ingest(
            doc(vec![], vec![programme("x", "20230507120000 +0000", "UTC")]),
            now(),
            false,
        );
        // Same instant written in a different offset.
        let stats = state.ingest(
            doc(vec![], vec![programme("x", "20230507170000 +0500", "East")]),
            now(),
            false,
        );
        assert_eq!(stats.collisions, 1);
    }

    #[test]
    fn unparsable_starts_collide_on_exact_text_only() {
        let mut state = MergeState::new();
        state.ingest(
            doc(vec![], vec![programme("x", "garbage", "A")]),
            now(),
            false,
        );
        let dup = state.ingest(
            doc(vec![], vec![programme("x", "garbage", "B")]),
            now(),
            false,
        );
        assert_eq!(dup.collisions, 1);

        let other = state.ingest(
            doc(vec![], vec![programme("x", "other-garbage", "C")]),
            now(),
            false,
        );
        assert_eq!(other.collisions, 0);
    }

    #[test]
    fn trim_drops_programmes_already_finished() {
        let mut past = programme("x", "20230507090000 +0000", "Old");
        past.stop = "20230507100000 +0000".to_string();
        let mut future = programme("x", "20230507120000 +0000", "Current");
        future.stop = "20230507230000 +0000".to_string();
        let mut garbage = programme("x", "20230507150000 +0000", "Broken stop");
        garbage.stop = "not-a-time".to_string();

        let mut state = MergeState::new();
        let stats = state.ingest(doc(vec![], vec![past, future, garbage]), now(), true);

        assert_eq!(stats.trimmed, 1);
        assert_eq!(stats.programmes, 2);

        let (_, programmes) = state.into_parts();
        let titles: Vec<_> = programmes.iter().filter_map(|p| p.title.as_deref()).collect();
        assert_eq!(titles, vec!["Current", "Broken stop"]);
    }

    #[test]
    fn trim_disabled_keeps_history() {
        let mut past = programme("x", "20230507090000 +0000", "Old");
        past.stop = "20230507100000 +0000".to_string();

        let mut state = MergeState::new();
        let stats = state.ingest(doc(vec![], vec![past]), now(), false);
        assert_eq!(stats.trimmed, 0);
        assert_eq!(stats.programmes, 1);
    }

    #[test]
    fn programmes_stay_grouped_by_channel() {
        let mut state = MergeState::new();
        state.ingest(
            doc(
                vec![channel("a", "A"), channel("b", "B")],
                vec![
                    programme("a", "20230507120000 +0000", "A1"),
                    programme("b", "20230507120000 +0000", "B1"),
                    programme("a", "20230507140000 +0000", "A2"),
                ],
            ),
            now(),
            false,
        );

        let (_, programmes) = state.into_parts();
        let titles: Vec<_> = programmes.iter().filter_map(|p| p.title.as_deref()).collect();
        // Channel "a" group first (insertion order), then "b".
        assert_eq!(titles, vec!["A1", "A2", "B1"]);
    }
}
