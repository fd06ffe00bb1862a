//! Content-similarity matching of a script line to a stored recording.
//!
//! Only used when a voice segment carries no message id. Thresholds come from
//! [`MatcherSettings`] and are tunables, not a contract.

use std::collections::HashSet;

use serde::Serialize;

use crate::settings::MatcherSettings;

use super::collaborators::Recording;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    Exact,
    Contains,
    WordOverlap,
}

/// Recording ids already claimed by an earlier segment.
#[derive(Debug, Clone, Default)]
pub struct ConsumedSet {
    ids: HashSet<String>,
}

impl ConsumedSet {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn consume(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn significant_words(text: &str, settings: &MatcherSettings) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > settings.max_insignificant_len)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Classify how `line` relates to `transcript`, if at all.
pub fn similarity(line: &str, transcript: &str, settings: &MatcherSettings) -> Option<MatchKind> {
    let line_norm = normalize(line);
    let transcript_norm = normalize(transcript);
    if line_norm.is_empty() || transcript_norm.is_empty() {
        return None;
    }

    if line_norm == transcript_norm {
        return Some(MatchKind::Exact);
    }
    if line_norm.contains(&transcript_norm) || transcript_norm.contains(&line_norm) {
        return Some(MatchKind::Contains);
    }

    let line_words = significant_words(line, settings);
    if line_words.is_empty() {
        return None;
    }
    let transcript_words = significant_words(transcript, settings);
    let shared = line_words.intersection(&transcript_words).count();
    let ratio = shared as f64 / line_words.len() as f64;

    (shared >= settings.min_shared_words && ratio >= settings.min_overlap_ratio)
        .then_some(MatchKind::WordOverlap)
}

/// Index of the best unconsumed candidate: exact beats containment beats overlap,
/// earlier contributions win ties.
pub fn best_match(
    line: &str,
    candidates: &[Recording],
    consumed: &ConsumedSet,
    settings: &MatcherSettings,
) -> Option<(usize, MatchKind)> {
    let rank = |kind: MatchKind| match kind {
        MatchKind::Exact => 0,
        MatchKind::Contains => 1,
        MatchKind::WordOverlap => 2,
    };

    candidates
        .iter()
        .enumerate()
        .filter(|(_, rec)| !consumed.contains(&rec.id) && !rec.audio_url.is_empty())
        .filter_map(|(index, rec)| {
            let transcript = rec.transcript.as_deref()?;
            similarity(line, transcript, settings).map(|kind| (index, kind))
        })
        .min_by_key(|(index, kind)| (rank(*kind), *index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, transcript: &str) -> Recording {
        Recording {
            id: id.into(),
            speaker_tag: "Sarah".into(),
            audio_url: format!("https://audio.example/{id}.mp3"),
            transcript: Some(transcript.into()),
        }
    }

    #[test]
    fn classifies_matches() {
        let settings = MatcherSettings::default();
        assert_eq!(
            similarity("We swam  every summer.", "we swam every summer.", &settings),
            Some(MatchKind::Exact)
        );
        assert_eq!(
            similarity("We swam every summer", "Honestly we swam every summer, rain or shine", &settings),
            Some(MatchKind::Contains)
        );
        assert_eq!(
            similarity("The lake house was cold", "That cold lake house again", &settings),
            Some(MatchKind::WordOverlap)
        );
        assert_eq!(similarity("The lake was cold", "Dinner was late", &settings), None);
    }

    #[test]
    fn single_shared_word_is_not_enough() {
        let settings = MatcherSettings::default();
        assert_eq!(similarity("Fog everywhere", "fog machine broke", &settings), None);
    }

    #[test]
    fn prefers_stronger_match_then_earlier_candidate() {
        let settings = MatcherSettings::default();
        let candidates = vec![
            rec("a", "the cold lake house in winter"),
            rec("b", "The lake house was cold"),
            rec("c", "The lake house was cold"),
        ];
        let consumed = ConsumedSet::default();
        assert_eq!(
            best_match("The lake house was cold", &candidates, &consumed, &settings),
            Some((1, MatchKind::Exact))
        );
    }

    #[test]
    fn consumed_recordings_are_skipped() {
        let settings = MatcherSettings::default();
        let candidates = vec![rec("a", "Hello there"), rec("b", "Hello there")];
        let mut consumed = ConsumedSet::default();
        consumed.consume("a");
        assert_eq!(
            best_match("hello there", &candidates, &consumed, &settings),
            Some((1, MatchKind::Exact))
        );
        consumed.consume("b");
        assert_eq!(best_match("hello there", &candidates, &consumed, &settings), None);
    }
}
