use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ParseWarning;
use crate::visual::explicit_duration;

use super::segment::{MediaRef, Segment, SegmentKind, SpeakerRole};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub segments: Vec<Segment>,
    pub warnings: Vec<ParseWarning>,
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[\[(MEDIA|HOLD)\]\](.*)$").expect("directive regex"))
}

fn unclosed_directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[\[(MEDIA|HOLD)\]").expect("unclosed directive regex"))
}

fn voice_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[([^\[\]]+)\](.*)$").expect("voice regex"))
}

/// `TAG|id` with no spaces around the bar and an id made of word characters,
/// dashes, dots or colons. Anything else stays part of the speaker tag.
fn message_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.*\S)\|([A-Za-z0-9][A-Za-z0-9_.:-]*)$").expect("message id regex")
    })
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([^<>]*)>").expect("token regex"))
}

fn media_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:^|\s)(?:id=([^\s"]+)|name="([^"]*)")"#).expect("media ref regex")
    })
}

/// Parse script text into segments, dropping malformed lines.
pub fn parse(script: &str) -> Vec<Segment> {
    parse_with_warnings(script).segments
}

/// Like [`parse`], but also reports every dropped line.
pub fn parse_with_warnings(script: &str) -> ParseOutput {
    let mut output = ParseOutput::default();

    for (index, raw) in script.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(segment) => output.segments.push(segment),
            Err(reason) => {
                let warning = ParseWarning {
                    line: index + 1,
                    reason: reason.to_string(),
                    text: line.to_string(),
                };
                log_warn!("dropping script {}", warning);
                output.warnings.push(warning);
            }
        }
    }

    output.segments = dedup_segments(output.segments);
    output
}

/// Keep the first of every `(kind, speaker_tag, display_content)` triple.
pub fn dedup_segments(segments: Vec<Segment>) -> Vec<Segment> {
    let mut seen = HashSet::new();
    segments
        .into_iter()
        .filter(|segment| {
            seen.insert((
                segment.kind,
                segment.speaker_tag.clone(),
                segment.display_content.clone(),
            ))
        })
        .collect()
}

/// Action tokens (without brackets) in source order.
pub fn extract_action_tokens(content: &str) -> Vec<String> {
    token_re()
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Remove action tokens and normalise whitespace.
pub fn strip_action_tokens(content: &str) -> String {
    let stripped = token_re().replace_all(content, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_line(line: &str) -> Result<Segment, &'static str> {
    if line.starts_with("[[") {
        return parse_directive(line);
    }
    if line.starts_with('[') {
        return parse_voice(line);
    }
    Err("line has no speaker tag or directive")
}

fn parse_directive(line: &str) -> Result<Segment, &'static str> {
    let Some(caps) = directive_re().captures(line) else {
        if unclosed_directive_re().is_match(line) {
            return Err("directive tag missing closing bracket");
        }
        return Err("unknown directive");
    };

    let kind = match &caps[1] {
        "MEDIA" => SegmentKind::Media,
        _ => SegmentKind::Hold,
    };
    let payload = caps[2].trim().to_string();
    let visual_actions = extract_action_tokens(&payload);

    let media_ref = match kind {
        SegmentKind::Media => find_media_ref(&strip_action_tokens(&payload)),
        _ => None,
    };

    if media_ref.is_none() && visual_actions.is_empty() {
        return Err("directive has no media reference or visual action");
    }

    let explicit_duration = visual_actions
        .iter()
        .find_map(|token| explicit_duration(token));

    Ok(Segment {
        kind,
        speaker_tag: String::new(),
        speaker_role: SpeakerRole::Narrator,
        message_id: None,
        display_content: payload,
        audio_content: String::new(),
        visual_actions,
        media_ref,
        explicit_duration,
    })
}

fn find_media_ref(text: &str) -> Option<MediaRef> {
    let caps = media_ref_re().captures(text)?;
    if let Some(id) = caps.get(1) {
        return Some(MediaRef::Id(id.as_str().to_string()));
    }
    caps.get(2)
        .map(|name| name.as_str().trim())
        .filter(|name| !name.is_empty())
        .map(|name| MediaRef::Name(name.to_string()))
}

fn parse_voice(line: &str) -> Result<Segment, &'static str> {
    let caps = voice_re()
        .captures(line)
        .ok_or("malformed speaker tag")?;

    let bracket = caps[1].trim();
    let (tag, message_id) = match message_id_re().captures(bracket) {
        Some(id_caps) => match (id_caps.get(1), id_caps.get(2)) {
            (Some(tag), Some(id)) => (tag.as_str().trim(), Some(id.as_str().to_string())),
            _ => (bracket, None),
        },
        None => (bracket, None),
    };

    if tag.is_empty() {
        return Err("empty speaker tag");
    }
    if tag == "MEDIA" || tag == "HOLD" {
        return Err("directive tag missing second bracket");
    }

    let display_content = caps[2].trim().to_string();
    let audio_content = strip_action_tokens(&display_content);
    if audio_content.is_empty() {
        return Err("voice line has no spoken text");
    }

    Ok(Segment {
        kind: SegmentKind::Voice,
        speaker_tag: tag.to_string(),
        speaker_role: SpeakerRole::from_tag(tag),
        message_id,
        visual_actions: extract_action_tokens(&display_content),
        display_content,
        audio_content,
        media_ref: None,
        explicit_duration: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_voice_roles() {
        let segments = parse(
            "[NARRATOR] It began at the lake.\n\n[EMBER VOICE] A quiet morning.\n\n[Sarah Chen] I remember the fog.",
        );
        let roles: Vec<_> = segments.iter().map(|s| s.speaker_role).collect();
        assert_eq!(
            roles,
            vec![SpeakerRole::Narrator, SpeakerRole::Ember, SpeakerRole::Contributor]
        );
        assert_eq!(segments[2].speaker_tag, "Sarah Chen");
        assert_eq!(segments[2].audio_content, "I remember the fog.");
    }

    #[test]
    fn role_tags_are_exact() {
        let segments = parse("[Narrator] lower case is a person.");
        assert_eq!(segments[0].speaker_role, SpeakerRole::Contributor);
    }

    #[test]
    fn action_tokens_stay_in_display_but_not_audio() {
        let segments = parse("[NARRATOR] <COLOR:#FF0000,TRAN:0.5> Hello   there. <FADE-IN:duration=1.0>");
        let segment = &segments[0];
        assert_eq!(
            segment.display_content,
            "<COLOR:#FF0000,TRAN:0.5> Hello   there. <FADE-IN:duration=1.0>"
        );
        assert_eq!(segment.audio_content, "Hello there.");
        assert_eq!(
            segment.visual_actions,
            vec!["COLOR:#FF0000,TRAN:0.5", "FADE-IN:duration=1.0"]
        );
        assert_eq!(segment.explicit_duration, None);
    }

    #[test]
    fn message_id_is_split_from_tag() {
        let segments = parse("[Sarah|msg-42] We swam every summer.");
        assert_eq!(segments[0].speaker_tag, "Sarah");
        assert_eq!(segments[0].message_id.as_deref(), Some("msg-42"));
    }

    #[test]
    fn bar_inside_speaker_name_is_not_an_id() {
        let segments = parse("[Tom | Jr] We fixed the boat.\n[Ann|] Then we sailed.\n[Bo|a b] Far out.");
        assert_eq!(segments[0].speaker_tag, "Tom | Jr");
        assert_eq!(segments[0].message_id, None);
        assert_eq!(segments[1].speaker_tag, "Ann|");
        assert_eq!(segments[1].message_id, None);
        assert_eq!(segments[2].speaker_tag, "Bo|a b");
        assert_eq!(segments[2].message_id, None);
    }

    #[test]
    fn media_references() {
        let segments = parse(
            "[[MEDIA]] id=abc123 <ZOOM-IN:scale=1.5:duration=3.5>\n[[MEDIA]] name=\"Lake House\"",
        );
        assert_eq!(segments[0].media_ref, Some(MediaRef::Id("abc123".into())));
        assert_eq!(segments[0].explicit_duration, Some(3.5));
        assert_eq!(segments[1].media_ref, Some(MediaRef::Name("Lake House".into())));
        assert_eq!(segments[1].visual_actions, Vec::<String>::new());
    }

    #[test]
    fn hold_takes_duration_from_color_token() {
        let segments = parse("[[HOLD]] <COLOR:#000000,duration=2.0>");
        assert_eq!(segments[0].kind, SegmentKind::Hold);
        assert_eq!(segments[0].explicit_duration, Some(2.0));
    }

    #[test]
    fn drops_malformed_media_line() {
        let output = parse_with_warnings("[[MEDIA] id=abc\n\n[NARRATOR] Hi.");
        assert_eq!(output.segments.len(), 1);
        assert_eq!(output.segments[0].speaker_tag, "NARRATOR");
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].line, 1);
    }

    #[test]
    fn drops_empty_payloads() {
        let output = parse_with_warnings(
            "[[HOLD]]\n[[MEDIA]] name=\"\"\n[NARRATOR] <COLOR:#000000>\n[MEDIA] not a speaker\nloose text",
        );
        assert!(output.segments.is_empty());
        assert_eq!(output.warnings.len(), 5);
    }

    #[test]
    fn media_with_only_actions_is_kept() {
        let segments = parse("[[MEDIA]] <PAN-LEFT:distance=20%:duration=4>");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].media_ref, None);
    }

    #[test]
    fn exact_duplicates_keep_first_position() {
        let script = "[NARRATOR] One.\n[Sarah] Two.\n[NARRATOR] One.\n[[HOLD]] <COLOR:#000>\n[Sarah] Two.\n[Tom] Two.";
        let texts: Vec<_> = parse(script)
            .into_iter()
            .map(|s| format!("{}:{}", s.speaker_tag, s.display_content))
            .collect();
        assert_eq!(texts, vec!["NARRATOR:One.", "Sarah:Two.", ":<COLOR:#000>", "Tom:Two."]);
    }
}
