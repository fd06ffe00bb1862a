use super::segment::{Segment, SegmentKind};

/// Render segments back to editable script text, one blank line between entries.
pub fn to_script_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(render_line)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_line(segment: &Segment) -> String {
    let head = match segment.kind {
        SegmentKind::Voice => match &segment.message_id {
            Some(id) => format!("[{}|{}]", segment.speaker_tag, id),
            None => format!("[{}]", segment.speaker_tag),
        },
        SegmentKind::Media => "[[MEDIA]]".to_string(),
        SegmentKind::Hold => "[[HOLD]]".to_string(),
    };

    if segment.display_content.is_empty() {
        head
    } else {
        format!("{head} {}", segment.display_content)
    }
}
