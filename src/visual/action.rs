use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const DEFAULT_FADE_SECS: f64 = 1.0;
const DEFAULT_MOTION_SECS: f64 = 3.0;
const DEFAULT_PAN_PERCENT: u32 = 25;
const DEFAULT_ZOOM_SCALE: f64 = 1.5;
const LEGACY_ZOOM_START: f64 = 1.1;
const LEGACY_ZOOM_END: f64 = 1.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FadeDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PanDirection {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ZoomDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ZoomTarget {
    Center,
    Person { person_id: String },
    Custom { x: f64, y: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum VisualAction {
    /// Solid colour (hold) or tint (voice/media). Transparency is clamped to `[0, 1]`.
    Color {
        color: String,
        transparency: Option<f32>,
    },
    Fade {
        direction: FadeDirection,
        duration_secs: f64,
    },
    Pan {
        direction: PanDirection,
        distance_percent: u32,
        duration_secs: f64,
    },
    /// Legacy `Z-OUT` zoom between two fixed scales.
    Zoom { start_scale: f64, end_scale: f64 },
    ZoomTarget {
        direction: ZoomDirection,
        scale: f64,
        duration_secs: f64,
        target: ZoomTarget,
    },
}

fn hex_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"#([0-9a-fA-F]{6}|[0-9a-fA-F]{3})\b").expect("hex colour regex")
    })
}

fn param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(scale|duration|distance|target)\s*=|\b(TRAN)\s*:")
            .expect("action parameter regex")
    })
}

/// Decode one action token (brackets already removed). Unknown kinds yield `None`.
pub fn decode(token: &str) -> Option<VisualAction> {
    let token = token.trim();
    let split_at = token.find([':', ',']).unwrap_or(token.len());
    let kind = token[..split_at].trim().to_ascii_uppercase();
    let rest = &token[split_at..];
    let params = parse_params(rest);

    match kind.as_str() {
        "COLOR" => decode_color(rest, &params),
        "FADE-IN" => Some(fade(FadeDirection::In, &params)),
        "FADE-OUT" => Some(fade(FadeDirection::Out, &params)),
        "PAN-LEFT" => Some(pan(PanDirection::Left, &params)),
        "PAN-RIGHT" => Some(pan(PanDirection::Right, &params)),
        "ZOOM-IN" => Some(zoom_target(ZoomDirection::In, &params)),
        "ZOOM-OUT" => Some(zoom_target(ZoomDirection::Out, &params)),
        "Z-OUT" => Some(legacy_zoom(&params)),
        _ => None,
    }
}

/// Decode every token, skipping the ones that are not recognised.
pub fn decode_all<S: AsRef<str>>(tokens: &[S]) -> Vec<VisualAction> {
    tokens.iter().filter_map(|t| decode(t.as_ref())).collect()
}

/// The `duration=` value carried by a token, if any.
pub fn explicit_duration(token: &str) -> Option<f64> {
    parse_params(token)
        .get("duration")
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|secs| secs.is_finite())
        .map(|secs| secs.max(0.0))
}

fn parse_params(rest: &str) -> HashMap<String, String> {
    let markers: Vec<_> = param_re().captures_iter(rest).collect();
    let mut params = HashMap::new();

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2))) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(rest.len());
        let value = rest[whole.end()..end].trim_matches(|c: char| c == ':' || c == ',' || c.is_whitespace());
        params
            .entry(key.as_str().to_ascii_lowercase())
            .or_insert_with(|| value.to_string());
    }

    params
}

fn number(params: &HashMap<String, String>, key: &str) -> Option<f64> {
    params
        .get(key)
        .map(|v| v.trim_end_matches('%'))
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn duration_or(params: &HashMap<String, String>, default: f64) -> f64 {
    number(params, "duration").map(|d| d.max(0.0)).unwrap_or(default)
}

fn decode_color(rest: &str, params: &HashMap<String, String>) -> Option<VisualAction> {
    let caps = hex_re().captures(rest)?;
    let hex = caps.get(1)?.as_str();
    let expanded = if hex.len() == 3 {
        hex.chars().flat_map(|c| [c, c]).collect::<String>()
    } else {
        hex.to_string()
    };

    let transparency = number(params, "tran").map(|t| (t as f32).clamp(0.0, 1.0));

    Some(VisualAction::Color {
        color: format!("#{}", expanded.to_ascii_uppercase()),
        transparency,
    })
}

fn fade(direction: FadeDirection, params: &HashMap<String, String>) -> VisualAction {
    VisualAction::Fade {
        direction,
        duration_secs: duration_or(params, DEFAULT_FADE_SECS),
    }
}

fn pan(direction: PanDirection, params: &HashMap<String, String>) -> VisualAction {
    let distance_percent = number(params, "distance")
        .map(|d| d.round().clamp(0.0, 100.0) as u32)
        .unwrap_or(DEFAULT_PAN_PERCENT);
    VisualAction::Pan {
        direction,
        distance_percent,
        duration_secs: duration_or(params, DEFAULT_MOTION_SECS),
    }
}

fn zoom_target(direction: ZoomDirection, params: &HashMap<String, String>) -> VisualAction {
    let scale = number(params, "scale")
        .filter(|s| *s > 0.0)
        .unwrap_or(DEFAULT_ZOOM_SCALE);
    let target = params
        .get("target")
        .and_then(|raw| decode_target(raw))
        .unwrap_or(ZoomTarget::Center);

    VisualAction::ZoomTarget {
        direction,
        scale,
        duration_secs: duration_or(params, DEFAULT_MOTION_SECS),
        target,
    }
}

fn decode_target(raw: &str) -> Option<ZoomTarget> {
    let (kind, value) = raw.split_once(':').unwrap_or((raw, ""));
    match kind.trim().to_ascii_lowercase().as_str() {
        "center" => Some(ZoomTarget::Center),
        "person" => {
            let person_id = value.trim();
            (!person_id.is_empty()).then(|| ZoomTarget::Person {
                person_id: person_id.to_string(),
            })
        }
        "custom" => {
            let (x, y) = value.split_once(',')?;
            Some(ZoomTarget::Custom {
                x: x.trim().parse().ok()?,
                y: y.trim().parse().ok()?,
            })
        }
        _ => None,
    }
}

fn legacy_zoom(params: &HashMap<String, String>) -> VisualAction {
    match number(params, "scale").filter(|s| *s > 0.0) {
        Some(end) => VisualAction::Zoom {
            start_scale: f64::max(1.2, end * 2.0),
            end_scale: end,
        },
        None => VisualAction::Zoom {
            start_scale: LEGACY_ZOOM_START,
            end_scale: LEGACY_ZOOM_END,
        },
    }
}
