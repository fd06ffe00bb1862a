use serde::{Deserialize, Serialize};

use crate::script::{SegmentKind, SpeakerRole};
use crate::settings::EngineSettings;

use super::action::{VisualAction, ZoomDirection};

/// What the presentation layer should paint. `background_image_url: None` keeps the
/// current background; overlays are replaced wholesale on every update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisualState {
    pub overlay_color: Option<String>,
    pub overlay_transparency: Option<f32>,
    pub background_image_url: Option<String>,
    pub zoom_scale: f64,
    pub media_color: Option<String>,
    /// Animated effects (fade/pan/zoom) for the presenter to run over the step.
    pub effects: Vec<VisualAction>,
}

impl Default for VisualState {
    fn default() -> Self {
        Self::cleared()
    }
}

impl VisualState {
    pub fn cleared() -> Self {
        Self {
            overlay_color: None,
            overlay_transparency: None,
            background_image_url: None,
            zoom_scale: 1.0,
            media_color: None,
            effects: Vec::new(),
        }
    }

    /// Hold steps paint a solid colour; media steps show the image tinted by any colour action.
    pub fn for_directive(
        kind: SegmentKind,
        actions: &[VisualAction],
        media_url: Option<String>,
        settings: &EngineSettings,
    ) -> Self {
        let mut state = Self::cleared();
        state.background_image_url = media_url;

        for action in actions {
            match action {
                VisualAction::Color {
                    color,
                    transparency,
                } => {
                    if kind == SegmentKind::Hold {
                        state.media_color = Some(color.clone());
                    } else {
                        state.overlay_color = Some(color.clone());
                        state.overlay_transparency =
                            Some(transparency.unwrap_or(settings.overlay_transparency));
                    }
                }
                other => state.push_effect(other),
            }
        }

        state
    }

    /// Voice steps tint the photo with the role colour unless a `COLOR` action overrides it.
    pub fn for_voice(role: SpeakerRole, actions: &[VisualAction], settings: &EngineSettings) -> Self {
        let mut state = Self::cleared();
        state.overlay_color = Some(settings.overlay_colors.for_role(role).to_string());
        state.overlay_transparency = Some(settings.overlay_transparency);

        for action in actions {
            match action {
                VisualAction::Color {
                    color,
                    transparency,
                } => {
                    state.overlay_color = Some(color.clone());
                    state.overlay_transparency =
                        Some(transparency.unwrap_or(settings.overlay_transparency));
                }
                other => state.push_effect(other),
            }
        }

        state
    }

    fn push_effect(&mut self, action: &VisualAction) {
        match action {
            VisualAction::Zoom { start_scale, .. } => self.zoom_scale = *start_scale,
            VisualAction::ZoomTarget {
                direction: ZoomDirection::Out,
                scale,
                ..
            } => self.zoom_scale = *scale,
            _ => {}
        }
        self.effects.push(action.clone());
    }
}
