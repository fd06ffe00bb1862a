pub mod action;
pub mod state;

pub use action::{
    decode, decode_all, explicit_duration, FadeDirection, PanDirection, VisualAction,
    ZoomDirection, ZoomTarget,
};
pub use state::VisualState;
