//! Script text <-> structured [`Segment`] list.
//!
//! ```text
//! [<SPEAKER TAG>] <text with optional <ACTION> tokens>
//! [<SPEAKER TAG>|<message id>] <text>
//! [[MEDIA]] id=<token>|name="<text>" <optional <ACTION> tokens>
//! [[HOLD]] <optional <ACTION> tokens>
//! ```

pub mod parser;
pub mod segment;
pub mod writer;

pub use parser::{parse, parse_with_warnings, ParseOutput};
pub use segment::{MediaRef, Segment, SegmentKind, SpeakerRole, EMBER_TAG, NARRATOR_TAG};
pub use writer::to_script_text;
