//! Text-level conflict handling: marker stripping and the deletion ladder

pub mod ladder;
pub mod markers;

pub use ladder::{apply_level, level_name, EscalationSchedule, LadderPass, MAX_LEVEL};
pub use markers::{has_conflict_markers, resolve_conflict_markers, Resolution};
