//! Schedule view helpers: filtering, rooms and date presets.

pub mod dates;
pub mod filter;
pub mod rooms;

pub use dates::DatePreset;
pub use filter::MeetingFilter;
