//! State machine module for the mute transition logic
//!
//! Two states only:
//! - unmuted: default, nothing saved
//! - muted-by-us: output muted, prior volume level saved for restore

mod machine;

pub use machine::{MuteStateMachine, Transition};
