//! # Audio Module
//!
//! Per-guild playback queue and session state machine.
//!
//! Every guild gets one lazily created session holding its queue, the
//! now-playing metadata, the announce target and an optional idle timer.
//! Requests enter through [`service::MusicService`]; the voice transport,
//! search backend and chat announcements are reached only through the
//! [`player::Player`], [`player::VoiceGateway`], [`crate::sources::Resolver`]
//! and [`announce::Announcer`] traits.
//!
//! ## Components
//!
//! ### [`sequencer`] - Playback Sequencer
//! - Drains a guild's queue through its Player, one pass at a time
//! - Skips entries that fail to start instead of aborting the queue
//! - Retracts the previous "now playing" announcement and posts the new one
//!
//! ### [`idle`] - Idle Monitor
//! - Armed when the queue finishes or playback is stopped
//! - Re-checks the session (and the play head) before leaving voice
//!
//! ### [`selection`] - Selection Broker
//! - One-time tokens for ambiguous searches, expiring after a TTL
//!
//! ## State machine
//!
//! `Empty -> Playing -> (ended) -> Playing | Empty`, `Playing -> (start
//! failure) -> Playing | Empty`, and any state goes back to `Empty` on
//! `stop` or `leave`.

pub mod announce;
pub mod error;
pub mod idle;
pub mod player;
pub mod selection;
pub mod sequencer;
pub mod service;
pub mod session;
pub mod timer;
pub mod track;

#[cfg(test)]
pub mod testing;

pub use error::{ErrorCode, MusicError, MusicResult};
pub use service::{MusicService, MusicSettings, PlayOutcome, PlayRequest, QueueSnapshot, SkipOutcome};
