//! # Voice Module
//!
//! Songbird-backed implementations of the [`crate::audio::player::Player`]
//! and [`crate::audio::player::VoiceGateway`] capabilities.
//!
//! Tracks are streamed with songbird's `YoutubeDl` input using the page URL
//! stored as the track payload. Only the current track may raise
//! `ended`/`errored` signals; a driver disconnect drops the guild's player so
//! the playback core sees the voice session as gone.

pub mod gateway;
pub mod player;

pub use gateway::SongbirdGateway;
pub use player::SongbirdPlayer;
