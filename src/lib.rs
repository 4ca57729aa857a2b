//! # Guild Jukebox
//!
//! Discord music bot built around a per-guild playback queue and session
//! state machine.
//!
//! - [`audio`]: the playback core (sessions, sequencer, idle monitor,
//!   selection broker and the [`audio::MusicService`] facade)
//! - [`sources`]: query classification and the yt-dlp resolver
//! - [`voice`]: songbird-backed voice gateway and players
//! - [`ui`]: embeds, buttons, select menus and the announcer
//! - [`bot`]: slash commands and interaction routing
//! - [`config`]: environment configuration

pub mod audio;
pub mod bot;
pub mod config;
pub mod sources;
pub mod ui;
pub mod voice;
