//! # UI Module
//!
//! Discord-facing rendering: embeds, control buttons, the search selection
//! menu and the [`announcer::SerenityAnnouncer`] that posts "now playing"
//! messages for the playback core.

pub mod announcer;
pub mod buttons;
pub mod embeds;

use serenity::{
    builder::{CreateActionRow, CreateEmbed},
    model::id::UserId,
};

use crate::audio::PlayOutcome;

/// Embed y componentes para el resultado de `/play` o de una selección
pub fn render_play_outcome(
    outcome: &PlayOutcome,
    requester: UserId,
) -> (CreateEmbed, Vec<CreateActionRow>) {
    match outcome {
        PlayOutcome::Started { display, .. } => (embeds::create_started_embed(display), Vec::new()),
        PlayOutcome::Queued {
            display, position, ..
        } => (embeds::create_queued_embed(display, *position), Vec::new()),
        PlayOutcome::NeedsSelection {
            token,
            ttl,
            choices,
        } => (
            embeds::create_selection_embed(choices, *ttl),
            vec![buttons::create_selection_menu(token, requester, choices)],
        ),
    }
}
