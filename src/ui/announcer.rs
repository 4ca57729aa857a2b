use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::debug;

use crate::{
    audio::{
        announce::{AnnouncementHandle, Announcer},
        track::NowPlaying,
    },
    ui::{buttons, embeds},
};

/// Publica el embed de "reproduciendo ahora" con los controles del reproductor
pub struct SerenityAnnouncer {
    http: Arc<Http>,
}

impl SerenityAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Announcer for SerenityAnnouncer {
    async fn announce(
        &self,
        guild_id: GuildId,
        target: ChannelId,
        now_playing: &NowPlaying,
    ) -> Result<AnnouncementHandle> {
        let message = CreateMessage::new()
            .embed(embeds::create_now_playing_embed(now_playing))
            .components(buttons::create_player_buttons(guild_id));

        let sent = target
            .send_message(self.http.as_ref(), message)
            .await
            .with_context(|| format!("no se pudo anunciar en el canal {}", target))?;

        debug!("📣 Anuncio {} publicado en guild {}", sent.id, guild_id);
        Ok(AnnouncementHandle {
            channel_id: target,
            message_id: sent.id,
        })
    }

    async fn retract(&self, handle: &AnnouncementHandle) -> Result<()> {
        handle
            .channel_id
            .delete_message(self.http.as_ref(), handle.message_id)
            .await
            .with_context(|| format!("no se pudo borrar el anuncio {}", handle.message_id))?;
        Ok(())
    }
}
