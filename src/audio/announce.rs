use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, MessageId};

use crate::audio::track::NowPlaying;

/// Referencia a un anuncio publicado, para poder retirarlo después
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnouncementHandle {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// Publica y retira avisos de "reproduciendo ahora".
///
/// Los fallos se registran en el llamador y nunca revierten el estado de
/// reproducción.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(
        &self,
        guild_id: GuildId,
        target: ChannelId,
        now_playing: &NowPlaying,
    ) -> Result<AnnouncementHandle>;

    async fn retract(&self, handle: &AnnouncementHandle) -> Result<()>;
}
