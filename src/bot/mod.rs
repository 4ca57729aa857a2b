//! # Bot Module
//!
//! Thin Discord front-end over the playback core.
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]: it registers the
//! slash commands once the gateway is ready, marks the voice backend as
//! available and routes commands and component interactions to
//! [`handlers`]. All playback decisions live in
//! [`crate::audio::MusicService`]; this module only looks up the caller's
//! voice channel, renders outcomes and forwards voice-state changes (the bot
//! losing its connection, its channel emptying of listeners).

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, UserId, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::MusicService, config::Config, voice::SongbirdGateway};

/// Handler de eventos del bot
pub struct JukeboxBot {
    config: Arc<Config>,
    pub service: MusicService,
    gateway: Arc<SongbirdGateway>,
}

impl JukeboxBot {
    pub fn new(config: Arc<Config>, service: MusicService, gateway: Arc<SongbirdGateway>) -> Self {
        Self {
            config,
            service,
            gateway,
        }
    }

    /// Registra comandos por guild si hay `GUILD_ID`, si no globalmente
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        anyhow::anyhow!(
                            "No se pudieron registrar comandos de guild. Verifica el permiso 'applications.commands': {}",
                            e
                        )
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    anyhow::anyhow!("No se pudieron registrar comandos globales: {}", e)
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        self.gateway.mark_ready();

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new
            .guild_id
            .or_else(|| old.as_ref().and_then(|state| state.guild_id))
        else {
            return;
        };
        let bot_id = ctx.cache.current_user().id;

        if new.user_id == bot_id {
            self.service
                .handle_bot_voice_update(guild_id, new.channel_id)
                .await;
            return;
        }

        let touched = new
            .channel_id
            .or_else(|| old.as_ref().and_then(|state| state.channel_id));
        if listeners_left(&ctx, guild_id, bot_id, touched) == Some(0) {
            self.service.maybe_schedule_auto_leave(guild_id);
        }
    }
}

/// Oyentes humanos en el canal del bot, si `touched` es ese canal
fn listeners_left(
    ctx: &Context,
    guild_id: GuildId,
    bot_id: UserId,
    touched: Option<ChannelId>,
) -> Option<usize> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    let bot_channel = guild.voice_states.get(&bot_id)?.channel_id?;
    if touched != Some(bot_channel) {
        return None;
    }

    let listeners = guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(bot_channel))
        .filter(|state| {
            let member = state.member.as_ref().or_else(|| guild.members.get(&state.user_id));
            !member.is_some_and(|m| m.user.bot)
        })
        .count();

    debug!("👥 {} oyentes en el canal {} de guild {}", listeners, bot_channel, guild_id);
    Some(listeners)
}
