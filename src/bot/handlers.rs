use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{MusicError, MusicResult, PlayRequest},
    bot::JukeboxBot,
    ui::{self, buttons, embeds},
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(
            ctx,
            &command,
            embeds::create_info_embed("🏠 Solo en servidores", "Usa los comandos dentro de un servidor."),
            true,
        )
        .await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "join" => handle_join(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "pause" => {
            let result = bot.service.pause(guild_id).await.map(|()| {
                embeds::create_success_embed("Pausado", "⏸️ Reproducción pausada")
            });
            respond_result(ctx, &command, result).await?
        }
        "resume" => {
            let result = bot.service.resume(guild_id).await.map(|()| {
                embeds::create_success_embed("Reanudado", "▶️ Reproducción reanudada")
            });
            respond_result(ctx, &command, result).await?
        }
        "stop" => {
            let result = bot.service.stop(guild_id).await.map(|()| {
                embeds::create_success_embed("Detenido", "⏹️ Reproducción detenida y cola vaciada")
            });
            respond_result(ctx, &command, result).await?
        }
        "leave" => {
            let result = bot.service.leave(guild_id).await.map(|()| {
                embeds::create_success_embed("Desconectado", "👋 Salí del canal de voz")
            });
            respond_result(ctx, &command, result).await?
        }
        "volume" => handle_volume(ctx, &command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await?,
        "queue" => {
            let result = bot
                .service
                .queue_snapshot(guild_id)
                .map(|snapshot| embeds::create_queue_embed(&snapshot));
            respond_result(ctx, &command, result).await?
        }
        _ => {
            respond(
                ctx,
                &command,
                embeds::create_info_embed("❓ Comando no reconocido", "Este comando ya no existe."),
                true,
            )
            .await?
        }
    }

    Ok(())
}

/// Maneja interacciones con componentes (botones y menús)
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    buttons::handle_music_component(ctx, &component, &bot.service).await
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .unwrap_or_default()
        .to_string();

    // resolver y unirse puede tomar más de 3 segundos
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let Some(channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return edit(ctx, command, not_in_voice_embed(), Vec::new()).await;
    };

    let request = PlayRequest {
        guild_id,
        channel_id,
        shard_id: ctx.shard_id.0,
        query,
        announce_target: Some(command.channel_id),
    };

    let (embed, components) = match bot.service.play(request).await {
        Ok(outcome) => ui::render_play_outcome(&outcome, command.user.id),
        Err(e) => {
            warn!("⚠️ /play falló en guild {}: {}", guild_id, e);
            (embeds::create_error_embed(&e), Vec::new())
        }
    };

    edit(ctx, command, embed, components).await
}

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, command, not_in_voice_embed(), true).await;
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let deaf = bot.service.settings().deafen;
    let embed = match bot
        .service
        .join(guild_id, channel_id, ctx.shard_id.0, deaf)
        .await
    {
        Ok(_) => embeds::create_success_embed("Conectado", &format!("🔊 Unido a <#{}>", channel_id)),
        Err(e) => embeds::create_error_embed(&e),
    };

    edit(ctx, command, embed, Vec::new()).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let result = bot.service.skip(guild_id).await.map(|skipped| {
        let description = match skipped.next {
            Some(next) => format!("⏭️ Siguiente: {}", next),
            None => "⏭️ No quedan canciones en la cola".to_string(),
        };
        embeds::create_success_embed("Saltado", &description)
    });

    respond_result(ctx, command, result).await
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_f64().or_else(|| opt.value.as_i64().map(|v| v as f64)));

    let result = match level {
        Some(level) => bot
            .service
            .set_volume(guild_id, level)
            .await
            .map(embeds::create_volume_embed),
        None => Err(MusicError::InvalidVolume),
    };

    respond_result(ctx, command, result).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.service.now_playing(guild_id) {
        Ok(Some(now_playing)) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::create_now_playing_embed(&now_playing))
                            .components(buttons::create_player_buttons(guild_id)),
                    ),
                )
                .await?;
            Ok(())
        }
        Ok(None) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed("🔇 Silencio", "No hay nada reproduciéndose."),
                true,
            )
            .await
        }
        Err(e) => respond(ctx, command, embeds::create_error_embed(&e), true).await,
    }
}

// Funciones auxiliares

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn not_in_voice_embed() -> CreateEmbed {
    embeds::create_info_embed(
        "🎧 Sin canal de voz",
        "Debes estar en un canal de voz para usar este comando.",
    )
}

/// Éxito visible para todos, errores solo para quien usó el comando
async fn respond_result(
    ctx: &Context,
    command: &CommandInteraction,
    result: MusicResult<CreateEmbed>,
) -> Result<()> {
    match result {
        Ok(embed) => respond(ctx, command, embed, false).await,
        Err(e) => respond(ctx, command, embeds::create_error_embed(&e), true).await,
    }
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn edit(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    components: Vec<serenity::builder::CreateActionRow>,
) -> Result<()> {
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new()
                .embed(embed)
                .components(components),
        )
        .await?;
    Ok(())
}
