use anyhow::Result;
use serenity::{
    all::{ButtonStyle, ComponentInteraction, ComponentInteractionDataKind, Context},
    builder::{
        CreateActionRow, CreateButton, CreateInteractionResponse, CreateInteractionResponseMessage,
        CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption, EditInteractionResponse,
    },
    model::id::{GuildId, UserId},
};
use tracing::{debug, info, warn};

use crate::{
    audio::{selection::SelectionChoice, MusicError, MusicService},
    ui::embeds,
};

/// Prefijo de los botones del anuncio "reproduciendo ahora"
const CONTROL_PREFIX: &str = "np";
/// Prefijo del menú de selección de búsqueda
const PICK_PREFIX: &str = "pick";

/// Acción de un botón de control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Skip,
    Queue,
    Stop,
}

impl ControlAction {
    pub const ALL: [ControlAction; 5] = [
        Self::Pause,
        Self::Resume,
        Self::Skip,
        Self::Queue,
        Self::Stop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Skip => "skip",
            Self::Queue => "queue",
            Self::Stop => "stop",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == raw)
    }
}

/// `np:<guild>:<acción>`
pub fn control_id(guild_id: GuildId, action: ControlAction) -> String {
    format!("{}:{}:{}", CONTROL_PREFIX, guild_id, action.as_str())
}

pub fn parse_control_id(custom_id: &str) -> Option<(GuildId, ControlAction)> {
    let mut parts = custom_id.splitn(3, ':');
    if parts.next()? != CONTROL_PREFIX {
        return None;
    }
    let guild = parts.next()?.parse::<u64>().ok().filter(|id| *id != 0)?;
    let action = ControlAction::parse(parts.next()?)?;
    Some((GuildId::new(guild), action))
}

/// `pick:<token>:<usuario>`
pub fn selection_id(token: &str, user_id: UserId) -> String {
    format!("{}:{}:{}", PICK_PREFIX, token, user_id)
}

pub fn parse_selection_id(custom_id: &str) -> Option<(String, UserId)> {
    let mut parts = custom_id.splitn(3, ':');
    if parts.next()? != PICK_PREFIX {
        return None;
    }
    let token = parts.next().filter(|t| !t.is_empty())?;
    let user = parts.next()?.parse::<u64>().ok().filter(|id| *id != 0)?;
    Some((token.to_string(), UserId::new(user)))
}

/// Controles del anuncio de reproducción
pub fn create_player_buttons(guild_id: GuildId) -> Vec<CreateActionRow> {
    let pause_btn = CreateButton::new(control_id(guild_id, ControlAction::Pause))
        .emoji('⏸')
        .style(ButtonStyle::Secondary);

    let resume_btn = CreateButton::new(control_id(guild_id, ControlAction::Resume))
        .emoji('▶')
        .style(ButtonStyle::Primary);

    let skip_btn = CreateButton::new(control_id(guild_id, ControlAction::Skip))
        .emoji('⏭')
        .style(ButtonStyle::Secondary);

    let queue_btn = CreateButton::new(control_id(guild_id, ControlAction::Queue))
        .label("Cola")
        .emoji('📋')
        .style(ButtonStyle::Secondary);

    let stop_btn = CreateButton::new(control_id(guild_id, ControlAction::Stop))
        .emoji('⏹')
        .style(ButtonStyle::Danger);

    vec![CreateActionRow::Buttons(vec![
        pause_btn, resume_btn, skip_btn, queue_btn, stop_btn,
    ])]
}

/// Menú desplegable con los candidatos de una búsqueda ambigua
pub fn create_selection_menu(
    token: &str,
    requester: UserId,
    choices: &[SelectionChoice],
) -> CreateActionRow {
    let options = choices
        .iter()
        .map(|choice| {
            CreateSelectMenuOption::new(&choice.label, choice.index.to_string())
                .description(&choice.description)
        })
        .collect();

    let menu = CreateSelectMenu::new(
        selection_id(token, requester),
        CreateSelectMenuKind::String { options },
    )
    .placeholder("🎶 Elige un resultado")
    .min_values(1)
    .max_values(1);

    CreateActionRow::SelectMenu(menu)
}

/// Punto de entrada para todas las interacciones de componentes
pub async fn handle_music_component(
    ctx: &Context,
    interaction: &ComponentInteraction,
    service: &MusicService,
) -> Result<()> {
    let custom_id = interaction.data.custom_id.as_str();

    if let Some((token, requester)) = parse_selection_id(custom_id) {
        return handle_selection(ctx, interaction, service, &token, requester).await;
    }

    if let Some((guild_id, action)) = parse_control_id(custom_id) {
        return handle_control(ctx, interaction, service, guild_id, action).await;
    }

    debug!("Componente no manejado: {}", custom_id);
    respond_ephemeral(
        ctx,
        interaction,
        embeds::create_info_embed("⚠️ Control desconocido", "Este control ya no está disponible."),
    )
    .await
}

async fn handle_selection(
    ctx: &Context,
    interaction: &ComponentInteraction,
    service: &MusicService,
    token: &str,
    requester: UserId,
) -> Result<()> {
    if interaction.user.id != requester {
        return respond_ephemeral(
            ctx,
            interaction,
            embeds::create_info_embed(
                "🚫 Selección ajena",
                "Solo quien hizo la búsqueda puede elegir el resultado.",
            ),
        )
        .await;
    }

    let picked = match &interaction.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => {
            values.first().and_then(|v| v.parse::<usize>().ok())
        }
        _ => None,
    };

    let (Some(guild_id), Some(index)) = (interaction.guild_id, picked) else {
        return respond_ephemeral(
            ctx,
            interaction,
            embeds::create_error_embed(&MusicError::SelectionExpired),
        )
        .await;
    };

    // unirse al canal puede tardar más que el plazo de respuesta
    interaction
        .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
        .await?;

    let (embed, components) = match service.complete_selection(token, guild_id, index).await {
        Ok(outcome) => {
            info!("🎯 Selección {} completada en guild {}", index, guild_id);
            super::render_play_outcome(&outcome, requester)
        }
        Err(e) => {
            warn!("⚠️ Selección rechazada en guild {}: {}", guild_id, e);
            (embeds::create_error_embed(&e), Vec::new())
        }
    };

    interaction
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new()
                .embed(embed)
                .components(components),
        )
        .await?;

    Ok(())
}

async fn handle_control(
    ctx: &Context,
    interaction: &ComponentInteraction,
    service: &MusicService,
    guild_id: GuildId,
    action: ControlAction,
) -> Result<()> {
    if interaction.guild_id != Some(guild_id) {
        return respond_ephemeral(
            ctx,
            interaction,
            embeds::create_error_embed(&MusicError::WrongGuild),
        )
        .await;
    }

    debug!("🎛️ Botón {} en guild {}", action.as_str(), guild_id);

    let embed = match action {
        ControlAction::Pause => service
            .pause(guild_id)
            .await
            .map(|()| embeds::create_success_embed("Pausado", "⏸️ Reproducción pausada")),
        ControlAction::Resume => service
            .resume(guild_id)
            .await
            .map(|()| embeds::create_success_embed("Reanudado", "▶️ Reproducción reanudada")),
        ControlAction::Skip => service.skip(guild_id).await.map(|skipped| {
            let description = match skipped.next {
                Some(next) => format!("⏭️ Siguiente: {}", next),
                None => "⏭️ No quedan canciones en la cola".to_string(),
            };
            embeds::create_success_embed("Saltado", &description)
        }),
        ControlAction::Queue => service
            .queue_snapshot(guild_id)
            .map(|snapshot| embeds::create_queue_embed(&snapshot)),
        ControlAction::Stop => service.stop(guild_id).await.map(|()| {
            embeds::create_success_embed("Detenido", "⏹️ Reproducción detenida y cola vaciada")
        }),
    };

    let embed = embed.unwrap_or_else(|e| embeds::create_error_embed(&e));
    respond_ephemeral(ctx, interaction, embed).await
}

async fn respond_ephemeral(
    ctx: &Context,
    interaction: &ComponentInteraction,
    embed: serenity::builder::CreateEmbed,
) -> Result<()> {
    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_control_id_round_trip() {
        let guild = GuildId::new(4242);
        for action in ControlAction::ALL {
            let id = control_id(guild, action);
            assert_eq!(parse_control_id(&id), Some((guild, action)));
        }
        assert_eq!(control_id(guild, ControlAction::Skip), "np:4242:skip");
    }

    #[test]
    fn test_control_id_rejects_garbage() {
        assert_eq!(parse_control_id("np:4242:shuffle"), None);
        assert_eq!(parse_control_id("np:abc:skip"), None);
        assert_eq!(parse_control_id("np:0:skip"), None);
        assert_eq!(parse_control_id("music_skip"), None);
        assert_eq!(parse_control_id("pick:4242:skip"), None);
    }

    #[test]
    fn test_selection_id_round_trip() {
        let user = UserId::new(77);
        let id = selection_id("3f2a-token", user);
        assert_eq!(id, "pick:3f2a-token:77");
        assert_eq!(
            parse_selection_id(&id),
            Some(("3f2a-token".to_string(), user))
        );
    }

    #[test]
    fn test_selection_id_rejects_garbage() {
        assert_eq!(parse_selection_id("pick::77"), None);
        assert_eq!(parse_selection_id("pick:token"), None);
        assert_eq!(parse_selection_id("pick:token:nadie"), None);
        assert_eq!(parse_selection_id("np:1:pause"), None);
    }
}
