use serenity::{
    builder::{CreateEmbed, CreateEmbedFooter},
    model::Timestamp,
};
use std::time::Duration;

use crate::audio::{
    error::{ErrorCode, MusicError},
    selection::SelectionChoice,
    track::NowPlaying,
    QueueSnapshot,
};

/// Colores estándar para embeds
pub mod colors {
    use serenity::model::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estándar para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Entradas de la cola visibles en el embed
const QUEUE_PAGE: usize = 10;

/// Embed de "reproduciendo ahora" para el anuncio en el canal
pub fn create_now_playing_embed(now_playing: &NowPlaying) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(&now_playing.label)
        .color(colors::MUSIC_PURPLE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now());

    if let Some(artwork) = &now_playing.artwork_url {
        embed = embed.thumbnail(artwork);
    }

    embed
}

/// Respuesta a `/play` cuando el track empezó a sonar
pub fn create_started_embed(display: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("▶️ Reproduciendo")
        .description(display)
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Respuesta a `/play` cuando el track quedó en cola
pub fn create_queued_embed(display: &str, position: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("➕ Agregado a la cola")
        .description(display)
        .field("📍 Posición", format!("#{}", position), true)
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Embed de la cola actual
pub fn create_queue_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now());

    if let Some(current) = &snapshot.now_playing {
        embed = embed.field("🎵 Reproduciendo", current, false);
    }

    if snapshot.items.is_empty() {
        if snapshot.now_playing.is_none() {
            embed = embed.description(
                "😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música",
            );
        }
        return embed;
    }

    embed
        .field("📜 Próximas canciones", queue_lines(&snapshot.items), false)
        .field("📊 En cola", snapshot.items.len().to_string(), true)
}

/// Numera las primeras entradas y resume el resto
fn queue_lines(items: &[String]) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(QUEUE_PAGE)
        .enumerate()
        .map(|(i, item)| format!("**{}**. {}", i + 1, item))
        .collect();

    if items.len() > QUEUE_PAGE {
        lines.push(format!("*… y {} más*", items.len() - QUEUE_PAGE));
    }

    lines.join("\n")
}

/// Prompt del menú de selección para búsquedas ambiguas
pub fn create_selection_embed(choices: &[SelectionChoice], ttl: Duration) -> CreateEmbed {
    let list = choices
        .iter()
        .map(|c| format!("**{}**. {}", c.index + 1, c.label))
        .collect::<Vec<_>>()
        .join("\n");

    CreateEmbed::default()
        .title("🔍 Elige una canción")
        .description(list)
        .color(colors::MUSIC_PURPLE)
        .footer(CreateEmbedFooter::new(format!(
            "⏱️ La selección expira en {}",
            humantime::format_duration(ttl)
        )))
        .timestamp(Timestamp::now())
}

/// Embed de volumen con barra visual
pub fn create_volume_embed(volume: u8) -> CreateEmbed {
    let emoji = match volume {
        0 => "🔇",
        1..=50 => "🔉",
        _ => "🔊",
    };

    CreateEmbed::default()
        .title(format!("{} Volumen", emoji))
        .description(format!("**Volumen actual: {}%**", volume))
        .field("📊 Nivel", create_volume_bar(volume), false)
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

fn create_volume_bar(volume: u8) -> String {
    let segments = 20;
    let filled = usize::from(volume.min(100)) * segments / 100;
    format!("`[{}{}]`", "█".repeat(filled), "▒".repeat(segments - filled))
}

/// Confirmación breve de una acción de control
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::NEUTRAL_GRAY)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de error con el mensaje de la tabla de motivos
pub fn create_error_embed(error: &MusicError) -> CreateEmbed {
    let color = match error.code() {
        ErrorCode::AlreadyPaused | ErrorCode::NotPaused | ErrorCode::NoPlayer => {
            colors::WARNING_ORANGE
        }
        _ => colors::ERROR_RED,
    };

    CreateEmbed::default()
        .title("❌ No se pudo completar")
        .description(describe_failure(error))
        .color(color)
        .footer(CreateEmbedFooter::new(format!("Código: {}", error.code())))
        .timestamp(Timestamp::now())
}

/// Tabla motivo → mensaje para el usuario
pub fn describe_failure(error: &MusicError) -> String {
    match error {
        MusicError::JoinFailed(_) => {
            "No pude unirme a tu canal de voz. Revisa mis permisos.".to_string()
        }
        MusicError::ResolveFailed(_) => {
            "La búsqueda falló. Intenta de nuevo en unos segundos.".to_string()
        }
        MusicError::NoTracks { .. } => "No encontré resultados para esa búsqueda.".to_string(),
        MusicError::NoEncoded { info } => format!(
            "**{}** no se puede reproducir.",
            info.display_title()
        ),
        MusicError::PlayFailed(_) => "No se pudo reproducir la canción.".to_string(),
        MusicError::NoPlayer => "No estoy conectado a un canal de voz.".to_string(),
        MusicError::AlreadyPaused => "La reproducción ya está pausada.".to_string(),
        MusicError::NotPaused => "La reproducción no está pausada.".to_string(),
        MusicError::SelectionExpired | MusicError::WrongGuild => {
            "Esa selección ya no es válida. Vuelve a usar `/play`.".to_string()
        }
        MusicError::InvalidSelection(_) => "Esa opción no existe.".to_string(),
        MusicError::InvalidVolume => "El volumen debe ser un número entero.".to_string(),
        MusicError::OutOfRange(_) => "El volumen debe estar entre 0 y 100.".to_string(),
        MusicError::NoDisconnectMethod => {
            "No pude salir del canal de voz. Intenta de nuevo.".to_string()
        }
    }
}
