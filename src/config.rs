use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

use crate::audio::MusicSettings;

/// Máximo de opciones que admite un menú de selección de Discord
const MAX_SELECT_OPTIONS: usize = 25;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Sesiones
    pub auto_leave_ms: u64,
    pub idle_probe_ms: u64,
    pub selection_ttl_ms: u64,
    pub search_choices: usize,
    pub self_deafen: bool,

    // Audio
    pub default_volume: u8,
    pub track_start_timeout_ms: u64,
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración leyendo cada clave con `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            discord_token: lookup("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            application_id: lookup("APPLICATION_ID")
                .context("APPLICATION_ID no está definido")?
                .trim()
                .parse()
                .context("APPLICATION_ID inválido")?,
            guild_id: lookup("GUILD_ID")
                .and_then(|s| s.trim().parse().ok())
                .filter(|id| *id != 0),

            auto_leave_ms: parse_or(&lookup, "AUTO_LEAVE_MS", defaults.auto_leave_ms)?,
            idle_probe_ms: parse_or(&lookup, "IDLE_PROBE_MS", defaults.idle_probe_ms)?,
            selection_ttl_ms: parse_or(&lookup, "SELECTION_TTL_MS", defaults.selection_ttl_ms)?,
            search_choices: parse_or(&lookup, "SEARCH_CHOICES", defaults.search_choices)?,
            self_deafen: parse_or(&lookup, "SELF_DEAFEN", defaults.self_deafen)?,

            default_volume: parse_or(&lookup, "DEFAULT_VOLUME", defaults.default_volume)?,
            track_start_timeout_ms: parse_or(
                &lookup,
                "TRACK_START_TIMEOUT_MS",
                defaults.track_start_timeout_ms,
            )?,
            ytdlp_path: lookup("YTDLP_PATH")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.ytdlp_path),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0 and 100
    /// - Every timer must be greater than zero
    /// - Search choices must fit in a Discord select menu (1-25)
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 100 {
            anyhow::bail!("Default volume must be between 0 and 100, got: {}", self.default_volume);
        }

        for (name, value) in [
            ("AUTO_LEAVE_MS", self.auto_leave_ms),
            ("IDLE_PROBE_MS", self.idle_probe_ms),
            ("SELECTION_TTL_MS", self.selection_ttl_ms),
            ("TRACK_START_TIMEOUT_MS", self.track_start_timeout_ms),
        ] {
            if value == 0 {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }

        if self.search_choices == 0 || self.search_choices > MAX_SELECT_OPTIONS {
            anyhow::bail!(
                "Search choices must be between 1 and {}, got: {}",
                MAX_SELECT_OPTIONS,
                self.search_choices
            );
        }

        Ok(())
    }

    /// Parámetros que recibe el núcleo de reproducción
    pub fn music_settings(&self) -> MusicSettings {
        MusicSettings {
            auto_leave: Duration::from_millis(self.auto_leave_ms),
            idle_probe: Duration::from_millis(self.idle_probe_ms),
            selection_ttl: Duration::from_millis(self.selection_ttl_ms),
            max_choices: self.search_choices,
            deafen: self.self_deafen,
        }
    }

    pub fn track_start_timeout(&self) -> Duration {
        Duration::from_millis(self.track_start_timeout_ms)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the bot token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Sessions: auto-leave {}, probe {}, selection TTL {}, {} choices, deafen={}\n  \
            Audio: {}% vol, start timeout {}, yt-dlp at '{}'",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            humantime::format_duration(Duration::from_millis(self.auto_leave_ms)),
            humantime::format_duration(Duration::from_millis(self.idle_probe_ms)),
            humantime::format_duration(Duration::from_millis(self.selection_ttl_ms)),
            self.search_choices,
            self.self_deafen,
            self.default_volume,
            humantime::format_duration(self.track_start_timeout()),
            self.ytdlp_path,
        )
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} inválido: '{}'", key, raw)),
        _ => Ok(default),
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        let settings = MusicSettings::default();

        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            auto_leave_ms: settings.auto_leave.as_millis() as u64,
            idle_probe_ms: settings.idle_probe.as_millis() as u64,
            selection_ttl_ms: settings.selection_ttl.as_millis() as u64,
            search_choices: settings.max_choices,
            self_deafen: settings.deafen,

            default_volume: 100,
            track_start_timeout_ms: 20_000,
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}
