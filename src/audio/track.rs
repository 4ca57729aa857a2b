use serde::{Deserialize, Serialize};

/// Longitud máxima de las etiquetas mostradas en menús de selección.
pub const CHOICE_TEXT_MAX: usize = 100;

const UNKNOWN_TITLE: &str = "Desconocido";

/// Metadata de visualización de un track resuelto.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub author: Option<String>,
    pub duration_ms: Option<u64>,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub identifier: Option<String>,
    pub source_name: Option<String>,
}

impl TrackInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_artwork(mut self, artwork_url: impl Into<String>) -> Self {
        self.artwork_url = Some(artwork_url.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_source(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    /// Título limpio, con fallback para tracks sin nombre
    pub fn display_title(&self) -> &str {
        match self.title.trim() {
            "" => UNKNOWN_TITLE,
            title => title,
        }
    }
}

/// Track listo para reproducir: payload opaco para el Player + metadata.
///
/// Inmutable una vez resuelto; la cola es dueña de cada instancia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    encoded: String,
    info: TrackInfo,
}

impl TrackDescriptor {
    pub fn new(encoded: impl Into<String>, info: TrackInfo) -> Self {
        Self {
            encoded: encoded.into(),
            info,
        }
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    pub fn describe(&self) -> String {
        describe_track(&self.info)
    }
}

/// Datos cacheados del track que está sonando (sin el payload, que ya tiene el Player).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
    pub label: String,
    pub artwork_url: Option<String>,
}

impl From<&TrackInfo> for NowPlaying {
    fn from(info: &TrackInfo) -> Self {
        Self {
            label: describe_track(info),
            artwork_url: find_artwork(info),
        }
    }
}

/// Formatea milisegundos como `mm:ss` o `h:mm:ss`
pub fn format_duration(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Línea de texto para colas y anuncios: título enlazado, autor y duración.
pub fn describe_track(info: &TrackInfo) -> String {
    let title = info.display_title();

    let mut parts = vec![match info.uri.as_deref() {
        Some(uri) if !uri.is_empty() => format!("**[{}]({})**", title, uri),
        _ => format!("**{}**", title),
    }];

    if let Some(author) = info.author.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        parts.push(author.to_string());
    }

    if let Some(ms) = info.duration_ms {
        parts.push(format!("({})", format_duration(ms)));
    }

    parts.join(" - ")
}

/// Recorta a `max` caracteres (no bytes) terminando en `…`
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Busca artwork explícito o lo deriva del ID de YouTube.
pub fn find_artwork(info: &TrackInfo) -> Option<String> {
    if let Some(artwork) = info.artwork_url.as_deref().filter(|a| !a.is_empty()) {
        return Some(artwork.to_string());
    }

    let is_youtube = info
        .source_name
        .as_deref()
        .is_some_and(|s| s.to_lowercase().contains("youtube"));

    match info.identifier.as_deref() {
        Some(id) if is_youtube && !id.is_empty() => {
            Some(format!("https://img.youtube.com/vi/{}/hqdefault.jpg", id))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(65_000), "01:05");
        assert_eq!(format_duration(3_723_999), "1:02:03");
    }

    #[test]
    fn test_describe_track_with_all_fields() {
        let info = TrackInfo::new("  Lofi Beats ")
            .with_author("Chill Cow")
            .with_duration_ms(185_000)
            .with_uri("https://www.youtube.com/watch?v=abc");

        assert_eq!(
            describe_track(&info),
            "**[Lofi Beats](https://www.youtube.com/watch?v=abc)** - Chill Cow - (03:05)"
        );
    }

    #[test]
    fn test_describe_track_without_metadata() {
        assert_eq!(describe_track(&TrackInfo::default()), "**Desconocido**");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("corto", 100), "corto");
        assert_eq!(truncate("ñandú ñandú", 6), "ñandú…");
        assert_eq!(truncate(&"x".repeat(150), 100).chars().count(), 100);
    }

    #[test]
    fn test_artwork_fallbacks() {
        let explicit = TrackInfo::new("a").with_artwork("https://img/a.png");
        assert_eq!(find_artwork(&explicit).as_deref(), Some("https://img/a.png"));

        let youtube = TrackInfo::new("b").with_identifier("dQw4w9WgXcQ").with_source("youtube");
        assert_eq!(
            find_artwork(&youtube).as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );

        let soundcloud = TrackInfo::new("c").with_identifier("123").with_source("soundcloud");
        assert_eq!(find_artwork(&soundcloud), None);
    }

    #[test]
    fn test_now_playing_from_info() {
        let info = TrackInfo::new("Song").with_identifier("id1").with_source("YouTube");
        let np = NowPlaying::from(&info);
        assert_eq!(np.label, "**Song**");
        assert!(np.artwork_url.is_some());
    }
}
