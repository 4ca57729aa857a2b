use url::Url;

const SOUNDCLOUD_PREFIX: &str = "soundcloud:";
const SOUNDCLOUD_HOSTS: [&str; 3] = ["soundcloud.com", "www.soundcloud.com", "on.soundcloud.com"];

/// Fuente a la que se dirige una consulta
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    /// URL directa (ya normalizada)
    Url(String),
    /// Búsqueda en YouTube
    YouTubeSearch(String),
    /// Búsqueda en SoundCloud (`soundcloud:<texto>`)
    SoundCloudSearch(String),
}

impl QueryTarget {
    pub fn source_name(&self) -> &'static str {
        match self {
            Self::Url(url) if is_soundcloud_url(url) => "soundcloud",
            Self::Url(_) => "youtube",
            Self::YouTubeSearch(_) => "youtube",
            Self::SoundCloudSearch(_) => "soundcloud",
        }
    }
}

/// Verdadero solo para URLs http(s) absolutas
pub fn looks_like_url(input: &str) -> bool {
    Url::parse(input.trim())
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Clasifica la consulta del usuario. Devuelve `None` si está vacía.
pub fn classify(raw: &str) -> Option<QueryTarget> {
    let query = raw.trim();
    if query.is_empty() {
        return None;
    }

    if looks_like_url(query) {
        return Some(QueryTarget::Url(normalize_youtube_url(query)));
    }

    let has_prefix = query
        .get(..SOUNDCLOUD_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(SOUNDCLOUD_PREFIX));

    if has_prefix {
        let term = query[SOUNDCLOUD_PREFIX.len()..].trim();
        if !term.is_empty() {
            return Some(QueryTarget::SoundCloudSearch(term.to_string()));
        }
    }

    Some(QueryTarget::YouTubeSearch(query.to_string()))
}

/// Reduce links de YouTube a `watch?v=<id>` (sin list, t, index...).
///
/// Cualquier otra URL se devuelve sin cambios.
pub fn normalize_youtube_url(input: &str) -> String {
    let Ok(url) = Url::parse(input.trim()) else {
        return input.to_string();
    };

    let Some(host) = url.host_str().map(str::to_lowercase) else {
        return input.to_string();
    };

    if !is_youtube_host(&host) {
        return input.to_string();
    }

    let id = if host == "youtu.be" {
        url.path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string)
    } else {
        url.query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .or_else(|| path_id(&url, "shorts"))
            .or_else(|| path_id(&url, "embed"))
    };

    match id.filter(|id| !id.is_empty()) {
        Some(id) => format!("https://www.youtube.com/watch?v={}", id),
        None => input.to_string(),
    }
}

fn path_id(url: &Url, prefix: &str) -> Option<String> {
    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == prefix {
            return segments.next().map(str::to_string);
        }
    }
    None
}

fn is_youtube_host(host: &str) -> bool {
    host == "youtu.be" || host == "youtube.com" || host.ends_with(".youtube.com")
}

fn is_soundcloud_url(input: &str) -> bool {
    Url::parse(input)
        .ok()
        .and_then(|url| url.host_str().map(str::to_lowercase))
        .is_some_and(|host| {
            SOUNDCLOUD_HOSTS
                .iter()
                .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_detection() {
        assert!(looks_like_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(looks_like_url("  http://example.com/a.mp3 "));
        assert!(!looks_like_url("lofi beats"));
        assert!(!looks_like_url("ytsearch:lofi"));
        assert!(!looks_like_url("ftp://example.com/file"));
    }

    #[test]
    fn test_youtube_normalization() {
        let expected = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(normalize_youtube_url("https://youtu.be/dQw4w9WgXcQ?t=42"), expected);
        assert_eq!(
            normalize_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL1&index=3"),
            expected
        );
        assert_eq!(normalize_youtube_url("https://youtube.com/shorts/dQw4w9WgXcQ"), expected);
        assert_eq!(normalize_youtube_url("https://m.youtube.com/embed/dQw4w9WgXcQ"), expected);
        assert_eq!(
            normalize_youtube_url("https://soundcloud.com/artist/track"),
            "https://soundcloud.com/artist/track"
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("   "), None);
        assert_eq!(
            classify("lofi beats"),
            Some(QueryTarget::YouTubeSearch("lofi beats".to_string()))
        );
        assert_eq!(
            classify("SoundCloud: night drive"),
            Some(QueryTarget::SoundCloudSearch("night drive".to_string()))
        );

        let target = classify("https://soundcloud.com/artist/track").unwrap();
        assert_eq!(target.source_name(), "soundcloud");
    }
}
