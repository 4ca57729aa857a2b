use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{
    query::{classify, QueryTarget},
    LoadType, Resolution, ResolvedTrack, Resolver,
};
use crate::audio::track::TrackInfo;

/// Resolver que consulta yt-dlp (`--dump-single-json`) como proceso externo
pub struct YtDlpResolver {
    binary: String,
    search_limit: usize,
    timeout: Duration,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, search_limit: usize) -> Self {
        Self {
            binary: binary.into(),
            search_limit: search_limit.max(1),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Argumentos de yt-dlp según el tipo de consulta
    fn build_args(&self, target: &QueryTarget) -> (Vec<String>, LoadType) {
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--skip-download",
            "--quiet",
            "--no-warnings",
            "--socket-timeout",
            "15",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let load_type = match target {
            QueryTarget::Url(url) => {
                args.push("--no-playlist".to_string());
                args.push(url.clone());
                LoadType::DirectHit
            }
            QueryTarget::YouTubeSearch(term) => {
                args.push("--flat-playlist".to_string());
                args.push(format!("ytsearch{}:{}", self.search_limit, term));
                LoadType::SearchResult
            }
            QueryTarget::SoundCloudSearch(term) => {
                args.push("--flat-playlist".to_string());
                args.push(format!("scsearch{}:{}", self.search_limit, term));
                LoadType::SearchResult
            }
        };

        (args, load_type)
    }

    async fn run(&self, args: &[String]) -> Result<String> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);

        let output = timeout(self.timeout, cmd.output())
            .await
            .context("yt-dlp excedió el tiempo límite")?
            .with_context(|| format!("no se pudo ejecutar {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp falló ({}): {}", output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Resolution> {
        let Some(target) = classify(query) else {
            return Ok(Resolution::empty("unknown"));
        };

        let source = target.source_name();
        let (args, load_type) = self.build_args(&target);
        debug!("🔍 yt-dlp {:?}", args);

        let stdout = self
            .run(&args)
            .await
            .with_context(|| format!("resolve para {} falló: {}", source, query))?;

        let resolution = parse_output(&stdout, load_type, source)?;
        info!(
            "🔍 {} resultados ({:?}) para '{}' en {}",
            resolution.tracks.len(),
            resolution.load_type,
            query,
            source
        );
        Ok(resolution)
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<YtDlpThumbnail>,
    extractor_key: Option<String>,
    ie_key: Option<String>,
    #[serde(default)]
    entries: Vec<Option<YtDlpEntry>>,
}

#[derive(Debug, Deserialize)]
struct YtDlpThumbnail {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

impl YtDlpEntry {
    fn source_name(&self) -> Option<String> {
        self.extractor_key
            .as_deref()
            .or(self.ie_key.as_deref())
            .map(str::to_lowercase)
    }

    /// URL canónica que sirve como payload para el Player
    fn payload(&self) -> Option<String> {
        let is_http = |u: &&String| u.starts_with("http://") || u.starts_with("https://");

        self.webpage_url
            .as_ref()
            .filter(is_http)
            .or(self.url.as_ref().filter(is_http))
            .cloned()
            .or_else(|| {
                let youtube = self.source_name().is_some_and(|s| s.contains("youtube"));
                match (&self.id, youtube) {
                    (Some(id), true) => Some(format!("https://www.youtube.com/watch?v={}", id)),
                    _ => None,
                }
            })
    }

    fn artwork(&self) -> Option<String> {
        if let Some(thumbnail) = self.thumbnail.as_ref().filter(|t| !t.is_empty()) {
            return Some(thumbnail.clone());
        }

        self.thumbnails
            .iter()
            .max_by_key(|t| t.width.unwrap_or(0) as u64 * t.height.unwrap_or(0) as u64)
            .map(|t| t.url.clone())
    }

    fn into_track(self) -> ResolvedTrack {
        let encoded = self.payload();

        let mut info = TrackInfo::new(self.title.clone().unwrap_or_default());
        info.author = self.uploader.clone().or_else(|| self.channel.clone());
        info.duration_ms = self
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| (d * 1000.0) as u64);
        info.uri = encoded.clone();
        info.artwork_url = self.artwork();
        info.identifier = self.id.clone();
        info.source_name = self.source_name();

        ResolvedTrack { encoded, info }
    }
}

/// Convierte la salida JSON de yt-dlp en una [`Resolution`]
fn parse_output(stdout: &str, load_type: LoadType, source: &str) -> Result<Resolution> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Resolution::empty(source));
    }

    let mut root: YtDlpEntry =
        serde_json::from_str(trimmed).context("salida de yt-dlp no es JSON válido")?;

    let tracks: Vec<ResolvedTrack> = if root.entries.is_empty() {
        vec![root.into_track()]
    } else {
        std::mem::take(&mut root.entries)
            .into_iter()
            .flatten()
            .map(YtDlpEntry::into_track)
            .collect()
    };

    if tracks.is_empty() {
        warn!("⚠️ yt-dlp no devolvió entradas para {}", source);
        return Ok(Resolution::empty(source));
    }

    Ok(Resolution {
        load_type,
        tracks,
        source: source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_search_result() {
        let json = r#"{
            "_type": "playlist",
            "entries": [
                {"id": "aaa", "title": "Lofi 1", "url": "https://www.youtube.com/watch?v=aaa",
                 "duration": 125.0, "channel": "Chill", "ie_key": "Youtube",
                 "thumbnails": [{"url": "https://i/small.jpg", "width": 120, "height": 90},
                                {"url": "https://i/big.jpg", "width": 480, "height": 360}]},
                null,
                {"id": "bbb", "title": "Lofi 2", "ie_key": "Youtube"}
            ]
        }"#;

        let resolution = parse_output(json, LoadType::SearchResult, "youtube").unwrap();
        assert_eq!(resolution.load_type, LoadType::SearchResult);
        assert_eq!(resolution.tracks.len(), 2);

        let first = &resolution.tracks[0];
        assert_eq!(first.encoded.as_deref(), Some("https://www.youtube.com/watch?v=aaa"));
        assert_eq!(first.info.author.as_deref(), Some("Chill"));
        assert_eq!(first.info.duration_ms, Some(125_000));
        assert_eq!(first.info.artwork_url.as_deref(), Some("https://i/big.jpg"));

        // sin url, se reconstruye desde el id de YouTube
        assert_eq!(
            resolution.tracks[1].encoded.as_deref(),
            Some("https://www.youtube.com/watch?v=bbb")
        );
    }

    #[test]
    fn test_parse_direct_hit() {
        let json = r#"{"id": "x1", "title": "Song", "webpage_url": "https://soundcloud.com/a/b",
                       "uploader": "Artist", "extractor_key": "Soundcloud",
                       "thumbnail": "https://i/x1.jpg"}"#;

        let resolution = parse_output(json, LoadType::DirectHit, "soundcloud").unwrap();
        assert_eq!(resolution.tracks.len(), 1);
        assert_eq!(resolution.tracks[0].info.source_name.as_deref(), Some("soundcloud"));
        assert!(resolution.tracks[0].playable().is_some());
    }

    #[test]
    fn test_parse_empty_outputs() {
        let resolution = parse_output("   ", LoadType::SearchResult, "youtube").unwrap();
        assert_eq!(resolution.load_type, LoadType::Empty);

        let resolution =
            parse_output(r#"{"entries": [null]}"#, LoadType::SearchResult, "youtube").unwrap();
        assert_eq!(resolution.load_type, LoadType::Empty);

        assert!(parse_output("not json", LoadType::DirectHit, "youtube").is_err());
    }

    #[test]
    fn test_search_args_use_limit() {
        let resolver = YtDlpResolver::new("yt-dlp", 5);
        let (args, load_type) =
            resolver.build_args(&QueryTarget::SoundCloudSearch("night drive".to_string()));
        assert_eq!(load_type, LoadType::SearchResult);
        assert_eq!(args.last().map(String::as_str), Some("scsearch5:night drive"));
    }

    #[tokio::test]
    async fn test_blank_query_is_empty() {
        let resolver = YtDlpResolver::new("yt-dlp-no-existe", 5);
        let resolution = resolver.resolve("   ").await.unwrap();
        assert_eq!(resolution.load_type, LoadType::Empty);
        assert!(resolution.tracks.is_empty());
    }
}
