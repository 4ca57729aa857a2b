//! # Sources Module
//!
//! Turns a free-text query or URL into candidate tracks.
//!
//! The playback core only depends on the [`Resolver`] trait and branches on
//! the [`LoadType`] plus the number of candidates; it never inspects query
//! syntax. Query normalisation per source lives in [`query`], and the
//! concrete yt-dlp backend in [`ytdlp`].

pub mod query;
pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::audio::track::{TrackDescriptor, TrackInfo};

pub use ytdlp::YtDlpResolver;

/// Cómo interpretó el backend la consulta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadType {
    /// La consulta apuntaba directamente a un track (URL)
    DirectHit,
    /// Lista de resultados de búsqueda, puede requerir desambiguación
    SearchResult,
    /// Consulta válida sin resultados
    Empty,
}

/// Candidato devuelto por el resolver; el payload puede faltar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub encoded: Option<String>,
    pub info: TrackInfo,
}

impl ResolvedTrack {
    pub fn new(encoded: impl Into<String>, info: TrackInfo) -> Self {
        Self {
            encoded: Some(encoded.into()),
            info,
        }
    }

    pub fn without_payload(info: TrackInfo) -> Self {
        Self { encoded: None, info }
    }

    /// Convierte en track reproducible si trae payload no vacío
    pub fn playable(&self) -> Option<TrackDescriptor> {
        self.encoded
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(|encoded| TrackDescriptor::new(encoded, self.info.clone()))
    }
}

/// Resultado de resolver una consulta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub load_type: LoadType,
    pub tracks: Vec<ResolvedTrack>,
    /// Fuente usada ("youtube", "soundcloud", ...), solo para diagnóstico
    pub source: String,
}

impl Resolution {
    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            load_type: LoadType::Empty,
            tracks: Vec::new(),
            source: source.into(),
        }
    }
}

/// Backend de búsqueda de audio
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Resolution>;
}
