use serde::Serialize;
use thiserror::Error;

use crate::{audio::track::TrackInfo, sources::LoadType};

/// Códigos estables que el front-end usa para elegir el mensaje.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    JoinFailed,
    ResolveFailed,
    NoTracks,
    NoEncoded,
    PlayFailed,
    NoPlayer,
    AlreadyPaused,
    NotPaused,
    SelectionExpired,
    WrongGuild,
    InvalidSelection,
    InvalidVolume,
    OutOfRange,
    NoDisconnectMethod,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JoinFailed => "JOIN_FAILED",
            Self::ResolveFailed => "RESOLVE_FAILED",
            Self::NoTracks => "NO_TRACKS",
            Self::NoEncoded => "NO_ENCODED",
            Self::PlayFailed => "PLAY_FAILED",
            Self::NoPlayer => "NO_PLAYER",
            Self::AlreadyPaused => "ALREADY_PAUSED",
            Self::NotPaused => "NOT_PAUSED",
            Self::SelectionExpired => "SELECTION_EXPIRED",
            Self::WrongGuild => "WRONG_GUILD",
            Self::InvalidSelection => "INVALID_SELECTION",
            Self::InvalidVolume => "INVALID_VOLUME",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::NoDisconnectMethod => "NO_DISCONNECT_METHOD",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fallo de una operación pública del servicio de música.
///
/// Ninguna operación del núcleo entra en pánico ni propaga errores sin
/// clasificar: todo termina en una de estas variantes.
#[derive(Debug, Error)]
pub enum MusicError {
    #[error("no se pudo unir al canal de voz: {0:#}")]
    JoinFailed(#[source] anyhow::Error),

    #[error("no se pudo resolver la búsqueda: {0:#}")]
    ResolveFailed(#[source] anyhow::Error),

    #[error("no se encontraron tracks ({load_type:?}, fuente {source_name})")]
    NoTracks { load_type: LoadType, source_name: String },

    #[error("el track no tiene payload reproducible")]
    NoEncoded { info: TrackInfo },

    #[error("no se pudo iniciar la reproducción: {0:#}")]
    PlayFailed(#[source] anyhow::Error),

    #[error("no hay player activo en esta guild")]
    NoPlayer,

    #[error("la reproducción ya está pausada")]
    AlreadyPaused,

    #[error("la reproducción no está pausada")]
    NotPaused,

    #[error("la selección expiró o ya fue usada")]
    SelectionExpired,

    #[error("la selección pertenece a otra guild")]
    WrongGuild,

    #[error("índice de selección inválido: {0}")]
    InvalidSelection(usize),

    #[error("volumen inválido")]
    InvalidVolume,

    #[error("el volumen debe estar entre 0 y 100, recibido {0}")]
    OutOfRange(f64),

    #[error("no se pudo liberar la conexión de voz")]
    NoDisconnectMethod,
}

impl MusicError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::JoinFailed(_) => ErrorCode::JoinFailed,
            Self::ResolveFailed(_) => ErrorCode::ResolveFailed,
            Self::NoTracks { .. } => ErrorCode::NoTracks,
            Self::NoEncoded { .. } => ErrorCode::NoEncoded,
            Self::PlayFailed(_) => ErrorCode::PlayFailed,
            Self::NoPlayer => ErrorCode::NoPlayer,
            Self::AlreadyPaused => ErrorCode::AlreadyPaused,
            Self::NotPaused => ErrorCode::NotPaused,
            Self::SelectionExpired => ErrorCode::SelectionExpired,
            Self::WrongGuild => ErrorCode::WrongGuild,
            Self::InvalidSelection(_) => ErrorCode::InvalidSelection,
            Self::InvalidVolume => ErrorCode::InvalidVolume,
            Self::OutOfRange(_) => ErrorCode::OutOfRange,
            Self::NoDisconnectMethod => ErrorCode::NoDisconnectMethod,
        }
    }
}

pub type MusicResult<T> = std::result::Result<T, MusicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_as_wire_strings() {
        let json = serde_json::to_string(&ErrorCode::NoDisconnectMethod).unwrap();
        assert_eq!(json, "\"NO_DISCONNECT_METHOD\"");
        assert_eq!(
            serde_json::to_string(&ErrorCode::JoinFailed).unwrap(),
            format!("\"{}\"", ErrorCode::JoinFailed.as_str())
        );
    }

    #[test]
    fn test_error_maps_to_code() {
        let err = MusicError::JoinFailed(anyhow::anyhow!("canal lleno"));
        assert_eq!(err.code(), ErrorCode::JoinFailed);
        assert!(err.to_string().contains("canal lleno"));
        assert_eq!(MusicError::OutOfRange(150.0).code(), ErrorCode::OutOfRange);
    }
}
