use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::debug;

/// Señales asíncronas que emite un Player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// El track terminó normalmente
    Ended,
    /// El stream dejó de avanzar
    Stuck,
    /// Error durante la reproducción
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSignal {
    pub guild_id: GuildId,
    pub event: PlayerEvent,
}

/// Extremo emisor del canal de señales hacia el servicio
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<PlayerSignal>,
}

impl SignalSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlayerSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, guild_id: GuildId, event: PlayerEvent) {
        if self.tx.send(PlayerSignal { guild_id, event }).is_err() {
            debug!("Señal {:?} descartada para guild {}: receptor cerrado", event, guild_id);
        }
    }
}

/// Parámetros para unirse a un canal de voz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub shard_id: u32,
    pub deaf: bool,
}

/// Capacidad de reproducción de una sesión de voz (una por guild).
///
/// Las señales `ended`/`stuck`/`errored` no pasan por aquí: el gateway las
/// publica en el [`SignalSender`] recibido en [`VoiceGateway::connect`].
#[async_trait]
pub trait Player: Send + Sync {
    /// Comienza a reproducir el payload; falla si el track no arranca
    async fn start(&self, payload: &str) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn set_paused(&self, paused: bool) -> Result<()>;

    /// Volumen 0..=100
    async fn set_volume(&self, volume: u8) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    fn is_paused(&self) -> bool;

    /// Posición aproximada del track actual, si el backend la expone
    async fn position(&self) -> Option<Duration>;
}

/// Backend de conexiones de voz: crea y localiza los Players por guild.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Falso si no hay backend de voz utilizable
    fn is_ready(&self) -> bool;

    fn player(&self, guild_id: GuildId) -> Option<Arc<dyn Player>>;

    /// Une el bot al canal y devuelve el Player de la guild
    async fn connect(&self, request: JoinRequest, signals: SignalSender) -> Result<Arc<dyn Player>>;

    /// Abandona la conexión de voz aunque no exista Player
    async fn leave(&self, guild_id: GuildId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signals_reach_receiver() {
        let (sender, mut rx) = SignalSender::channel();
        let guild_id = GuildId::new(7);

        sender.emit(guild_id, PlayerEvent::Stuck);

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.guild_id, guild_id);
        assert_eq!(signal.event, PlayerEvent::Stuck);
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (sender, rx) = SignalSender::channel();
        drop(rx);
        sender.emit(GuildId::new(1), PlayerEvent::Ended);
    }
}
