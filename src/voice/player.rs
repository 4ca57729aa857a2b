use anyhow::{anyhow, bail, Context as _, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::{async_trait, model::id::GuildId};
use songbird::{
    input::{Input, YoutubeDl},
    tracks::{PlayMode, TrackHandle},
    Call, Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler, Songbird,
    TrackEvent,
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::audio::player::{Player, PlayerEvent, SignalSender};

type StartReply = Mutex<Option<oneshot::Sender<Result<(), String>>>>;

/// Player de una guild sobre un `Call` de songbird.
///
/// Solo el track actual puede emitir señales: los tracks detenidos o
/// reemplazados se descartan para que un skip no avance la cola dos veces.
pub struct SongbirdPlayer {
    guild_id: GuildId,
    call: Arc<AsyncMutex<Call>>,
    manager: Arc<Songbird>,
    players: Arc<DashMap<GuildId, Arc<SongbirdPlayer>>>,
    http: reqwest::Client,
    signals: SignalSender,
    current: Arc<Mutex<Option<TrackHandle>>>,
    paused: AtomicBool,
    volume: AtomicU8,
    start_timeout: Duration,
}

impl SongbirdPlayer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        guild_id: GuildId,
        call: Arc<AsyncMutex<Call>>,
        manager: Arc<Songbird>,
        players: Arc<DashMap<GuildId, Arc<SongbirdPlayer>>>,
        http: reqwest::Client,
        signals: SignalSender,
        volume: u8,
        start_timeout: Duration,
    ) -> Self {
        Self {
            guild_id,
            call,
            manager,
            players,
            http,
            signals,
            current: Arc::new(Mutex::new(None)),
            paused: AtomicBool::new(false),
            volume: AtomicU8::new(volume.min(100)),
            start_timeout,
        }
    }

    fn gain(&self) -> f32 {
        f32::from(self.volume.load(Ordering::SeqCst)) / 100.0
    }

    /// Quita el track actual solo si sigue siendo `handle`
    fn clear_current(&self, handle: &TrackHandle) {
        let mut current = self.current.lock();
        if current.as_ref().map(TrackHandle::uuid) == Some(handle.uuid()) {
            *current = None;
        }
    }

    fn current(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }

    fn detach(&self) {
        self.players
            .remove_if(&self.guild_id, |_, p| std::ptr::eq(Arc::as_ptr(p), self));
    }
}

#[async_trait]
impl Player for SongbirdPlayer {
    async fn start(&self, payload: &str) -> Result<()> {
        let previous = self.current.lock().take();
        if let Some(previous) = previous {
            let _ = previous.stop();
        }

        let input: Input = YoutubeDl::new(self.http.clone(), payload.to_string()).into();
        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };
        let _ = handle.set_volume(self.gain());

        let (tx, rx) = oneshot::channel();
        let reply: Arc<StartReply> = Arc::new(Mutex::new(Some(tx)));
        let playable = Arc::new(AtomicBool::new(false));

        for event in [TrackEvent::Playable, TrackEvent::Error] {
            handle
                .add_event(
                    VoiceEvent::Track(event),
                    StartWatcher {
                        reply: reply.clone(),
                        playable: playable.clone(),
                    },
                )
                .map_err(|e| anyhow!("Error al agregar event handler: {}", e))?;
        }

        for (event, signal) in [
            (TrackEvent::End, PlayerEvent::Ended),
            (TrackEvent::Error, PlayerEvent::Errored),
        ] {
            handle
                .add_event(
                    VoiceEvent::Track(event),
                    TrackSignalForwarder {
                        guild_id: self.guild_id,
                        current: self.current.clone(),
                        playable: playable.clone(),
                        signals: self.signals.clone(),
                        signal,
                    },
                )
                .map_err(|e| anyhow!("Error al agregar event handler: {}", e))?;
        }

        *self.current.lock() = Some(handle.clone());
        self.paused.store(false, Ordering::SeqCst);

        match tokio::time::timeout(self.start_timeout, rx).await {
            Ok(Ok(Ok(()))) => {
                debug!("▶️ Track listo en guild {}", self.guild_id);
                Ok(())
            }
            Ok(Ok(Err(reason))) => {
                self.clear_current(&handle);
                bail!("el track no pudo iniciar: {}", reason)
            }
            Ok(Err(_)) => {
                self.clear_current(&handle);
                bail!("el track se descartó antes de iniciar")
            }
            Err(_) => {
                self.clear_current(&handle);
                let _ = handle.stop();
                bail!(
                    "el track no inició en {}",
                    humantime::format_duration(self.start_timeout)
                )
            }
        }
    }

    async fn stop(&self) -> Result<()> {
        // soltar el actual antes de parar para que su End no se reenvíe
        let current = self.current.lock().take();
        if let Some(handle) = current {
            handle
                .stop()
                .map_err(|e| anyhow!("Error al detener track: {}", e))?;
        }
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> Result<()> {
        if let Some(handle) = self.current() {
            let result = if paused { handle.pause() } else { handle.play() };
            result.map_err(|e| anyhow!("Error al cambiar pausa: {}", e))?;
        }
        self.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        self.volume.store(volume.min(100), Ordering::SeqCst);
        if let Some(handle) = self.current() {
            handle
                .set_volume(self.gain())
                .map_err(|e| anyhow!("Error al ajustar volumen: {}", e))?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let current = self.current.lock().take();
        if let Some(handle) = current {
            let _ = handle.stop();
        }

        self.detach();
        self.manager
            .remove(self.guild_id)
            .await
            .with_context(|| format!("no se pudo salir de la voz en guild {}", self.guild_id))?;

        info!("👋 Player desconectado en guild {}", self.guild_id);
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn position(&self) -> Option<Duration> {
        let handle = self.current()?;
        match handle.get_info().await {
            Ok(state) => Some(state.position),
            Err(e) => {
                debug!("Sin posición para guild {}: {}", self.guild_id, e);
                None
            }
        }
    }
}

/// Responde a `start` cuando el track queda listo o falla al prepararse
struct StartWatcher {
    reply: Arc<StartReply>,
    playable: Arc<AtomicBool>,
}

#[async_trait]
impl VoiceEventHandler for StartWatcher {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        let Some(tx) = self.reply.lock().take() else {
            return Some(VoiceEvent::Cancel);
        };

        let outcome = match ctx {
            EventContext::Track(tracks) => match tracks.first().map(|(state, _)| &state.playing) {
                Some(PlayMode::Errored(e)) => Err(e.to_string()),
                Some(PlayMode::End) | Some(PlayMode::Stop) => Err("track finalizado".to_string()),
                _ => Ok(()),
            },
            _ => Ok(()),
        };

        if outcome.is_ok() {
            self.playable.store(true, Ordering::SeqCst);
        }
        let _ = tx.send(outcome);

        Some(VoiceEvent::Cancel)
    }
}

/// Reenvía End/Error del track actual como señal del Player
struct TrackSignalForwarder {
    guild_id: GuildId,
    current: Arc<Mutex<Option<TrackHandle>>>,
    playable: Arc<AtomicBool>,
    signals: SignalSender,
    signal: PlayerEvent,
}

#[async_trait]
impl VoiceEventHandler for TrackSignalForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        let EventContext::Track(tracks) = ctx else {
            return None;
        };

        // los fallos previos a Playable ya los reporta `start`
        if !self.playable.load(Ordering::SeqCst) {
            return Some(VoiceEvent::Cancel);
        }

        for (state, handle) in tracks.iter() {
            let is_current = {
                let mut current = self.current.lock();
                let matches = current.as_ref().map(TrackHandle::uuid) == Some(handle.uuid());
                if matches {
                    *current = None;
                }
                matches
            };

            if !is_current {
                debug!("Evento de track reemplazado ignorado en guild {}", self.guild_id);
                continue;
            }

            match self.signal {
                PlayerEvent::Errored => {
                    error!("❌ Error en track para guild {}: {:?}", self.guild_id, state.playing)
                }
                _ => debug!("🎵 Track terminó en guild {}", self.guild_id),
            }
            self.signals.emit(self.guild_id, self.signal);
        }

        Some(VoiceEvent::Cancel)
    }
}

/// Elimina el Player cuando el driver pierde la conexión
pub(crate) struct DisconnectWatcher {
    pub guild_id: GuildId,
    pub players: Arc<DashMap<GuildId, Arc<SongbirdPlayer>>>,
    pub player: std::sync::Weak<SongbirdPlayer>,
}

#[async_trait]
impl VoiceEventHandler for DisconnectWatcher {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        if let EventContext::DriverDisconnect(data) = ctx {
            warn!(
                "🔌 Driver de voz desconectado en guild {}: {:?}",
                self.guild_id, data.reason
            );
        }

        let target = self.player.as_ptr();
        if self
            .players
            .remove_if(&self.guild_id, |_, p| std::ptr::eq(Arc::as_ptr(p), target))
            .is_some()
        {
            info!("🗑️ Player eliminado tras desconexión en guild {}", self.guild_id);
        }

        if self.player.strong_count() == 0 {
            return Some(VoiceEvent::Cancel);
        }
        None
    }
}
