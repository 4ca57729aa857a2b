use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        announce::Announcer,
        error::{MusicError, MusicResult},
        idle::IdleMonitor,
        player::{JoinRequest, Player, PlayerEvent, PlayerSignal, SignalSender, VoiceGateway},
        selection::{PendingSelection, SelectionBroker, SelectionChoice},
        sequencer::{AdvanceOutcome, Sequencer},
        session::{GuildSession, SessionRegistry},
        track::{NowPlaying, TrackDescriptor, TrackInfo},
    },
    sources::{query::looks_like_url, LoadType, ResolvedTrack, Resolver},
};

/// Parámetros del núcleo de reproducción derivados de la configuración
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicSettings {
    pub auto_leave: Duration,
    pub idle_probe: Duration,
    pub selection_ttl: Duration,
    pub max_choices: usize,
    pub deafen: bool,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            auto_leave: Duration::from_millis(120_000),
            idle_probe: Duration::from_millis(1_500),
            selection_ttl: Duration::from_millis(60_000),
            max_choices: 5,
            deafen: true,
        }
    }
}

/// Petición de reproducción tal como llega del front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub shard_id: u32,
    pub query: String,
    pub announce_target: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// La cola estaba libre y el track empezó a sonar
    Started { info: TrackInfo, display: String },
    /// Añadido detrás de lo que ya suena; `position` es 1-based
    Queued {
        info: TrackInfo,
        display: String,
        position: usize,
    },
    /// Búsqueda ambigua: el usuario debe elegir antes de `ttl`
    NeedsSelection {
        token: String,
        ttl: Duration,
        choices: Vec<SelectionChoice>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipOutcome {
    /// Descripción del siguiente track, si lo había
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub now_playing: Option<String>,
    pub items: Vec<String>,
}

/// Fachada del sistema de colas por guild.
///
/// Todas las operaciones públicas devuelven `MusicResult`; ninguna propaga
/// errores sin clasificar. Las señales de los Players llegan por el canal
/// devuelto en [`MusicService::new`] y se procesan con
/// [`MusicService::run_signal_loop`].
#[derive(Clone)]
pub struct MusicService {
    registry: Arc<SessionRegistry>,
    gateway: Arc<dyn VoiceGateway>,
    resolver: Arc<dyn Resolver>,
    sequencer: Sequencer,
    idle: IdleMonitor,
    selections: SelectionBroker,
    signals: SignalSender,
    settings: MusicSettings,
}

impl MusicService {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        resolver: Arc<dyn Resolver>,
        announcer: Arc<dyn Announcer>,
        settings: MusicSettings,
    ) -> (Self, UnboundedReceiver<PlayerSignal>) {
        let registry = Arc::new(SessionRegistry::new());
        let idle = IdleMonitor::new(
            registry.clone(),
            gateway.clone(),
            settings.auto_leave,
            settings.idle_probe,
        );
        let sequencer = Sequencer::new(registry.clone(), gateway.clone(), announcer, idle.clone());
        let (signals, rx) = SignalSender::channel();

        let service = Self {
            registry,
            gateway,
            resolver,
            sequencer,
            idle,
            selections: SelectionBroker::new(settings.selection_ttl),
            signals,
            settings,
        };

        (service, rx)
    }

    pub fn settings(&self) -> &MusicSettings {
        &self.settings
    }

    pub fn is_ready(&self) -> bool {
        self.gateway.is_ready()
    }

    /// Une el bot al canal o reutiliza el Player existente de la guild
    pub async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        shard_id: u32,
        deaf: bool,
    ) -> MusicResult<Arc<dyn Player>> {
        if !self.gateway.is_ready() {
            error!("❌ Sin backend de voz disponible para guild {}", guild_id);
            return Err(MusicError::JoinFailed(anyhow::anyhow!(
                "no hay backend de voz disponible"
            )));
        }

        let session = self.registry.get_or_create(guild_id);
        self.idle.cancel(&session);

        let _join = session.lock_join().await;
        if let Some(player) = self.gateway.player(guild_id) {
            return Ok(player);
        }

        let request = JoinRequest {
            guild_id,
            channel_id,
            shard_id,
            deaf,
        };

        match self.gateway.connect(request, self.signals.clone()).await {
            Ok(player) => {
                info!("🔊 Conectado al canal {} en guild {}", channel_id, guild_id);
                Ok(player)
            }
            Err(e) => {
                error!(
                    "❌ Error al unirse al canal {} en guild {}: {:?}",
                    channel_id, guild_id, e
                );
                Err(MusicError::JoinFailed(e))
            }
        }
    }

    /// Resuelve la consulta y reproduce, encola o pide desambiguación
    pub async fn play(&self, request: PlayRequest) -> MusicResult<PlayOutcome> {
        let PlayRequest {
            guild_id,
            channel_id,
            shard_id,
            query,
            announce_target,
        } = request;
        let deaf = self.settings.deafen;

        self.join(guild_id, channel_id, shard_id, deaf).await?;

        let resolution = self.resolver.resolve(&query).await.map_err(|e| {
            error!("❌ Error resolviendo '{}' en guild {}: {:?}", query, guild_id, e);
            MusicError::ResolveFailed(e)
        })?;

        let Some(first) = resolution.tracks.first() else {
            info!("🔍 Sin resultados para '{}' ({:?})", query, resolution.load_type);
            return Err(MusicError::NoTracks {
                load_type: resolution.load_type,
                source_name: resolution.source,
            });
        };

        if resolution.load_type == LoadType::SearchResult && !looks_like_url(&query) {
            let candidates: Vec<TrackDescriptor> = resolution
                .tracks
                .iter()
                .take(self.settings.max_choices)
                .filter_map(ResolvedTrack::playable)
                .collect();

            if candidates.len() > 1 {
                let pending = PendingSelection {
                    guild_id,
                    channel_id,
                    shard_id,
                    deaf,
                    announce_target,
                    candidates,
                };
                let choices = pending.choices();
                let token = self.selections.register(pending);

                return Ok(PlayOutcome::NeedsSelection {
                    token,
                    ttl: self.selections.ttl(),
                    choices,
                });
            }
        }

        let track = first.playable().ok_or_else(|| MusicError::NoEncoded {
            info: first.info.clone(),
        })?;

        self.enqueue(guild_id, track, announce_target).await
    }

    /// Completa una selección pendiente con el índice elegido
    pub async fn complete_selection(
        &self,
        token: &str,
        guild_id: GuildId,
        index: usize,
    ) -> MusicResult<PlayOutcome> {
        let pending = self
            .selections
            .take(token)
            .ok_or(MusicError::SelectionExpired)?;

        if pending.guild_id != guild_id {
            warn!(
                "⚠️ Selección {} de guild {} usada desde guild {}",
                token, pending.guild_id, guild_id
            );
            return Err(MusicError::WrongGuild);
        }

        let track = pending
            .candidates
            .get(index)
            .cloned()
            .ok_or(MusicError::InvalidSelection(index))?;

        self.join(guild_id, pending.channel_id, pending.shard_id, pending.deaf)
            .await?;

        self.enqueue(guild_id, track, pending.announce_target).await
    }

    async fn enqueue(
        &self,
        guild_id: GuildId,
        track: TrackDescriptor,
        announce_target: Option<ChannelId>,
    ) -> MusicResult<PlayOutcome> {
        let session = self.registry.get_or_create(guild_id);
        let info = track.info().clone();
        let display_text = track.describe();

        let queued_at = session.with_state(|s| {
            if announce_target.is_some() {
                s.announce_target = announce_target;
            }
            let busy = s.is_busy();
            s.queue.push_back(track);
            busy.then_some(s.queue.len())
        });

        if let Some(position) = queued_at {
            info!("➕ Encolado en guild {} (posición {}): {}", guild_id, position, display_text);
            return Ok(PlayOutcome::Queued {
                info,
                display: display_text,
                position,
            });
        }

        match self.sequencer.advance(guild_id).await {
            AdvanceOutcome::Started(_) | AdvanceOutcome::Busy => {
                Ok(PlayOutcome::Started { info, display: display_text })
            }
            AdvanceOutcome::Finished {
                last_error: Some(e),
            } => Err(MusicError::PlayFailed(e)),
            AdvanceOutcome::Finished { last_error: None } | AdvanceOutcome::PlayerMissing => {
                Err(MusicError::PlayFailed(anyhow::anyhow!(
                    "la conexión de voz se perdió antes de reproducir"
                )))
            }
        }
    }

    pub async fn skip(&self, guild_id: GuildId) -> MusicResult<SkipOutcome> {
        let player = self.require_player(guild_id)?;

        let next = self
            .registry
            .get(guild_id)
            .and_then(|s| s.with_state(|s| s.queue.front().map(TrackDescriptor::describe)));

        if let Err(e) = player.stop().await {
            warn!("⚠️ stop falló al saltar en guild {}: {:?}", guild_id, e);
        }

        // la señal de fin no siempre llega tras un stop manual
        self.sequencer.advance(guild_id).await;

        info!("⏭️ Track saltado en guild {}", guild_id);
        Ok(SkipOutcome { next })
    }

    pub async fn pause(&self, guild_id: GuildId) -> MusicResult<()> {
        let player = self.require_player(guild_id)?;
        if player.is_paused() {
            return Err(MusicError::AlreadyPaused);
        }

        player.set_paused(true).await.map_err(MusicError::PlayFailed)?;
        info!("⏸️ Reproducción pausada en guild {}", guild_id);
        Ok(())
    }

    pub async fn resume(&self, guild_id: GuildId) -> MusicResult<()> {
        let player = self.require_player(guild_id)?;
        if !player.is_paused() {
            return Err(MusicError::NotPaused);
        }

        player.set_paused(false).await.map_err(MusicError::PlayFailed)?;
        info!("▶️ Reproducción reanudada en guild {}", guild_id);
        Ok(())
    }

    /// Vacía la sesión y detiene el Player sin salir del canal
    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<()> {
        let player = self.require_player(guild_id)?;
        let session = self.registry.get_or_create(guild_id);

        let last = session.with_state(GuildSession::reset);
        self.sequencer.retract(last).await;

        if let Err(e) = player.stop().await {
            warn!("⚠️ stop falló en guild {}: {:?}", guild_id, e);
        }

        self.idle.arm(&session);
        info!("⏹️ Reproducción detenida en guild {}", guild_id);
        Ok(())
    }

    /// Vacía la sesión, libera la conexión de voz y desaloja la guild
    pub async fn leave(&self, guild_id: GuildId) -> MusicResult<()> {
        let player = self.require_player(guild_id)?;

        if let Some(session) = self.registry.get(guild_id) {
            let last = session.with_state(GuildSession::reset);
            self.sequencer.retract(last).await;
        }

        let released = match player.disconnect().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("⚠️ disconnect falló en guild {}, probando gateway: {:?}", guild_id, e);
                self.gateway.leave(guild_id).await
            }
        };

        self.registry.evict(guild_id);

        match released {
            Ok(()) => {
                info!("👋 Desconectado de guild {}", guild_id);
                Ok(())
            }
            Err(e) => {
                error!("❌ No se pudo liberar la voz en guild {}: {:?}", guild_id, e);
                Err(MusicError::NoDisconnectMethod)
            }
        }
    }

    /// Sincroniza la sesión con el estado de voz del propio bot.
    ///
    /// `None` significa que el bot salió o fue expulsado de la voz: la sesión
    /// se descarta aunque el Player ya no exista.
    pub async fn handle_bot_voice_update(&self, guild_id: GuildId, channel_id: Option<ChannelId>) {
        match channel_id {
            Some(channel_id) => {
                debug!("🔀 Bot en el canal {} de guild {}", channel_id, guild_id);
            }
            None => {
                info!("🔌 Bot fuera de la voz en guild {}, descartando sesión", guild_id);
                self.discard_session(guild_id).await;
            }
        }
    }

    /// Vacía y desaloja la sesión sin exigir un Player
    pub async fn discard_session(&self, guild_id: GuildId) {
        if let Some(session) = self.registry.get(guild_id) {
            let last = session.with_state(GuildSession::reset);
            self.sequencer.retract(last).await;
        }

        if let Some(player) = self.gateway.player(guild_id) {
            if let Err(e) = player.disconnect().await {
                warn!("⚠️ disconnect falló en guild {}, probando gateway: {:?}", guild_id, e);
                if let Err(e) = self.gateway.leave(guild_id).await {
                    warn!("⚠️ No se pudo liberar la voz en guild {}: {:?}", guild_id, e);
                }
            }
        }

        self.registry.evict(guild_id);
    }

    /// Arma el auto-leave cuando no quedan oyentes en el canal del bot.
    ///
    /// Devuelve `false` si la guild no tiene Player. La verificación al
    /// dispararse sigue respetando las sesiones ocupadas.
    pub fn maybe_schedule_auto_leave(&self, guild_id: GuildId) -> bool {
        if self.gateway.player(guild_id).is_none() {
            return false;
        }

        let session = self.registry.get_or_create(guild_id);
        info!("🙈 Sin oyentes en guild {}", guild_id);
        self.idle.arm(&session);
        true
    }

    /// Valida y aplica el volumen (0-100)
    pub async fn set_volume(&self, guild_id: GuildId, volume: f64) -> MusicResult<u8> {
        let player = self.require_player(guild_id)?;

        if !volume.is_finite() || volume.fract() != 0.0 {
            return Err(MusicError::InvalidVolume);
        }
        if !(0.0..=100.0).contains(&volume) {
            return Err(MusicError::OutOfRange(volume));
        }

        let volume = volume as u8;
        player.set_volume(volume).await.map_err(MusicError::PlayFailed)?;
        info!("🔊 Volumen de guild {} ajustado a {}%", guild_id, volume);
        Ok(volume)
    }

    pub fn now_playing(&self, guild_id: GuildId) -> MusicResult<Option<NowPlaying>> {
        self.require_player(guild_id)?;
        Ok(self
            .registry
            .get(guild_id)
            .and_then(|s| s.with_state(|s| s.now_playing.clone())))
    }

    pub fn queue_snapshot(&self, guild_id: GuildId) -> MusicResult<QueueSnapshot> {
        self.require_player(guild_id)?;

        let snapshot = self.registry.get(guild_id).map(|session| {
            session.with_state(|s| QueueSnapshot {
                now_playing: s.now_playing.as_ref().map(|np| np.label.clone()),
                items: s.queue.iter().map(TrackDescriptor::describe).collect(),
            })
        });

        Ok(snapshot.unwrap_or_default())
    }

    /// Reacciona a una señal asíncrona de un Player
    pub async fn handle_player_event(&self, signal: PlayerSignal) {
        let PlayerSignal { guild_id, event } = signal;

        match event {
            PlayerEvent::Ended => debug!("Track terminado en guild {}", guild_id),
            PlayerEvent::Stuck => warn!("⚠️ Track atascado en guild {}", guild_id),
            PlayerEvent::Errored => warn!("⚠️ Error de reproducción en guild {}", guild_id),
        }

        self.sequencer.advance(guild_id).await;
    }

    /// Consume señales hasta que se cierre el canal; un `advance` por señal
    pub async fn run_signal_loop(self, mut signals: UnboundedReceiver<PlayerSignal>) {
        while let Some(signal) = signals.recv().await {
            let service = self.clone();
            tokio::spawn(async move {
                service.handle_player_event(signal).await;
            });
        }
        debug!("Canal de señales cerrado");
    }

    fn require_player(&self, guild_id: GuildId) -> MusicResult<Arc<dyn Player>> {
        self.gateway.player(guild_id).ok_or(MusicError::NoPlayer)
    }
}
