use anyhow::{anyhow, Result};
use dashmap::DashMap;
use serenity::{async_trait, model::id::GuildId};
use songbird::{error::JoinError, events::CoreEvent, Event as VoiceEvent, Songbird};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info, warn};

use super::player::{DisconnectWatcher, SongbirdPlayer};
use crate::audio::player::{JoinRequest, Player, SignalSender, VoiceGateway};

/// Gateway de voz sobre el manager de songbird; un [`SongbirdPlayer`] por guild.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    players: Arc<DashMap<GuildId, Arc<SongbirdPlayer>>>,
    http: reqwest::Client,
    ready: AtomicBool,
    default_volume: u8,
    start_timeout: Duration,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>, default_volume: u8, start_timeout: Duration) -> Self {
        Self {
            manager,
            players: Arc::new(DashMap::new()),
            http: reqwest::Client::new(),
            ready: AtomicBool::new(false),
            default_volume,
            start_timeout,
        }
    }

    /// Se llama desde el evento `ready` del cliente
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn active_players(&self) -> usize {
        self.players.len()
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn player(&self, guild_id: GuildId) -> Option<Arc<dyn Player>> {
        self.players
            .get(&guild_id)
            .map(|entry| entry.value().clone() as Arc<dyn Player>)
    }

    async fn connect(&self, request: JoinRequest, signals: SignalSender) -> Result<Arc<dyn Player>> {
        let JoinRequest {
            guild_id,
            channel_id,
            shard_id,
            deaf,
        } = request;
        debug!("🔊 Uniendo a canal {} (guild {}, shard {})", channel_id, guild_id, shard_id);

        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| anyhow!("Error al unirse al canal de voz: {}", e))?;

        let player = Arc::new(SongbirdPlayer::new(
            guild_id,
            call.clone(),
            self.manager.clone(),
            self.players.clone(),
            self.http.clone(),
            signals,
            self.default_volume,
            self.start_timeout,
        ));

        {
            let mut handler = call.lock().await;

            if deaf {
                if let Err(e) = handler.deafen(true).await {
                    warn!("⚠️ No se pudo ensordecer en guild {}: {}", guild_id, e);
                }
            }

            handler.add_global_event(
                VoiceEvent::Core(CoreEvent::DriverDisconnect),
                DisconnectWatcher {
                    guild_id,
                    players: self.players.clone(),
                    player: Arc::downgrade(&player),
                },
            );
        }

        self.players.insert(guild_id, player.clone());
        info!("✅ Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        Ok(player)
    }

    async fn leave(&self, guild_id: GuildId) -> Result<()> {
        if let Some((_, player)) = self.players.remove(&guild_id) {
            let _ = player.stop().await;
        }

        match self.manager.remove(guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => {
                info!("👋 Voz liberada en guild {}", guild_id);
                Ok(())
            }
            Err(e) => Err(anyhow!("Error al salir del canal de voz: {}", e)),
        }
    }
}
