//! In-memory collaborators for exercising the playback core in tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use crate::audio::{
    announce::{AnnouncementHandle, Announcer},
    player::{JoinRequest, Player, PlayerEvent, SignalSender, VoiceGateway},
    track::{NowPlaying, TrackDescriptor, TrackInfo},
};

type PlayerMap = Mutex<HashMap<GuildId, Arc<FakePlayer>>>;

/// Track de prueba: el título es el payload en mayúsculas
pub fn track(payload: &str) -> TrackDescriptor {
    TrackDescriptor::new(payload, TrackInfo::new(payload.to_uppercase()))
}

pub struct FakeGateway {
    players: Arc<PlayerMap>,
    ready: AtomicBool,
    connects: AtomicUsize,
    fail_connect: AtomicBool,
    fail_leave: AtomicBool,
    leaves: Mutex<Vec<GuildId>>,
    joins: Mutex<Vec<JoinRequest>>,
    failing_payloads: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            players: Arc::new(Mutex::new(HashMap::new())),
            ready: AtomicBool::new(true),
            connects: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            fail_leave: AtomicBool::new(false),
            leaves: Mutex::new(Vec::new()),
            joins: Mutex::new(Vec::new()),
            failing_payloads: Mutex::new(Vec::new()),
        })
    }

    /// Registra un Player sin pasar por `connect`
    pub fn install(&self, guild_id: GuildId) -> Arc<FakePlayer> {
        let (signals, _) = SignalSender::channel();
        self.spawn_player(guild_id, signals)
    }

    fn spawn_player(&self, guild_id: GuildId, signals: SignalSender) -> Arc<FakePlayer> {
        let player = Arc::new(FakePlayer {
            guild_id,
            players: Arc::downgrade(&self.players),
            signals,
            started: Mutex::new(Vec::new()),
            failing: Mutex::new(self.failing_payloads.lock().clone()),
            paused: AtomicBool::new(false),
            volume: Mutex::new(None),
            stops: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            fail_disconnect: AtomicBool::new(false),
            start_delay: Mutex::new(None),
            position: Mutex::new(Duration::ZERO),
            position_step: Mutex::new(None),
        });
        self.players.lock().insert(guild_id, player.clone());
        player
    }

    pub fn player_for(&self, guild_id: GuildId) -> Option<Arc<FakePlayer>> {
        self.players.lock().get(&guild_id).cloned()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn leaves(&self) -> Vec<GuildId> {
        self.leaves.lock().clone()
    }

    /// Peticiones recibidas por `connect`, en orden
    pub fn joins(&self) -> Vec<JoinRequest> {
        self.joins.lock().clone()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn fail_leave(&self) {
        self.fail_leave.store(true, Ordering::SeqCst);
    }

    /// Los Players creados después fallarán al iniciar este payload
    pub fn fail_payload_on_connect(&self, payload: &str) {
        self.failing_payloads.lock().push(payload.to_string());
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn player(&self, guild_id: GuildId) -> Option<Arc<dyn Player>> {
        self.player_for(guild_id).map(|p| p as Arc<dyn Player>)
    }

    async fn connect(&self, request: JoinRequest, signals: SignalSender) -> Result<Arc<dyn Player>> {
        if self.fail_connect.load(Ordering::SeqCst) {
            bail!("canal lleno");
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.joins.lock().push(request);
        Ok(self.spawn_player(request.guild_id, signals))
    }

    async fn leave(&self, guild_id: GuildId) -> Result<()> {
        if self.fail_leave.load(Ordering::SeqCst) {
            bail!("gateway sin conexión");
        }
        self.leaves.lock().push(guild_id);
        self.players.lock().remove(&guild_id);
        Ok(())
    }
}

pub struct FakePlayer {
    guild_id: GuildId,
    players: Weak<PlayerMap>,
    signals: SignalSender,
    started: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
    paused: AtomicBool,
    volume: Mutex<Option<u8>>,
    stops: AtomicUsize,
    disconnects: AtomicUsize,
    fail_disconnect: AtomicBool,
    start_delay: Mutex<Option<Duration>>,
    position: Mutex<Duration>,
    position_step: Mutex<Option<Duration>>,
}

impl FakePlayer {
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> Option<u8> {
        *self.volume.lock()
    }

    pub fn fail_payload(&self, payload: &str) {
        self.failing.lock().push(payload.to_string());
    }

    pub fn fail_disconnect(&self) {
        self.fail_disconnect.store(true, Ordering::SeqCst);
    }

    pub fn delay_start(&self, delay: Duration) {
        *self.start_delay.lock() = Some(delay);
    }

    pub fn set_paused_flag(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Cada lectura de posición avanza `step`
    pub fn advance_position_on_read(&self, step: Duration) {
        *self.position_step.lock() = Some(step);
    }

    pub fn emit(&self, event: PlayerEvent) {
        self.signals.emit(self.guild_id, event);
    }
}

#[async_trait]
impl Player for FakePlayer {
    async fn start(&self, payload: &str) -> Result<()> {
        let delay = *self.start_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().iter().any(|p| p == payload) {
            bail!("no se pudo decodificar {}", payload);
        }
        self.started.lock().push(payload.to_string());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> Result<()> {
        self.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        *self.volume.lock() = Some(volume);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.fail_disconnect.load(Ordering::SeqCst) {
            bail!("la conexión ya estaba cerrada");
        }
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if let Some(players) = self.players.upgrade() {
            players.lock().remove(&self.guild_id);
        }
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn position(&self) -> Option<Duration> {
        let step = (*self.position_step.lock())?;
        let mut position = self.position.lock();
        *position += step;
        Some(*position)
    }
}

/// Announcer que guarda lo publicado y lo retirado
pub struct RecordingAnnouncer {
    posted: Mutex<Vec<String>>,
    targets: Mutex<Vec<ChannelId>>,
    retracted: Mutex<Vec<AnnouncementHandle>>,
    fail_posts: AtomicBool,
    next_id: AtomicU64,
}

impl RecordingAnnouncer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            posted: Mutex::new(Vec::new()),
            targets: Mutex::new(Vec::new()),
            retracted: Mutex::new(Vec::new()),
            fail_posts: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().clone()
    }

    /// Canales donde se publicó cada anuncio
    pub fn targets(&self) -> Vec<ChannelId> {
        self.targets.lock().clone()
    }

    pub fn retracted(&self) -> Vec<AnnouncementHandle> {
        self.retracted.lock().clone()
    }

    pub fn fail_posts(&self) {
        self.fail_posts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(
        &self,
        _guild_id: GuildId,
        target: ChannelId,
        now_playing: &NowPlaying,
    ) -> Result<AnnouncementHandle> {
        if self.fail_posts.load(Ordering::SeqCst) {
            bail!("sin permisos para escribir");
        }
        self.posted.lock().push(now_playing.label.clone());
        self.targets.lock().push(target);
        Ok(AnnouncementHandle {
            channel_id: target,
            message_id: MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
        })
    }

    async fn retract(&self, handle: &AnnouncementHandle) -> Result<()> {
        self.retracted.lock().push(*handle);
        Ok(())
    }
}
