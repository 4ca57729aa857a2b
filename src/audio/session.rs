use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::debug;

use crate::audio::{
    announce::AnnouncementHandle,
    timer::ScheduledTask,
    track::{NowPlaying, TrackDescriptor},
};

/// Estado mutable de la sesión de una guild
#[derive(Debug, Default)]
pub struct GuildSession {
    /// Tracks pendientes en orden de reproducción
    pub queue: VecDeque<TrackDescriptor>,
    pub now_playing: Option<NowPlaying>,
    pub announce_target: Option<ChannelId>,
    pub last_announcement: Option<AnnouncementHandle>,
    pub idle_timer: Option<ScheduledTask>,
}

impl GuildSession {
    /// Hay algo sonando o esperando en la cola
    pub fn is_busy(&self) -> bool {
        self.now_playing.is_some() || !self.queue.is_empty()
    }

    pub fn cancel_idle(&mut self) {
        // descartar la tarea la cancela
        self.idle_timer = None;
    }

    /// Vacía cola, now playing y destino de anuncios; cancela el timer.
    ///
    /// Devuelve el último anuncio para que el llamador lo retire.
    pub fn reset(&mut self) -> Option<AnnouncementHandle> {
        self.queue.clear();
        self.now_playing = None;
        self.announce_target = None;
        self.cancel_idle();
        self.last_announcement.take()
    }
}

/// Sesión de una guild compartida entre comandos, señales y timers.
///
/// El estado vive tras un mutex síncrono que nunca se mantiene a través de
/// un `.await`; la serialización de `advance` y del join usa mutex async.
#[derive(Debug)]
pub struct SessionHandle {
    guild_id: GuildId,
    state: Mutex<GuildSession>,
    advancing: AsyncMutex<()>,
    join_lock: AsyncMutex<()>,
}

impl SessionHandle {
    fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            state: Mutex::new(GuildSession::default()),
            advancing: AsyncMutex::new(()),
            join_lock: AsyncMutex::new(()),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut GuildSession) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Guard de reentrada: `None` si ya hay un `advance` en curso
    pub fn try_begin_advance(&self) -> Option<AsyncMutexGuard<'_, ()>> {
        self.advancing.try_lock().ok()
    }

    pub async fn lock_join(&self) -> AsyncMutexGuard<'_, ()> {
        self.join_lock.lock().await
    }
}

/// Registro de sesiones por guild: creación perezosa, desalojo explícito.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<SessionHandle> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Nueva sesión para guild {}", guild_id);
                Arc::new(SessionHandle::new(guild_id))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(&guild_id).map(|entry| entry.clone())
    }

    /// Elimina la sesión y cancela su timer de inactividad
    pub fn evict(&self, guild_id: GuildId) -> Option<Arc<SessionHandle>> {
        let (_, session) = self.sessions.remove(&guild_id)?;
        session.with_state(GuildSession::cancel_idle);
        debug!("🗑️ Sesión eliminada para guild {}", guild_id);
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::TrackInfo;
    use serenity::model::id::MessageId;

    #[test]
    fn test_lazy_creation_returns_same_session() {
        let registry = SessionRegistry::new();
        let guild_id = GuildId::new(1);

        assert!(registry.get(guild_id).is_none());
        let a = registry.get_or_create(guild_id);
        let b = registry.get_or_create(guild_id);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        assert!(registry.evict(guild_id).is_some());
        assert!(registry.is_empty());
        assert!(registry.evict(guild_id).is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = GuildSession::default();
        session
            .queue
            .push_back(TrackDescriptor::new("a", TrackInfo::new("A")));
        session.now_playing = Some(NowPlaying::from(&TrackInfo::new("B")));
        session.announce_target = Some(ChannelId::new(3));
        session.last_announcement = Some(AnnouncementHandle {
            channel_id: ChannelId::new(3),
            message_id: MessageId::new(4),
        });
        assert!(session.is_busy());

        let last = session.reset();
        assert!(last.is_some());
        assert!(!session.is_busy());
        assert!(session.announce_target.is_none());
        assert!(session.last_announcement.is_none());
    }

    #[tokio::test]
    async fn test_advance_guard_is_exclusive() {
        let registry = SessionRegistry::new();
        let session = registry.get_or_create(GuildId::new(9));

        let guard = session.try_begin_advance();
        assert!(guard.is_some());
        assert!(session.try_begin_advance().is_none());

        drop(guard);
        assert!(session.try_begin_advance().is_some());
    }
}
