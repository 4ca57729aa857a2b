use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::audio::{
    announce::{AnnouncementHandle, Announcer},
    idle::IdleMonitor,
    player::VoiceGateway,
    session::{SessionHandle, SessionRegistry},
    track::NowPlaying,
};

/// Resultado de una pasada de `advance`
#[derive(Debug)]
pub enum AdvanceOutcome {
    /// Otro `advance` ya estaba drenando la cola de esta guild
    Busy,
    Started(NowPlaying),
    /// Cola agotada: sesión terminada y auto-leave armado
    Finished {
        /// Último fallo al iniciar un track, si lo hubo
        last_error: Option<anyhow::Error>,
    },
    /// La conexión de voz desapareció con tracks aún en cola
    PlayerMissing,
}

/// Drena la cola de cada guild a través de su Player, una pasada a la vez.
#[derive(Clone)]
pub struct Sequencer {
    registry: Arc<SessionRegistry>,
    gateway: Arc<dyn VoiceGateway>,
    announcer: Arc<dyn Announcer>,
    idle: IdleMonitor,
}

impl Sequencer {
    pub fn new(
        registry: Arc<SessionRegistry>,
        gateway: Arc<dyn VoiceGateway>,
        announcer: Arc<dyn Announcer>,
        idle: IdleMonitor,
    ) -> Self {
        Self {
            registry,
            gateway,
            announcer,
            idle,
        }
    }

    /// Avanza la cola de la guild. No hace nada si ya hay otro avance en curso.
    ///
    /// Tras soltar el guard vuelve a comprobar si quedó algo encolado sin
    /// reproducir mientras estaba ocupado.
    pub async fn advance(&self, guild_id: GuildId) -> AdvanceOutcome {
        let session = self.registry.get_or_create(guild_id);
        let mut outcome = None;

        loop {
            let Some(guard) = session.try_begin_advance() else {
                debug!("advance ya en curso para guild {}", guild_id);
                break;
            };

            let drained = self.drain(&session).await;
            drop(guard);
            outcome.get_or_insert(drained);

            if !self.needs_advance(&session) {
                break;
            }
            debug!("🔁 Track encolado durante advance en guild {}, reintentando", guild_id);
        }

        outcome.unwrap_or(AdvanceOutcome::Busy)
    }

    fn needs_advance(&self, session: &SessionHandle) -> bool {
        let pending = session.with_state(|s| s.now_playing.is_none() && !s.queue.is_empty());
        pending && self.gateway.player(session.guild_id()).is_some()
    }

    async fn drain(&self, session: &Arc<SessionHandle>) -> AdvanceOutcome {
        let guild_id = session.guild_id();
        let mut last_error = None;

        loop {
            let Some(player) = self.gateway.player(guild_id) else {
                let empty = session.with_state(|s| {
                    s.now_playing = None;
                    s.queue.is_empty()
                });

                if empty {
                    self.finish(session).await;
                    return AdvanceOutcome::Finished { last_error };
                }

                warn!(
                    "⚠️ Player ausente al avanzar la cola de guild {}",
                    guild_id
                );
                return AdvanceOutcome::PlayerMissing;
            };

            let next = session.with_state(|s| {
                let track = s.queue.pop_front()?;
                let now_playing = NowPlaying::from(track.info());
                s.cancel_idle();
                s.now_playing = Some(now_playing.clone());
                Some((track, now_playing, s.announce_target))
            });

            let Some((track, now_playing, target)) = next else {
                self.finish(session).await;
                return AdvanceOutcome::Finished { last_error };
            };

            info!("🎵 Reproduciendo en guild {}: {}", guild_id, now_playing.label);

            if let Some(target) = target {
                self.announce(session, target, &now_playing).await;
            }

            match player.start(track.encoded()).await {
                Ok(()) => return AdvanceOutcome::Started(now_playing),
                Err(e) => {
                    error!(
                        "❌ No se pudo iniciar '{}' en guild {}, saltando: {:?}",
                        now_playing.label, guild_id, e
                    );

                    let empty = session.with_state(|s| {
                        s.now_playing = None;
                        s.queue.is_empty()
                    });
                    last_error = Some(e);

                    if empty {
                        self.finish(session).await;
                        return AdvanceOutcome::Finished { last_error };
                    }
                }
            }
        }
    }

    /// Cola terminada: limpia now playing y anuncios, y arma el auto-leave
    async fn finish(&self, session: &Arc<SessionHandle>) {
        let last = session.with_state(|s| {
            s.now_playing = None;
            s.announce_target = None;
            s.last_announcement.take()
        });

        self.retract(last).await;
        info!("🏁 Cola terminada en guild {}", session.guild_id());
        self.idle.arm(session);
    }

    async fn announce(&self, session: &SessionHandle, target: ChannelId, now_playing: &NowPlaying) {
        let previous = session.with_state(|s| s.last_announcement.take());
        self.retract(previous).await;

        match self
            .announcer
            .announce(session.guild_id(), target, now_playing)
            .await
        {
            Ok(handle) => session.with_state(|s| s.last_announcement = Some(handle)),
            Err(e) => warn!(
                "⚠️ No se pudo anunciar en canal {} (guild {}): {:?}",
                target,
                session.guild_id(),
                e
            ),
        }
    }

    /// Retira un anuncio; los fallos solo se registran
    pub async fn retract(&self, handle: Option<AnnouncementHandle>) {
        let Some(handle) = handle else {
            return;
        };

        if let Err(e) = self.announcer.retract(&handle).await {
            warn!(
                "⚠️ No se pudo borrar el anuncio {} en canal {}: {:?}",
                handle.message_id, handle.channel_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        testing::{track, FakeGateway, RecordingAnnouncer},
        track::TrackInfo,
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const GUILD: GuildId = GuildId::new(42);

    struct Fixture {
        registry: Arc<SessionRegistry>,
        gateway: Arc<FakeGateway>,
        announcer: Arc<RecordingAnnouncer>,
        sequencer: Sequencer,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(SessionRegistry::new());
        let gateway = FakeGateway::new();
        let announcer = RecordingAnnouncer::new();
        let idle = IdleMonitor::new(
            registry.clone(),
            gateway.clone(),
            Duration::from_secs(120),
            Duration::from_millis(1500),
        );
        let sequencer = Sequencer::new(registry.clone(), gateway.clone(), announcer.clone(), idle);

        Fixture {
            registry,
            gateway,
            announcer,
            sequencer,
        }
    }

    fn enqueue(fx: &Fixture, payloads: &[&str]) {
        let session = fx.registry.get_or_create(GUILD);
        session.with_state(|s| {
            for payload in payloads {
                s.queue.push_back(track(payload));
            }
        });
    }

    #[tokio::test]
    async fn test_empty_session_only_arms_idle() {
        let fx = fixture();
        fx.gateway.install(GUILD);

        let outcome = fx.sequencer.advance(GUILD).await;
        assert!(matches!(outcome, AdvanceOutcome::Finished { last_error: None }));

        let session = fx.registry.get_or_create(GUILD);
        assert!(session.with_state(|s| s.idle_timer.is_some()));
        assert!(fx.announcer.posted().is_empty());
    }

    #[tokio::test]
    async fn test_pops_head_and_announces() {
        let fx = fixture();
        let player = fx.gateway.install(GUILD);
        enqueue(&fx, &["t1", "t2"]);
        fx.registry
            .get_or_create(GUILD)
            .with_state(|s| s.announce_target = Some(ChannelId::new(5)));

        let outcome = fx.sequencer.advance(GUILD).await;
        assert!(matches!(outcome, AdvanceOutcome::Started(_)));
        assert_eq!(player.started(), vec!["t1".to_string()]);

        let session = fx.registry.get_or_create(GUILD);
        let (queued, now_playing, announced) = session.with_state(|s| {
            (s.queue.len(), s.now_playing.clone(), s.last_announcement.is_some())
        });
        assert_eq!(queued, 1);
        assert_eq!(now_playing.map(|np| np.label), Some("**T1**".to_string()));
        assert!(announced);
        assert_eq!(fx.announcer.posted(), vec!["**T1**".to_string()]);
    }

    #[tokio::test]
    async fn test_new_announcement_retracts_previous() {
        let fx = fixture();
        fx.gateway.install(GUILD);
        enqueue(&fx, &["t1", "t2"]);
        fx.registry
            .get_or_create(GUILD)
            .with_state(|s| s.announce_target = Some(ChannelId::new(5)));

        fx.sequencer.advance(GUILD).await;
        fx.sequencer.advance(GUILD).await;

        assert_eq!(fx.announcer.posted().len(), 2);
        assert_eq!(fx.announcer.retracted().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_start_skips_to_next() {
        let fx = fixture();
        let player = fx.gateway.install(GUILD);
        player.fail_payload("bad");
        enqueue(&fx, &["bad", "good"]);

        let outcome = fx.sequencer.advance(GUILD).await;
        assert!(matches!(outcome, AdvanceOutcome::Started(ref np) if np.label == "**GOOD**"));
        assert_eq!(player.started(), vec!["good".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_last_track_finishes() {
        let fx = fixture();
        let player = fx.gateway.install(GUILD);
        player.fail_payload("bad");
        enqueue(&fx, &["bad"]);

        let outcome = fx.sequencer.advance(GUILD).await;
        assert!(matches!(outcome, AdvanceOutcome::Finished { last_error: Some(_) }));

        let session = fx.registry.get_or_create(GUILD);
        assert!(session.with_state(|s| s.now_playing.is_none() && s.idle_timer.is_some()));
    }

    #[tokio::test]
    async fn test_missing_player_keeps_queue() {
        let fx = fixture();
        enqueue(&fx, &["t1"]);

        let outcome = fx.sequencer.advance(GUILD).await;
        assert!(matches!(outcome, AdvanceOutcome::PlayerMissing));
        assert_eq!(
            fx.registry.get_or_create(GUILD).with_state(|s| s.queue.len()),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_advances_pop_once() {
        let fx = fixture();
        let player = fx.gateway.install(GUILD);
        player.delay_start(Duration::from_millis(50));
        enqueue(&fx, &["t1", "t2"]);

        let a = fx.sequencer.clone();
        let b = fx.sequencer.clone();
        let (first, second) = tokio::join!(a.advance(GUILD), b.advance(GUILD));

        let started = [&first, &second]
            .iter()
            .filter(|o| matches!(o, AdvanceOutcome::Started(_)))
            .count();
        assert_eq!(started, 1);
        assert_eq!(player.started(), vec!["t1".to_string()]);
        assert_eq!(
            fx.registry.get_or_create(GUILD).with_state(|s| s.queue.len()),
            1
        );
    }

    #[tokio::test]
    async fn test_announcement_failure_is_not_fatal() {
        let fx = fixture();
        let player = fx.gateway.install(GUILD);
        fx.announcer.fail_posts();
        enqueue(&fx, &["t1"]);
        fx.registry
            .get_or_create(GUILD)
            .with_state(|s| s.announce_target = Some(ChannelId::new(5)));

        let outcome = fx.sequencer.advance(GUILD).await;
        assert!(matches!(outcome, AdvanceOutcome::Started(_)));
        assert_eq!(player.started(), vec!["t1".to_string()]);
    }

    #[test]
    fn test_track_helper_uses_uppercase_title() {
        assert_eq!(track("abc").info(), &TrackInfo::new("ABC"));
    }
}
