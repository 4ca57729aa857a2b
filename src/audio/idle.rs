use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::audio::{
    player::{Player, VoiceGateway},
    session::{SessionHandle, SessionRegistry},
    timer::ScheduledTask,
};

/// Desconecta las guilds que se quedan sin actividad.
///
/// Se arma al terminar la cola o tras `stop`, y se cancela en cuanto vuelve
/// a haber reproducción. Al dispararse vuelve a verificar que la guild siga
/// inactiva antes de liberar la conexión.
#[derive(Clone)]
pub struct IdleMonitor {
    registry: Arc<SessionRegistry>,
    gateway: Arc<dyn VoiceGateway>,
    delay: Duration,
    probe_window: Duration,
}

impl IdleMonitor {
    pub fn new(
        registry: Arc<SessionRegistry>,
        gateway: Arc<dyn VoiceGateway>,
        delay: Duration,
        probe_window: Duration,
    ) -> Self {
        Self {
            registry,
            gateway,
            delay,
            probe_window,
        }
    }

    pub fn arm(&self, session: &Arc<SessionHandle>) {
        self.arm_after(session, self.delay);
    }

    /// Programa la verificación; reemplaza (y cancela) el timer anterior
    pub fn arm_after(&self, session: &Arc<SessionHandle>, delay: Duration) {
        let monitor = self.clone();
        let target = session.clone();

        let task = ScheduledTask::after(delay, move |token| async move {
            monitor.fire(target, token).await;
        });

        session.with_state(|s| s.idle_timer = Some(task));
        info!(
            "⏲️ Auto-leave programado para guild {} en {}",
            session.guild_id(),
            humantime::format_duration(delay)
        );
    }

    pub fn cancel(&self, session: &SessionHandle) {
        session.with_state(|s| s.cancel_idle());
    }

    async fn fire(&self, session: Arc<SessionHandle>, token: CancellationToken) {
        let guild_id = session.guild_id();

        if session.with_state(|s| s.is_busy()) {
            debug!("Guild {} activa de nuevo, se omite auto-leave", guild_id);
            return;
        }

        let Some(player) = self.gateway.player(guild_id) else {
            info!("👋 Player ya no existe en guild {}, saliendo igualmente", guild_id);
            session.with_state(|s| s.reset());
            if let Err(e) = self.gateway.leave(guild_id).await {
                warn!("⚠️ No se pudo abandonar la voz en guild {}: {:?}", guild_id, e);
            }
            self.registry.evict(guild_id);
            return;
        };

        // pausado cuenta como inactivo
        if !player.is_paused() {
            let before = player.position().await;

            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(self.probe_window) => {}
            }

            let after = player.position().await;
            if is_advancing(before, after) {
                debug!(
                    "🎶 La posición sigue avanzando en guild {}, se re-arma el timer",
                    guild_id
                );
                self.arm(&session);
                return;
            }
        }

        let idle = session.with_state(|s| {
            if token.is_cancelled() || s.is_busy() {
                return false;
            }
            s.reset();
            true
        });

        if !idle {
            debug!("Guild {} reanudó durante la verificación de inactividad", guild_id);
            return;
        }

        info!("👋 Saliendo del canal de voz inactivo en guild {}", guild_id);
        self.release(guild_id, player.as_ref()).await;
        self.registry.evict(guild_id);
    }

    async fn release(&self, guild_id: GuildId, player: &dyn Player) {
        if let Err(e) = player.disconnect().await {
            warn!("⚠️ disconnect falló en guild {}: {:?}", guild_id, e);
            if let Err(e) = self.gateway.leave(guild_id).await {
                error!("❌ No se pudo liberar la voz en guild {}: {:?}", guild_id, e);
            }
        }
    }
}

fn is_advancing(before: Option<Duration>, after: Option<Duration>) -> bool {
    matches!((before, after), (Some(before), Some(after)) if after > before)
}
