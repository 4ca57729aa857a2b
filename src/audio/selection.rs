use dashmap::DashMap;
use serde::Serialize;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::audio::{
    timer::ScheduledTask,
    track::{truncate, TrackDescriptor, CHOICE_TEXT_MAX},
};

/// Búsqueda ambigua a la espera de que el usuario elija un resultado
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelection {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub shard_id: u32,
    pub deaf: bool,
    pub announce_target: Option<ChannelId>,
    pub candidates: Vec<TrackDescriptor>,
}

impl PendingSelection {
    /// Opciones para el menú, con textos recortados
    pub fn choices(&self) -> Vec<SelectionChoice> {
        self.candidates
            .iter()
            .enumerate()
            .map(|(index, track)| {
                let info = track.info();
                let label = match (info.title.trim(), info.identifier.as_deref()) {
                    ("", Some(id)) if !id.is_empty() => id.to_string(),
                    ("", _) => format!("Resultado {}", index + 1),
                    (title, _) => title.to_string(),
                };

                SelectionChoice {
                    index,
                    label: truncate(&label, CHOICE_TEXT_MAX),
                    description: truncate(&track.describe(), CHOICE_TEXT_MAX),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionChoice {
    pub index: usize,
    pub label: String,
    pub description: String,
}

#[derive(Debug)]
struct Entry {
    selection: PendingSelection,
    expires_at: Instant,
    _expiry: ScheduledTask,
}

/// Almacén de selecciones pendientes indexadas por token de un solo uso.
///
/// Cada entrada caduca tras el TTL; `take` además comprueba la fecha de
/// expiración por si el timer aún no se ejecutó.
#[derive(Debug, Clone)]
pub struct SelectionBroker {
    entries: Arc<DashMap<String, Entry>>,
    ttl: Duration,
}

impl SelectionBroker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn register(&self, selection: PendingSelection) -> String {
        let token = Uuid::new_v4().to_string();
        let entries: Weak<DashMap<String, Entry>> = Arc::downgrade(&self.entries);
        let key = token.clone();

        let expiry = ScheduledTask::after(self.ttl, move |_| async move {
            if let Some(entries) = entries.upgrade() {
                if entries.remove(&key).is_some() {
                    debug!("⌛ Selección {} expirada", key);
                }
            }
        });

        debug!(
            "🔍 Selección {} registrada para guild {} ({} opciones)",
            token,
            selection.guild_id,
            selection.candidates.len()
        );

        self.entries.insert(
            token.clone(),
            Entry {
                selection,
                expires_at: Instant::now() + self.ttl,
                _expiry: expiry,
            },
        );

        token
    }

    /// Consume la selección. `None` si no existe o ya expiró.
    pub fn take(&self, token: &str) -> Option<PendingSelection> {
        let (_, entry) = self.entries.remove(token)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.selection)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{testing::track, track::TrackInfo};
    use pretty_assertions::assert_eq;

    fn pending(candidates: Vec<TrackDescriptor>) -> PendingSelection {
        PendingSelection {
            guild_id: GuildId::new(1),
            channel_id: ChannelId::new(2),
            shard_id: 0,
            deaf: true,
            announce_target: None,
            candidates,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_is_one_time() {
        let broker = SelectionBroker::new(Duration::from_secs(60));
        let token = broker.register(pending(vec![track("a"), track("b")]));

        assert_eq!(broker.len(), 1);
        assert!(broker.take(&token).is_some());
        assert!(broker.take(&token).is_none());
        assert!(broker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_ttl() {
        let broker = SelectionBroker::new(Duration::from_secs(60));
        let token = broker.register(pending(vec![track("a"), track("b")]));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(broker.is_empty());
        assert!(broker.take(&token).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_are_unique() {
        let broker = SelectionBroker::new(Duration::from_secs(60));
        let a = broker.register(pending(vec![track("a")]));
        let b = broker.register(pending(vec![track("a")]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_choices_are_truncated_and_labelled() {
        let long = TrackInfo::new("x".repeat(150)).with_author("y".repeat(150));
        let untitled = TrackInfo::new("").with_identifier("vid123");
        let anonymous = TrackInfo::default();

        let selection = pending(vec![
            TrackDescriptor::new("p1", long),
            TrackDescriptor::new("p2", untitled),
            TrackDescriptor::new("p3", anonymous),
        ]);
        let choices = selection.choices();

        assert_eq!(choices.len(), 3);
        assert_eq!(choices[0].label.chars().count(), CHOICE_TEXT_MAX);
        assert_eq!(choices[0].description.chars().count(), CHOICE_TEXT_MAX);
        assert_eq!(choices[1].label, "vid123");
        assert_eq!(choices[2].label, "Resultado 3");
        assert_eq!(choices[2].index, 2);
    }
}
