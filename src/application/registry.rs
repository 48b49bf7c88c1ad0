//! Process-wide session registry.
//!
//! Sessions are keyed by the channel hosting them. Starting a session
//! creates a fresh channel through the factory; stopping one ends the
//! session and schedules the channel for delayed deletion, so players get
//! a last look at the result.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::application::events::{EventBus, SessionEvent};
use crate::application::session::PugSession;
use crate::domain::{Participant, RegistryError, SessionConfig};
use crate::infra::channel::{ChannelFactory, ChannelId, InteractionChannel, MessageContent};
use crate::infra::store::SettingsStore;

pub struct SessionRegistry {
    sessions: Mutex<Vec<Arc<PugSession>>>,
    factory: Arc<dyn ChannelFactory>,
    store: Arc<dyn SettingsStore>,
    config: SessionConfig,
    events: EventBus,
    counter: AtomicUsize,
    cancel: tokio_util::sync::CancellationToken,
}

impl SessionRegistry {
    pub fn new(
        factory: Arc<dyn ChannelFactory>,
        store: Arc<dyn SettingsStore>,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(Vec::new()),
            factory,
            store,
            config,
            events: EventBus::default(),
            counter: AtomicUsize::new(0),
            cancel: tokio_util::sync::CancellationToken::new(),
        })
    }

    /// Lifecycle events from every session this registry starts.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// The session hosted in `channel`, if one is still live.
    pub fn get(&self, channel: &ChannelId) -> Option<Arc<PugSession>> {
        let mut sessions = self.sessions.lock();
        sessions.retain(|s| !s.is_ended());
        sessions.iter().find(|s| s.id() == *channel).cloned()
    }

    /// Creates a channel and starts a session in it, with `owner` as the
    /// first queue member. The owner then answers the setup menus in the
    /// background; a session whose settings are still unset simply queues
    /// players until setup completes.
    pub async fn start_session(
        &self,
        owner: Participant,
    ) -> Result<Arc<PugSession>, RegistryError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("pug-{n}");
        let channel = self.factory.create_channel(&name).await?;
        let session = PugSession::new(
            channel.clone(),
            owner.clone(),
            self.config.clone(),
            self.events.clone(),
        );
        self.sessions.lock().push(session.clone());
        self.events.emit(SessionEvent::SessionStarted {
            session: session.id(),
            owner: owner.clone(),
        });
        log::debug!("PUG started in {} by {}", session.id(), owner.name);
        if let Err(err) = channel
            .post_message(MessageContent::text(format!(
                "A PUG has been started here by {}, type `pug join` in this channel to join it.",
                owner.mention()
            )))
            .await
        {
            log::warn!("welcome delivery failed in {}: {err}", session.id());
        }
        if let Err(err) = session.add_member(owner).await {
            log::warn!("owner could not join their own PUG: {err}");
        }
        {
            let session = session.clone();
            let store = self.store.clone();
            tokio::spawn(async move {
                let result = tokio::select! {
                    _ = session.cancelled() => return,
                    result = session.run_initial_setup(store.as_ref()) => result,
                };
                if let Err(err) = result {
                    log::warn!("initial setup failed in {}: {err}", session.id());
                }
            });
        }
        Ok(session)
    }

    /// Ends the session in `channel` and schedules its channel for
    /// deletion after the configured grace period.
    pub async fn end_session(&self, channel: &ChannelId) -> Result<(), RegistryError> {
        let session = self
            .get(channel)
            .ok_or_else(|| RegistryError::NoSession(channel.to_string()))?;
        session.end().await;
        self.sessions.lock().retain(|s| s.id() != *channel);
        let factory = self.factory.clone();
        let id = channel.clone();
        let delay = self.config.channel_delete_delay;
        let cancel = self.cancel.clone();
        log::debug!("scheduling deletion of {id} in {delay:?}");
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Err(err) = factory.delete_channel(&id).await {
                        log::warn!("failed to delete {id}: {err}");
                    }
                }
            }
        });
        Ok(())
    }

    /// Reacts to a channel disappearing underneath a session: the session
    /// ends, and no deletion is scheduled for the already-gone channel.
    pub async fn handle_channel_deleted(&self, channel: &ChannelId) {
        let session = self.get(channel);
        if let Some(session) = session {
            log::debug!("channel {channel} deleted, ending its PUG");
            session.end().await;
            self.sessions.lock().retain(|s| s.id() != *channel);
        }
    }

    /// Ends every session and cancels pending channel deletions. Used on
    /// shutdown.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<PugSession>> = self.sessions.lock().drain(..).collect();
        for session in sessions {
            session.end().await;
        }
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory_channel::MemoryHub;
    use crate::infra::store::MemoryStore;

    fn player(id: u64) -> Participant {
        Participant::new(id, format!("player-{id}"))
    }

    fn registry() -> (Arc<SessionRegistry>, Arc<MemoryHub>) {
        let hub = MemoryHub::new();
        let registry = SessionRegistry::new(
            hub.clone(),
            Arc::new(MemoryStore::new()),
            SessionConfig::default(),
        );
        (registry, hub)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_session_queues_owner() {
        let (registry, hub) = registry();
        let session = registry.start_session(player(1)).await.unwrap();
        assert_eq!(session.queue_len(), 1);
        assert!(session.is_queued(&player(1)));
        assert!(hub.get(&session.id()).is_some());
        assert_eq!(registry.active_count(), 1);
        assert!(registry.get(&session.id()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_session_schedules_channel_deletion() {
        let (registry, hub) = registry();
        let session = registry.start_session(player(1)).await.unwrap();
        let id = session.id();
        registry.end_session(&id).await.unwrap();
        assert!(session.is_ended());
        assert!(registry.get(&id).is_none());
        // Deletion happens only after the grace period.
        assert!(hub.get(&id).is_some());
        tokio::time::sleep(SessionConfig::default().channel_delete_delay * 2).await;
        assert!(hub.get(&id).is_none());
        assert_eq!(hub.deleted_channels(), vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_session_requires_a_session() {
        let (registry, _hub) = registry();
        assert!(matches!(
            registry.end_session(&ChannelId("nowhere".into())).await,
            Err(RegistryError::NoSession(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_deletion_ends_session() {
        let (registry, hub) = registry();
        let session = registry.start_session(player(1)).await.unwrap();
        let id = session.id();
        hub.delete_channel(&id).await.unwrap();
        registry.handle_channel_deleted(&id).await;
        assert!(session.is_ended());
        assert_eq!(registry.active_count(), 0);
        // The channel was already gone; only the explicit delete is recorded.
        assert_eq!(hub.deleted_channels(), vec![id]);
    }
}
