//! In-process interaction channel.
//!
//! Used by the simulation binary and the integration tests as the fake
//! collaborator on the other side of the transport contract: it records
//! every posted message, broadcasts a prompt whenever the core starts
//! waiting on reactions, and accepts injected reactions and replies.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};

use crate::domain::{ChannelError, Participant};
use crate::infra::channel::{
    ChannelFactory, ChannelId, InteractionChannel, MessageContent, MessageHandle, Reaction, Symbol,
    TextReply,
};

/// Broadcast to scripted responders whenever a wait for reactions begins.
#[derive(Debug, Clone)]
pub struct ReactionPrompt {
    pub channel: ChannelId,
    pub handle: MessageHandle,
    pub participants: Vec<Participant>,
    pub symbols: Vec<Symbol>,
}

struct StoredMessage {
    handle: MessageHandle,
    content: MessageContent,
    posted_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Default)]
struct Inner {
    messages: Vec<StoredMessage>,
    pending: VecDeque<(MessageHandle, Reaction)>,
    replies: VecDeque<TextReply>,
    roles: Vec<(Participant, String)>,
}

pub struct MemoryChannel {
    id: ChannelId,
    inner: Mutex<Inner>,
    notify: Notify,
    prompts: broadcast::Sender<ReactionPrompt>,
    fail_edits: AtomicBool,
}

impl MemoryChannel {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let (prompts, _) = broadcast::channel(256);
        Self::with_prompt_sender(name, prompts)
    }

    /// Builds a channel that reports prompts on a shared sender, so a hub
    /// subscriber sees prompts from every channel it created.
    pub fn with_prompt_sender(
        name: impl Into<String>,
        prompts: broadcast::Sender<ReactionPrompt>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ChannelId(name.into()),
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            prompts,
            fail_edits: AtomicBool::new(false),
        })
    }

    pub fn subscribe_prompts(&self) -> broadcast::Receiver<ReactionPrompt> {
        self.prompts.subscribe()
    }

    /// Injects a reaction as if `participant` had clicked `symbol` on the
    /// message `handle`.
    pub fn push_reaction(&self, handle: MessageHandle, participant: Participant, symbol: Symbol) {
        self.inner.lock().pending.push_back((
            handle,
            Reaction {
                participant,
                symbol,
            },
        ));
        self.notify.notify_one();
    }

    pub fn push_text_reply(&self, participant: Participant, text: impl Into<String>) {
        self.inner.lock().replies.push_back(TextReply {
            participant,
            text: text.into(),
        });
        self.notify.notify_one();
    }

    /// Makes every subsequent `edit_message` fail, to exercise the
    /// plain-text fallback path.
    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn content_of(&self, handle: MessageHandle) -> Option<MessageContent> {
        self.inner
            .lock()
            .messages
            .iter()
            .find(|m| m.handle == handle)
            .map(|m| m.content.clone())
    }

    pub fn message_count(&self) -> usize {
        self.inner.lock().messages.len()
    }

    /// Plain-text rendering of every message, in post order, stamped with
    /// its post time.
    pub fn transcript(&self) -> Vec<String> {
        self.inner
            .lock()
            .messages
            .iter()
            .map(|m| {
                format!(
                    "[{}] {}",
                    m.posted_at.format("%H:%M:%S"),
                    m.content.plain_fallback()
                )
            })
            .collect()
    }

    pub fn roles_of(&self, participant: &Participant) -> Vec<String> {
        self.inner
            .lock()
            .roles
            .iter()
            .filter(|(p, _)| p == participant)
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn take_matching(
        &self,
        handle: MessageHandle,
        participants: &[Participant],
        symbols: &[Symbol],
    ) -> Option<Reaction> {
        let mut inner = self.inner.lock();
        let idx = inner.pending.iter().position(|(h, r)| {
            *h == handle && participants.contains(&r.participant) && symbols.contains(&r.symbol)
        })?;
        inner.pending.remove(idx).map(|(_, r)| r)
    }
}

#[async_trait]
impl InteractionChannel for MemoryChannel {
    fn id(&self) -> ChannelId {
        self.id.clone()
    }

    async fn post_message(&self, content: MessageContent) -> Result<MessageHandle, ChannelError> {
        let handle = MessageHandle::new();
        self.inner.lock().messages.push(StoredMessage {
            handle,
            content,
            posted_at: chrono::Utc::now(),
        });
        Ok(handle)
    }

    async fn edit_message(
        &self,
        handle: MessageHandle,
        content: MessageContent,
    ) -> Result<(), ChannelError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(ChannelError::Delivery("edit rejected".into()));
        }
        let mut inner = self.inner.lock();
        let slot = inner
            .messages
            .iter_mut()
            .find(|m| m.handle == handle)
            .ok_or(ChannelError::UnknownMessage)?;
        slot.content = content;
        Ok(())
    }

    async fn await_reaction(
        &self,
        handle: MessageHandle,
        participants: &[Participant],
        symbols: &[Symbol],
        timeout: Duration,
    ) -> Result<Option<Reaction>, ChannelError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let _ = self.prompts.send(ReactionPrompt {
            channel: self.id.clone(),
            handle,
            participants: participants.to_vec(),
            symbols: symbols.to_vec(),
        });
        loop {
            if let Some(reaction) = self.take_matching(handle, participants, symbols) {
                return Ok(Some(reaction));
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }

    async fn await_text_reply(
        &self,
        participants: &[Participant],
        timeout: Duration,
    ) -> Result<Option<TextReply>, ChannelError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(idx) = inner
                    .replies
                    .iter()
                    .position(|r| participants.contains(&r.participant))
                {
                    return Ok(inner.replies.remove(idx));
                }
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }

    async fn grant_role(
        &self,
        participant: &Participant,
        role: &str,
    ) -> Result<(), ChannelError> {
        self.inner
            .lock()
            .roles
            .push((participant.clone(), role.to_string()));
        Ok(())
    }

    async fn revoke_role(
        &self,
        participant: &Participant,
        role: &str,
    ) -> Result<(), ChannelError> {
        self.inner
            .lock()
            .roles
            .retain(|(p, r)| p != participant || r != role);
        Ok(())
    }
}

/// Factory for in-process channels, with a shared prompt stream.
pub struct MemoryHub {
    channels: Mutex<HashMap<ChannelId, Arc<MemoryChannel>>>,
    deleted: Mutex<Vec<ChannelId>>,
    prompts: broadcast::Sender<ReactionPrompt>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        let (prompts, _) = broadcast::channel(256);
        Arc::new(Self {
            channels: Mutex::new(HashMap::new()),
            deleted: Mutex::new(Vec::new()),
            prompts,
        })
    }

    /// Prompts from every channel this hub created.
    pub fn subscribe_prompts(&self) -> broadcast::Receiver<ReactionPrompt> {
        self.prompts.subscribe()
    }

    pub fn get(&self, id: &ChannelId) -> Option<Arc<MemoryChannel>> {
        self.channels.lock().get(id).cloned()
    }

    pub fn deleted_channels(&self) -> Vec<ChannelId> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl ChannelFactory for MemoryHub {
    async fn create_channel(
        &self,
        name: &str,
    ) -> Result<Arc<dyn InteractionChannel>, ChannelError> {
        let channel = MemoryChannel::with_prompt_sender(name, self.prompts.clone());
        self.channels
            .lock()
            .insert(channel.id.clone(), channel.clone());
        Ok(channel)
    }

    async fn delete_channel(&self, id: &ChannelId) -> Result<(), ChannelError> {
        self.channels.lock().remove(id);
        self.deleted.lock().push(id.clone());
        Ok(())
    }
}

/// Scripted responder that reacts to prompts on one channel: everyone not
/// marked AFK confirms ready checks, selectors pick their preferred option
/// when it is still open and the first open option otherwise.
pub struct AutoResponder {
    channel: Arc<MemoryChannel>,
    afk: Vec<Participant>,
    preferences: Vec<String>,
}

impl AutoResponder {
    pub fn new(channel: Arc<MemoryChannel>) -> Self {
        Self {
            channel,
            afk: Vec::new(),
            preferences: Vec::new(),
        }
    }

    /// Marks a participant as never confirming ready checks.
    pub fn afk(mut self, participant: Participant) -> Self {
        self.afk.push(participant);
        self
    }

    /// Adds a preferred option name, matched against open board options.
    pub fn prefer(mut self, option: impl Into<String>) -> Self {
        self.preferences.push(option.into());
        self
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        let mut rx = self.channel.subscribe_prompts();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(prompt) => self.respond(&prompt),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("auto responder lagged, skipped {skipped} prompts");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn respond(&self, prompt: &ReactionPrompt) {
        if prompt.symbols == [Symbol::TICK] {
            if let Some(p) = prompt.participants.iter().find(|p| !self.afk.contains(p)) {
                self.channel
                    .push_reaction(prompt.handle, p.clone(), Symbol::TICK);
            }
            return;
        }
        let Some(actor) = prompt.participants.first() else {
            return;
        };
        let symbol = self
            .preferred_symbol(prompt)
            .unwrap_or_else(|| prompt.symbols[0]);
        self.channel
            .push_reaction(prompt.handle, actor.clone(), symbol);
    }

    fn preferred_symbol(&self, prompt: &ReactionPrompt) -> Option<Symbol> {
        let content = self.channel.content_of(prompt.handle)?;
        let options = board_options(&content);
        self.preferences.iter().find_map(|pref| {
            options
                .iter()
                .find(|(sym, name)| name == pref && prompt.symbols.contains(sym))
                .map(|(sym, _)| *sym)
        })
    }
}

// Open board lines render as "<symbol> <option>".
fn board_options(content: &MessageContent) -> Vec<(Symbol, String)> {
    let Some(embed) = &content.embed else {
        return Vec::new();
    };
    embed
        .fields
        .iter()
        .flat_map(|field| field.value.lines())
        .filter_map(|line| {
            let mut chars = line.chars();
            let symbol = Symbol(chars.next()?);
            Some((symbol, chars.as_str().trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u64) -> Participant {
        Participant::new(id, format!("player-{id}"))
    }

    #[tokio::test]
    async fn test_reaction_round_trip() {
        let channel = MemoryChannel::new("test");
        let handle = channel
            .post_message(MessageContent::text("pick"))
            .await
            .unwrap();
        channel.push_reaction(handle, player(1), Symbol::TICK);
        let got = channel
            .await_reaction(
                handle,
                &[player(1)],
                &[Symbol::TICK],
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(got.unwrap().participant, player(1));
    }

    #[tokio::test]
    async fn test_reaction_filters_ineligible() {
        let channel = MemoryChannel::new("test");
        let handle = channel
            .post_message(MessageContent::text("pick"))
            .await
            .unwrap();
        channel.push_reaction(handle, player(2), Symbol::TICK);
        let got = channel
            .await_reaction(
                handle,
                &[player(1)],
                &[Symbol::TICK],
                Duration::from_millis(20),
            )
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaction_timeout_is_none() {
        let channel = MemoryChannel::new("test");
        let handle = channel
            .post_message(MessageContent::text("pick"))
            .await
            .unwrap();
        let got = channel
            .await_reaction(
                handle,
                &[player(1)],
                &[Symbol::TICK],
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_text_reply_round_trip() {
        let channel = MemoryChannel::new("test");
        channel.push_text_reply(player(1), "13 7");
        let got = channel
            .await_text_reply(&[player(1)], Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.participant, player(1));
        assert_eq!(got.text, "13 7");
    }

    #[tokio::test]
    async fn test_edit_failure_reported() {
        let channel = MemoryChannel::new("test");
        let handle = channel
            .post_message(MessageContent::text("hello"))
            .await
            .unwrap();
        channel.fail_edits(true);
        let err = channel
            .edit_message(handle, MessageContent::text("edited"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Delivery(_)));
    }

    #[tokio::test]
    async fn test_hub_creates_and_deletes() {
        let hub = MemoryHub::new();
        let channel = hub.create_channel("pug-1").await.unwrap();
        let id = channel.id();
        assert!(hub.get(&id).is_some());
        hub.delete_channel(&id).await.unwrap();
        assert!(hub.get(&id).is_none());
        assert_eq!(hub.deleted_channels(), vec![id]);
    }
}
