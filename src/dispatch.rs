//! Routes each inbound event to the relay or the stage engine.
//!
//! Group-chat traffic only matters when the admin sends a relay request.
//! Everything else is a participant event: the participant's record is
//! loaded (or created on first contact), commands are applied or the stage
//! engine decides, the record is saved, and only then are messages sent.
//! The whole sequence runs under a per-identifier lock.

use std::sync::Arc;

use futures::StreamExt;

use crate::admin::{self, Command, PROMOTION_REPLY, RelayRequest};
use crate::channels::{Channel, EventStream, InboundEvent, Messenger, Outbound};
use crate::config::QuestConfig;
use crate::error::{Result, StoreError};
use crate::quest::{ParticipantRecord, QuestScript, Role, StageEngine};
use crate::store::{FileStore, KeyedLocks, ParticipantStore};

/// Routes inbound events and owns the per-participant locks.
pub struct Dispatcher {
    config: Arc<QuestConfig>,
    store: Arc<dyn ParticipantStore>,
    messenger: Arc<dyn Messenger>,
    engine: StageEngine,
    locks: KeyedLocks,
}

impl Dispatcher {
    pub fn new(
        config: Arc<QuestConfig>,
        store: Arc<dyn ParticipantStore>,
        messenger: Arc<dyn Messenger>,
        engine: StageEngine,
    ) -> Self {
        Self {
            config,
            store,
            messenger,
            engine,
            locks: KeyedLocks::new(),
        }
    }

    /// Build a dispatcher over a `FileStore` at the configured path, using
    /// the configured quest script or the built-in one.
    pub async fn from_config(
        config: Arc<QuestConfig>,
        messenger: Arc<dyn Messenger>,
    ) -> Result<Self> {
        let script = match &config.script_path {
            Some(path) => QuestScript::load(path)?,
            None => QuestScript::default(),
        };
        let engine = StageEngine::new(script, config.group_chat, config.audio_asset.clone())?;

        let store = FileStore::new(config.storage_path.clone());
        store.ensure_dir().await.map_err(|source| StoreError::Io {
            key: config.storage_path.display().to_string(),
            source,
        })?;

        Ok(Self::new(config, Arc::new(store), messenger, engine))
    }

    pub fn engine(&self) -> &StageEngine {
        &self.engine
    }

    /// Check the channel is reachable, then handle its events until the
    /// stream ends.
    pub async fn serve(self: Arc<Self>, channel: &dyn Channel) -> Result<()> {
        channel.health_check().await?;
        let events = channel.start().await?;
        tracing::info!(channel = channel.name(), "Quest bot started");
        self.run(events).await;
        Ok(())
    }

    /// Consume events until the stream ends, one task per event.
    pub async fn run(self: Arc<Self>, mut events: EventStream) {
        while let Some(event) = events.next().await {
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                let sender = event.sender.clone();
                if let Err(e) = dispatcher.handle(event).await {
                    tracing::warn!(identifier = %sender, error = %e, "Event dropped");
                }
            });
        }
        tracing::info!("Event stream ended");
    }

    /// Handle one inbound event to completion.
    pub async fn handle(&self, event: InboundEvent) -> Result<()> {
        if event.chat == self.config.group_chat {
            return self.handle_group(event).await;
        }
        self.handle_participant(event).await
    }

    async fn handle_group(&self, event: InboundEvent) -> Result<()> {
        if event.sender != self.config.admin_identifier {
            return Ok(());
        }
        let Some(request) = event.text.as_deref().and_then(RelayRequest::parse) else {
            return Ok(());
        };

        let outbound = admin::relay(self.store.as_ref(), &request, self.config.group_chat).await?;
        tracing::info!(target_identifier = %request.target, chat_id = outbound.chat, "Relay resolved");
        self.deliver(&[outbound]).await;
        Ok(())
    }

    async fn handle_participant(&self, event: InboundEvent) -> Result<()> {
        let _guard = self.locks.lock(&event.sender).await;

        let loaded = self.store.load(&event.sender).await?;
        let first_contact = loaded.is_none();
        let record = loaded
            .unwrap_or_else(|| ParticipantRecord::new(event.sender.clone(), event.sender_chat));

        let command = event
            .text
            .as_deref()
            .and_then(|text| Command::parse(text, &self.config.admin_secret));

        let mut broadcast = false;
        let mut advanced = false;
        let (next, effects) = match command {
            Some(Command::Start) if first_contact => {
                let effects = self.engine.opening(&record);
                (record.clone(), effects)
            }
            Some(Command::Start) => (record.clone(), Vec::new()),
            Some(Command::Promote) => {
                let mut next = record.clone();
                next.role = Role::Operator;
                tracing::info!(identifier = %record.identifier, "Participant promoted to operator");
                let reply = Outbound::text(record.channel_id, PROMOTION_REPLY);
                (next, vec![reply])
            }
            Some(Command::Dump) if record.is_operator() => {
                (record.clone(), vec![admin::dump(&record)])
            }
            Some(Command::Check) if record.is_operator() => {
                broadcast = true;
                (record.clone(), Vec::new())
            }
            Some(Command::Dump | Command::Check) => (record.clone(), Vec::new()),
            Some(Command::Reset) => {
                self.store.remove(&record.identifier).await?;
                tracing::info!(identifier = %record.identifier, "Participant reset");
                return Ok(());
            }
            None => {
                let mut effects: Vec<Outbound> =
                    admin::attachment_echo(&event, &self.config.admin_identifier)
                        .into_iter()
                        .collect();
                let decision = self.engine.step(&record, &event);
                advanced = decision.advanced;
                effects.extend(decision.effects);
                (decision.record, effects)
            }
        };

        if first_contact || next != record {
            self.store.save(&next).await?;
        }

        tracing::info!(
            identifier = %next.identifier,
            stage = next.stage,
            advanced,
            command = event.text_or_empty(),
            "Event handled"
        );

        self.deliver(&effects).await;

        if broadcast {
            let report = admin::broadcast_summaries(
                self.store.as_ref(),
                self.messenger.as_ref(),
                next.channel_id,
            )
            .await;
            tracing::info!(
                listed = report.listed,
                unreadable = report.unreadable,
                "Participant summary sent"
            );
        }

        Ok(())
    }

    /// Send messages in order. Failures are logged and skipped.
    async fn deliver(&self, effects: &[Outbound]) {
        for msg in effects {
            if let Err(e) = self.messenger.deliver(msg).await {
                tracing::warn!(chat_id = msg.chat, error = %e, "Delivery failed");
            }
        }
    }
}
