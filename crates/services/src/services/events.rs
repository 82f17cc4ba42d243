use std::time::Duration;

use db::{
    DBService,
    entities::event_outbox,
    events::{
        AttachmentEventPayload, CategoryEventPayload, CommentEventPayload,
        EVENT_ATTACHMENT_DELETED, EVENT_ATTACHMENT_UPLOADED, EVENT_CATEGORY_CREATED,
        EVENT_CATEGORY_DELETED, EVENT_CATEGORY_UPDATED, EVENT_COMMENT_ADDED,
        EVENT_COMMENT_DELETED, EVENT_COMMENT_UPDATED, EVENT_TODO_CREATED, EVENT_TODO_DELETED,
        EVENT_TODO_UPDATED, TodoEventPayload,
    },
    models::event_outbox::EventOutbox,
    retry::retry_on_busy,
};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[path = "events/types.rs"]
pub mod types;

pub use types::EventError;

use super::config::WorkerConfig;

const OUTBOX_BATCH_LIMIT: u64 = 100;

/// Target of the structured log records emitted for domain events.
pub const DOMAIN_EVENT_TARGET: &str = "domain_event";

/// Publishes committed outbox rows as structured log records.
#[derive(Clone)]
pub struct EventService {
    db: DBService,
    poll_interval: Duration,
    max_attempts: i32,
}

fn parse<P: DeserializeOwned>(entry: &event_outbox::Model) -> Result<P, EventError> {
    Ok(serde_json::from_value(entry.payload.clone())?)
}

impl EventService {
    pub fn new(db: DBService, workers: &WorkerConfig) -> Self {
        Self {
            db,
            poll_interval: workers.outbox_poll_interval(),
            max_attempts: workers.outbox_max_attempts,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_outbox_loop(shutdown).await;
        })
    }

    async fn run_outbox_loop(&self, shutdown: CancellationToken) {
        loop {
            if let Err(err) = self.flush_pending().await {
                tracing::error!(error = %err, "event outbox flush failed");
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        // Publish whatever committed before shutdown.
        if let Err(err) = self.flush_pending().await {
            tracing::warn!(error = %err, "final event outbox flush failed");
        }
        tracing::debug!("event outbox publisher stopped");
    }

    /// Publishes one batch of pending events and returns how many went out.
    pub async fn flush_pending(&self) -> Result<usize, EventError> {
        let pool = &self.db.pool;
        let entries = retry_on_busy(|| {
            EventOutbox::fetch_unpublished(pool, self.max_attempts, OUTBOX_BATCH_LIMIT)
        })
        .await?;

        let mut published = 0;
        for entry in entries {
            match self.dispatch_entry(&entry) {
                Ok(()) => {
                    retry_on_busy(|| EventOutbox::mark_published(pool, entry.id)).await?;
                    published += 1;
                }
                Err(err) => {
                    let err_msg = err.to_string();
                    tracing::warn!(event_id = %entry.uuid, error = %err_msg, "event dispatch failed");
                    retry_on_busy(|| EventOutbox::mark_failed(pool, entry.id, &err_msg)).await?;
                }
            }
        }

        Ok(published)
    }

    fn dispatch_entry(&self, entry: &event_outbox::Model) -> Result<(), EventError> {
        let event = entry.event_type.as_str();
        let entity_id = entry.entity_uuid;
        let owner_id = entry.owner_id.as_str();

        match event {
            EVENT_TODO_CREATED | EVENT_TODO_UPDATED | EVENT_TODO_DELETED => {
                let payload: TodoEventPayload = parse(entry)?;
                let category_id = payload
                    .category_id
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                tracing::info!(
                    target: DOMAIN_EVENT_TARGET,
                    event,
                    entity_type = entry.entity_type.as_str(),
                    entity_id = %entity_id,
                    owner_id,
                    title = payload.title.as_str(),
                    category_id = category_id.as_str(),
                    priority = %payload.priority,
                    status = %payload.status,
                    "domain event"
                );
            }
            EVENT_CATEGORY_CREATED | EVENT_CATEGORY_UPDATED | EVENT_CATEGORY_DELETED => {
                let payload: CategoryEventPayload = parse(entry)?;
                tracing::info!(
                    target: DOMAIN_EVENT_TARGET,
                    event,
                    entity_type = entry.entity_type.as_str(),
                    entity_id = %entity_id,
                    owner_id,
                    name = payload.name.as_str(),
                    "domain event"
                );
            }
            EVENT_COMMENT_ADDED | EVENT_COMMENT_UPDATED | EVENT_COMMENT_DELETED => {
                let payload: CommentEventPayload = parse(entry)?;
                tracing::info!(
                    target: DOMAIN_EVENT_TARGET,
                    event,
                    entity_type = entry.entity_type.as_str(),
                    entity_id = %entity_id,
                    owner_id,
                    todo_id = %payload.todo_id,
                    "domain event"
                );
            }
            EVENT_ATTACHMENT_UPLOADED | EVENT_ATTACHMENT_DELETED => {
                let payload: AttachmentEventPayload = parse(entry)?;
                tracing::info!(
                    target: DOMAIN_EVENT_TARGET,
                    event,
                    entity_type = entry.entity_type.as_str(),
                    entity_id = %entity_id,
                    owner_id,
                    todo_id = %payload.todo_id,
                    name = payload.name.as_str(),
                    file_size = payload.file_size,
                    "domain event"
                );
            }
            other => return Err(EventError::UnknownEventType(other.to_string())),
        }

        Ok(())
    }
}
