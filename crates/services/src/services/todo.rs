use chrono::Utc;
use db::{
    DBService, TransactionTrait,
    models::{
        ownership::{self, EntityKind},
        pagination::PaginatedResponse,
        todo::{CreateTodo, PopulatedTodo, Todo, TodoStats, UpdateTodo},
        todo_query::TodoListQuery,
    },
};
use uuid::Uuid;

use super::{
    error::{Result, TodoServiceError},
    hierarchy,
};

/// Todo workflows. Every write runs in one transaction together with its
/// outbox events, so a failed step leaves nothing behind.
#[derive(Clone)]
pub struct TodoService {
    db: DBService,
    bucket: String,
}

impl TodoService {
    pub fn new(db: DBService, bucket: impl Into<String>) -> Self {
        Self {
            db,
            bucket: bucket.into(),
        }
    }

    #[tracing::instrument(name = "todo.create", skip_all, fields(owner_id = %owner_id))]
    pub async fn create_todo(&self, owner_id: &str, payload: CreateTodo) -> Result<Todo> {
        payload.validate()?;

        let txn = self.db.pool.begin().await?;
        let parent = match payload.parent_todo_id {
            Some(parent_id) => {
                let parent = ownership::resolve_parent_todo(&txn, parent_id, owner_id).await?;
                hierarchy::validate_new_child(&parent)?;
                Some(parent)
            }
            None => None,
        };
        let category = match payload.category_id {
            Some(category_id) => {
                Some(ownership::resolve_category(&txn, category_id, owner_id).await?)
            }
            None => None,
        };

        let todo = Todo::create(&txn, owner_id, &payload, parent.as_ref(), category.as_ref())
            .await?;
        txn.commit().await?;

        tracing::info!(
            todo_id = %todo.id,
            owner_id,
            parent_todo_id = ?todo.parent_todo_id,
            "todo created"
        );
        Ok(todo)
    }

    #[tracing::instrument(name = "todo.get", skip_all, fields(owner_id = %owner_id, todo_id = %id))]
    pub async fn get_todo(&self, owner_id: &str, id: Uuid) -> Result<PopulatedTodo> {
        Todo::find_populated(&self.db.pool, owner_id, id)
            .await?
            .ok_or(TodoServiceError::NotFound(EntityKind::Todo))
    }

    #[tracing::instrument(name = "todo.list", skip_all, fields(owner_id = %owner_id))]
    pub async fn list_todos(
        &self,
        owner_id: &str,
        query: TodoListQuery,
    ) -> Result<PaginatedResponse<PopulatedTodo>> {
        let filter = query.normalize()?;
        Ok(Todo::list(&self.db.pool, owner_id, &filter, Utc::now()).await?)
    }

    /// Patches a todo. Parent and category references are re-checked and the
    /// write is a compare-and-swap on `expected_version` (or the version just
    /// read). Any status may replace any other.
    #[tracing::instrument(name = "todo.update", skip_all, fields(owner_id = %owner_id, todo_id = %id))]
    pub async fn update_todo(
        &self,
        owner_id: &str,
        id: Uuid,
        payload: UpdateTodo,
    ) -> Result<Todo> {
        payload.validate()?;
        if let Some(parent_id) = payload.parent_todo_id {
            hierarchy::ensure_not_self(id, parent_id)?;
        }

        let txn = self.db.pool.begin().await?;
        let current = ownership::resolve_todo(&txn, id, owner_id).await?;

        let parent = match payload.parent_todo_id {
            Some(parent_id) => {
                let parent = ownership::resolve_parent_todo(&txn, parent_id, owner_id).await?;
                let has_children = Todo::has_children(&txn, &current).await?;
                hierarchy::validate_reparent(&current, &parent, has_children)?;
                Some(parent)
            }
            None => None,
        };
        let category = match payload.category_id {
            Some(category_id) => {
                Some(ownership::resolve_category(&txn, category_id, owner_id).await?)
            }
            None => None,
        };

        let expected_version = payload.expected_version.unwrap_or(current.version);
        let todo = Todo::update(
            &txn,
            &current,
            &payload,
            parent.as_ref(),
            category.as_ref(),
            expected_version,
        )
        .await?;
        txn.commit().await?;

        tracing::info!(
            todo_id = %todo.id,
            owner_id,
            status = %todo.status,
            version = todo.version,
            "todo updated"
        );
        Ok(todo)
    }

    /// Deletes a todo with its subtasks, comments and attachments. Attachment
    /// objects are queued for removal rather than deleted inline.
    #[tracing::instrument(name = "todo.delete", skip_all, fields(owner_id = %owner_id, todo_id = %id))]
    pub async fn delete_todo(
        &self,
        owner_id: &str,
        id: Uuid,
        expected_version: Option<i32>,
    ) -> Result<()> {
        let txn = self.db.pool.begin().await?;
        let root = ownership::resolve_todo(&txn, id, owner_id).await?;
        let expected_version = expected_version.unwrap_or(root.version);
        let removed = Todo::delete_cascade(&txn, &root, expected_version, &self.bucket).await?;
        txn.commit().await?;

        tracing::info!(
            todo_id = %id,
            owner_id,
            removed = removed.len(),
            "todo deleted"
        );
        Ok(())
    }

    #[tracing::instrument(name = "todo.stats", skip_all, fields(owner_id = %owner_id))]
    pub async fn stats(&self, owner_id: &str) -> Result<TodoStats> {
        Ok(Todo::stats(&self.db.pool, owner_id, Utc::now()).await?)
    }
}
