use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, JsonValue,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionSession, TransactionTrait,
    sea_query::{Expr, Func},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    attachment::Attachment,
    category::Category,
    comment::Comment,
    event_outbox::EventOutbox,
    ids,
    pagination::PaginatedResponse,
    todo_query::TodoFilter,
};
pub use crate::types::{TodoMetadata, TodoPriority, TodoStatus};
use crate::{
    entities::{todo, todo_attachment, todo_category, todo_comment},
    events::{
        ENTITY_TODO, EVENT_TODO_CREATED, EVENT_TODO_DELETED, EVENT_TODO_UPDATED,
        TodoEventPayload,
    },
    validation::{ValidationError, optional_max_len, require_len},
};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Error)]
pub enum TodoError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Todo not found")]
    NotFound,
    #[error("Todo was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { expected: i32, actual: i32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub parent_todo_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub metadata: Option<TodoMetadata>,
    pub sort_order: i32,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A todo together with its category, direct children, comments and
/// attachments. Built on every read, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PopulatedTodo {
    #[serde(flatten)]
    #[ts(flatten)]
    pub todo: Todo,
    pub category: Option<Category>,
    pub children: Vec<Todo>,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
}

impl std::ops::Deref for PopulatedTodo {
    type Target = Todo;
    fn deref(&self) -> &Self::Target {
        &self.todo
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct CreateTodo {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub parent_todo_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub metadata: Option<TodoMetadata>,
}

impl CreateTodo {
    pub fn from_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_len("title", &self.title, 1, MAX_TITLE_LEN)?;
        optional_max_len("description", self.description.as_deref(), MAX_DESCRIPTION_LEN)
    }
}

/// Patch for an existing todo. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub parent_todo_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub metadata: Option<TodoMetadata>,
    pub sort_order: Option<i32>,
    pub expected_version: Option<i32>,
}

impl UpdateTodo {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_len("title", title, 1, MAX_TITLE_LEN)?;
        }
        optional_max_len("description", self.description.as_deref(), MAX_DESCRIPTION_LEN)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusCounts {
    pub draft: u64,
    pub active: u64,
    pub completed: u64,
    pub archived: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriorityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TodoStats {
    pub total: u64,
    pub by_status: StatusCounts,
    pub by_priority: PriorityCounts,
    pub overdue: u64,
}

fn decode_metadata(value: Option<JsonValue>) -> Result<Option<TodoMetadata>, DbErr> {
    value
        .filter(|value| !value.is_null())
        .map(|value| serde_json::from_value(value).map_err(|err| DbErr::Custom(err.to_string())))
        .transpose()
}

fn encode_metadata(metadata: &TodoMetadata) -> Result<JsonValue, DbErr> {
    serde_json::to_value(metadata).map_err(|err| DbErr::Custom(err.to_string()))
}

impl Todo {
    fn from_parts(
        model: todo::Model,
        parent_todo_id: Option<Uuid>,
        category_id: Option<Uuid>,
    ) -> Result<Self, DbErr> {
        Ok(Self {
            id: model.uuid,
            user_id: model.user_id,
            title: model.title,
            description: model.description,
            status: model.status,
            priority: model.priority,
            due_date: model.due_date,
            completed_at: model.completed_at,
            parent_todo_id,
            category_id,
            metadata: decode_metadata(model.metadata)?,
            sort_order: model.sort_order,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    /// Converts rows with two batched lookups for parent and category ids.
    pub(crate) async fn from_models<C: ConnectionTrait>(
        db: &C,
        models: Vec<todo::Model>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut parent_ids: Vec<i64> = models.iter().filter_map(|m| m.parent_todo_id).collect();
        parent_ids.sort_unstable();
        parent_ids.dedup();
        let mut category_ids: Vec<i64> = models.iter().filter_map(|m| m.category_id).collect();
        category_ids.sort_unstable();
        category_ids.dedup();

        let parents = ids::todo_uuids_by_ids(db, &parent_ids).await?;
        let categories = ids::category_uuids_by_ids(db, &category_ids).await?;

        models
            .into_iter()
            .map(|model| {
                let parent = model.parent_todo_id.and_then(|id| parents.get(&id).copied());
                let category = model.category_id.and_then(|id| categories.get(&id).copied());
                Self::from_parts(model, parent, category)
            })
            .collect()
    }

    pub fn event_payload(&self) -> TodoEventPayload {
        TodoEventPayload {
            todo_id: self.id,
            title: self.title.clone(),
            category_id: self.category_id,
            priority: self.priority,
            status: self.status,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        owner_id: &str,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let Some(model) = todo::Entity::find()
            .filter(todo::Column::Uuid.eq(id))
            .filter(todo::Column::UserId.eq(owner_id))
            .one(db)
            .await?
        else {
            return Ok(None);
        };
        Ok(Self::from_models(db, vec![model]).await?.pop())
    }

    /// Loads the populated view of one todo inside a single read
    /// transaction so the related rows come from one snapshot.
    pub async fn find_populated<C>(
        db: &C,
        owner_id: &str,
        id: Uuid,
    ) -> Result<Option<PopulatedTodo>, DbErr>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = db.begin().await?;
        let root = todo::Entity::find()
            .filter(todo::Column::Uuid.eq(id))
            .filter(todo::Column::UserId.eq(owner_id))
            .one(&txn)
            .await?;
        let populated = match root {
            Some(root) => Self::populate_many(&txn, owner_id, vec![root]).await?.pop(),
            None => None,
        };
        txn.commit().await?;
        Ok(populated)
    }

    /// Attaches categories, children, comments and attachments to `roots`
    /// using a fixed number of queries regardless of how many roots there
    /// are. Output order follows `roots`.
    pub(crate) async fn populate_many<C: ConnectionTrait>(
        db: &C,
        owner_id: &str,
        roots: Vec<todo::Model>,
    ) -> Result<Vec<PopulatedTodo>, DbErr> {
        if roots.is_empty() {
            return Ok(Vec::new());
        }

        let root_ids: Vec<i64> = roots.iter().map(|m| m.id).collect();
        let root_uuids: HashMap<i64, Uuid> = roots.iter().map(|m| (m.id, m.uuid)).collect();
        let root_keys: Vec<(i64, Option<i64>)> =
            roots.iter().map(|m| (m.id, m.category_id)).collect();

        let mut category_ids: Vec<i64> = roots.iter().filter_map(|m| m.category_id).collect();
        category_ids.sort_unstable();
        category_ids.dedup();
        let mut categories: HashMap<i64, Category> = if category_ids.is_empty() {
            HashMap::new()
        } else {
            todo_category::Entity::find()
                .filter(todo_category::Column::Id.is_in(category_ids))
                .filter(todo_category::Column::UserId.eq(owner_id))
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, Category::from_model(m)))
                .collect()
        };

        let children = todo::Entity::find()
            .filter(todo::Column::ParentTodoId.is_in(root_ids.clone()))
            .filter(todo::Column::UserId.eq(owner_id))
            .order_by_asc(todo::Column::SortOrder)
            .order_by_asc(todo::Column::CreatedAt)
            .order_by_asc(todo::Column::Id)
            .all(db)
            .await?;

        let comments = todo_comment::Entity::find()
            .filter(todo_comment::Column::TodoId.is_in(root_ids.clone()))
            .filter(todo_comment::Column::UserId.eq(owner_id))
            .order_by_asc(todo_comment::Column::CreatedAt)
            .order_by_asc(todo_comment::Column::Id)
            .all(db)
            .await?;

        let attachments = todo_attachment::Entity::find()
            .filter(todo_attachment::Column::TodoId.is_in(root_ids))
            .filter(todo_attachment::Column::UserId.eq(owner_id))
            .order_by_asc(todo_attachment::Column::CreatedAt)
            .order_by_asc(todo_attachment::Column::Id)
            .all(db)
            .await?;

        let root_count = roots.len();
        let child_parents: Vec<Option<i64>> = children.iter().map(|c| c.parent_todo_id).collect();
        let mut all = roots;
        all.extend(children);
        let mut converted = Self::from_models(db, all).await?.into_iter();
        let root_todos: Vec<Todo> = converted.by_ref().take(root_count).collect();

        let mut children_by_parent: HashMap<i64, Vec<Todo>> = HashMap::new();
        for (parent, child) in child_parents.into_iter().zip(converted) {
            if let Some(parent) = parent {
                children_by_parent.entry(parent).or_default().push(child);
            }
        }

        let mut comments_by_todo: HashMap<i64, Vec<Comment>> = HashMap::new();
        for comment in comments {
            if let Some(&todo_uuid) = root_uuids.get(&comment.todo_id) {
                comments_by_todo
                    .entry(comment.todo_id)
                    .or_default()
                    .push(Comment::from_model(comment, todo_uuid));
            }
        }

        let mut attachments_by_todo: HashMap<i64, Vec<Attachment>> = HashMap::new();
        for attachment in attachments {
            if let Some(&todo_uuid) = root_uuids.get(&attachment.todo_id) {
                attachments_by_todo
                    .entry(attachment.todo_id)
                    .or_default()
                    .push(Attachment::from_model(attachment, todo_uuid));
            }
        }

        Ok(root_keys
            .into_iter()
            .zip(root_todos)
            .map(|((row_id, category_id), todo)| PopulatedTodo {
                todo,
                category: category_id.and_then(|id| categories.remove(&id)),
                children: children_by_parent.remove(&row_id).unwrap_or_default(),
                comments: comments_by_todo.remove(&row_id).unwrap_or_default(),
                attachments: attachments_by_todo.remove(&row_id).unwrap_or_default(),
            })
            .collect())
    }

    /// One page of the owner's todos matching `filter`. The count and the
    /// page are read in the same transaction.
    pub async fn list<C>(
        db: &C,
        owner_id: &str,
        filter: &TodoFilter,
        now: DateTime<Utc>,
    ) -> Result<PaginatedResponse<PopulatedTodo>, DbErr>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = db.begin().await?;
        let page = Self::list_in(&txn, owner_id, filter, now).await?;
        txn.commit().await?;
        Ok(page)
    }

    async fn list_in<C: ConnectionTrait>(
        db: &C,
        owner_id: &str,
        filter: &TodoFilter,
        now: DateTime<Utc>,
    ) -> Result<PaginatedResponse<PopulatedTodo>, DbErr> {
        // A category or parent the owner cannot see matches nothing.
        let category_row_id = match filter.category_id {
            Some(id) => match ids::category_id_by_uuid(db, owner_id, id).await? {
                Some(row_id) => Some(row_id),
                None => return Ok(PaginatedResponse::empty(filter.page)),
            },
            None => None,
        };
        let parent_row_id = match filter.parent_todo_id {
            Some(id) => match ids::todo_id_by_uuid(db, owner_id, id).await? {
                Some(row_id) => Some(row_id),
                None => return Ok(PaginatedResponse::empty(filter.page)),
            },
            None => None,
        };

        let condition = filter.condition(owner_id, category_row_id, parent_row_id, now);
        let total = todo::Entity::find()
            .filter(condition.clone())
            .count(db)
            .await?;
        let rows = filter
            .apply_order(todo::Entity::find().filter(condition))
            .offset(filter.page.offset())
            .limit(filter.page.limit)
            .all(db)
            .await?;

        let data = Self::populate_many(db, owner_id, rows).await?;
        Ok(PaginatedResponse::new(data, filter.page, total))
    }

    async fn next_sort_order<C: ConnectionTrait>(
        db: &C,
        owner_id: &str,
        parent_id: Option<i64>,
    ) -> Result<i32, DbErr> {
        let query = todo::Entity::find().filter(todo::Column::UserId.eq(owner_id));
        let query = match parent_id {
            Some(parent_id) => query.filter(todo::Column::ParentTodoId.eq(parent_id)),
            None => query.filter(todo::Column::ParentTodoId.is_null()),
        };
        let last = query
            .order_by_desc(todo::Column::SortOrder)
            .one(db)
            .await?;
        Ok(last.map(|m| m.sort_order + 1).unwrap_or(0))
    }

    pub async fn has_children<C: ConnectionTrait>(db: &C, todo: &todo::Model) -> Result<bool, DbErr> {
        let count = todo::Entity::find()
            .filter(todo::Column::ParentTodoId.eq(todo.id))
            .filter(todo::Column::UserId.eq(todo.user_id.as_str()))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    /// Inserts a todo whose parent and category have already been resolved
    /// for `owner_id`.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        owner_id: &str,
        data: &CreateTodo,
        parent: Option<&todo::Model>,
        category: Option<&todo_category::Model>,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let priority = data.priority.unwrap_or_default();
        let status = data.status.unwrap_or_default();
        let sort_order = Self::next_sort_order(db, owner_id, parent.map(|p| p.id)).await?;
        let metadata = data.metadata.as_ref().map(encode_metadata).transpose()?;

        let active = todo::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            user_id: Set(owner_id.to_string()),
            title: Set(data.title.trim().to_string()),
            description: Set(data.description.clone()),
            status: Set(status),
            priority: Set(priority),
            priority_rank: Set(priority.rank()),
            due_date: Set(data.due_date),
            completed_at: Set((status == TodoStatus::Completed).then_some(now)),
            parent_todo_id: Set(parent.map(|p| p.id)),
            category_id: Set(category.map(|c| c.id)),
            metadata: Set(metadata),
            sort_order: Set(sort_order),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        let todo = Self::from_parts(model, parent.map(|p| p.uuid), category.map(|c| c.uuid))?;

        EventOutbox::enqueue_event(
            db,
            EVENT_TODO_CREATED,
            ENTITY_TODO,
            todo.id,
            owner_id,
            &todo.event_payload(),
        )
        .await?;
        Ok(todo)
    }

    /// Applies `data` with a compare-and-swap on `expected_version`.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        current: &todo::Model,
        data: &UpdateTodo,
        parent: Option<&todo::Model>,
        category: Option<&todo_category::Model>,
        expected_version: i32,
    ) -> Result<Self, TodoError> {
        let now = Utc::now();
        let mut active = todo::ActiveModel {
            version: Set(expected_version + 1),
            updated_at: Set(now),
            ..Default::default()
        };
        if let Some(title) = &data.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = &data.description {
            active.description = Set(Some(description.clone()));
        }
        if let Some(status) = data.status {
            active.status = Set(status);
            if status == TodoStatus::Completed && current.status != TodoStatus::Completed {
                active.completed_at = Set(Some(now));
            } else if status != TodoStatus::Completed {
                active.completed_at = Set(None);
            }
        }
        if let Some(priority) = data.priority {
            active.priority = Set(priority);
            active.priority_rank = Set(priority.rank());
        }
        if let Some(due_date) = data.due_date {
            active.due_date = Set(Some(due_date));
        }
        if let Some(parent) = parent {
            active.parent_todo_id = Set(Some(parent.id));
        }
        if let Some(category) = category {
            active.category_id = Set(Some(category.id));
        }
        if let Some(metadata) = &data.metadata {
            active.metadata = Set(Some(encode_metadata(metadata)?));
        }
        if let Some(sort_order) = data.sort_order {
            active.sort_order = Set(sort_order);
        }

        let result = todo::Entity::update_many()
            .set(active)
            .filter(todo::Column::Id.eq(current.id))
            .filter(todo::Column::UserId.eq(current.user_id.as_str()))
            .filter(todo::Column::Version.eq(expected_version))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(Self::cas_failure(db, current, expected_version).await?);
        }

        let updated = todo::Entity::find_by_id(current.id)
            .one(db)
            .await?
            .ok_or(TodoError::NotFound)?;
        let todo = Self::from_models(db, vec![updated])
            .await?
            .pop()
            .ok_or(TodoError::NotFound)?;

        EventOutbox::enqueue_event(
            db,
            EVENT_TODO_UPDATED,
            ENTITY_TODO,
            todo.id,
            &todo.user_id,
            &todo.event_payload(),
        )
        .await?;
        Ok(todo)
    }

    async fn cas_failure<C: ConnectionTrait>(
        db: &C,
        current: &todo::Model,
        expected_version: i32,
    ) -> Result<TodoError, DbErr> {
        let latest = todo::Entity::find_by_id(current.id)
            .filter(todo::Column::UserId.eq(current.user_id.as_str()))
            .one(db)
            .await?;
        Ok(match latest {
            Some(latest) => TodoError::Conflict {
                expected: expected_version,
                actual: latest.version,
            },
            None => TodoError::NotFound,
        })
    }

    /// Removes `root`, its direct children and every comment and attachment
    /// hanging off them. Attachment objects are queued for deletion from
    /// `bucket`. Must run inside a transaction; on a version mismatch the
    /// caller rolls back. Returns the removed todos, children first.
    pub async fn delete_cascade<C: ConnectionTrait>(
        db: &C,
        root: &todo::Model,
        expected_version: i32,
        bucket: &str,
    ) -> Result<Vec<Todo>, TodoError> {
        let children = todo::Entity::find()
            .filter(todo::Column::ParentTodoId.eq(root.id))
            .order_by_asc(todo::Column::Id)
            .all(db)
            .await?;
        let child_ids: Vec<i64> = children.iter().map(|c| c.id).collect();
        let mut row_ids = child_ids.clone();
        row_ids.push(root.id);

        let mut doomed = children;
        doomed.push(root.clone());
        let removed = Self::from_models(db, doomed).await?;

        Comment::delete_for_todos(db, &row_ids).await?;
        Attachment::delete_for_todos(db, &row_ids, bucket).await?;
        if !child_ids.is_empty() {
            todo::Entity::delete_many()
                .filter(todo::Column::Id.is_in(child_ids))
                .exec(db)
                .await?;
        }

        let result = todo::Entity::delete_many()
            .filter(todo::Column::Id.eq(root.id))
            .filter(todo::Column::UserId.eq(root.user_id.as_str()))
            .filter(todo::Column::Version.eq(expected_version))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(Self::cas_failure(db, root, expected_version).await?);
        }

        for todo in &removed {
            EventOutbox::enqueue_event(
                db,
                EVENT_TODO_DELETED,
                ENTITY_TODO,
                todo.id,
                &todo.user_id,
                &todo.event_payload(),
            )
            .await?;
        }
        Ok(removed)
    }

    /// Grouped counts for `owner_id`, read in one transaction so the totals
    /// agree with each other.
    pub async fn stats<C>(db: &C, owner_id: &str, now: DateTime<Utc>) -> Result<TodoStats, DbErr>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = db.begin().await?;

        let by_status: Vec<(TodoStatus, i64)> = todo::Entity::find()
            .select_only()
            .column(todo::Column::Status)
            .column_as(
                Expr::expr(Func::count(Expr::col((todo::Entity, todo::Column::Id)))),
                "count",
            )
            .filter(todo::Column::UserId.eq(owner_id))
            .group_by(todo::Column::Status)
            .into_tuple()
            .all(&txn)
            .await?;
        let by_priority: Vec<(TodoPriority, i64)> = todo::Entity::find()
            .select_only()
            .column(todo::Column::Priority)
            .column_as(
                Expr::expr(Func::count(Expr::col((todo::Entity, todo::Column::Id)))),
                "count",
            )
            .filter(todo::Column::UserId.eq(owner_id))
            .group_by(todo::Column::Priority)
            .into_tuple()
            .all(&txn)
            .await?;
        let overdue_filter = TodoFilter {
            overdue: Some(true),
            ..Default::default()
        };
        let overdue = todo::Entity::find()
            .filter(overdue_filter.condition(owner_id, None, None, now))
            .count(&txn)
            .await?;
        txn.commit().await?;

        let mut stats = TodoStats {
            overdue,
            ..Default::default()
        };
        for (status, count) in by_status {
            let count = count.max(0) as u64;
            stats.total += count;
            match status {
                TodoStatus::Draft => stats.by_status.draft = count,
                TodoStatus::Active => stats.by_status.active = count,
                TodoStatus::Completed => stats.by_status.completed = count,
                TodoStatus::Archived => stats.by_status.archived = count,
            }
        }
        for (priority, count) in by_priority {
            let count = count.max(0) as u64;
            match priority {
                TodoPriority::Low => stats.by_priority.low = count,
                TodoPriority::Medium => stats.by_priority.medium = count,
                TodoPriority::High => stats.by_priority.high = count,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Duration;
    use sea_orm::DatabaseConnection;

    use super::*;
    use crate::models::{
        attachment::NewAttachment,
        blob_deletion::BlobDeletion,
        comment::AddComment,
        test_support::{insert_category, setup_db},
        todo_query::TodoListQuery,
    };

    async fn create(db: &DatabaseConnection, owner: &str, data: CreateTodo) -> todo::Model {
        let todo = Todo::create(db, owner, &data, None, None).await.unwrap();
        model_of(db, todo.id).await
    }

    async fn create_child(
        db: &DatabaseConnection,
        owner: &str,
        parent: &todo::Model,
        title: &str,
    ) -> todo::Model {
        let todo = Todo::create(db, owner, &CreateTodo::from_title(title), Some(parent), None)
            .await
            .unwrap();
        model_of(db, todo.id).await
    }

    async fn model_of(db: &DatabaseConnection, id: Uuid) -> todo::Model {
        todo::Entity::find()
            .filter(todo::Column::Uuid.eq(id))
            .one(db)
            .await
            .unwrap()
            .unwrap()
    }

    async fn list(db: &DatabaseConnection, owner: &str, query: TodoListQuery) -> PaginatedResponse<PopulatedTodo> {
        let filter = query.normalize().unwrap();
        Todo::list(db, owner, &filter, Utc::now()).await.unwrap()
    }

    #[test]
    fn create_validation() {
        assert!(CreateTodo::from_title("ship it").validate().is_ok());
        assert_eq!(CreateTodo::from_title("").validate().unwrap_err().field, "title");
        assert!(CreateTodo::from_title("t".repeat(256)).validate().is_err());

        let mut long = CreateTodo::from_title("ok");
        long.description = Some("d".repeat(1001));
        assert_eq!(long.validate().unwrap_err().field, "description");

        let mut completed = CreateTodo::from_title("ok");
        completed.status = Some(TodoStatus::Completed);
        assert!(completed.validate().is_ok());
    }

    #[tokio::test]
    async fn bare_todo_populates_with_empty_relations() {
        let db = setup_db().await;
        let root = create(&db, "alice", CreateTodo::from_title("lonely")).await;

        let populated = Todo::find_populated(&db, "alice", root.uuid)
            .await
            .unwrap()
            .expect("todo exists");
        assert!(populated.category.is_none());
        assert!(populated.children.is_empty());
        assert!(populated.comments.is_empty());
        assert!(populated.attachments.is_empty());
        assert_eq!(populated.version, 1);
    }

    #[tokio::test]
    async fn populated_view_collects_everything_in_order() {
        let db = setup_db().await;
        let category = insert_category(&db, "alice", "work").await;
        let root = Todo::create(
            &db,
            "alice",
            &CreateTodo {
                metadata: Some(TodoMetadata {
                    tags: vec!["q3".to_string()],
                    difficulty: Some(3),
                    ..Default::default()
                }),
                ..CreateTodo::from_title("parent")
            },
            None,
            Some(&category),
        )
        .await
        .unwrap();
        let root = model_of(&db, root.id).await;

        let first = create_child(&db, "alice", &root, "first").await;
        let second = create_child(&db, "alice", &root, "second").await;
        assert_eq!(first.sort_order + 1, second.sort_order);

        for content in ["a", "b"] {
            Comment::create(
                &db,
                &root,
                &AddComment {
                    content: content.to_string(),
                },
            )
            .await
            .unwrap();
        }
        Attachment::create(
            &db,
            &root,
            &NewAttachment {
                id: Uuid::new_v4(),
                name: "plan.pdf".to_string(),
                download_key: "todos/k/attachments/plan.pdf".to_string(),
                file_size: 10,
                mime_type: "application/pdf".to_string(),
            },
        )
        .await
        .unwrap();

        let populated = Todo::find_populated(&db, "alice", root.uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(populated.category.as_ref().map(|c| c.id), Some(category.uuid));
        assert_eq!(populated.category_id, Some(category.uuid));
        let children: Vec<_> = populated.children.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(children, vec!["first", "second"]);
        assert!(populated.children.iter().all(|c| c.parent_todo_id == Some(root.uuid)));
        let comments: Vec<_> = populated.comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(comments, vec!["a", "b"]);
        assert_eq!(populated.attachments.len(), 1);
        assert_eq!(
            populated.metadata.as_ref().map(|m| m.tags.clone()),
            Some(vec!["q3".to_string()])
        );
    }

    #[tokio::test]
    async fn other_owners_todo_is_invisible() {
        let db = setup_db().await;
        let root = create(&db, "alice", CreateTodo::from_title("private")).await;

        assert!(
            Todo::find_populated(&db, "mallory", root.uuid)
                .await
                .unwrap()
                .is_none()
        );
        assert!(Todo::find_by_id(&db, "mallory", root.uuid).await.unwrap().is_none());
        assert_eq!(list(&db, "mallory", TodoListQuery::default()).await.total, 0);
    }

    #[tokio::test]
    async fn twenty_five_todos_split_over_two_pages() {
        let db = setup_db().await;
        for i in 0..25 {
            create(&db, "x", CreateTodo::from_title(format!("todo {i}"))).await;
        }
        create(&db, "y", CreateTodo::from_title("someone else")).await;

        let first = list(
            &db,
            "x",
            TodoListQuery {
                page: Some(1),
                limit: Some(20),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(first.data.len(), 20);
        assert_eq!(first.total, 25);
        assert_eq!(first.total_pages, 2);

        let second = list(
            &db,
            "x",
            TodoListQuery {
                page: Some(2),
                limit: Some(20),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(second.data.len(), 5);

        let first_ids: HashSet<_> = first.data.iter().map(|t| t.id).collect();
        assert!(second.data.iter().all(|t| !first_ids.contains(&t.id)));
    }

    #[tokio::test]
    async fn concatenated_pages_match_single_page_for_every_sort() {
        let db = setup_db().await;
        // Identical priorities and titles force the tie breakers to decide.
        for i in 0..13 {
            let mut data = CreateTodo::from_title(if i % 2 == 0 { "same" } else { "other" });
            data.priority = Some(if i % 3 == 0 {
                TodoPriority::High
            } else {
                TodoPriority::Low
            });
            create(&db, "alice", data).await;
        }

        for sort in ["created_at", "updated_at", "title", "priority", "due_date"] {
            for order in ["asc", "desc"] {
                let everything = list(
                    &db,
                    "alice",
                    TodoListQuery {
                        limit: Some(13),
                        sort: Some(sort.to_string()),
                        order: Some(order.to_string()),
                        ..Default::default()
                    },
                )
                .await;

                let mut paged = Vec::new();
                for page in 1..=5 {
                    let chunk = list(
                        &db,
                        "alice",
                        TodoListQuery {
                            page: Some(page),
                            limit: Some(3),
                            sort: Some(sort.to_string()),
                            order: Some(order.to_string()),
                            ..Default::default()
                        },
                    )
                    .await;
                    paged.extend(chunk.data.into_iter().map(|t| t.id));
                }

                let expected: Vec<_> = everything.data.iter().map(|t| t.id).collect();
                assert_eq!(paged, expected, "sort={sort} order={order}");
            }
        }
    }

    #[tokio::test]
    async fn priority_sort_is_semantic() {
        let db = setup_db().await;
        for priority in [TodoPriority::Medium, TodoPriority::High, TodoPriority::Low] {
            let mut data = CreateTodo::from_title(priority.to_string());
            data.priority = Some(priority);
            create(&db, "alice", data).await;
        }

        let page = list(
            &db,
            "alice",
            TodoListQuery {
                sort: Some("priority".to_string()),
                order: Some("desc".to_string()),
                ..Default::default()
            },
        )
        .await;
        let priorities: Vec<_> = page.data.iter().map(|t| t.priority).collect();
        assert_eq!(
            priorities,
            vec![TodoPriority::High, TodoPriority::Medium, TodoPriority::Low]
        );
    }

    #[tokio::test]
    async fn filters_narrow_the_listing() {
        let db = setup_db().await;
        let category = insert_category(&db, "alice", "home").await;
        let foreign_category = insert_category(&db, "bob", "home").await;

        let mut groceries = CreateTodo::from_title("Buy groceries");
        groceries.description = Some("milk and eggs".to_string());
        groceries.status = Some(TodoStatus::Active);
        let groceries = Todo::create(&db, "alice", &groceries, None, Some(&category))
            .await
            .unwrap();

        let mut taxes = CreateTodo::from_title("File taxes");
        taxes.priority = Some(TodoPriority::High);
        taxes.due_date = Some(Utc::now() + Duration::days(10));
        create(&db, "alice", taxes).await;

        let by_search = list(
            &db,
            "alice",
            TodoListQuery {
                search: Some("eggs".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(by_search.total, 1);
        assert_eq!(by_search.data[0].id, groceries.id);

        let by_status = list(
            &db,
            "alice",
            TodoListQuery {
                status: Some(TodoStatus::Active),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(by_status.total, 1);

        let by_priority = list(
            &db,
            "alice",
            TodoListQuery {
                priority: Some(TodoPriority::High),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(by_priority.data[0].title, "File taxes");

        let by_category = list(
            &db,
            "alice",
            TodoListQuery {
                category_id: Some(category.uuid),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(by_category.total, 1);
        assert_eq!(
            by_category.data[0].category.as_ref().map(|c| c.name.as_str()),
            Some("home")
        );

        let by_foreign_category = list(
            &db,
            "alice",
            TodoListQuery {
                category_id: Some(foreign_category.uuid),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(by_foreign_category.total, 0);

        let due_window = list(
            &db,
            "alice",
            TodoListQuery {
                due_from: Some(Utc::now()),
                due_to: Some(Utc::now() + Duration::days(30)),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(due_window.total, 1);
        assert_eq!(due_window.data[0].title, "File taxes");
    }

    #[tokio::test]
    async fn overdue_excludes_completed_todos() {
        let db = setup_db().await;
        let mut data = CreateTodo::from_title("late");
        data.status = Some(TodoStatus::Active);
        data.due_date = Some(Utc::now() - Duration::days(1));
        let late = create(&db, "alice", data).await;
        create(&db, "alice", CreateTodo::from_title("no deadline")).await;

        let overdue = TodoListQuery {
            overdue: Some(true),
            ..Default::default()
        };
        let page = list(&db, "alice", overdue.clone()).await;
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].id, late.uuid);

        let not_overdue = list(
            &db,
            "alice",
            TodoListQuery {
                overdue: Some(false),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(not_overdue.total, 1);

        let completed = Todo::update(
            &db,
            &late,
            &UpdateTodo {
                status: Some(TodoStatus::Completed),
                ..Default::default()
            },
            None,
            None,
            late.version,
        )
        .await
        .unwrap();
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.version, 2);

        assert_eq!(list(&db, "alice", overdue).await.total, 0);
        let done = list(
            &db,
            "alice",
            TodoListQuery {
                completed: Some(true),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(done.total, 1);
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let db = setup_db().await;
        let todo = create(&db, "alice", CreateTodo::from_title("shared")).await;

        Todo::update(
            &db,
            &todo,
            &UpdateTodo {
                title: Some("first writer".to_string()),
                ..Default::default()
            },
            None,
            None,
            1,
        )
        .await
        .unwrap();

        let err = Todo::update(
            &db,
            &todo,
            &UpdateTodo {
                title: Some("second writer".to_string()),
                ..Default::default()
            },
            None,
            None,
            1,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            TodoError::Conflict {
                expected: 1,
                actual: 2
            }
        ));

        let stored = model_of(&db, todo.uuid).await;
        assert_eq!(stored.title, "first writer");
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn patch_leaves_absent_fields_alone() {
        let db = setup_db().await;
        let mut data = CreateTodo::from_title("keep me");
        data.description = Some("original".to_string());
        data.priority = Some(TodoPriority::High);
        let todo = create(&db, "alice", data).await;

        let updated = Todo::update(
            &db,
            &todo,
            &UpdateTodo {
                priority: Some(TodoPriority::Low),
                ..Default::default()
            },
            None,
            None,
            todo.version,
        )
        .await
        .unwrap();
        assert_eq!(updated.title, "keep me");
        assert_eq!(updated.description.as_deref(), Some("original"));
        assert_eq!(updated.priority, TodoPriority::Low);
        assert_eq!(model_of(&db, todo.uuid).await.priority_rank, 0);
    }

    #[tokio::test]
    async fn cascade_removes_children_comments_and_attachments() {
        let db = setup_db().await;
        let root = create(&db, "alice", CreateTodo::from_title("root")).await;
        let child = create_child(&db, "alice", &root, "child").await;
        Comment::create(
            &db,
            &child,
            &AddComment {
                content: "on child".to_string(),
            },
        )
        .await
        .unwrap();
        let attachment = Attachment::create(
            &db,
            &root,
            &NewAttachment {
                id: Uuid::new_v4(),
                name: "a.txt".to_string(),
                download_key: "todos/root/attachments/a.txt".to_string(),
                file_size: 1,
                mime_type: "text/plain".to_string(),
            },
        )
        .await
        .unwrap();

        let removed = Todo::delete_cascade(&db, &root, root.version, "bucket")
            .await
            .unwrap();
        let removed_ids: Vec<_> = removed.iter().map(|t| t.id).collect();
        assert_eq!(removed_ids, vec![child.uuid, root.uuid]);

        assert_eq!(todo::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(todo_comment::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(todo_attachment::Entity::find().count(&db).await.unwrap(), 0);
        assert!(
            BlobDeletion::find_by_key(&db, &attachment.download_key)
                .await
                .unwrap()
                .is_some()
        );

        let deleted_events = EventOutbox::find_by_entity(&db, child.uuid)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == EVENT_TODO_DELETED)
            .count();
        assert_eq!(deleted_events, 1);
    }

    #[tokio::test]
    async fn stats_count_by_status_priority_and_overdue() {
        let db = setup_db().await;
        let mut late = CreateTodo::from_title("late");
        late.status = Some(TodoStatus::Active);
        late.priority = Some(TodoPriority::High);
        late.due_date = Some(Utc::now() - Duration::hours(2));
        create(&db, "alice", late).await;
        create(&db, "alice", CreateTodo::from_title("draft")).await;
        create(&db, "bob", CreateTodo::from_title("not mine")).await;

        let mut finished_late = CreateTodo::from_title("finished late");
        finished_late.status = Some(TodoStatus::Completed);
        finished_late.priority = Some(TodoPriority::Low);
        finished_late.due_date = Some(Utc::now() - Duration::days(3));
        create(&db, "alice", finished_late).await;
        let mut shelved = CreateTodo::from_title("shelved");
        shelved.status = Some(TodoStatus::Archived);
        shelved.due_date = Some(Utc::now() - Duration::days(1));
        create(&db, "alice", shelved).await;

        let stats = Todo::stats(&db, "alice", Utc::now()).await.unwrap();
        assert_eq!(
            stats,
            TodoStats {
                total: 4,
                by_status: StatusCounts {
                    draft: 1,
                    active: 1,
                    completed: 1,
                    archived: 1,
                },
                by_priority: PriorityCounts {
                    low: 1,
                    medium: 2,
                    high: 1,
                },
                overdue: 2,
            }
        );

        let empty = Todo::stats(&db, "carol", Utc::now()).await.unwrap();
        assert_eq!(empty, TodoStats::default());
    }

    #[tokio::test]
    async fn search_is_literal_and_case_insensitive() {
        let db = setup_db().await;
        for title in ["Buy milk", "File taxes", "Call mom", "50% off", "snake_case"] {
            create(&db, "alice", CreateTodo::from_title(title)).await;
        }

        for (term, expected) in [
            ("milk", vec!["Buy milk"]),
            ("MILK", vec!["Buy milk"]),
            ("%", vec!["50% off"]),
            ("_", vec!["snake_case"]),
            ("\\", vec![]),
        ] {
            let page = list(
                &db,
                "alice",
                TodoListQuery {
                    search: Some(term.to_string()),
                    ..Default::default()
                },
            )
            .await;
            let titles: Vec<_> = page.data.iter().map(|t| t.title.as_str()).collect();
            assert_eq!(titles, expected, "search {term:?}");
            assert_eq!(page.total, expected.len() as u64);
        }
    }

    #[tokio::test]
    async fn parent_filter_lists_direct_children_only() {
        let db = setup_db().await;
        let parent = create(&db, "alice", CreateTodo::from_title("parent")).await;
        let first = create_child(&db, "alice", &parent, "first").await;
        let second = create_child(&db, "alice", &parent, "second").await;
        create(&db, "alice", CreateTodo::from_title("unrelated")).await;
        let bobs = create(&db, "bob", CreateTodo::from_title("bob's parent")).await;
        create_child(&db, "bob", &bobs, "bob's child").await;

        let children = list(
            &db,
            "alice",
            TodoListQuery {
                parent_todo_id: Some(parent.uuid),
                sort: Some("created_at".to_string()),
                order: Some("asc".to_string()),
                ..Default::default()
            },
        )
        .await;
        let ids: Vec<_> = children.data.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![first.uuid, second.uuid]);
        assert_eq!(children.total, 2);

        let foreign = list(
            &db,
            "alice",
            TodoListQuery {
                parent_todo_id: Some(bobs.uuid),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(foreign.total, 0);
        assert!(foreign.data.is_empty());
    }

    #[tokio::test]
    async fn completed_false_keeps_everything_but_completed() {
        let db = setup_db().await;
        for status in [
            TodoStatus::Draft,
            TodoStatus::Active,
            TodoStatus::Completed,
            TodoStatus::Archived,
        ] {
            let mut data = CreateTodo::from_title(status.to_string());
            data.status = Some(status);
            create(&db, "alice", data).await;
        }

        let open = list(
            &db,
            "alice",
            TodoListQuery {
                completed: Some(false),
                ..Default::default()
            },
        )
        .await;
        let statuses: HashSet<_> = open.data.iter().map(|t| t.status).collect();
        assert_eq!(open.total, 3);
        assert_eq!(
            statuses,
            HashSet::from([TodoStatus::Draft, TodoStatus::Active, TodoStatus::Archived])
        );
    }
}
