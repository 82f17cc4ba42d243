use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    event_outbox::EventOutbox,
    pagination::{PageRequest, PaginatedResponse},
    todo_query::contains_ignore_case,
};
use crate::{
    entities::todo_category,
    events::{
        CategoryEventPayload, ENTITY_CATEGORY, EVENT_CATEGORY_CREATED, EVENT_CATEGORY_DELETED,
        EVENT_CATEGORY_UPDATED,
    },
    validation::{ValidationError, optional_max_len, require_len},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct CreateCategory {
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

impl CreateCategory {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_len("name", &self.name, 1, 100)?;
        optional_max_len("color", self.color.as_deref(), 32)?;
        optional_max_len("description", self.description.as_deref(), 255)
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
}

impl UpdateCategory {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_len("name", name, 1, 100)?;
        }
        optional_max_len("color", self.color.as_deref(), 32)?;
        optional_max_len("description", self.description.as_deref(), 255)
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct CategoryListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

impl Category {
    pub(crate) fn from_model(model: todo_category::Model) -> Self {
        Self {
            id: model.uuid,
            user_id: model.user_id,
            name: model.name,
            color: model.color,
            description: model.description,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        owner_id: &str,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = todo_category::Entity::find()
            .filter(todo_category::Column::Uuid.eq(id))
            .filter(todo_category::Column::UserId.eq(owner_id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn list<C: ConnectionTrait>(
        db: &C,
        owner_id: &str,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<PaginatedResponse<Self>, DbErr> {
        let mut condition = Condition::all().add(todo_category::Column::UserId.eq(owner_id));
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(contains_ignore_case(todo_category::Column::Name, search))
                    .add(contains_ignore_case(todo_category::Column::Description, search)),
            );
        }

        let total = todo_category::Entity::find()
            .filter(condition.clone())
            .count(db)
            .await?;
        let records = todo_category::Entity::find()
            .filter(condition)
            .order_by_asc(todo_category::Column::Name)
            .order_by_asc(todo_category::Column::Id)
            .offset(page.offset())
            .limit(page.limit)
            .all(db)
            .await?;

        Ok(PaginatedResponse::new(
            records.into_iter().map(Self::from_model).collect(),
            page,
            total,
        ))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        owner_id: &str,
        data: &CreateCategory,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = todo_category::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            user_id: Set(owner_id.to_string()),
            name: Set(data.name.trim().to_string()),
            color: Set(data.color.clone()),
            description: Set(data.description.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = active.insert(db).await?;

        EventOutbox::enqueue_event(
            db,
            EVENT_CATEGORY_CREATED,
            ENTITY_CATEGORY,
            model.uuid,
            owner_id,
            &CategoryEventPayload {
                category_id: model.uuid,
                name: model.name.clone(),
            },
        )
        .await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        record: todo_category::Model,
        data: &UpdateCategory,
    ) -> Result<Self, DbErr> {
        let owner_id = record.user_id.clone();
        let mut active: todo_category::ActiveModel = record.into();
        if let Some(name) = &data.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(color) = &data.color {
            active.color = Set(Some(color.clone()));
        }
        if let Some(description) = &data.description {
            active.description = Set(Some(description.clone()));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        EventOutbox::enqueue_event(
            db,
            EVENT_CATEGORY_UPDATED,
            ENTITY_CATEGORY,
            updated.uuid,
            &owner_id,
            &CategoryEventPayload {
                category_id: updated.uuid,
                name: updated.name.clone(),
            },
        )
        .await?;
        Ok(Self::from_model(updated))
    }

    /// Deletes the category; todos referencing it are detached by the
    /// foreign key.
    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        owner_id: &str,
        id: Uuid,
    ) -> Result<u64, DbErr> {
        let Some(record) = todo_category::Entity::find()
            .filter(todo_category::Column::Uuid.eq(id))
            .filter(todo_category::Column::UserId.eq(owner_id))
            .one(db)
            .await?
        else {
            return Ok(0);
        };

        let result = todo_category::Entity::delete_by_id(record.id)
            .exec(db)
            .await?;
        if result.rows_affected > 0 {
            EventOutbox::enqueue_event(
                db,
                EVENT_CATEGORY_DELETED,
                ENTITY_CATEGORY,
                record.uuid,
                owner_id,
                &CategoryEventPayload {
                    category_id: record.uuid,
                    name: record.name,
                },
            )
            .await?;
        }
        Ok(result.rows_affected)
    }
}
