use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entities::{todo, todo_category};

pub async fn todo_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    todo::Entity::find()
        .select_only()
        .column(todo::Column::Id)
        .filter(todo::Column::Uuid.eq(uuid))
        .filter(todo::Column::UserId.eq(owner_id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn category_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    todo_category::Entity::find()
        .select_only()
        .column(todo_category::Column::Id)
        .filter(todo_category::Column::Uuid.eq(uuid))
        .filter(todo_category::Column::UserId.eq(owner_id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn todo_uuids_by_ids<C: ConnectionTrait>(
    db: &C,
    ids: &[i64],
) -> Result<HashMap<i64, Uuid>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, Uuid)> = todo::Entity::find()
        .select_only()
        .column(todo::Column::Id)
        .column(todo::Column::Uuid)
        .filter(todo::Column::Id.is_in(ids.to_vec()))
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

pub async fn category_uuids_by_ids<C: ConnectionTrait>(
    db: &C,
    ids: &[i64],
) -> Result<HashMap<i64, Uuid>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, Uuid)> = todo_category::Entity::find()
        .select_only()
        .column(todo_category::Column::Id)
        .column(todo_category::Column::Uuid)
        .filter(todo_category::Column::Id.is_in(ids.to_vec()))
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}
