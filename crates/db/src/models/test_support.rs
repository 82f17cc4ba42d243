use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use crate::{
    DBService,
    entities::{todo, todo_category},
    types::{TodoPriority, TodoStatus},
};

pub(crate) async fn setup_db() -> DatabaseConnection {
    DBService::new_in_memory().await.unwrap().pool
}

pub(crate) async fn insert_todo(db: &DatabaseConnection, owner: &str, title: &str) -> todo::Model {
    let now = Utc::now();
    todo::ActiveModel {
        uuid: Set(Uuid::new_v4()),
        user_id: Set(owner.to_string()),
        title: Set(title.to_string()),
        description: Set(None),
        status: Set(TodoStatus::Draft),
        priority: Set(TodoPriority::Medium),
        priority_rank: Set(TodoPriority::Medium.rank()),
        due_date: Set(None),
        completed_at: Set(None),
        parent_todo_id: Set(None),
        category_id: Set(None),
        metadata: Set(None),
        sort_order: Set(0),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub(crate) async fn insert_category(
    db: &DatabaseConnection,
    owner: &str,
    name: &str,
) -> todo_category::Model {
    let now = Utc::now();
    todo_category::ActiveModel {
        uuid: Set(Uuid::new_v4()),
        user_id: Set(owner.to_string()),
        name: Set(name.to_string()),
        color: Set(None),
        description: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
