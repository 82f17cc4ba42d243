use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TodoCategories::Table)
                    .col(pk_id_col(manager, TodoCategories::Id))
                    .col(uuid_col(TodoCategories::Uuid))
                    .col(owner_col(TodoCategories::UserId))
                    .col(ColumnDef::new(TodoCategories::Name).string_len(100).not_null())
                    .col(ColumnDef::new(TodoCategories::Color).string_len(32))
                    .col(ColumnDef::new(TodoCategories::Description).string_len(255))
                    .col(timestamp_col(TodoCategories::CreatedAt))
                    .col(timestamp_col(TodoCategories::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todo_categories_uuid")
                    .table(TodoCategories::Table)
                    .col(TodoCategories::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todo_categories_user_id_name")
                    .table(TodoCategories::Table)
                    .col(TodoCategories::UserId)
                    .col(TodoCategories::Name)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Todos::Table)
                    .col(pk_id_col(manager, Todos::Id))
                    .col(uuid_col(Todos::Uuid))
                    .col(owner_col(Todos::UserId))
                    .col(ColumnDef::new(Todos::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Todos::Description).text())
                    .col(
                        ColumnDef::new(Todos::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("draft")),
                    )
                    .col(
                        ColumnDef::new(Todos::Priority)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("medium")),
                    )
                    .col(
                        ColumnDef::new(Todos::PriorityRank)
                            .integer()
                            .not_null()
                            .default(Expr::val(1)),
                    )
                    .col(ColumnDef::new(Todos::DueDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Todos::CompletedAt).timestamp_with_time_zone())
                    .col(fk_id_nullable_col(manager, Todos::ParentTodoId))
                    .col(fk_id_nullable_col(manager, Todos::CategoryId))
                    .col(ColumnDef::new(Todos::Metadata).json())
                    .col(
                        ColumnDef::new(Todos::SortOrder)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(
                        ColumnDef::new(Todos::Version)
                            .integer()
                            .not_null()
                            .default(Expr::val(1)),
                    )
                    .col(timestamp_col(Todos::CreatedAt))
                    .col(timestamp_col(Todos::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_todos_parent_todo_id")
                            .from(Todos::Table, Todos::ParentTodoId)
                            .to(Todos::Table, Todos::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_todos_category_id")
                            .from(Todos::Table, Todos::CategoryId)
                            .to(TodoCategories::Table, TodoCategories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todos_uuid")
                    .table(Todos::Table)
                    .col(Todos::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todos_user_id_created_at")
                    .table(Todos::Table)
                    .col(Todos::UserId)
                    .col(Todos::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todos_parent_todo_id")
                    .table(Todos::Table)
                    .col(Todos::ParentTodoId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todos_category_id")
                    .table(Todos::Table)
                    .col(Todos::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todos_user_id_status")
                    .table(Todos::Table)
                    .col(Todos::UserId)
                    .col(Todos::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TodoComments::Table)
                    .col(pk_id_col(manager, TodoComments::Id))
                    .col(uuid_col(TodoComments::Uuid))
                    .col(fk_id_col(manager, TodoComments::TodoId))
                    .col(owner_col(TodoComments::UserId))
                    .col(ColumnDef::new(TodoComments::Content).text().not_null())
                    .col(timestamp_col(TodoComments::CreatedAt))
                    .col(timestamp_col(TodoComments::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_todo_comments_todo_id")
                            .from(TodoComments::Table, TodoComments::TodoId)
                            .to(Todos::Table, Todos::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todo_comments_uuid")
                    .table(TodoComments::Table)
                    .col(TodoComments::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todo_comments_todo_id_created_at")
                    .table(TodoComments::Table)
                    .col(TodoComments::TodoId)
                    .col(TodoComments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TodoAttachments::Table)
                    .col(pk_id_col(manager, TodoAttachments::Id))
                    .col(uuid_col(TodoAttachments::Uuid))
                    .col(fk_id_col(manager, TodoAttachments::TodoId))
                    .col(owner_col(TodoAttachments::UserId))
                    .col(ColumnDef::new(TodoAttachments::Name).string().not_null())
                    .col(ColumnDef::new(TodoAttachments::DownloadKey).string().not_null())
                    .col(ColumnDef::new(TodoAttachments::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(TodoAttachments::MimeType).string_len(255).not_null())
                    .col(timestamp_col(TodoAttachments::CreatedAt))
                    .col(timestamp_col(TodoAttachments::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_todo_attachments_todo_id")
                            .from(TodoAttachments::Table, TodoAttachments::TodoId)
                            .to(Todos::Table, Todos::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todo_attachments_uuid")
                    .table(TodoAttachments::Table)
                    .col(TodoAttachments::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_todo_attachments_todo_id")
                    .table(TodoAttachments::Table)
                    .col(TodoAttachments::TodoId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(EventOutbox::Table)
                    .col(pk_id_col(manager, EventOutbox::Id))
                    .col(uuid_col(EventOutbox::Uuid))
                    .col(ColumnDef::new(EventOutbox::EventType).string_len(64).not_null())
                    .col(ColumnDef::new(EventOutbox::EntityType).string_len(64).not_null())
                    .col(ColumnDef::new(EventOutbox::EntityUuid).uuid().not_null())
                    .col(owner_col(EventOutbox::OwnerId))
                    .col(ColumnDef::new(EventOutbox::Payload).json().not_null())
                    .col(timestamp_col(EventOutbox::CreatedAt))
                    .col(ColumnDef::new(EventOutbox::PublishedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(EventOutbox::Attempts)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(ColumnDef::new(EventOutbox::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_event_outbox_uuid")
                    .table(EventOutbox::Table)
                    .col(EventOutbox::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_event_outbox_published_at")
                    .table(EventOutbox::Table)
                    .col(EventOutbox::PublishedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(BlobDeletions::Table)
                    .col(pk_id_col(manager, BlobDeletions::Id))
                    .col(uuid_col(BlobDeletions::Uuid))
                    .col(ColumnDef::new(BlobDeletions::Bucket).string().not_null())
                    .col(ColumnDef::new(BlobDeletions::ObjectKey).string().not_null())
                    .col(
                        ColumnDef::new(BlobDeletions::Attempts)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(ColumnDef::new(BlobDeletions::LastError).text())
                    .col(timestamp_col(BlobDeletions::NextAttemptAt))
                    .col(ColumnDef::new(BlobDeletions::CompletedAt).timestamp_with_time_zone())
                    .col(timestamp_col(BlobDeletions::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_blob_deletions_uuid")
                    .table(BlobDeletions::Table)
                    .col(BlobDeletions::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_blob_deletions_pending")
                    .table(BlobDeletions::Table)
                    .col(BlobDeletions::CompletedAt)
                    .col(BlobDeletions::NextAttemptAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlobDeletions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventOutbox::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TodoAttachments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TodoComments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Todos::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TodoCategories::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

// Owner ids come from the identity provider and are opaque.
fn owner_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).string_len(255).not_null().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum TodoCategories {
    Table,
    Id,
    Uuid,
    UserId,
    Name,
    Color,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Todos {
    Table,
    Id,
    Uuid,
    UserId,
    Title,
    Description,
    Status,
    Priority,
    PriorityRank,
    DueDate,
    CompletedAt,
    ParentTodoId,
    CategoryId,
    Metadata,
    SortOrder,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TodoComments {
    Table,
    Id,
    Uuid,
    TodoId,
    UserId,
    Content,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TodoAttachments {
    Table,
    Id,
    Uuid,
    TodoId,
    UserId,
    Name,
    DownloadKey,
    FileSize,
    MimeType,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum EventOutbox {
    Table,
    Id,
    Uuid,
    EventType,
    EntityType,
    EntityUuid,
    OwnerId,
    Payload,
    CreatedAt,
    PublishedAt,
    Attempts,
    LastError,
}

#[derive(Iden)]
enum BlobDeletions {
    Table,
    Id,
    Uuid,
    Bucket,
    ObjectKey,
    Attempts,
    LastError,
    NextAttemptAt,
    CompletedAt,
    CreatedAt,
}
