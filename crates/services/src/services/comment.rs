use db::{
    DBService, TransactionTrait,
    models::{
        comment::{AddComment, Comment, UpdateComment},
        ownership::{self, EntityKind},
    },
};
use uuid::Uuid;

use super::error::{Result, TodoServiceError};

#[derive(Clone)]
pub struct CommentService {
    db: DBService,
}

impl CommentService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    #[tracing::instrument(name = "comment.add", skip_all, fields(owner_id = %owner_id, todo_id = %todo_id))]
    pub async fn add_comment(
        &self,
        owner_id: &str,
        todo_id: Uuid,
        payload: AddComment,
    ) -> Result<Comment> {
        payload.validate()?;
        let txn = self.db.pool.begin().await?;
        let todo = ownership::resolve_todo(&txn, todo_id, owner_id).await?;
        let comment = Comment::create(&txn, &todo, &payload).await?;
        txn.commit().await?;

        tracing::info!(comment_id = %comment.id, todo_id = %todo_id, owner_id, "comment added");
        Ok(comment)
    }

    #[tracing::instrument(name = "comment.list", skip_all, fields(owner_id = %owner_id, todo_id = %todo_id))]
    pub async fn list_comments(&self, owner_id: &str, todo_id: Uuid) -> Result<Vec<Comment>> {
        let todo = ownership::resolve_todo(&self.db.pool, todo_id, owner_id).await?;
        Ok(Comment::find_by_todo(&self.db.pool, &todo).await?)
    }

    #[tracing::instrument(name = "comment.update", skip_all, fields(owner_id = %owner_id, comment_id = %comment_id))]
    pub async fn update_comment(
        &self,
        owner_id: &str,
        comment_id: Uuid,
        payload: UpdateComment,
    ) -> Result<Comment> {
        payload.validate()?;
        let txn = self.db.pool.begin().await?;
        let record = ownership::resolve_comment(&txn, comment_id, owner_id).await?;
        let comment = Comment::update(&txn, record, &payload).await?;
        txn.commit().await?;
        Ok(comment)
    }

    #[tracing::instrument(name = "comment.delete", skip_all, fields(owner_id = %owner_id, comment_id = %comment_id))]
    pub async fn delete_comment(&self, owner_id: &str, comment_id: Uuid) -> Result<()> {
        let txn = self.db.pool.begin().await?;
        if Comment::delete(&txn, owner_id, comment_id).await? == 0 {
            return Err(TodoServiceError::NotFound(EntityKind::Comment));
        }
        txn.commit().await?;

        tracing::info!(comment_id = %comment_id, owner_id, "comment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use db::models::todo::CreateTodo;

    use super::*;
    use crate::services::{test_support::setup_db, todo::TodoService};

    fn comment(content: &str) -> AddComment {
        AddComment {
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn comments_require_an_owned_todo() {
        let db = setup_db().await;
        let comments = CommentService::new(db.clone());
        let todo = TodoService::new(db, "uploads")
            .create_todo("alice", CreateTodo::from_title("review"))
            .await
            .unwrap();

        let err = comments
            .add_comment("bob", todo.id, comment("hijack"))
            .await
            .unwrap_err();
        assert!(matches!(err, TodoServiceError::NotFound(EntityKind::Todo)));

        let added = comments
            .add_comment("alice", todo.id, comment("lgtm"))
            .await
            .unwrap();
        let listed = comments.list_comments("alice", todo.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, added.id);
        assert_eq!(listed[0].content, "lgtm");

        let err = comments.list_comments("bob", todo.id).await.unwrap_err();
        assert!(matches!(err, TodoServiceError::NotFound(EntityKind::Todo)));
    }

    #[tokio::test]
    async fn update_and_delete_are_owner_scoped() {
        let db = setup_db().await;
        let comments = CommentService::new(db.clone());
        let todo = TodoService::new(db, "uploads")
            .create_todo("alice", CreateTodo::from_title("review"))
            .await
            .unwrap();
        let added = comments
            .add_comment("alice", todo.id, comment("first draft"))
            .await
            .unwrap();

        let err = comments
            .update_comment("bob", added.id, UpdateComment { content: "x".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, TodoServiceError::NotFound(EntityKind::Comment)));

        let updated = comments
            .update_comment(
                "alice",
                added.id,
                UpdateComment {
                    content: "final".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.content, "final");
        assert_eq!(updated.todo_id, todo.id);

        let err = comments.delete_comment("bob", added.id).await.unwrap_err();
        assert!(matches!(err, TodoServiceError::NotFound(EntityKind::Comment)));
        comments.delete_comment("alice", added.id).await.unwrap();
        assert!(comments.list_comments("alice", todo.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let comments = CommentService::new(setup_db().await);
        let err = comments
            .add_comment("alice", Uuid::new_v4(), comment("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, TodoServiceError::Validation(_)));
    }
}
