use db::{
    DBService, TransactionTrait,
    models::{
        category::{Category, CategoryListQuery, CreateCategory, UpdateCategory},
        ownership::{self, EntityKind},
        pagination::{PageRequest, PaginatedResponse},
    },
};
use uuid::Uuid;

use super::error::{Result, TodoServiceError};

#[derive(Clone)]
pub struct CategoryService {
    db: DBService,
}

impl CategoryService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    #[tracing::instrument(name = "category.create", skip_all, fields(owner_id = %owner_id))]
    pub async fn create_category(&self, owner_id: &str, payload: CreateCategory) -> Result<Category> {
        payload.validate()?;
        let txn = self.db.pool.begin().await?;
        let category = Category::create(&txn, owner_id, &payload).await?;
        txn.commit().await?;

        tracing::info!(category_id = %category.id, owner_id, "category created");
        Ok(category)
    }

    #[tracing::instrument(name = "category.get", skip_all, fields(owner_id = %owner_id, category_id = %id))]
    pub async fn get_category(&self, owner_id: &str, id: Uuid) -> Result<Category> {
        Category::find_by_id(&self.db.pool, owner_id, id)
            .await?
            .ok_or(TodoServiceError::NotFound(EntityKind::Category))
    }

    #[tracing::instrument(name = "category.list", skip_all, fields(owner_id = %owner_id))]
    pub async fn list_categories(
        &self,
        owner_id: &str,
        query: CategoryListQuery,
    ) -> Result<PaginatedResponse<Category>> {
        let page = PageRequest::from_parts(query.page, query.limit)?;
        Ok(Category::list(&self.db.pool, owner_id, page, query.search.as_deref()).await?)
    }

    #[tracing::instrument(name = "category.update", skip_all, fields(owner_id = %owner_id, category_id = %id))]
    pub async fn update_category(
        &self,
        owner_id: &str,
        id: Uuid,
        payload: UpdateCategory,
    ) -> Result<Category> {
        payload.validate()?;
        let txn = self.db.pool.begin().await?;
        let record = ownership::resolve_category(&txn, id, owner_id).await?;
        let category = Category::update(&txn, record, &payload).await?;
        txn.commit().await?;

        tracing::info!(category_id = %category.id, owner_id, "category updated");
        Ok(category)
    }

    /// Todos in the category keep existing with no category.
    #[tracing::instrument(name = "category.delete", skip_all, fields(owner_id = %owner_id, category_id = %id))]
    pub async fn delete_category(&self, owner_id: &str, id: Uuid) -> Result<()> {
        let txn = self.db.pool.begin().await?;
        if Category::delete(&txn, owner_id, id).await? == 0 {
            return Err(TodoServiceError::NotFound(EntityKind::Category));
        }
        txn.commit().await?;

        tracing::info!(category_id = %id, owner_id, "category deleted");
        Ok(())
    }
}
