use std::{sync::Arc, time::Duration};

use db::{
    DBService, DbErr, TransactionTrait,
    entities::todo,
    models::{
        attachment::{Attachment, NewAttachment},
        blob_deletion::BlobDeletion,
        ownership::{self, EntityKind},
    },
    validation::{ValidationError, require_len},
};
use uuid::Uuid;

use super::{
    blob_store::{self, BlobStore},
    error::{Result, TodoServiceError},
};

const MAX_FILENAME_LEN: usize = 255;

/// Attachment workflows. Uploads go to the blob store before the record is
/// written; deletions only queue the object for the background worker.
#[derive(Clone)]
pub struct AttachmentService {
    db: DBService,
    store: Arc<dyn BlobStore>,
    bucket: String,
    presign_expiry: Duration,
    max_bytes: u64,
}

impl AttachmentService {
    pub fn new(
        db: DBService,
        store: Arc<dyn BlobStore>,
        bucket: impl Into<String>,
        presign_expiry: Duration,
        max_bytes: u64,
    ) -> Self {
        Self {
            db,
            store,
            bucket: bucket.into(),
            presign_expiry,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    fn validate_upload(&self, filename: &str, size: usize) -> std::result::Result<(), ValidationError> {
        require_len("file", filename, 1, MAX_FILENAME_LEN)?;
        if size == 0 {
            return Err(ValidationError::new("file", "must not be empty"));
        }
        if size as u64 > self.max_bytes {
            return Err(ValidationError::new(
                "file",
                format!("must be at most {} bytes", self.max_bytes),
            ));
        }
        Ok(())
    }

    #[tracing::instrument(name = "attachment.upload", skip_all, fields(owner_id = %owner_id, todo_id = %todo_id))]
    pub async fn upload_attachment(
        &self,
        owner_id: &str,
        todo_id: Uuid,
        filename: &str,
        body: Vec<u8>,
    ) -> Result<Attachment> {
        let filename = filename.trim();
        self.validate_upload(filename, body.len())?;
        let todo = ownership::resolve_todo(&self.db.pool, todo_id, owner_id).await?;

        let id = Uuid::new_v4();
        let download_key = blob_store::attachment_key(todo.uuid, id, filename);
        let mime_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let file_size = body.len() as i64;

        self.store
            .put(&self.bucket, &download_key, body, &mime_type)
            .await
            .inspect_err(|err| {
                tracing::error!(error = %err, key = %download_key, "attachment upload failed");
            })?;

        let record = NewAttachment {
            id,
            name: filename.to_string(),
            download_key,
            file_size,
            mime_type,
        };
        match self.insert_record(&todo, &record).await {
            Ok(attachment) => {
                tracing::info!(
                    attachment_id = %attachment.id,
                    todo_id = %todo_id,
                    owner_id,
                    key = %attachment.download_key,
                    "attachment uploaded"
                );
                Ok(attachment)
            }
            Err(err) => {
                tracing::error!(error = %err, key = %record.download_key, "attachment record insert failed");
                // The object is orphaned; hand it to the deletion worker.
                if let Err(queue_err) =
                    BlobDeletion::enqueue(&self.db.pool, &self.bucket, &record.download_key).await
                {
                    tracing::error!(
                        error = %queue_err,
                        key = %record.download_key,
                        "failed to queue orphaned attachment for deletion"
                    );
                }
                Err(TodoServiceError::Database(err))
            }
        }
    }

    async fn insert_record(
        &self,
        todo: &todo::Model,
        record: &NewAttachment,
    ) -> std::result::Result<Attachment, DbErr> {
        let txn = self.db.pool.begin().await?;
        let attachment = Attachment::create(&txn, todo, record).await?;
        txn.commit().await?;
        Ok(attachment)
    }

    /// Removes the record and queues the object for deletion. Returns as soon
    /// as the transaction commits.
    #[tracing::instrument(name = "attachment.delete", skip_all, fields(owner_id = %owner_id, todo_id = %todo_id, attachment_id = %attachment_id))]
    pub async fn delete_attachment(
        &self,
        owner_id: &str,
        todo_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<()> {
        let txn = self.db.pool.begin().await?;
        let todo = ownership::resolve_todo(&txn, todo_id, owner_id).await?;
        let record = Attachment::find_for_todo(&txn, &todo, attachment_id)
            .await?
            .ok_or(TodoServiceError::NotFound(EntityKind::Attachment))?;
        let key = record.download_key.clone();
        if Attachment::delete(&txn, &todo, record, &self.bucket).await? == 0 {
            return Err(TodoServiceError::NotFound(EntityKind::Attachment));
        }
        txn.commit().await?;

        tracing::info!(
            attachment_id = %attachment_id,
            todo_id = %todo_id,
            owner_id,
            key = %key,
            "attachment deleted, object queued for removal"
        );
        Ok(())
    }

    #[tracing::instrument(name = "attachment.presign", skip_all, fields(owner_id = %owner_id, todo_id = %todo_id, attachment_id = %attachment_id))]
    pub async fn presigned_url(
        &self,
        owner_id: &str,
        todo_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<String> {
        let todo = ownership::resolve_todo(&self.db.pool, todo_id, owner_id).await?;
        let record = Attachment::find_for_todo(&self.db.pool, &todo, attachment_id)
            .await?
            .ok_or(TodoServiceError::NotFound(EntityKind::Attachment))?;

        let url = self
            .store
            .presigned_url(&self.bucket, &record.download_key, self.presign_expiry)
            .await
            .inspect_err(|err| {
                tracing::error!(error = %err, key = %record.download_key, "failed to presign attachment");
            })?;
        Ok(url)
    }
}
