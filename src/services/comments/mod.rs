use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::catalog::{Actor, CatalogService};
use crate::services::feed::FeedService;
use crate::store::Datastore;
use crate::utils::validation::validate_comment;

#[derive(Clone)]
pub struct CommentService {
    store: Datastore,
    catalog: CatalogService,
    feed: FeedService,
}

impl CommentService {
    pub fn new(store: Datastore, catalog: CatalogService, feed: FeedService) -> Self {
        Self {
            store,
            catalog,
            feed,
        }
    }

    pub async fn create_comment(
        &self,
        actor: &Actor,
        request: &CreateCommentRequest,
    ) -> AppResult<Comment> {
        validate_comment(&request.message)?;
        let project = self
            .catalog
            .get_project(actor.user_id, request.project_id)
            .await?;

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            message: request.message.trim().to_string(),
            project_id: project.id,
            created_by: actor.user_id,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.store.comments().insert(&comment).await?;

        self.feed
            .announce(
                actor.user_id,
                FeedSubject::Comment,
                FeedActivity::Create,
                project.id,
                format!("{} left a comment in project: {}", actor.name, project.name),
            )
            .await;

        info!("Comment {} added to project {}", comment.id, project.id);
        Ok(comment)
    }

    pub async fn list_comments(&self, user_id: Uuid, project_id: Uuid) -> AppResult<Vec<Comment>> {
        self.catalog.get_project(user_id, project_id).await?;
        let mut comments = self
            .store
            .comments()
            .find_active(|comment| comment.project_id == project_id)
            .await?;
        comments.reverse();
        Ok(comments)
    }

    pub async fn get_comment(&self, user_id: Uuid, id: Uuid) -> AppResult<Comment> {
        let comment = self
            .store
            .comments()
            .get_active(id)
            .await?
            .ok_or_else(|| AppError::not_found("No comment found!"))?;

        self.catalog.get_project(user_id, comment.project_id).await?;
        Ok(comment)
    }

    async fn authored(&self, actor: &Actor, id: Uuid) -> AppResult<Comment> {
        let comment = self.get_comment(actor.user_id, id).await?;
        if !actor.may_modify(comment.created_by) {
            return Err(AppError::Forbidden(
                "Only the author can change this comment".to_string(),
            ));
        }
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        actor: &Actor,
        id: Uuid,
        request: &UpdateCommentRequest,
    ) -> AppResult<Comment> {
        validate_comment(&request.message)?;
        let mut comment = self.authored(actor, id).await?;

        comment.message = request.message.trim().to_string();
        comment.updated_at = Utc::now();
        self.store.comments().replace(&comment).await?;
        Ok(comment)
    }

    pub async fn archive_comment(&self, actor: &Actor, id: Uuid) -> AppResult<Comment> {
        let mut comment = self.authored(actor, id).await?;

        comment.status = RecordStatus::Archived;
        comment.updated_at = Utc::now();
        self.store.comments().replace(&comment).await?;
        info!("Archived comment {}", id);
        Ok(comment)
    }
}
