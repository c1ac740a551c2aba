use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::*;
use crate::services::catalog::GroupDirectory;
use crate::store::Datastore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedResourceView {
    #[serde(flatten)]
    pub resource: Resource,
    pub recommended_category: String,
    pub project_name: String,
    pub uploader: Option<UserSummary>,
}

#[derive(Clone)]
pub struct RecommendationReader {
    store: Datastore,
}

impl RecommendationReader {
    pub fn new(store: Datastore) -> Self {
        Self { store }
    }

    /// Keeps recommendation order. A user without recommendations gets an empty list.
    pub async fn list_recommended_resources(
        &self,
        user_id: Uuid,
    ) -> AppResult<Vec<RecommendedResourceView>> {
        let Some(recommendation) = self
            .store
            .recommendations()
            .get_active(Recommendation::natural_id(user_id))
            .await?
        else {
            return Ok(Vec::new());
        };

        let directory = GroupDirectory::new(self.store.groups().find_active(|_| true).await?);
        let mut projects: HashMap<Uuid, Option<Project>> = HashMap::new();
        let mut uploaders: HashMap<Uuid, Option<UserSummary>> = HashMap::new();
        let mut views = Vec::with_capacity(recommendation.resources.len());

        for entry in &recommendation.resources {
            let Some(resource) = self.store.resources().get_active(entry.resource_id).await? else {
                debug!("Recommended resource {} no longer exists", entry.resource_id);
                continue;
            };

            if !projects.contains_key(&resource.project_id) {
                let project = self.store.projects().get_active(resource.project_id).await?;
                projects.insert(resource.project_id, project);
            }
            let Some(Some(project)) = projects.get(&resource.project_id) else {
                continue;
            };
            if !directory.can_view(project, user_id) {
                continue;
            }
            let project_name = project.name.clone();

            if !uploaders.contains_key(&resource.uploader_id) {
                let uploader = self
                    .store
                    .users()
                    .get(resource.uploader_id)
                    .await?
                    .map(|user| UserSummary::from(&user));
                uploaders.insert(resource.uploader_id, uploader);
            }
            let uploader = uploaders.get(&resource.uploader_id).cloned().flatten();

            views.push(RecommendedResourceView {
                resource,
                recommended_category: entry.category.clone(),
                project_name,
                uploader,
            });
        }

        Ok(views)
    }
}
