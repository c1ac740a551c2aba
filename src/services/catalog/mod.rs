use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::feed::FeedService;
use crate::services::outbound::{EmailMessage, OutboundQueue};
use crate::services::similarity::SimilarityEngine;
use crate::store::Datastore;
use crate::utils::contains_ignore_case;
use crate::utils::validation::{
    validate_group, validate_group_update, validate_project, validate_project_update,
    validate_resource, validate_resource_update,
};

pub const OWNER_MEMBER_TYPE: &str = "owner";
pub const MEMBER_TYPE: &str = "member";

pub struct GroupDirectory {
    groups: HashMap<Uuid, Group>,
}

impl GroupDirectory {
    pub fn new(groups: Vec<Group>) -> Self {
        Self {
            groups: groups.into_iter().map(|g| (g.id, g)).collect(),
        }
    }

    pub async fn load(store: &Datastore) -> AppResult<Self> {
        Ok(Self::new(store.groups().find_active(|_| true).await?))
    }

    /// A project without groups is open to everyone; otherwise the user must belong
    /// to at least one of its groups.
    pub fn can_view(&self, project: &Project, user_id: Uuid) -> bool {
        project.available_groups.is_empty()
            || project.available_groups.iter().any(|group_id| {
                self.groups
                    .get(group_id)
                    .map_or(false, |group| group.has_member(user_id))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub resources: Vec<Resource>,
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub name: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            is_admin: false,
        }
    }

    pub fn may_modify(&self, owner: Uuid) -> bool {
        self.is_admin || self.user_id == owner
    }
}

#[derive(Clone)]
pub struct CatalogService {
    store: Datastore,
    engine: Arc<dyn SimilarityEngine>,
    outbound: OutboundQueue,
    feed: FeedService,
    client_url: Option<String>,
}

impl CatalogService {
    pub fn new(
        store: Datastore,
        engine: Arc<dyn SimilarityEngine>,
        outbound: OutboundQueue,
        feed: FeedService,
        client_url: Option<String>,
    ) -> Self {
        Self {
            store,
            engine,
            outbound,
            feed,
            client_url,
        }
    }

    pub async fn group_directory(&self) -> AppResult<GroupDirectory> {
        GroupDirectory::load(&self.store).await
    }

    fn invite(&self, user: &User, group: &Group, member_type: &str) {
        self.outbound.enqueue(EmailMessage::group_invitation(
            &user.email,
            &group.name,
            member_type,
            self.client_url.as_deref(),
        ));
    }

    pub async fn create_group(&self, actor: &Actor, request: &CreateGroupRequest) -> AppResult<Group> {
        validate_group(request)?;

        let now = Utc::now();
        let mut members = vec![GroupMember {
            user_id: actor.user_id,
            member_type: OWNER_MEMBER_TYPE.to_string(),
            joined_at: now,
        }];

        let mut seen = HashSet::from([actor.user_id]);
        let member_ids: Vec<Uuid> = request
            .members
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let users = self.store.users();
        let lookups = try_join_all(member_ids.iter().map(|&id| users.get_active(id))).await?;

        let mut invited = Vec::with_capacity(member_ids.len());
        for (member_id, user) in member_ids.into_iter().zip(lookups) {
            let user = user
                .ok_or_else(|| AppError::not_found(format!("User {} does not exist", member_id)))?;
            members.push(GroupMember {
                user_id: member_id,
                member_type: MEMBER_TYPE.to_string(),
                joined_at: now,
            });
            invited.push(user);
        }

        let group = Group {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            description: request.description.clone(),
            members,
            created_by: actor.user_id,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.store.groups().insert(&group).await?;

        for user in &invited {
            self.invite(user, &group, MEMBER_TYPE);
        }
        self.feed
            .announce(
                actor.user_id,
                FeedSubject::Group,
                FeedActivity::Create,
                group.id,
                format!("{} created a group: {}", actor.name, group.name),
            )
            .await;

        info!("Created group {} with {} members", group.id, group.members.len());
        Ok(group)
    }

    pub async fn list_groups(&self, user_id: Uuid) -> AppResult<Vec<Group>> {
        self.store
            .groups()
            .find_active(|group| group.has_member(user_id))
            .await
    }

    pub async fn get_group(&self, user_id: Uuid, id: Uuid) -> AppResult<Group> {
        let group = self
            .store
            .groups()
            .get_active(id)
            .await?
            .ok_or_else(|| AppError::not_found("No group found!"))?;

        if !group.has_member(user_id) {
            return Err(AppError::Forbidden(
                "You do not have access to this group".to_string(),
            ));
        }
        Ok(group)
    }

    async fn owned_group(&self, actor: &Actor, id: Uuid) -> AppResult<Group> {
        let group = self.get_group(actor.user_id, id).await?;
        if !actor.may_modify(group.created_by) {
            return Err(AppError::Forbidden(
                "Only the group owner can change this group".to_string(),
            ));
        }
        Ok(group)
    }

    pub async fn update_group(
        &self,
        actor: &Actor,
        id: Uuid,
        request: &UpdateGroupRequest,
    ) -> AppResult<Group> {
        validate_group_update(request)?;
        let mut group = self.owned_group(actor, id).await?;
        let now = Utc::now();

        if let Some(name) = &request.name {
            group.name = name.trim().to_string();
        }
        if let Some(description) = &request.description {
            group.description = description.clone();
        }

        let mut added = None;
        if let Some(new_member) = &request.new_member {
            let user = self
                .store
                .users()
                .get_active(User::natural_id(&new_member.email))
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!("No user registered as {}", new_member.email))
                })?;
            let member_type = new_member
                .member_type
                .clone()
                .unwrap_or_else(|| MEMBER_TYPE.to_string());

            if !group.has_member(user.id) {
                group.members.push(GroupMember {
                    user_id: user.id,
                    member_type: member_type.clone(),
                    joined_at: now,
                });
                added = Some((user, member_type));
            }
        }

        let mut removed = false;
        if let Some(member_id) = request.remove_member {
            if member_id == group.created_by {
                return Err(AppError::validation("The group owner cannot be removed"));
            }
            let before = group.members.len();
            group.members.retain(|m| m.user_id != member_id);
            if group.members.len() == before {
                return Err(AppError::not_found(format!(
                    "User {} is not a member of this group",
                    member_id
                )));
            }
            removed = true;
        }

        group.updated_at = now;
        self.store.groups().replace(&group).await?;

        if let Some((user, member_type)) = &added {
            self.invite(user, &group, member_type);
            self.feed
                .announce(
                    actor.user_id,
                    FeedSubject::Group,
                    FeedActivity::Add,
                    group.id,
                    format!("{} added a member to group: {}", actor.name, group.name),
                )
                .await;
        }
        if removed {
            self.feed
                .announce(
                    actor.user_id,
                    FeedSubject::Group,
                    FeedActivity::Remove,
                    group.id,
                    format!("{} removed a member from group: {}", actor.name, group.name),
                )
                .await;
        }
        if added.is_none() && !removed {
            self.feed
                .announce(
                    actor.user_id,
                    FeedSubject::Group,
                    FeedActivity::Update,
                    group.id,
                    format!("{} updated group details: {}", actor.name, group.name),
                )
                .await;
        }

        info!("Updated group {}", group.id);
        Ok(group)
    }

    pub async fn archive_group(&self, actor: &Actor, id: Uuid) -> AppResult<Group> {
        let mut group = self.owned_group(actor, id).await?;

        group.status = RecordStatus::Archived;
        group.updated_at = Utc::now();
        self.store.groups().replace(&group).await?;

        self.feed
            .announce(
                actor.user_id,
                FeedSubject::Group,
                FeedActivity::Delete,
                group.id,
                format!("{} deleted group: {}", actor.name, group.name),
            )
            .await;

        info!("Archived group {}", id);
        Ok(group)
    }

    async fn require_groups(&self, groups: &[Uuid]) -> AppResult<()> {
        for &group_id in groups {
            if self.store.groups().get_active(group_id).await?.is_none() {
                return Err(AppError::not_found(format!(
                    "Group {} does not exist",
                    group_id
                )));
            }
        }
        Ok(())
    }

    pub async fn create_project(
        &self,
        actor: &Actor,
        request: &CreateProjectRequest,
    ) -> AppResult<Project> {
        validate_project(request)?;
        self.require_groups(&request.groups).await?;

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            description: request.description.clone(),
            available_groups: request.groups.clone(),
            created_by: actor.user_id,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.store.projects().insert(&project).await?;

        self.feed
            .announce(
                actor.user_id,
                FeedSubject::Project,
                FeedActivity::Create,
                project.id,
                format!("{} created new project: {}", actor.name, project.name),
            )
            .await;

        info!("Created project {}", project.id);
        Ok(project)
    }

    pub async fn list_projects(&self, user_id: Uuid) -> AppResult<Vec<Project>> {
        let directory = self.group_directory().await?;
        let mut projects = self
            .store
            .projects()
            .find_active(|project| directory.can_view(project, user_id))
            .await?;
        projects.reverse();
        Ok(projects)
    }

    pub async fn get_project(&self, user_id: Uuid, id: Uuid) -> AppResult<Project> {
        let project = self
            .store
            .projects()
            .get_active(id)
            .await?
            .ok_or_else(|| AppError::not_found("No project found!"))?;

        if !self.group_directory().await?.can_view(&project, user_id) {
            return Err(AppError::Forbidden(
                "You do not have access to this project".to_string(),
            ));
        }
        Ok(project)
    }

    async fn owned_project(&self, actor: &Actor, id: Uuid) -> AppResult<Project> {
        let project = self.get_project(actor.user_id, id).await?;
        if !actor.may_modify(project.created_by) {
            return Err(AppError::Forbidden(
                "Only the creator can change this project".to_string(),
            ));
        }
        Ok(project)
    }

    pub async fn update_project(
        &self,
        actor: &Actor,
        id: Uuid,
        request: &UpdateProjectRequest,
    ) -> AppResult<Project> {
        validate_project_update(request)?;
        let mut project = self.owned_project(actor, id).await?;

        if let Some(name) = &request.name {
            project.name = name.trim().to_string();
        }
        if let Some(description) = &request.description {
            project.description = description.clone();
        }
        if let Some(groups) = &request.groups {
            self.require_groups(groups).await?;
            project.available_groups = groups.clone();
        }

        project.updated_at = Utc::now();
        self.store.projects().replace(&project).await?;

        self.feed
            .announce(
                actor.user_id,
                FeedSubject::Project,
                FeedActivity::Update,
                project.id,
                format!("{} updated the project: {}", actor.name, project.name),
            )
            .await;

        info!("Updated project {}", project.id);
        Ok(project)
    }

    pub async fn archive_project(&self, actor: &Actor, id: Uuid) -> AppResult<Project> {
        let mut project = self.owned_project(actor, id).await?;

        project.status = RecordStatus::Archived;
        project.updated_at = Utc::now();
        self.store.projects().replace(&project).await?;

        self.feed
            .announce(
                actor.user_id,
                FeedSubject::Project,
                FeedActivity::Delete,
                project.id,
                format!("{} deleted project: {}", actor.name, project.name),
            )
            .await;

        info!("Archived project {}", id);
        Ok(project)
    }

    async fn classify(
        &self,
        resource_type: ResourceType,
        title: &str,
        description: &str,
    ) -> Option<Classification> {
        if resource_type == ResourceType::Folder {
            return None;
        }

        match self.engine.classify(title, description).await {
            Ok(classification) => Some(classification),
            Err(e) => {
                warn!("Classifying resource {:?} failed: {}", title, e);
                None
            }
        }
    }

    /// Folders are never classified. When classification fails the resource is still
    /// created, untagged.
    pub async fn create_resource(
        &self,
        uploader: Uuid,
        request: &CreateResourceRequest,
    ) -> AppResult<Resource> {
        validate_resource(request)?;
        self.get_project(uploader, request.project_id).await?;

        let mut category = request.category.clone();
        let mut keywords = Vec::new();

        if let Some(classification) = self
            .classify(request.resource_type, &request.title, &request.description)
            .await
        {
            if category.is_none() {
                category = Some(classification.category);
            }
            keywords = classification.keywords;
        }

        let now = Utc::now();
        let resource = Resource {
            id: Uuid::new_v4(),
            resource_type: request.resource_type,
            title: request.title.trim().to_string(),
            description: request.description.clone(),
            category,
            keywords,
            uploader_id: uploader,
            project_id: request.project_id,
            project_path: request.project_path.clone(),
            versions: Vec::new(),
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.store.resources().insert(&resource).await?;

        info!(
            "Created resource {} in project {} (category {:?})",
            resource.id, resource.project_id, resource.category
        );
        Ok(resource)
    }

    pub async fn list_resources(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        project_path: Option<&str>,
    ) -> AppResult<Vec<Resource>> {
        self.get_project(user_id, project_id).await?;
        self.store
            .resources()
            .find_active(|resource| {
                resource.project_id == project_id
                    && project_path.map_or(true, |path| resource.project_path == path)
            })
            .await
    }

    pub async fn get_resource(&self, user_id: Uuid, id: Uuid) -> AppResult<Resource> {
        let resource = self
            .store
            .resources()
            .get_active(id)
            .await?
            .ok_or_else(|| AppError::not_found("No resource found!"))?;

        self.get_project(user_id, resource.project_id).await?;
        Ok(resource)
    }

    /// Any user who can see the project may edit its resources. Each effective edit
    /// appends the previous state to `versions`; changed text refreshes the keywords.
    pub async fn update_resource(
        &self,
        actor: &Actor,
        id: Uuid,
        request: &UpdateResourceRequest,
    ) -> AppResult<Resource> {
        validate_resource_update(request)?;
        let mut resource = self.get_resource(actor.user_id, id).await?;

        let title = request.title.as_deref().map(str::trim);
        let mut changed = Vec::new();
        if title.map_or(false, |t| t != resource.title) {
            changed.push("title");
        }
        if request
            .description
            .as_ref()
            .map_or(false, |d| *d != resource.description)
        {
            changed.push("description");
        }
        if request.category.is_some() && request.category != resource.category {
            changed.push("category");
        }
        if request
            .project_path
            .as_ref()
            .map_or(false, |p| *p != resource.project_path)
        {
            changed.push("project_path");
        }

        if changed.is_empty() {
            return Ok(resource);
        }

        let now = Utc::now();
        resource.versions.push(ResourceVersion {
            title: resource.title.clone(),
            description: resource.description.clone(),
            category: resource.category.clone(),
            updated_by: actor.user_id,
            changed_fields: changed.iter().map(|f| f.to_string()).collect(),
            status: RecordStatus::Active,
            recorded_at: now,
        });

        if let Some(title) = title {
            resource.title = title.to_string();
        }
        if let Some(description) = &request.description {
            resource.description = description.clone();
        }
        if let Some(category) = &request.category {
            resource.category = Some(category.clone());
        }
        if let Some(path) = &request.project_path {
            resource.project_path = path.clone();
        }

        if changed.contains(&"title") || changed.contains(&"description") {
            if let Some(classification) = self
                .classify(resource.resource_type, &resource.title, &resource.description)
                .await
            {
                resource.keywords = classification.keywords;
            }
        }

        resource.updated_at = now;
        self.store.resources().replace(&resource).await?;

        info!(
            "Updated resource {} ({}), version {}",
            resource.id,
            changed.join(", "),
            resource.versions.len()
        );
        Ok(resource)
    }

    pub async fn list_resource_versions(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> AppResult<Vec<ResourceVersion>> {
        Ok(self.get_resource(user_id, id).await?.versions)
    }

    pub async fn archive_resource(&self, actor: &Actor, id: Uuid) -> AppResult<Resource> {
        let mut resource = self.get_resource(actor.user_id, id).await?;
        if !actor.may_modify(resource.uploader_id) {
            return Err(AppError::Forbidden(
                "Only the uploader can delete this resource".to_string(),
            ));
        }

        resource.status = RecordStatus::Archived;
        resource.updated_at = Utc::now();
        self.store.resources().replace(&resource).await?;
        info!("Archived resource {}", id);
        Ok(resource)
    }

    pub async fn search(&self, user_id: Uuid, query: &str) -> AppResult<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("Search query is required"));
        }

        let directory = self.group_directory().await?;
        let visible: Vec<Project> = self
            .store
            .projects()
            .find_active(|project| directory.can_view(project, user_id))
            .await?;
        let visible_ids: HashSet<Uuid> = visible.iter().map(|p| p.id).collect();

        let resources = self
            .store
            .resources()
            .find_active(|resource| {
                visible_ids.contains(&resource.project_id)
                    && (contains_ignore_case(&resource.title, query)
                        || contains_ignore_case(&resource.description, query))
            })
            .await?;

        let mut projects: Vec<Project> = visible
            .into_iter()
            .filter(|project| {
                contains_ignore_case(&project.name, query)
                    || contains_ignore_case(&project.description, query)
            })
            .collect();
        projects.reverse();

        Ok(SearchResults {
            resources,
            projects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::outbound::LogMailer;
    use crate::services::similarity::LocalSimilarityEngine;

    fn group_with(members: &[Uuid]) -> Group {
        let now = Utc::now();
        Group {
            id: Uuid::new_v4(),
            name: "g".to_string(),
            description: String::new(),
            members: members
                .iter()
                .map(|&user_id| GroupMember {
                    user_id,
                    member_type: MEMBER_TYPE.to_string(),
                    joined_at: now,
                })
                .collect(),
            created_by: members[0],
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn project_for(groups: Vec<Uuid>) -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            name: "p".to_string(),
            description: String::new(),
            available_groups: groups,
            created_by: Uuid::new_v4(),
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_visibility_rule() {
        let (member, outsider) = (Uuid::new_v4(), Uuid::new_v4());
        let group = group_with(&[member]);
        let directory = GroupDirectory::new(vec![group.clone()]);

        let open = project_for(vec![]);
        assert!(directory.can_view(&open, member));
        assert!(directory.can_view(&open, outsider));

        let restricted = project_for(vec![group.id]);
        assert!(directory.can_view(&restricted, member));
        assert!(!directory.can_view(&restricted, outsider));

        let dangling = project_for(vec![Uuid::new_v4()]);
        assert!(!directory.can_view(&dangling, member));
    }

    fn catalog_over(store: Datastore) -> CatalogService {
        let config = Config::default();
        let (outbound, _worker) = OutboundQueue::start(Arc::new(LogMailer), &config.mail);
        CatalogService::new(
            store.clone(),
            Arc::new(LocalSimilarityEngine::new(3)),
            outbound,
            FeedService::new(store),
            None,
        )
    }

    fn catalog() -> CatalogService {
        catalog_over(Datastore::in_memory())
    }

    async fn seed_user(store: &Datastore, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: User::natural_id(email),
            email: email.to_string(),
            password_hash: String::new(),
            first_name: "Test".to_string(),
            last_name: String::new(),
            role: UserRole::User,
            research_interests: vec![],
            favourite_resources: vec![],
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        };
        store.users().insert(&user).await.unwrap();
        user
    }

    fn project_request(name: &str, groups: Vec<Uuid>) -> CreateProjectRequest {
        CreateProjectRequest {
            name: name.to_string(),
            description: String::new(),
            groups,
        }
    }

    fn lab_request() -> CreateGroupRequest {
        CreateGroupRequest {
            name: "Lab".to_string(),
            description: String::new(),
            members: vec![],
        }
    }

    #[tokio::test]
    async fn test_resources_are_classified_unless_folders() {
        let catalog = catalog();
        let user = Actor::new(Uuid::new_v4(), "Ada");
        let project = catalog
            .create_project(&user, &project_request("Vision", vec![]))
            .await
            .unwrap();

        let paper = catalog
            .create_resource(
                user.user_id,
                &CreateResourceRequest {
                    title: "Diffusion models".to_string(),
                    description: "Diffusion for image synthesis".to_string(),
                    resource_type: ResourceType::ResearchPaper,
                    project_id: project.id,
                    project_path: "/".to_string(),
                    category: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(paper.category.as_deref(), Some("uncategorized"));
        assert_eq!(paper.keywords[0], "diffusion");

        let folder = catalog
            .create_resource(
                user.user_id,
                &CreateResourceRequest {
                    title: "Drafts".to_string(),
                    description: String::new(),
                    resource_type: ResourceType::Folder,
                    project_id: project.id,
                    project_path: "/".to_string(),
                    category: None,
                },
            )
            .await
            .unwrap();
        assert!(folder.category.is_none());
        assert!(folder.keywords.is_empty());
    }

    #[tokio::test]
    async fn test_restricted_project_hidden_from_outsiders() {
        let catalog = catalog();
        let owner = Actor::new(Uuid::new_v4(), "Owner");
        let outsider = Uuid::new_v4();

        let group = catalog.create_group(&owner, &lab_request()).await.unwrap();
        let project = catalog
            .create_project(&owner, &project_request("Secret lab notes", vec![group.id]))
            .await
            .unwrap();

        assert_eq!(catalog.list_projects(owner.user_id).await.unwrap().len(), 1);
        assert!(catalog.list_projects(outsider).await.unwrap().is_empty());
        assert!(matches!(
            catalog.get_project(outsider, project.id).await,
            Err(AppError::Forbidden(_))
        ));

        let found = catalog.search(outsider, "secret").await.unwrap();
        assert!(found.projects.is_empty());
        let found = catalog.search(owner.user_id, "SECRET").await.unwrap();
        assert_eq!(found.projects.len(), 1);
    }

    #[tokio::test]
    async fn test_group_members_must_exist() {
        let catalog = catalog();
        let result = catalog
            .create_group(
                &Actor::new(Uuid::new_v4(), "Owner"),
                &CreateGroupRequest {
                    name: "Lab".to_string(),
                    description: String::new(),
                    members: vec![Uuid::new_v4()],
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_group_membership_updates() {
        let store = Datastore::in_memory();
        let catalog = catalog_over(store.clone());
        let owner = Actor::new(Uuid::new_v4(), "Owner");
        let invitee = seed_user(&store, "invitee@b.org").await;
        let group = catalog.create_group(&owner, &lab_request()).await.unwrap();

        let added = catalog
            .update_group(
                &owner,
                group.id,
                &UpdateGroupRequest {
                    new_member: Some(NewGroupMember {
                        email: "Invitee@B.org".to_string(),
                        member_type: Some("reviewer".to_string()),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(added.has_member(invitee.id));
        assert_eq!(added.members[1].member_type, "reviewer");

        let as_member = Actor::new(invitee.id, "Invitee");
        assert!(matches!(
            catalog
                .update_group(&as_member, group.id, &UpdateGroupRequest::default())
                .await,
            Err(AppError::Forbidden(_))
        ));

        let owner_removal = UpdateGroupRequest {
            remove_member: Some(owner.user_id),
            ..Default::default()
        };
        assert!(matches!(
            catalog.update_group(&owner, group.id, &owner_removal).await,
            Err(AppError::Validation(_))
        ));

        let removed = catalog
            .update_group(
                &owner,
                group.id,
                &UpdateGroupRequest {
                    remove_member: Some(invitee.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!removed.has_member(invitee.id));

        let unknown = UpdateGroupRequest {
            new_member: Some(NewGroupMember {
                email: "nobody@b.org".to_string(),
                member_type: None,
            }),
            ..Default::default()
        };
        assert!(matches!(
            catalog.update_group(&owner, group.id, &unknown).await,
            Err(AppError::NotFound(_))
        ));

        let activities: Vec<FeedActivity> = store
            .feeds()
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.activity)
            .collect();
        assert_eq!(
            activities,
            vec![FeedActivity::Create, FeedActivity::Add, FeedActivity::Remove]
        );
    }

    #[tokio::test]
    async fn test_archived_group_no_longer_grants_visibility() {
        let store = Datastore::in_memory();
        let catalog = catalog_over(store.clone());
        let owner = Actor::new(Uuid::new_v4(), "Owner");
        let group = catalog.create_group(&owner, &lab_request()).await.unwrap();
        let project = catalog
            .create_project(&owner, &project_request("Notes", vec![group.id]))
            .await
            .unwrap();

        catalog.archive_group(&owner, group.id).await.unwrap();

        assert!(matches!(
            catalog.get_group(owner.user_id, group.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            catalog.get_project(owner.user_id, project.id).await,
            Err(AppError::Forbidden(_))
        ));

        let last = store.feeds().all().await.unwrap().pop().unwrap();
        assert_eq!(last.activity, FeedActivity::Delete);
        assert_eq!(last.recipients, vec![owner.user_id]);
    }

    #[tokio::test]
    async fn test_project_update_requires_creator() {
        let catalog = catalog();
        let creator = Actor::new(Uuid::new_v4(), "Creator");
        let project = catalog
            .create_project(&creator, &project_request("Draft", vec![]))
            .await
            .unwrap();

        let rename = UpdateProjectRequest {
            name: Some("Final".to_string()),
            ..Default::default()
        };
        let stranger = Actor::new(Uuid::new_v4(), "Stranger");
        assert!(matches!(
            catalog.update_project(&stranger, project.id, &rename).await,
            Err(AppError::Forbidden(_))
        ));

        let admin = Actor {
            is_admin: true,
            ..stranger
        };
        let updated = catalog.update_project(&admin, project.id, &rename).await.unwrap();
        assert_eq!(updated.name, "Final");

        let bad_groups = UpdateProjectRequest {
            groups: Some(vec![Uuid::new_v4()]),
            ..Default::default()
        };
        assert!(matches!(
            catalog.update_project(&creator, project.id, &bad_groups).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resource_updates_keep_versions() {
        let catalog = catalog();
        let author = Actor::new(Uuid::new_v4(), "Author");
        let editor = Actor::new(Uuid::new_v4(), "Editor");
        let project = catalog
            .create_project(&author, &project_request("Shared", vec![]))
            .await
            .unwrap();
        let resource = catalog
            .create_resource(
                author.user_id,
                &CreateResourceRequest {
                    title: "Graph kernels".to_string(),
                    description: "Kernels on graphs".to_string(),
                    resource_type: ResourceType::ResearchPaper,
                    project_id: project.id,
                    project_path: "/".to_string(),
                    category: Some("cs.LG".to_string()),
                },
            )
            .await
            .unwrap();

        let updated = catalog
            .update_resource(
                &editor,
                resource.id,
                &UpdateResourceRequest {
                    title: Some("Message passing networks".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Message passing networks");
        assert_eq!(updated.category.as_deref(), Some("cs.LG"));
        assert_eq!(updated.keywords[0], "message");
        assert_eq!(updated.versions.len(), 1);
        assert_eq!(updated.versions[0].title, "Graph kernels");
        assert_eq!(updated.versions[0].updated_by, editor.user_id);
        assert_eq!(updated.versions[0].changed_fields, vec!["title".to_string()]);

        let unchanged = catalog
            .update_resource(
                &editor,
                resource.id,
                &UpdateResourceRequest {
                    title: Some("Message passing networks".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(unchanged.versions.len(), 1);

        let versions = catalog
            .list_resource_versions(author.user_id, resource.id)
            .await
            .unwrap();
        assert_eq!(versions.len(), 1);
    }
}
