use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::store::Document;

/// Namespace for ids derived from natural keys.
const NATURAL_KEY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b0e_9d4a_4c1e_8a57_3e2f_1d0c_b9a8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub research_interests: Vec<String>,
    #[serde(default)]
    pub favourite_resources: Vec<Uuid>,
    #[serde(default)]
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Stable id for an account, derived from its normalized email.
    pub fn natural_id(email: &str) -> Uuid {
        Uuid::new_v5(
            &NATURAL_KEY_NAMESPACE,
            format!("user:{}", normalize_email(email)).as_bytes(),
        )
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A user as exposed over the API, without credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: Uuid,
    pub member_type: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: Vec<GroupMember>,
    pub created_by: Uuid,
    #[serde(default)]
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Groups allowed to see the project; empty means unrestricted.
    #[serde(default)]
    pub available_groups: Vec<Uuid>,
    pub created_by: Uuid,
    #[serde(default)]
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "research paper")]
    ResearchPaper,
    #[serde(rename = "journal")]
    Journal,
    #[default]
    #[serde(rename = "other")]
    Other,
    #[serde(rename = "folder")]
    Folder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    #[serde(default)]
    pub resource_type: ResourceType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub uploader_id: Uuid,
    pub project_id: Uuid,
    pub project_path: String,
    /// Earlier states, oldest first.
    #[serde(default)]
    pub versions: Vec<ResourceVersion>,
    #[serde(default)]
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The state of a resource before one update, and who made that update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceVersion {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub updated_by: Uuid,
    pub changed_fields: Vec<String>,
    #[serde(default)]
    pub status: RecordStatus,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub message: String,
    pub project_id: Uuid,
    pub created_by: Uuid,
    #[serde(default)]
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSubject {
    Comment,
    Project,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedActivity {
    Create,
    Update,
    Delete,
    Add,
    Remove,
}

/// A line in the activity feed, addressed to the members around its subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: Uuid,
    pub message: String,
    pub subject: FeedSubject,
    pub activity: FeedActivity,
    pub subject_id: Uuid,
    pub created_by: Uuid,
    #[serde(default)]
    pub recipients: Vec<Uuid>,
    #[serde(default)]
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedEntry {
    pub fn concerns(&self, user_id: Uuid) -> bool {
        self.created_by == user_id || self.recipients.contains(&user_id)
    }
}

/// One implicit-feedback record per (user, resource) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub resource_category: String,
    pub project_id: Option<Uuid>,
    pub reason: String,
    pub rating: f64,
    #[serde(default)]
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityEvent {
    /// Stable id for the (user, resource) natural key.
    pub fn natural_id(user_id: Uuid, resource_id: Uuid) -> Uuid {
        Uuid::new_v5(
            &NATURAL_KEY_NAMESPACE,
            format!("activity:{}:{}", user_id, resource_id).as_bytes(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedResource {
    pub resource_id: Uuid,
    pub category: String,
}

/// The latest recommendation list computed for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resources: Vec<RecommendedResource>,
    #[serde(default)]
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn natural_id(user_id: Uuid) -> Uuid {
        Uuid::new_v5(
            &NATURAL_KEY_NAMESPACE,
            format!("recommendation:{}", user_id).as_bytes(),
        )
    }

    pub fn new(user_id: Uuid, resources: Vec<RecommendedResource>) -> Self {
        let now = Utc::now();
        Self {
            id: Self::natural_id(user_id),
            user_id,
            resources,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Columnar interaction rows for one category, in the shape the matrix builder expects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryRows {
    #[serde(rename = "user_id")]
    pub user_ids: Vec<Uuid>,
    #[serde(rename = "item_id")]
    pub item_ids: Vec<Uuid>,
    #[serde(rename = "rating")]
    pub ratings: Vec<f64>,
    #[serde(rename = "category")]
    pub categories: Vec<String>,
}

impl CategoryRows {
    pub fn push(&mut self, user_id: Uuid, item_id: Uuid, rating: f64, category: &str) {
        self.user_ids.push(user_id);
        self.item_ids.push(item_id);
        self.ratings.push(rating);
        self.categories.push(category.to_string());
    }

    pub fn len(&self) -> usize {
        self.user_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty()
    }
}

/// User-item ratings for one category, column-major: item id -> user id -> rating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMatrix(pub BTreeMap<String, BTreeMap<String, f64>>);

impl CategoryMatrix {
    pub fn items(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn rating(&self, user_id: &str, item_id: &str) -> Option<f64> {
        self.0.get(item_id).and_then(|col| col.get(user_id)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Item-by-item similarity for one category: item id -> item id -> score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySimilarity(pub BTreeMap<String, BTreeMap<String, f64>>);

impl CategorySimilarity {
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        self.0.get(a).and_then(|row| row.get(b)).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub keywords: Vec<String>,
}

/// Interaction signals reported by a client for one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordActivityRequest {
    #[serde(alias = "activity_to_resource_id")]
    pub resource_id: Uuid,
    #[serde(alias = "activity_to_resource_category")]
    pub resource_category: String,
    #[serde(default, alias = "activity_to_project_id")]
    pub project_id: Option<Uuid>,
    /// Seconds spent on the resource.
    #[serde(default)]
    pub duration: f64,
    #[serde(default, alias = "is_fav")]
    pub is_favourite: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPatch {
    pub resource_category: Option<String>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<RecordStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub research_interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Users to add besides the creator.
    #[serde(default)]
    pub members: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "project_groups")]
    pub groups: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResourceRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resource_type: ResourceType,
    pub project_id: Uuid,
    pub project_path: String,
    /// Explicit category; when absent the classifier decides.
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGroupMember {
    #[serde(alias = "group_member_email")]
    pub email: String,
    #[serde(default, alias = "group_member_type")]
    pub member_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub new_member: Option<NewGroupMember>,
    #[serde(default)]
    pub remove_member: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "project_groups")]
    pub groups: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateResourceRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(alias = "comment_project_id")]
    pub project_id: Uuid,
    #[serde(alias = "comment_message")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(alias = "comment_message")]
    pub message: String,
}

macro_rules! impl_document {
    ($ty:ty, $collection:literal) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> Uuid {
                self.id
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn status(&self) -> RecordStatus {
                self.status
            }
        }
    };
}

impl_document!(User, "users");
impl_document!(Group, "groups");
impl_document!(Project, "projects");
impl_document!(Resource, "resources");
impl_document!(ActivityEvent, "activities");
impl_document!(Recommendation, "recommendations");
impl_document!(Comment, "comments");
impl_document!(FeedEntry, "feeds");
