use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::*;
use crate::store::Datastore;

pub const FEED_WINDOW_DAYS: i64 = 5;

#[derive(Clone)]
pub struct FeedService {
    store: Datastore,
}

impl FeedService {
    pub fn new(store: Datastore) -> Self {
        Self { store }
    }

    /// Group entries go to the group's members. Project and comment entries (whose
    /// subject id is the project) go to the members of every group the project is
    /// shared with, so an unrestricted project only reaches its author.
    pub async fn publish(
        &self,
        author: Uuid,
        subject: FeedSubject,
        activity: FeedActivity,
        subject_id: Uuid,
        message: String,
    ) -> AppResult<FeedEntry> {
        let now = Utc::now();
        let entry = FeedEntry {
            id: Uuid::new_v4(),
            message,
            subject,
            activity,
            subject_id,
            created_by: author,
            recipients: self.recipients(subject, subject_id).await?,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.store.feeds().insert(&entry).await?;

        debug!(
            "Feed {:?}/{:?} on {} for {} recipients",
            subject,
            activity,
            subject_id,
            entry.recipients.len()
        );
        Ok(entry)
    }

    pub async fn announce(
        &self,
        author: Uuid,
        subject: FeedSubject,
        activity: FeedActivity,
        subject_id: Uuid,
        message: String,
    ) {
        if let Err(e) = self
            .publish(author, subject, activity, subject_id, message)
            .await
        {
            warn!("Recording feed entry for {:?} {} failed: {}", subject, subject_id, e);
        }
    }

    async fn recipients(&self, subject: FeedSubject, subject_id: Uuid) -> AppResult<Vec<Uuid>> {
        let groups: Vec<Group> = match subject {
            FeedSubject::Group => self.store.groups().get(subject_id).await?.into_iter().collect(),
            FeedSubject::Project | FeedSubject::Comment => {
                let Some(project) = self.store.projects().get(subject_id).await? else {
                    return Ok(Vec::new());
                };
                self.store
                    .groups()
                    .find_active(|group| project.available_groups.contains(&group.id))
                    .await?
            }
        };

        let mut seen = HashSet::new();
        Ok(groups
            .iter()
            .flat_map(|group| group.members.iter().map(|m| m.user_id))
            .filter(|id| seen.insert(*id))
            .collect())
    }

    pub async fn recent_for(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Vec<FeedEntry>> {
        let since = now - Duration::days(FEED_WINDOW_DAYS);
        let mut entries = self
            .store
            .feeds()
            .find_active(|entry| entry.created_at >= since && entry.concerns(user_id))
            .await?;
        entries.reverse();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(members: &[Uuid]) -> Group {
        let now = Utc::now();
        Group {
            id: Uuid::new_v4(),
            name: "Lab".to_string(),
            description: String::new(),
            members: members
                .iter()
                .map(|&user_id| GroupMember {
                    user_id,
                    member_type: "member".to_string(),
                    joined_at: now,
                })
                .collect(),
            created_by: members[0],
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn project(groups: Vec<Uuid>) -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            name: "Survey".to_string(),
            description: String::new(),
            available_groups: groups,
            created_by: Uuid::new_v4(),
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_project_entries_reach_group_members_once() {
        let store = Datastore::in_memory();
        let feed = FeedService::new(store.clone());
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let first = group(&[a, b]);
        let second = group(&[b, c]);
        store.groups().insert(&first).await.unwrap();
        store.groups().insert(&second).await.unwrap();
        let shared = project(vec![first.id, second.id]);
        store.projects().insert(&shared).await.unwrap();

        let entry = feed
            .publish(a, FeedSubject::Project, FeedActivity::Update, shared.id, "x".to_string())
            .await
            .unwrap();
        assert_eq!(entry.recipients.len(), 3);
        assert!(entry.recipients.contains(&c));

        let open = project(vec![]);
        store.projects().insert(&open).await.unwrap();
        let entry = feed
            .publish(a, FeedSubject::Comment, FeedActivity::Create, open.id, "y".to_string())
            .await
            .unwrap();
        assert!(entry.recipients.is_empty());
    }

    #[tokio::test]
    async fn test_recent_for_filters_by_user_and_window() {
        let store = Datastore::in_memory();
        let feed = FeedService::new(store.clone());
        let (member, outsider) = (Uuid::new_v4(), Uuid::new_v4());
        let lab = group(&[member]);
        store.groups().insert(&lab).await.unwrap();

        feed.publish(member, FeedSubject::Group, FeedActivity::Create, lab.id, "first".to_string())
            .await
            .unwrap();
        feed.publish(member, FeedSubject::Group, FeedActivity::Update, lab.id, "second".to_string())
            .await
            .unwrap();

        let entries = feed.recent_for(member, Utc::now()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "second");

        assert!(feed.recent_for(outsider, Utc::now()).await.unwrap().is_empty());

        let later = Utc::now() + Duration::days(FEED_WINDOW_DAYS + 1);
        assert!(feed.recent_for(member, later).await.unwrap().is_empty());
    }
}
