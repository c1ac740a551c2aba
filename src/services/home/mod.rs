use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::*;
use crate::services::catalog::GroupDirectory;
use crate::services::feed::FeedService;
use crate::store::Datastore;

pub const OVERVIEW_WINDOW_DAYS: i64 = 30;
pub const RECENT_PROJECTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeOverview {
    pub project_counts: Vec<DailyCount>,
    pub resource_counts: Vec<DailyCount>,
    pub resource_category_counts: Vec<CategoryCount>,
    pub feeds: Vec<FeedEntry>,
    pub recent_projects: Vec<Project>,
}

pub fn daily_counts(timestamps: impl IntoIterator<Item = DateTime<Utc>>) -> Vec<DailyCount> {
    let mut days: BTreeMap<String, usize> = BTreeMap::new();
    for ts in timestamps {
        *days.entry(ts.format("%Y-%m-%d").to_string()).or_default() += 1;
    }
    days.into_iter()
        .rev()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}

pub fn category_counts<'a>(
    categories: impl IntoIterator<Item = &'a Option<String>>,
) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<Option<String>, usize> = BTreeMap::new();
    for category in categories {
        *counts.entry(category.clone()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect()
}

#[derive(Clone)]
pub struct HomeService {
    store: Datastore,
    feed: FeedService,
}

impl HomeService {
    pub fn new(store: Datastore, feed: FeedService) -> Self {
        Self { store, feed }
    }

    /// `project_path` narrows the resource figures to one folder.
    pub async fn overview(
        &self,
        user_id: Uuid,
        project_path: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<HomeOverview> {
        let since = now - Duration::days(OVERVIEW_WINDOW_DAYS);
        let directory = GroupDirectory::load(&self.store).await?;

        let projects = self
            .store
            .projects()
            .find_active(|project| directory.can_view(project, user_id))
            .await?;
        let visible: HashSet<Uuid> = projects.iter().map(|p| p.id).collect();

        let resources = self
            .store
            .resources()
            .find_active(|resource| {
                visible.contains(&resource.project_id)
                    && resource.created_at >= since
                    && project_path.map_or(true, |path| resource.project_path == path)
            })
            .await?;

        let project_counts = daily_counts(
            projects
                .iter()
                .filter(|p| p.created_at >= since)
                .map(|p| p.created_at),
        );

        Ok(HomeOverview {
            project_counts,
            resource_counts: daily_counts(resources.iter().map(|r| r.created_at)),
            resource_category_counts: category_counts(resources.iter().map(|r| &r.category)),
            feeds: self.feed.recent_for(user_id, now).await?,
            recent_projects: projects.into_iter().rev().take(RECENT_PROJECTS).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daily_counts_newest_day_first() {
        let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
        let counts = daily_counts(vec![day(1, 9), day(2, 10), day(1, 23)]);
        assert_eq!(
            counts,
            vec![
                DailyCount {
                    date: "2024-03-02".to_string(),
                    count: 1
                },
                DailyCount {
                    date: "2024-03-01".to_string(),
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn test_category_counts_include_untagged() {
        let categories = vec![Some("cs.AI".to_string()), None, Some("cs.AI".to_string())];
        let counts = category_counts(&categories);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].category, None);
        assert_eq!(counts[1].count, 2);
    }

    #[tokio::test]
    async fn test_overview_only_counts_visible_projects() {
        let store = Datastore::in_memory();
        let home = HomeService::new(store.clone(), FeedService::new(store.clone()));
        let (member, outsider) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        let group = Group {
            id: Uuid::new_v4(),
            name: "Lab".to_string(),
            description: String::new(),
            members: vec![GroupMember {
                user_id: member,
                member_type: "owner".to_string(),
                joined_at: now,
            }],
            created_by: member,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        };
        store.groups().insert(&group).await.unwrap();

        for (name, groups) in [("open", vec![]), ("private", vec![group.id])] {
            let project = Project {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: String::new(),
                available_groups: groups,
                created_by: member,
                status: RecordStatus::Active,
                created_at: now,
                updated_at: now,
            };
            store.projects().insert(&project).await.unwrap();
        }

        let overview = home.overview(member, None, now).await.unwrap();
        assert_eq!(overview.project_counts[0].count, 2);
        assert_eq!(overview.recent_projects.len(), 2);

        let overview = home.overview(outsider, None, now).await.unwrap();
        assert_eq!(overview.project_counts[0].count, 1);
        assert_eq!(overview.recent_projects[0].name, "open");
        assert!(overview.feeds.is_empty());
    }
}
