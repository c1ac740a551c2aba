use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::store::Datastore;
use crate::utils::validation::{validate_category, validate_record_activity};

pub const BROWSE_LONG_REASON: &str = "browse>5seconds";
pub const BROWSE_SHORT_REASON: &str = "browse>3seconds";
pub const FAVOURITE_REASON: &str = "addToFavourite";

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionScore {
    pub reason: String,
    pub rating: f64,
}

impl InteractionScore {
    /// Duration brackets use strict comparisons: exactly 5s earns the 3s bracket and
    /// exactly 3s earns nothing. A favourite adds a flat bonus on top.
    pub fn from_signals(duration: f64, is_favourite: bool) -> Self {
        let (browse_reason, browse_rating) = if duration > 10.0 {
            (BROWSE_LONG_REASON, 2.5)
        } else if duration > 5.0 {
            (BROWSE_LONG_REASON, 1.5)
        } else if duration > 3.0 {
            (BROWSE_SHORT_REASON, 0.5)
        } else {
            ("", 0.0)
        };

        let mut reason = browse_reason.to_string();
        let mut rating = browse_rating;

        if is_favourite {
            if !reason.is_empty() {
                reason.push('+');
            }
            reason.push_str(FAVOURITE_REASON);
            rating += 2.5;
        }

        Self { reason, rating }
    }
}

#[derive(Clone)]
pub struct ActivityLedger {
    store: Datastore,
}

impl ActivityLedger {
    pub fn new(store: Datastore) -> Self {
        Self { store }
    }

    pub async fn record_event(
        &self,
        user_id: Uuid,
        request: &RecordActivityRequest,
    ) -> AppResult<ActivityEvent> {
        validate_record_activity(request)?;

        let score = InteractionScore::from_signals(request.duration, request.is_favourite);
        let now = Utc::now();
        let event = ActivityEvent {
            id: ActivityEvent::natural_id(user_id, request.resource_id),
            user_id,
            resource_id: request.resource_id,
            resource_category: request.resource_category.trim().to_string(),
            project_id: request.project_id,
            reason: score.reason,
            rating: score.rating,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.activities().upsert(&event).await?;
        info!(
            "Recorded activity {} -> {} ({}, rating {})",
            user_id, request.resource_id, stored.reason, stored.rating
        );
        Ok(stored)
    }

    pub async fn list_events(&self, filter: &ActivityFilter) -> AppResult<Vec<ActivityEvent>> {
        let status = filter.status.unwrap_or(RecordStatus::Active);
        let user_id = filter.user_id;

        let events = self
            .store
            .activities()
            .find(|event| {
                event.status == status && user_id.map_or(true, |id| event.user_id == id)
            })
            .await?;

        debug!("Listed {} activity events", events.len());
        Ok(events)
    }

    pub async fn get_event(&self, user_id: Uuid, id: Uuid) -> AppResult<ActivityEvent> {
        self.store
            .activities()
            .get_active(id)
            .await?
            .filter(|event| event.user_id == user_id)
            .ok_or_else(|| AppError::not_found("No activity found!"))
    }

    pub async fn update_event(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &ActivityPatch,
    ) -> AppResult<ActivityEvent> {
        let mut event = self.get_event(user_id, id).await?;

        if let Some(category) = &patch.resource_category {
            validate_category(category)?;
            event.resource_category = category.trim().to_string();
        }
        if let Some(project_id) = patch.project_id {
            event.project_id = Some(project_id);
        }
        event.updated_at = Utc::now();

        if !self.store.activities().replace(&event).await? {
            return Err(AppError::server(
                "Something went wrong. No activity was updated!",
            ));
        }
        Ok(event)
    }

    /// Soft delete: the event stays in the ledger but leaves aggregation.
    pub async fn archive_event(&self, user_id: Uuid, id: Uuid) -> AppResult<ActivityEvent> {
        let mut event = self.get_event(user_id, id).await?;
        event.status = RecordStatus::Archived;
        event.updated_at = Utc::now();

        if !self.store.activities().replace(&event).await? {
            return Err(AppError::not_found("No activity found!"));
        }
        info!("Archived activity {}", id);
        Ok(event)
    }
}
