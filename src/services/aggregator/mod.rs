use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::*;
use crate::services::ledger::ActivityLedger;

/// Rows keep ledger read order. Should the ledger ever hold more than one event for a
/// (user, resource) pair, only the most recently updated one contributes.
pub fn aggregate_by_category(events: &[ActivityEvent]) -> BTreeMap<String, CategoryRows> {
    let mut latest: Vec<&ActivityEvent> = Vec::with_capacity(events.len());
    let mut positions: HashMap<(Uuid, Uuid), usize> = HashMap::new();

    for event in events.iter().filter(|e| e.status == RecordStatus::Active) {
        match positions.get(&(event.user_id, event.resource_id)) {
            Some(&idx) => {
                if event.updated_at >= latest[idx].updated_at {
                    latest[idx] = event;
                }
            }
            None => {
                positions.insert((event.user_id, event.resource_id), latest.len());
                latest.push(event);
            }
        }
    }

    let mut grouped: BTreeMap<String, CategoryRows> = BTreeMap::new();
    for event in latest {
        grouped
            .entry(event.resource_category.clone())
            .or_default()
            .push(
                event.user_id,
                event.resource_id,
                event.rating,
                &event.resource_category,
            );
    }

    grouped
}

#[derive(Clone)]
pub struct InteractionAggregator {
    ledger: ActivityLedger,
}

impl InteractionAggregator {
    pub fn new(ledger: ActivityLedger) -> Self {
        Self { ledger }
    }

    pub async fn aggregate(&self) -> AppResult<BTreeMap<String, CategoryRows>> {
        let events = self.ledger.list_events(&ActivityFilter::default()).await?;
        let grouped = aggregate_by_category(&events);

        for (category, rows) in &grouped {
            debug!("Category {} has {} interaction rows", category, rows.len());
        }
        info!(
            "Aggregated {} events into {} categories",
            events.len(),
            grouped.len()
        );
        Ok(grouped)
    }
}
