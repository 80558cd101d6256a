//! Alert deduplication policy
//!
//! Alerts owned by the same role whose queries normalize to the same text
//! are duplicates. Within each duplicate group the most recently updated
//! alert survives (ties broken by creation time, then id); the rest are
//! deleted. Watermarks are not merged: the survivor keeps its own.

use crate::models::{Alert, AlertId};
use std::collections::HashMap;

/// Decide which alerts to delete so that no duplicate group has more than
/// one member.
///
/// The result is sorted, so the same input always yields the same plan and
/// a second pass over the survivors yields nothing.
pub fn plan_dedupe<'a, I>(alerts: I) -> Vec<AlertId>
where
    I: IntoIterator<Item = &'a Alert>,
{
    let mut survivors: HashMap<String, &Alert> = HashMap::new();
    let mut removed = Vec::new();

    for alert in alerts {
        let fingerprint = alert.generate_fingerprint();

        match survivors.get(&fingerprint).copied() {
            Some(current) if !supersedes(alert, current) => {
                removed.push(alert.id);
            }
            Some(current) => {
                removed.push(current.id);
                survivors.insert(fingerprint, alert);
            }
            None => {
                survivors.insert(fingerprint, alert);
            }
        }
    }

    removed.sort();
    removed
}

/// Whether `candidate` should be kept over `current`
fn supersedes(candidate: &Alert, current: &Alert) -> bool {
    (candidate.updated_at, candidate.created_at, candidate.id)
        > (current.updated_at, current.created_at, current.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    #[test]
    fn test_keeps_most_recently_updated() {
        let role_id = Uuid::new_v4();
        let mut older = Alert::new(role_id, "Acme Corp");
        older.updated_at = Utc::now() - Duration::days(2);
        let newer = Alert::new(role_id, "acme  corp");

        let removed = plan_dedupe([&older, &newer]);
        assert_eq!(removed, vec![older.id]);

        // Order of input does not matter
        let removed = plan_dedupe([&newer, &older]);
        assert_eq!(removed, vec![older.id]);
    }

    #[test]
    fn test_different_owners_are_not_duplicates() {
        let a = Alert::new(Uuid::new_v4(), "acme corp");
        let b = Alert::new(Uuid::new_v4(), "acme corp");

        assert!(plan_dedupe([&a, &b]).is_empty());
    }

    #[test]
    fn test_plan_is_idempotent() {
        let role_id = Uuid::new_v4();
        let alerts: Vec<Alert> = (0..4)
            .map(|i| {
                let mut alert = Alert::new(role_id, "same query");
                alert.updated_at = Utc::now() - Duration::minutes(i);
                alert
            })
            .collect();

        let removed = plan_dedupe(alerts.iter());
        assert_eq!(removed.len(), 3);

        let survivors: Vec<&Alert> = alerts.iter().filter(|a| !removed.contains(&a.id)).collect();
        assert_eq!(survivors.len(), 1);
        assert!(plan_dedupe(survivors).is_empty());
    }
}
