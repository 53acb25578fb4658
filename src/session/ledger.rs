//! Activity ledger.
//!
//! The ledger is the single point where batches from either delivery
//! channel are accepted or rejected. A batch is accepted only if its
//! watermark is strictly greater than the current one; everything else is
//! stale and dropped whole. Accepted activities are appended in the order
//! received and never reordered or removed afterwards.

use crate::activity::{Activity, ActivitySet, Watermark};

/// Result of offering a batch to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The batch advanced the watermark and was appended.
    Advanced {
        watermark: Watermark,
        batch: Vec<Activity>,
    },
    /// The batch was not newer than what is already incorporated.
    Stale,
}

impl IngestOutcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, IngestOutcome::Advanced { .. })
    }
}

/// Ordered, append-only record of delivered activities.
#[derive(Debug, Clone, Default)]
pub struct ActivityLedger {
    watermark: Option<Watermark>,
    log: Vec<Activity>,
}

impl ActivityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest incorporated watermark, `None` before the first batch.
    pub fn watermark(&self) -> Option<Watermark> {
        self.watermark
    }

    /// Full activity log.
    pub fn activities(&self) -> &[Activity] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Offer a batch.
    ///
    /// A missing or non-numeric watermark never exceeds the current one, so
    /// such a batch is treated as stale.
    pub fn ingest(&mut self, set: ActivitySet) -> IngestOutcome {
        let Some(incoming) = Watermark::from_wire(set.watermark.as_deref()) else {
            return IngestOutcome::Stale;
        };

        if self.watermark.is_some_and(|current| incoming <= current) {
            return IngestOutcome::Stale;
        }

        self.watermark = Some(incoming);
        self.log.extend(set.activities.iter().cloned());

        IngestOutcome::Advanced {
            watermark: incoming,
            batch: set.activities,
        }
    }

    /// Append an activity the endpoint will not echo back.
    pub fn append_local(&mut self, activity: Activity) {
        self.log.push(activity);
    }

    /// Activities whose sender is not `user_id`.
    pub fn foreign(&self, user_id: &str) -> Vec<Activity> {
        self.log
            .iter()
            .filter(|a| !a.is_from(user_id))
            .cloned()
            .collect()
    }
}
