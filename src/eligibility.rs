use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use crate::ad_cycle::{AdCycleTable, AdType};
use crate::error::Result;
use crate::models::{AdStatus, PendingRequest};

/// Most recent application date per `(nick, ad type)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdApplicationHistory {
    entries: BTreeMap<(String, String), NaiveDate>,
}

impl AdApplicationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_applied(&self, nick: &str, ad_type: &str) -> Option<NaiveDate> {
        self.entries
            .get(&(nick.to_string(), ad_type.to_string()))
            .copied()
    }

    pub fn record(&mut self, nick: &str, ad_type: &str, applied_on: NaiveDate) {
        self.entries
            .insert((nick.to_string(), ad_type.to_string()), applied_on);
    }

    pub fn remove(&mut self, nick: &str, ad_type: &str) -> Option<NaiveDate> {
        self.entries.remove(&(nick.to_string(), ad_type.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String, NaiveDate)> for AdApplicationHistory {
    fn from_iter<I: IntoIterator<Item = (String, String, NaiveDate)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(nick, ad_type, date)| ((nick, ad_type), date))
                .collect(),
        }
    }
}

/// Cooldown bookkeeping for ad applications. History is passed in by the
/// caller; only the pending request batch lives here.
#[derive(Debug, Default)]
pub struct AdEligibilityTracker {
    table: AdCycleTable,
    pending: Vec<PendingRequest>,
}

impl AdEligibilityTracker {
    pub fn new(table: AdCycleTable) -> Self {
        Self {
            table,
            pending: Vec::new(),
        }
    }

    pub fn status(
        &self,
        history: &AdApplicationHistory,
        nick: &str,
        level_cat: &str,
        ad_type: &str,
        now: NaiveDate,
    ) -> Result<AdStatus> {
        let parsed: AdType = ad_type.parse()?;
        let Some(last_date) = history.last_applied(nick, &parsed.to_string()) else {
            return Ok(AdStatus::eligible());
        };

        let required_weeks = self.table.required_weeks(level_cat, &parsed);
        let elapsed_weeks = (now - last_date).num_days().abs() / 7;
        let remaining = required_weeks - elapsed_weeks;

        if remaining > 0 {
            Ok(AdStatus {
                cool: true,
                weeks_remaining: remaining,
                last_applied_date: Some(last_date),
            })
        } else {
            Ok(AdStatus::eligible())
        }
    }

    /// Records an application, overwriting any earlier date for the same
    /// counselor and ad type, and queues it for the submission batch.
    pub fn apply(
        &mut self,
        history: &mut AdApplicationHistory,
        nick: &str,
        level_cat: &str,
        ad_type: &str,
        applied_on: NaiveDate,
    ) -> Result<()> {
        let parsed: AdType = ad_type.parse()?;
        let ad_type = parsed.to_string();

        if let Some(previous) = history.last_applied(nick, &ad_type) {
            info!(nick, ad_type = %ad_type, %previous, "overwriting earlier application");
        }
        history.record(nick, &ad_type, applied_on);
        self.pending.push(PendingRequest {
            level_cat: level_cat.to_string(),
            ad_type,
            nick: nick.to_string(),
        });
        Ok(())
    }

    /// Removes an application; removing one that does not exist is a no-op.
    pub fn revoke(
        &self,
        history: &mut AdApplicationHistory,
        nick: &str,
        ad_type: &str,
    ) -> Result<bool> {
        let parsed: AdType = ad_type.parse()?;
        Ok(history.remove(nick, &parsed.to_string()).is_some())
    }

    pub fn pending(&self) -> &[PendingRequest] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<PendingRequest> {
        std::mem::take(&mut self.pending)
    }
}
