use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::models::{RawCounselorRecord, SixPeriodEntry, PERIODS};

/// Index of the first month with revenue; 0 when there is none.
pub fn join_month(revenues: &[i64; PERIODS]) -> usize {
    revenues.iter().position(|rev| *rev > 0).unwrap_or(0)
}

/// Average over the months since joining, floored.
pub fn active_average(total_rev: i64, join_month: usize) -> i64 {
    let active_months = PERIODS.saturating_sub(join_month) as i64;
    if active_months > 0 {
        total_rev.div_euclid(active_months)
    } else {
        0
    }
}

fn new_entry(record: &RawCounselorRecord, nick: &str) -> SixPeriodEntry {
    SixPeriodEntry {
        nick: nick.to_string(),
        real_name: record.real_name.clone(),
        category: record.category.clone(),
        level_cat: record.level_cat.clone(),
        level: record.level.clone(),
        revenues: [0; PERIODS],
        total_rev: 0,
        join_month: 0,
        avg_rev: 0,
    }
}

/// Builds the per-counselor revenue series over six monthly slots, highest
/// total first. Absent slots count as zero revenue. Within one month the first
/// row for a nick wins; blank and repeated nicks are logged and skipped.
pub fn roll_up(snapshots: &[Option<Vec<RawCounselorRecord>>; PERIODS]) -> Result<Vec<SixPeriodEntry>> {
    if snapshots.iter().all(Option::is_none) {
        return Err(EngineError::NoSnapshots);
    }

    let mut order: Vec<String> = Vec::new();
    let mut entries: HashMap<String, SixPeriodEntry> = HashMap::new();

    for (month, snapshot) in snapshots.iter().enumerate() {
        let Some(records) = snapshot else {
            debug!(month, "no snapshot for month");
            continue;
        };

        let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let row = index + 1;
            if !record.has_identity() {
                warn!(month, row, "row has no nick, left out of the rollup");
                continue;
            }
            let nick = record.nick.trim();
            if !seen.insert(nick) {
                warn!(month, row, nick, "duplicate nick in month, keeping the first row");
                continue;
            }
            let entry = entries.entry(nick.to_string()).or_insert_with(|| {
                order.push(nick.to_string());
                new_entry(record, nick)
            });
            entry.revenues[month] = record.cur_rev;
        }
    }

    let mut values: Vec<SixPeriodEntry> = order
        .into_iter()
        .filter_map(|nick| entries.remove(&nick))
        .map(|mut entry| {
            entry.total_rev = entry.revenues.iter().sum();
            entry.join_month = join_month(&entry.revenues);
            entry.avg_rev = active_average(entry.total_rev, entry.join_month);
            entry
        })
        .collect();

    values.sort_by(|a, b| b.total_rev.cmp(&a.total_rev).then_with(|| a.nick.cmp(&b.nick)));
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counselor(nick: &str, rev: i64) -> RawCounselorRecord {
        RawCounselorRecord {
            nick: nick.to_string(),
            category: "신점".to_string(),
            level_cat: "일반".to_string(),
            level: "1".to_string(),
            cur_rev: rev,
            ..Default::default()
        }
    }

    #[test]
    fn mid_term_joiner_averages_over_active_months() {
        let snapshots = [
            Some(vec![]),
            None,
            Some(vec![]),
            Some(vec![counselor("A", 500)]),
            Some(vec![counselor("A", 600)]),
            Some(vec![counselor("A", 700)]),
        ];
        let entries = roll_up(&snapshots).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.revenues, [0, 0, 0, 500, 600, 700]);
        assert_eq!(entry.join_month, 3);
        assert_eq!(entry.total_rev, 1800);
        assert_eq!(entry.avg_rev, 600);
    }

    #[test]
    fn average_is_floored_within_bound() {
        let snapshots = [
            Some(vec![counselor("A", 100)]),
            Some(vec![counselor("A", 100)]),
            Some(vec![counselor("A", 101)]),
            None,
            None,
            None,
        ];
        let entry = &roll_up(&snapshots).unwrap()[0];
        let active_months = (PERIODS - entry.join_month) as i64;
        assert_eq!(entry.avg_rev, 50);
        assert!(entry.avg_rev * active_months <= entry.total_rev);
        assert!(entry.total_rev - entry.avg_rev * active_months < active_months);
    }

    #[test]
    fn never_active_counselor_has_zero_join_month() {
        let snapshots = [
            Some(vec![counselor("Z", 0)]),
            None,
            None,
            None,
            None,
            Some(vec![counselor("Z", 0)]),
        ];
        let entry = &roll_up(&snapshots).unwrap()[0];
        assert_eq!(entry.join_month, 0);
        assert_eq!(entry.avg_rev, 0);
    }

    #[test]
    fn keeps_identity_from_first_sighting() {
        let mut later = counselor("A", 10);
        later.level_cat = "전문".to_string();
        let snapshots = [
            Some(vec![counselor("A", 10)]),
            Some(vec![later]),
            None,
            None,
            None,
            None,
        ];
        let entry = &roll_up(&snapshots).unwrap()[0];
        assert_eq!(entry.level_cat, "일반");
        assert_eq!(entry.revenues[1], 10);
    }

    #[test]
    fn sorted_by_total_descending() {
        let snapshots = [
            Some(vec![counselor("B", 10), counselor("A", 30), counselor("C", 10)]),
            None,
            None,
            None,
            None,
            Some(vec![counselor("B", 5)]),
        ];
        let nicks: Vec<String> = roll_up(&snapshots)
            .unwrap()
            .into_iter()
            .map(|entry| entry.nick)
            .collect();
        assert_eq!(nicks, vec!["A", "B", "C"]);
    }

    #[test]
    fn blank_and_repeated_nicks_within_a_month_are_skipped() {
        let snapshots = [
            Some(vec![counselor("A", 100), counselor(" ", 900), counselor("A", 999)]),
            Some(vec![counselor("A", 200)]),
            None,
            None,
            None,
            None,
        ];
        let entries = roll_up(&snapshots).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].revenues, [100, 200, 0, 0, 0, 0]);
        assert_eq!(entries[0].total_rev, 300);
    }

    #[test]
    fn all_slots_empty_is_an_error() {
        let snapshots: [Option<Vec<RawCounselorRecord>>; PERIODS] = Default::default();
        assert!(matches!(roll_up(&snapshots), Err(EngineError::NoSnapshots)));
    }
}
