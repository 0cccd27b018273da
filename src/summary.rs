use std::collections::HashSet;

use tracing::warn;

use crate::models::{RawCounselorRecord, RevenueSummary, SummaryEntry};

pub fn default_label(record: &RawCounselorRecord) -> String {
    format!(
        "{} {}{} {}",
        record.category,
        record.level_cat,
        record.level,
        record.nick.trim()
    )
}

fn growth_percent(this: i64, last: i64) -> f64 {
    if last == 0 {
        0.0
    } else {
        (this - last) as f64 / last as f64 * 100.0
    }
}

/// First occurrence of each usable nick, in source order.
fn index_by_nick(records: &[RawCounselorRecord]) -> (Vec<&RawCounselorRecord>, usize) {
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    let mut skipped = 0usize;

    for record in records {
        if !record.has_identity() || !seen.insert(record.nick.trim()) {
            skipped += 1;
            continue;
        }
        unique.push(record);
    }

    (unique, skipped)
}

/// Totals and new/blind/existing partitioning between two snapshots.
///
/// `label` builds the `info` text of each list entry.
pub fn summarize_revenue<F>(
    current: &[RawCounselorRecord],
    previous: &[RawCounselorRecord],
    label: F,
) -> RevenueSummary
where
    F: Fn(&RawCounselorRecord) -> String,
{
    let (current, skipped_current) = index_by_nick(current);
    let (previous, skipped_previous) = index_by_nick(previous);
    let skipped_rows = skipped_current + skipped_previous;
    if skipped_rows > 0 {
        warn!(skipped_rows, "rows without a usable nick left out of the summary");
    }

    let current_keys: HashSet<&str> = current.iter().map(|record| record.nick.trim()).collect();
    let previous_keys: HashSet<&str> = previous.iter().map(|record| record.nick.trim()).collect();

    let total_rev_this: i64 = current.iter().map(|record| record.cur_rev).sum();
    let total_rev_last: i64 = previous.iter().map(|record| record.cur_rev).sum();

    let new_list: Vec<SummaryEntry> = current
        .iter()
        .filter(|record| !previous_keys.contains(record.nick.trim()))
        .map(|&record| SummaryEntry {
            nick: record.nick.trim().to_string(),
            info: label(record),
            rev: record.cur_rev,
        })
        .collect();

    let blind_list: Vec<SummaryEntry> = previous
        .iter()
        .filter(|record| !current_keys.contains(record.nick.trim()))
        .map(|&record| SummaryEntry {
            nick: record.nick.trim().to_string(),
            info: label(record),
            rev: record.cur_rev,
        })
        .collect();

    RevenueSummary {
        total_rev_this,
        total_rev_last,
        growth: growth_percent(total_rev_this, total_rev_last),
        existing_count: current.len() - new_list.len(),
        new_count: new_list.len(),
        blind_count: blind_list.len(),
        new_list,
        blind_list,
        skipped_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counselor(nick: &str, rev: i64) -> RawCounselorRecord {
        RawCounselorRecord {
            nick: nick.to_string(),
            category: "사주".to_string(),
            level_cat: "전문".to_string(),
            level: "2".to_string(),
            cur_rev: rev,
            ..Default::default()
        }
    }

    #[test]
    fn totals_and_growth() {
        let summary = summarize_revenue(
            &[counselor("A", 150), counselor("B", 100)],
            &[counselor("A", 200)],
            default_label,
        );
        assert_eq!(summary.total_rev_this, 250);
        assert_eq!(summary.total_rev_last, 200);
        assert!((summary.growth - 25.0).abs() < 1e-9);
    }

    #[test]
    fn growth_is_zero_without_previous_revenue() {
        let summary = summarize_revenue(&[counselor("A", 150)], &[], default_label);
        assert_eq!(summary.growth, 0.0);
        assert_eq!(summary.new_count, 1);
        assert_eq!(summary.existing_count, 0);
    }

    #[test]
    fn partitions_by_nick_membership() {
        let current = vec![counselor("C", 30), counselor("A", 10), counselor("D", 40)];
        let previous = vec![counselor("A", 5), counselor("E", 50), counselor("B", 20)];
        let summary = summarize_revenue(&current, &previous, default_label);

        assert_eq!(summary.existing_count, 1);
        assert_eq!(summary.new_count, 2);
        assert_eq!(summary.blind_count, 2);
        assert_eq!(summary.existing_count + summary.new_count, current.len());
        assert_eq!(summary.existing_count + summary.blind_count, previous.len());

        let new_nicks: Vec<&str> = summary.new_list.iter().map(|e| e.nick.as_str()).collect();
        assert_eq!(new_nicks, vec!["C", "D"]);
        let blind: Vec<(&str, i64)> = summary
            .blind_list
            .iter()
            .map(|e| (e.nick.as_str(), e.rev))
            .collect();
        assert_eq!(blind, vec![("E", 50), ("B", 20)]);
        assert_eq!(summary.blind_list[0].info, "사주 전문2 E");
    }

    #[test]
    fn label_formatter_is_caller_supplied() {
        let summary = summarize_revenue(&[counselor("A", 1)], &[], |record| {
            format!("[{}]", record.nick)
        });
        assert_eq!(summary.new_list[0].info, "[A]");
    }

    #[test]
    fn unusable_rows_are_counted_not_summed() {
        let summary = summarize_revenue(
            &[counselor("A", 10), counselor(" ", 999), counselor("A", 999)],
            &[],
            default_label,
        );
        assert_eq!(summary.total_rev_this, 10);
        assert_eq!(summary.skipped_rows, 2);
        assert_eq!(summary.new_count, 1);
    }
}
