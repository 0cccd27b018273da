use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::ad_cycle::AdCatalog;
use crate::error::{EngineError, Result};
use crate::models::{
    AnalyzedRecord, CounselorStatus, DataShapeWarning, IssueCode, RawCounselorRecord, Thresholds,
};

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub records: Vec<AnalyzedRecord>,
    pub warnings: Vec<DataShapeWarning>,
}

struct RuleInput<'a> {
    record: &'a RawCounselorRecord,
    prev_rev: i64,
    status: CounselorStatus,
}

struct IssueRule {
    code: IssueCode,
    priority: u8,
    applies: fn(&RuleInput<'_>, &Thresholds) -> bool,
}

fn missed_contacts(input: &RuleInput<'_>, limits: &Thresholds) -> bool {
    input.record.cur_missed >= limits.missed
}

fn unanswered_reviews(input: &RuleInput<'_>, limits: &Thresholds) -> bool {
    input.record.unanswered >= limits.unanswered
}

fn short_connected_time(input: &RuleInput<'_>, limits: &Thresholds) -> bool {
    input.status != CounselorStatus::New
        && (input.record.cur_time as f64 / SECONDS_PER_HOUR) < limits.min_time_hours as f64
}

fn revenue_drop(input: &RuleInput<'_>, limits: &Thresholds) -> bool {
    input.status != CounselorStatus::New
        && input.prev_rev > 0
        && (input.prev_rev - input.record.cur_rev) * 100 >= limits.rev_drop_percent * input.prev_rev
}

// Evaluated top to bottom; the order is also the display order.
const ISSUE_RULES: [IssueRule; 4] = [
    IssueRule {
        code: IssueCode::C,
        priority: 0,
        applies: missed_contacts,
    },
    IssueRule {
        code: IssueCode::D,
        priority: 1,
        applies: unanswered_reviews,
    },
    IssueRule {
        code: IssueCode::A,
        priority: 2,
        applies: short_connected_time,
    },
    IssueRule {
        code: IssueCode::B,
        priority: 3,
        applies: revenue_drop,
    },
];

/// Signed fractional change; zero when there is nothing to compare against.
pub fn change_rate(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        0.0
    } else {
        (current - previous) as f64 / previous as f64
    }
}

pub fn classify_status(record: &RawCounselorRecord, has_previous: bool) -> CounselorStatus {
    if record.blind {
        CounselorStatus::Blind
    } else if !has_previous {
        CounselorStatus::New
    } else {
        CounselorStatus::Active
    }
}

fn evaluate_issues(input: &RuleInput<'_>, thresholds: &Thresholds) -> Vec<IssueCode> {
    if input.status == CounselorStatus::Blind {
        return Vec::new();
    }

    let mut fired: Vec<&IssueRule> = ISSUE_RULES
        .iter()
        .filter(|rule| (rule.applies)(input, thresholds))
        .collect();
    fired.sort_by_key(|rule| rule.priority);
    fired.into_iter().map(|rule| rule.code).collect()
}

/// Joins this period's rows against the previous period by nick.
///
/// Every usable nick in `current` yields exactly one record. Rows without a
/// nick, and repeats of a nick already seen, are skipped and reported in
/// `warnings` so callers can tell how many rows were dropped.
pub fn compare_periods<C: AdCatalog>(
    current: &[RawCounselorRecord],
    previous: &[RawCounselorRecord],
    thresholds: &Thresholds,
    catalog: &C,
) -> Result<Comparison> {
    if current.is_empty() {
        return Err(EngineError::NoCurrentSnapshot);
    }

    let mut previous_by_nick: HashMap<&str, &RawCounselorRecord> =
        HashMap::with_capacity(previous.len());
    for record in previous.iter().filter(|record| record.has_identity()) {
        previous_by_nick.entry(record.nick.trim()).or_insert(record);
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(current.len());
    let mut records = Vec::with_capacity(current.len());
    let mut warnings = Vec::new();

    for (index, record) in current.iter().enumerate() {
        let row = index + 1;
        if !record.has_identity() {
            warn!(row, "current row has no nick, skipping");
            warnings.push(DataShapeWarning {
                row,
                nick: None,
                reason: "missing nick".to_string(),
            });
            continue;
        }

        let nick = record.nick.trim();
        if !seen.insert(nick) {
            warn!(row, nick, "duplicate nick in current snapshot, skipping");
            warnings.push(DataShapeWarning {
                row,
                nick: Some(nick.to_string()),
                reason: "duplicate nick".to_string(),
            });
            continue;
        }

        let prior = previous_by_nick.get(nick).copied();
        let prev_time = prior.map_or(0, |prior| prior.cur_time);
        let prev_rev = prior.map_or(0, |prior| prior.cur_rev);
        let status = classify_status(record, prior.is_some());
        let issues = evaluate_issues(
            &RuleInput {
                record,
                prev_rev,
                status,
            },
            thresholds,
        );

        let mut normalized = record.clone();
        normalized.nick = nick.to_string();
        let ad_eligible_types =
            catalog.resolve(&normalized.category, &normalized.level_cat, &normalized.level);

        records.push(AnalyzedRecord {
            prev_time,
            prev_rev,
            time_delta: normalized.cur_time - prev_time,
            rev_delta: normalized.cur_rev - prev_rev,
            time_rate: change_rate(normalized.cur_time, prev_time),
            rev_rate: change_rate(normalized.cur_rev, prev_rev),
            status,
            issues,
            ad_eligible_types,
            current: normalized,
        });
    }

    debug!(
        analyzed = records.len(),
        skipped = warnings.len(),
        "period comparison finished"
    );

    Ok(Comparison { records, warnings })
}
