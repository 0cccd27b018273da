use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const PERIODS: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCounselorRecord {
    pub nick: String,
    pub real_name: Option<String>,
    pub category: String,
    pub level_cat: String,
    pub level: String,
    /// Connected duration in whole seconds.
    pub cur_time: i64,
    pub cur_rev: i64,
    pub cur_missed: i64,
    pub unanswered: i64,
    pub remarks: Option<String>,
    /// Upstream marker for a delisted or deactivated counselor.
    pub blind: bool,
}

impl RawCounselorRecord {
    pub fn has_identity(&self) -> bool {
        !self.nick.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounselorStatus {
    New,
    Active,
    Blind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    /// Connected time under the minimum hours.
    A,
    /// Revenue dropped by at least the configured percentage.
    B,
    /// Too many missed contacts.
    C,
    /// Too many reviews without a reply.
    D,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedRecord {
    #[serde(flatten)]
    pub current: RawCounselorRecord,
    pub prev_time: i64,
    pub prev_rev: i64,
    pub time_delta: i64,
    pub rev_delta: i64,
    pub time_rate: f64,
    pub rev_rate: f64,
    pub status: CounselorStatus,
    pub issues: Vec<IssueCode>,
    pub ad_eligible_types: Vec<String>,
}

/// A row that could not be used, with its 1-based position in the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataShapeWarning {
    pub row: usize,
    pub nick: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryEntry {
    pub nick: String,
    pub info: String,
    pub rev: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueSummary {
    pub total_rev_this: i64,
    pub total_rev_last: i64,
    pub growth: f64,
    pub existing_count: usize,
    pub new_count: usize,
    pub blind_count: usize,
    pub new_list: Vec<SummaryEntry>,
    pub blind_list: Vec<SummaryEntry>,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SixPeriodEntry {
    pub nick: String,
    pub real_name: Option<String>,
    pub category: String,
    pub level_cat: String,
    pub level: String,
    pub revenues: [i64; PERIODS],
    pub total_rev: i64,
    pub join_month: usize,
    pub avg_rev: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdStatus {
    pub cool: bool,
    pub weeks_remaining: i64,
    pub last_applied_date: Option<NaiveDate>,
}

impl AdStatus {
    pub fn eligible() -> Self {
        Self {
            cool: false,
            weeks_remaining: 0,
            last_applied_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRequest {
    pub level_cat: String,
    pub ad_type: String,
    pub nick: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub missed: i64,
    pub unanswered: i64,
    pub min_time_hours: i64,
    pub rev_drop_percent: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            missed: 10,
            unanswered: 5,
            min_time_hours: 30,
            rev_drop_percent: 10,
        }
    }
}
