use std::io;
use std::path::Path;

use anyhow::{bail, Context};
use clap::ValueEnum;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::RowRejection;
use crate::models::{DataShapeWarning, RawCounselorRecord};

const NONE_REMARKS: [&str; 4] = ["없음", "none", "-", "n/a"];
const BLIND_MARKERS: [&str; 6] = ["true", "1", "y", "yes", "o", "블라인드"];

/// Unit of plain numeric `cur_time` cells. One unit applies to a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3600.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub records: Vec<RawCounselorRecord>,
    pub rejected: Vec<DataShapeWarning>,
}

impl Snapshot {
    fn reject(&mut self, row: usize, nick: Option<String>, reason: RowRejection) {
        warn!(row, nick = nick.as_deref().unwrap_or(""), %reason, "rejected snapshot row");
        self.rejected.push(DataShapeWarning {
            row,
            nick,
            reason: reason.to_string(),
        });
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    nick: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    level_cat: String,
    #[serde(default)]
    level: String,
    #[serde(default)]
    cur_time: String,
    #[serde(default)]
    cur_rev: String,
    #[serde(default)]
    cur_missed: String,
    #[serde(default)]
    unanswered: String,
    #[serde(default)]
    remarks: Option<String>,
    #[serde(default)]
    blind: Option<String>,
}

/// Parses a duration cell into whole seconds. Accepts `H:MM:SS`, `H:MM`, or
/// a plain number in `unit`. Blank cells are zero.
pub fn parse_duration(value: &str, unit: TimeUnit) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return Some(0);
    }

    if value.contains(':') {
        let parts: Vec<i64> = value
            .split(':')
            .map(|part| part.trim().parse::<i64>().ok().filter(|n| *n >= 0))
            .collect::<Option<_>>()?;
        let (hours, minutes, seconds) = match parts.as_slice() {
            [hours, minutes, seconds] => (*hours, *minutes, *seconds),
            [hours, minutes] => (*hours, *minutes, 0),
            _ => return None,
        };
        if minutes >= 60 || seconds >= 60 {
            return None;
        }
        return hours
            .checked_mul(3600)?
            .checked_add(minutes * 60 + seconds);
    }

    let amount: f64 = value.replace(',', "").parse().ok()?;
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    let seconds = (amount * unit.seconds()).round();
    if seconds >= i64::MAX as f64 {
        return None;
    }
    Some(seconds as i64)
}

/// Parses a non-negative whole-number cell; thousands separators allowed,
/// blank is zero.
pub fn parse_count(value: &str) -> Option<i64> {
    let cleaned = value.trim().replace(',', "");
    if cleaned.is_empty() {
        return Some(0);
    }
    cleaned.parse::<i64>().ok().filter(|n| *n >= 0)
}

fn parse_remarks(value: Option<String>) -> Option<String> {
    value
        .map(|remarks| remarks.trim().to_string())
        .filter(|remarks| {
            !remarks.is_empty()
                && !NONE_REMARKS
                    .iter()
                    .any(|none| remarks.eq_ignore_ascii_case(none))
        })
}

fn parse_blind(value: Option<&str>) -> bool {
    value.is_some_and(|marker| {
        BLIND_MARKERS
            .iter()
            .any(|truthy| marker.trim().eq_ignore_ascii_case(truthy))
    })
}

fn convert(row: CsvRow, unit: TimeUnit) -> Result<RawCounselorRecord, RowRejection> {
    let nick = row.nick.trim().to_string();
    if nick.is_empty() {
        return Err(RowRejection::MissingNick);
    }

    let number = |field: &'static str, value: &str| {
        parse_count(value).ok_or_else(|| RowRejection::NonNumeric {
            field,
            value: value.to_string(),
        })
    };

    Ok(RawCounselorRecord {
        cur_time: parse_duration(&row.cur_time, unit)
            .ok_or_else(|| RowRejection::UnreadableDuration(row.cur_time.clone()))?,
        cur_rev: number("cur_rev", &row.cur_rev)?,
        cur_missed: number("cur_missed", &row.cur_missed)?,
        unanswered: number("unanswered", &row.unanswered)?,
        blind: parse_blind(row.blind.as_deref()),
        remarks: parse_remarks(row.remarks),
        real_name: row
            .real_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
        category: row.category.trim().to_string(),
        level_cat: row.level_cat.trim().to_string(),
        level: row.level.trim().to_string(),
        nick,
    })
}

/// Reads one snapshot. Bad rows are skipped and listed in `rejected`; a
/// source without a `nick` column fails as a whole.
pub fn read_snapshot<R: io::Read>(source: R, unit: TimeUnit) -> anyhow::Result<Snapshot> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source);

    let headers = reader.headers().context("failed to read CSV header")?;
    if !headers.iter().any(|header| header == "nick") {
        bail!("snapshot has no 'nick' column");
    }

    let mut snapshot = Snapshot::default();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = index + 1;
        let csv_row = match result {
            Ok(csv_row) => csv_row,
            Err(err) => {
                snapshot.reject(row, None, RowRejection::Malformed(err.to_string()));
                continue;
            }
        };

        let nick = Some(csv_row.nick.trim().to_string()).filter(|nick| !nick.is_empty());
        match convert(csv_row, unit) {
            Ok(record) => snapshot.records.push(record),
            Err(reason) => snapshot.reject(row, nick, reason),
        }
    }

    Ok(snapshot)
}

pub fn load_snapshot(path: &Path, unit: TimeUnit) -> anyhow::Result<Snapshot> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open snapshot {}", path.display()))?;
    let snapshot = read_snapshot(file, unit)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
    info!(
        path = %path.display(),
        rows = snapshot.records.len(),
        rejected = snapshot.rejected.len(),
        "loaded snapshot"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "nick,real_name,category,level_cat,level,cur_time,cur_rev,cur_missed,unanswered,remarks,blind\n";

    fn read(body: &str, unit: TimeUnit) -> Snapshot {
        read_snapshot(format!("{HEADER}{body}").as_bytes(), unit).unwrap()
    }

    #[test]
    fn reads_well_formed_rows() {
        let snapshot = read(
            "별빛,김하늘,타로,전문,2,2400,\"120,000\",3,1,없음,\n",
            TimeUnit::Minutes,
        );
        assert!(snapshot.rejected.is_empty());
        let record = &snapshot.records[0];
        assert_eq!(record.nick, "별빛");
        assert_eq!(record.real_name.as_deref(), Some("김하늘"));
        assert_eq!(record.cur_time, 2400 * 60);
        assert_eq!(record.cur_rev, 120_000);
        assert_eq!(record.cur_missed, 3);
        assert_eq!(record.remarks, None);
        assert!(!record.blind);
    }

    #[test]
    fn clock_strings_and_units() {
        assert_eq!(parse_duration("40:30:15", TimeUnit::Minutes), Some(40 * 3600 + 30 * 60 + 15));
        assert_eq!(parse_duration("2:15", TimeUnit::Seconds), Some(2 * 3600 + 15 * 60));
        assert_eq!(parse_duration("1.5", TimeUnit::Hours), Some(5400));
        assert_eq!(parse_duration("90", TimeUnit::Seconds), Some(90));
        assert_eq!(parse_duration("", TimeUnit::Hours), Some(0));
        assert_eq!(parse_duration("-3", TimeUnit::Hours), None);
        assert_eq!(parse_duration("1:2:3:4", TimeUnit::Hours), None);
        assert_eq!(parse_duration("abc", TimeUnit::Hours), None);
    }

    #[test]
    fn out_of_range_clock_cells_are_rejected_not_panicking() {
        assert_eq!(parse_duration("9999999999999999:00", TimeUnit::Hours), None);
        assert_eq!(parse_duration("1:99", TimeUnit::Hours), None);
        assert_eq!(parse_duration("1:30:60", TimeUnit::Hours), None);
        assert_eq!(parse_duration("1e300", TimeUnit::Hours), None);
        assert_eq!(parse_duration("0:59:59", TimeUnit::Hours), Some(3599));

        let snapshot = read(
            "별빛,,타로,일반,1,9999999999999999:00,100,0,0,,\n\
             달빛,,타로,일반,1,1:00,100,0,0,,\n",
            TimeUnit::Hours,
        );
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.rejected.len(), 1);
        assert_eq!(snapshot.rejected[0].nick.as_deref(), Some("별빛"));
        assert!(snapshot.rejected[0].reason.contains("cur_time"));
    }

    #[test]
    fn rejects_bad_rows_and_keeps_going() {
        let snapshot = read(
            ",무명,타로,일반,1,10,100,0,0,,\n\
             달빛,,사주,일반,1,10,많음,0,0,,\n\
             해님,,사주,일반,1,10,500,0,0,메모 있음,블라인드\n",
            TimeUnit::Hours,
        );
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.rejected.len(), 2);
        assert_eq!(snapshot.rejected[0].row, 1);
        assert_eq!(snapshot.rejected[0].reason, "missing nick");
        assert!(snapshot.rejected[1].reason.contains("cur_rev"));

        let record = &snapshot.records[0];
        assert!(record.blind);
        assert_eq!(record.remarks.as_deref(), Some("메모 있음"));
        assert_eq!(record.real_name, None);
    }

    #[test]
    fn missing_nick_column_fails_the_snapshot() {
        let outcome = read_snapshot("name,cur_rev\nA,1\n".as_bytes(), TimeUnit::Hours);
        assert!(outcome.is_err());
    }
}
