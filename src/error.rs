/// Errors raised by the analytics engine.
///
/// Per-row data problems are not errors; they are collected as
/// `DataShapeWarning`s so one bad row never aborts a batch.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The comparison was asked to run without any current-period rows.
    #[error("no current snapshot supplied; upload this period's data first")]
    NoCurrentSnapshot,

    /// The six-period rollup received six empty slots.
    #[error("no monthly snapshots supplied for the rollup")]
    NoSnapshots,

    /// An ad type that is not of the form `channel(subtype)`.
    #[error("malformed ad type '{0}', expected e.g. 전화(타로)")]
    MalformedAdType(String),
}

/// Why a single snapshot row was left out. The row is reported, the rest of
/// the batch carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowRejection {
    #[error("missing nick")]
    MissingNick,

    #[error("non-numeric {field} '{value}'")]
    NonNumeric { field: &'static str, value: String },

    #[error("unreadable cur_time '{0}'")]
    UnreadableDuration(String),

    /// The CSV layer could not decode the row at all.
    #[error("malformed row: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
