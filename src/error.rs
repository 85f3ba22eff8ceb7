//! Structured errors raised while parsing and summarizing event records.

use thiserror::Error;

use crate::event::EventRecord;

/// A problem with a single input line or event record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The time portion of the timestamp could not be parsed.
    #[error("malformed timestamp `{timestamp}` in record {record}")]
    MalformedTimestamp {
        timestamp: String,
        record: EventRecord,
    },

    /// The device flag was not 0 (non-mobile) or 1 (mobile).
    #[error("invalid device flag {flag} in record {record}")]
    InvalidFlag { flag: i64, record: EventRecord },

    /// The input line does not have the expected shape.
    #[error("malformed line `{line}`: {reason}")]
    MalformedLine { line: String, reason: String },
}

/// An [`EventError`] tagged with the subject whose group it came from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("subject `{key}`, record #{record_index}: {error}")]
pub struct SubjectError {
    pub key: String,
    /// Position of the offending record within the subject's group.
    pub record_index: usize,
    #[source]
    pub error: EventError,
}

/// A line rejected before grouping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source_name}:{line_no}: {error}")]
pub struct RejectedLine {
    /// Name of the input the line came from, usually a file path.
    pub source_name: String,
    /// 1-based line number within that input.
    pub line_no: usize,
    #[source]
    pub error: EventError,
}
