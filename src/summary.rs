//! Folds one subject's event records into a fixed-shape [`Summary`].

use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::event::EventRecord;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Number of fields in a [`Summary`].
pub const SUMMARY_FIELDS: usize = 6;

/// Time-of-day range an event falls into, on a 24-hour clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeBucket {
    /// `[0, 5)` and `[22, 24)`
    Night,
    /// `[5, 12)`
    Morning,
    /// `[12, 17)`
    Afternoon,
    /// `[17, 22)`
    Evening,
}

impl TimeBucket {
    /// Classifies an hour of the day. Hours past 23 wrap as night.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeBucket::Morning,
            12..=16 => TimeBucket::Afternoon,
            17..=21 => TimeBucket::Evening,
            _ => TimeBucket::Night,
        }
    }
}

/// How the aggregation treats a record the summarizer rejects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Drop the whole subject on its first bad record.
    #[default]
    AbortGroup,
    /// Leave the bad record out and keep summarizing the rest.
    SkipRecord,
}

/// Per-subject summary, in output field order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Summary {
    pub unique_items: u64,
    pub morning: u64,
    pub afternoon: u64,
    pub evening: u64,
    pub night: u64,
    pub mobile: u64,
}

impl Summary {
    pub fn fields(&self) -> [u64; SUMMARY_FIELDS] {
        [
            self.unique_items,
            self.morning,
            self.afternoon,
            self.evening,
            self.night,
            self.mobile,
        ]
    }

    /// Sum of the four time-of-day counters.
    pub fn classified(&self) -> u64 {
        self.morning + self.afternoon + self.evening + self.night
    }
}

impl fmt::Display for Summary {
    /// Whitespace-delimited row: `unique morning afternoon evening night mobile`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.unique_items, self.morning, self.afternoon, self.evening, self.night, self.mobile
        )
    }
}

/// Extracts the hour of day from a `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn parse_hour(record: &EventRecord) -> Result<u32, EventError> {
    NaiveDateTime::parse_from_str(record.timestamp.trim(), TIMESTAMP_FORMAT)
        .map(|ts| ts.hour())
        .map_err(|_| EventError::MalformedTimestamp {
            timestamp: record.timestamp.clone(),
            record: record.clone(),
        })
}

fn device_flag(record: &EventRecord) -> Result<u64, EventError> {
    match record.device_flag {
        0 => Ok(0),
        1 => Ok(1),
        flag => Err(EventError::InvalidFlag {
            flag,
            record: record.clone(),
        }),
    }
}

/// Incremental summarizer for a single subject.
///
/// A record is validated in full before it touches any counter, so a
/// rejected record leaves the summarizer unchanged.
#[derive(Debug, Default)]
pub struct Summarizer {
    items: HashSet<i64>,
    counts: Summary,
}

impl Summarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: &EventRecord) -> Result<(), EventError> {
        let hour = parse_hour(record)?;
        let mobile = device_flag(record)?;

        self.items.insert(record.item_id);
        self.counts.mobile += mobile;
        match TimeBucket::from_hour(hour) {
            TimeBucket::Night => self.counts.night += 1,
            TimeBucket::Morning => self.counts.morning += 1,
            TimeBucket::Afternoon => self.counts.afternoon += 1,
            TimeBucket::Evening => self.counts.evening += 1,
        }
        Ok(())
    }

    pub fn finish(self) -> Summary {
        Summary {
            unique_items: self.items.len() as u64,
            ..self.counts
        }
    }
}

/// Summarizes a whole group, stopping at the first bad record.
///
/// An empty group yields the all-zero summary.
pub fn summarize<'a, I>(records: I) -> Result<Summary, EventError>
where
    I: IntoIterator<Item = &'a EventRecord>,
{
    let mut summarizer = Summarizer::new();
    for record in records {
        summarizer.push(record)?;
    }
    Ok(summarizer.finish())
}
