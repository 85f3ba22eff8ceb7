//! Event records and the comma-delimited lines they are read from.
//!
//! A line has the shape
//! `eventId,subjectKey,itemId,timestamp,deviceFlag,locationCode`.
//! Only the last four fields end up in the [`EventRecord`]; the subject key
//! is returned alongside it so the record can be grouped.

use std::fmt;

use crate::error::{EventError, RejectedLine};

const FIELD_COUNT: usize = 6;

/// One observed action of a subject, e.g. a single track play.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventRecord {
    pub item_id: i64,
    /// Expected as `YYYY-MM-DD HH:MM:SS`; validated when summarized.
    pub timestamp: String,
    /// 1 for mobile, 0 otherwise; validated when summarized.
    pub device_flag: i64,
    pub location: String,
}

impl EventRecord {
    pub fn new(
        item_id: i64,
        timestamp: impl Into<String>,
        device_flag: i64,
        location: impl Into<String>,
    ) -> Self {
        Self {
            item_id,
            timestamp: timestamp.into(),
            device_flag,
            location: location.into(),
        }
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, \"{}\", {}, \"{}\")",
            self.item_id, self.timestamp, self.device_flag, self.location
        )
    }
}

fn malformed(line: &str, reason: impl Into<String>) -> EventError {
    EventError::MalformedLine {
        line: line.to_string(),
        reason: reason.into(),
    }
}

/// Parses one input line into its subject key and event record.
pub fn parse_line(line: &str) -> Result<(String, EventRecord), EventError> {
    let fields = line.split(',').map(str::trim).collect::<Vec<_>>();
    if fields.len() != FIELD_COUNT {
        return Err(malformed(
            line,
            format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
        ));
    }

    let subject = fields[1];
    if subject.is_empty() {
        return Err(malformed(line, "empty subject key"));
    }
    let item_id = fields[2]
        .parse::<i64>()
        .map_err(|e| malformed(line, format!("item id `{}`: {e}", fields[2])))?;
    let device_flag = fields[4]
        .parse::<i64>()
        .map_err(|e| malformed(line, format!("device flag `{}`: {e}", fields[4])))?;

    let record = EventRecord::new(item_id, fields[3], device_flag, fields[5]);
    Ok((subject.to_string(), record))
}

fn decode_line(raw: &[u8]) -> Result<&str, EventError> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    std::str::from_utf8(raw).map_err(|e| {
        malformed(&String::from_utf8_lossy(raw), format!("invalid UTF-8: {e}"))
    })
}

/// Parses every non-blank line of `raw`.
///
/// Lines are decoded one at a time, so an undecodable line is rejected on
/// its own. Lines that fail to decode or parse are collected into the second
/// vector instead of aborting, tagged with `source_name` and their line
/// number.
pub fn parse_lines(
    source_name: &str,
    raw: &[u8],
) -> (Vec<(String, EventRecord)>, Vec<RejectedLine>) {
    let mut records = Vec::new();
    let mut rejected = Vec::new();
    for (idx, line) in raw.split(|b| *b == b'\n').enumerate() {
        let parsed = decode_line(line).and_then(|line| {
            if line.trim().is_empty() {
                Ok(None)
            } else {
                parse_line(line).map(Some)
            }
        });
        match parsed {
            Ok(Some(keyed)) => records.push(keyed),
            Ok(None) => {}
            Err(error) => rejected.push(RejectedLine {
                source_name: source_name.to_string(),
                line_no: idx + 1,
                error,
            }),
        }
    }
    (records, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_line() {
        let (key, record) = parse_line("7,cust42,1001,2014-01-01 09:15:00,1,00002").unwrap();
        assert_eq!(key, "cust42");
        assert_eq!(record, EventRecord::new(1001, "2014-01-01 09:15:00", 1, "00002"));
    }

    #[test]
    fn trims_fields() {
        let (key, record) = parse_line(" 7 , c1 , 3 , 2014-01-01 23:30:00 , 0 , 9 ").unwrap();
        assert_eq!(key, "c1");
        assert_eq!(record.item_id, 3);
        assert_eq!(record.timestamp, "2014-01-01 23:30:00");
        assert_eq!(record.location, "9");
    }

    #[test]
    fn out_of_range_flag_still_parses() {
        // rejected later by the summarizer, not here
        let (_, record) = parse_line("1,c,1,2014-01-01 00:00:00,3,x").unwrap();
        assert_eq!(record.device_flag, 3);
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = parse_line("1,c,1,2014-01-01 00:00:00,1").unwrap_err();
        assert!(matches!(err, EventError::MalformedLine { .. }));
        assert!(err.to_string().contains("expected 6 fields, found 5"));
    }

    #[test]
    fn rejects_non_numeric_item() {
        let err = parse_line("1,c,abc,2014-01-01 00:00:00,1,x").unwrap_err();
        assert!(err.to_string().contains("item id `abc`"));
    }

    #[test]
    fn rejects_empty_subject() {
        assert!(parse_line("1,,1,2014-01-01 00:00:00,1,x").is_err());
    }

    #[test]
    fn parse_lines_skips_blanks_and_collects_rejects() {
        let text = "1,a,1,2014-01-01 03:00:00,0,1\n\n   \nnot a record\n2,b,2,2014-01-01 13:00:00,1,2\n";
        let (records, rejected) = parse_lines("in.csv", text.as_bytes());
        assert_eq!(records.len(), 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].line_no, 4);
        assert_eq!(rejected[0].source_name, "in.csv");
        assert!(rejected[0].to_string().starts_with("in.csv:4:"));
    }

    #[test]
    fn invalid_utf8_rejects_only_that_line() {
        let mut raw = b"1,a,1,2014-01-01 03:00:00,0,1\r\n2,b,2,2014-01-01 13:00:00,1,".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe]);
        raw.extend_from_slice(b"\n3,c,3,2014-01-01 18:00:00,1,3");
        let (records, rejected) = parse_lines("in.csv", &raw);

        let keys = records.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, ["a", "c"]);
        assert_eq!(records[0].1.location, "1");
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].line_no, 2);
        assert!(matches!(
            &rejected[0].error,
            EventError::MalformedLine { reason, .. } if reason.starts_with("invalid UTF-8")
        ));
    }
}
