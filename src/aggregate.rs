//! Groups event records by subject and runs the summarizer once per group.
//!
//! Records are hashed into partitions with [`ihash`], each partition is
//! sorted and chunked by subject key, and partitions are reduced in
//! parallel on a thread pool owned by the run. Everything a run needs is
//! carried by the [`AggregationContext`] passed in.

use std::path::Path;

use anyhow::{bail, Context, Result};
use dashmap::DashMap;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{RejectedLine, SubjectError};
use crate::event::EventRecord;
use crate::ihash;
use crate::stats::FieldStats;
use crate::summary::{ErrorPolicy, Summarizer, Summary};

type PartitionIndex = u32;
type Partitions = DashMap<PartitionIndex, Vec<(String, EventRecord)>>;

/// Settings scoped to one aggregation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationContext {
    /// Number of hash partitions the records are spread over.
    pub partitions: u32,
    /// Worker threads; `None` lets rayon pick.
    pub threads: Option<usize>,
    pub error_policy: ErrorPolicy,
    /// Prefix each summary row with its subject key.
    pub include_key: bool,
}

impl Default for AggregationContext {
    fn default() -> Self {
        Self {
            partitions: 11,
            threads: None,
            error_policy: ErrorPolicy::default(),
            include_key: false,
        }
    }
}

impl AggregationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a context from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_include_key(mut self, include_key: bool) -> Self {
        self.include_key = include_key;
        self
    }

    fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = self.threads {
            builder = builder.num_threads(threads);
        }
        builder.build().context("building aggregation thread pool")
    }
}

/// Everything an aggregation run produced.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AggregationReport {
    /// One summary per subject, ordered by subject key.
    pub summaries: Vec<(String, Summary)>,
    /// Records the summarizer rejected, ordered by subject key.
    pub errors: Vec<SubjectError>,
    /// Input lines that never made it to grouping.
    pub rejected: Vec<RejectedLine>,
}

impl AggregationReport {
    /// Mean and variance of each summary field across all subjects.
    pub fn stats(&self) -> FieldStats {
        FieldStats::from_summaries(self.summaries.iter().map(|(_, summary)| summary))
    }

    pub fn summary_for(&self, key: &str) -> Option<&Summary> {
        self.summaries
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|idx| &self.summaries[idx].1)
    }
}

/// Spreads keyed records over `n` partitions by the hash of their key.
pub fn partition<I>(records: I, n: u32) -> Partitions
where
    I: IntoIterator<Item = (String, EventRecord)>,
{
    let partitions = Partitions::new();
    for (key, record) in records {
        let partition_no = ihash(key.as_bytes()) % n;
        partitions
            .entry(partition_no)
            .or_default()
            .push((key, record));
    }
    partitions
}

/// Summarizes one subject's complete group under the given policy.
pub fn reduce_group(
    key: &str,
    records: &[EventRecord],
    policy: ErrorPolicy,
) -> (Option<Summary>, Vec<SubjectError>) {
    let mut summarizer = Summarizer::new();
    let mut errors = Vec::new();
    for (record_index, record) in records.iter().enumerate() {
        if let Err(error) = summarizer.push(record) {
            errors.push(SubjectError {
                key: key.to_string(),
                record_index,
                error,
            });
            if policy == ErrorPolicy::AbortGroup {
                return (None, errors);
            }
        }
    }
    (Some(summarizer.finish()), errors)
}

fn reduce_partition(
    mut partition: Vec<(String, EventRecord)>,
    policy: ErrorPolicy,
) -> (Vec<(String, Summary)>, Vec<SubjectError>) {
    let mut summaries = Vec::new();
    let mut errors = Vec::new();
    // stable, so records keep their input order within a subject
    partition.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, group) in &partition.into_iter().chunk_by(|(key, _)| key.clone()) {
        let records = group.map(|(_, record)| record).collect::<Vec<_>>();
        let (summary, mut group_errors) = reduce_group(&key, &records, policy);
        errors.append(&mut group_errors);
        if let Some(summary) = summary {
            summaries.push((key, summary));
        }
    }
    (summaries, errors)
}

/// Groups `records` by subject and summarizes every group.
///
/// Bad records never abort the run; they are reported in the returned
/// [`AggregationReport`]. Only a bad context is an error.
pub fn aggregate(
    ctx: &AggregationContext,
    records: Vec<(String, EventRecord)>,
) -> Result<AggregationReport> {
    if ctx.partitions == 0 {
        bail!("partition count must be at least 1");
    }
    let n_records = records.len();
    let partitions = partition(records, ctx.partitions);
    debug!(
        records = n_records,
        partitions = partitions.len(),
        "partitioned event records"
    );

    let pool = ctx.thread_pool()?;
    let policy = ctx.error_policy;
    let reduced = pool.install(|| {
        partitions
            .into_par_iter()
            .map(|(_, partition)| reduce_partition(partition, policy))
            .collect::<Vec<_>>()
    });

    let mut report = AggregationReport::default();
    for (mut summaries, mut errors) in reduced {
        report.summaries.append(&mut summaries);
        report.errors.append(&mut errors);
    }
    report.summaries.sort_by(|a, b| a.0.cmp(&b.0));
    report
        .errors
        .sort_by(|a, b| (&a.key, a.record_index).cmp(&(&b.key, b.record_index)));

    for error in &report.errors {
        warn!("{error}");
    }
    info!(
        subjects = report.summaries.len(),
        errors = report.errors.len(),
        "aggregation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EventError;

    fn keyed(key: &str, item: i64, ts: &str, flag: i64) -> (String, EventRecord) {
        (key.to_string(), EventRecord::new(item, ts, flag, "00000"))
    }

    fn sample() -> Vec<(String, EventRecord)> {
        vec![
            keyed("alice", 1, "2014-01-01 03:00:00", 0),
            keyed("bob", 7, "2014-01-01 12:00:00", 1),
            keyed("alice", 1, "2014-01-01 09:00:00", 1),
            keyed("carol", 3, "2014-01-01 17:30:00", 0),
            keyed("alice", 2, "2014-01-01 23:30:00", 1),
            keyed("bob", 8, "2014-01-02 05:00:00", 1),
        ]
    }

    #[test]
    fn summarizes_every_subject() {
        let report = aggregate(&AggregationContext::new(), sample()).unwrap();
        let keys = report.summaries.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, ["alice", "bob", "carol"]);
        assert_eq!(report.summary_for("alice").unwrap().to_string(), "2 1 0 0 2 2");
        assert_eq!(report.summary_for("bob").unwrap().to_string(), "2 1 1 0 0 2");
        assert_eq!(report.summary_for("carol").unwrap().to_string(), "1 0 0 1 0 0");
        assert!(report.summary_for("dave").is_none());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn partition_and_thread_count_do_not_change_result() {
        let baseline = aggregate(&AggregationContext::new().with_partitions(1), sample()).unwrap();
        for partitions in [2, 3, 16] {
            for threads in [1, 4] {
                let ctx = AggregationContext::new()
                    .with_partitions(partitions)
                    .with_threads(threads);
                assert_eq!(aggregate(&ctx, sample()).unwrap(), baseline);
            }
        }
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut shuffled = sample();
        shuffled.reverse();
        let ctx = AggregationContext::new().with_partitions(4);
        assert_eq!(aggregate(&ctx, shuffled).unwrap(), aggregate(&ctx, sample()).unwrap());
    }

    #[test]
    fn partition_keeps_groups_together() {
        let partitions = partition(sample(), 4);
        let total: usize = partitions.iter().map(|p| p.value().len()).sum();
        assert_eq!(total, 6);
        let expected = ihash(b"alice") % 4;
        let alice = partitions.get(&expected).unwrap();
        assert_eq!(alice.iter().filter(|(k, _)| k == "alice").count(), 3);
    }

    #[test]
    fn abort_group_drops_subject_and_reports() {
        let mut records = sample();
        records.push(keyed("bob", 9, "not a time", 0));
        // never reached: the group stops at the first bad record
        records.push(keyed("bob", 10, "2014-01-01 20:00:00", 7));
        let report = aggregate(&AggregationContext::new(), records).unwrap();

        assert!(report.summary_for("bob").is_none());
        assert!(report.summary_for("alice").is_some());
        assert_eq!(report.errors.len(), 1);
        let err = &report.errors[0];
        assert_eq!(err.key, "bob");
        assert_eq!(err.record_index, 2);
        assert!(matches!(err.error, EventError::MalformedTimestamp { .. }));
    }

    #[test]
    fn skip_record_keeps_the_rest_of_the_group() {
        let mut records = sample();
        records.push(keyed("bob", 9, "2014-01-01 20:00:00", 4));
        records.push(keyed("bob", 10, "2014-01-01 20:00:00", 0));
        let ctx = AggregationContext::new().with_error_policy(ErrorPolicy::SkipRecord);
        let report = aggregate(&ctx, records).unwrap();

        let bob = report.summary_for("bob").unwrap();
        assert_eq!(bob.to_string(), "3 1 1 1 0 2");
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0].error, EventError::InvalidFlag { flag: 4, .. }));
    }

    #[test]
    fn stats_over_report() {
        let report = aggregate(&AggregationContext::new(), sample()).unwrap();
        let stats = report.stats();
        assert_eq!(stats.count(), 3);
        let mean = stats.mean();
        assert!((mean[0] - 5.0 / 3.0).abs() < 1e-9);
        assert!((mean[5] - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input() {
        let report = aggregate(&AggregationContext::new(), Vec::new()).unwrap();
        assert_eq!(report, AggregationReport::default());
        assert_eq!(report.stats().count(), 0);
    }

    #[test]
    fn zero_partitions_is_rejected() {
        let ctx = AggregationContext::new().with_partitions(0);
        assert!(aggregate(&ctx, sample()).is_err());
    }

    #[test]
    fn context_from_json_uses_defaults() {
        let ctx: AggregationContext =
            serde_json::from_str(r#"{"partitions": 3, "error_policy": "skip-record"}"#).unwrap();
        assert_eq!(ctx.partitions, 3);
        assert_eq!(ctx.error_policy, ErrorPolicy::SkipRecord);
        assert_eq!(ctx.threads, None);
        assert!(!ctx.include_key);

        assert!(serde_json::from_str::<AggregationContext>(r#"{"partition": 3}"#).is_err());
    }
}
