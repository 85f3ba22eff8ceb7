use anyhow::{Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use glob::glob;
use itertools::Itertools;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::aggregate::{aggregate, AggregationReport};
use crate::error::RejectedLine;
use crate::event::{parse_lines, EventRecord};
use crate::standalone::{Job, SummarizeJob};
use crate::*;

// types related to this engine
type BucketIndex = u32;
type Buckets = DashMap<BucketIndex, Vec<KeyValue>>;

/// Resolves a glob spec into the files it names, in sorted order.
///
/// A spec that names no files is an error.
pub fn input_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = glob(pattern)
        .with_context(|| format!("bad input glob `{pattern}`"))?
        .flatten()
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    anyhow::ensure!(!files.is_empty(), "no input files match `{pattern}`");
    files.sort();
    Ok(files)
}

pub fn perform_map(job: &Job, engine: &Workload, serialized_args: &Bytes) -> Result<Buckets> {
    let buckets: Buckets = Buckets::new();
    for pathspec in input_files(&job.input)? {
        let buf = fs::read(&pathspec)
            .with_context(|| format!("reading {}", pathspec.display()))?;
        let filename = pathspec.to_string_lossy().into_owned();
        debug!(file = %filename, bytes = buf.len(), "mapping input");
        // each file is one <filename, contents> record for the map function
        let input_kv = KeyValue::new(filename, buf);
        for item in (engine.map_fn)(input_kv, serialized_args.clone())? {
            let kv = item?;
            let bucket_no = ihash(&kv.key) % job.n_reduce;
            buckets.entry(bucket_no).or_default().push(kv);
        }
    }
    Ok(buckets)
}

pub fn perform_reduce(
    job: &Job,
    engine: &Workload,
    serialized_args: &Bytes,
    buckets: Buckets,
) -> Result<Vec<PathBuf>> {
    let output_dir = Path::new(&job.output);
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let mut written = Vec::new();
    // one output file per bucket, keys in ascending order within it
    for (reduce_id, mut bkt) in buckets.into_iter() {
        let out_path = output_dir.join(format!("mr-out-{reduce_id}"));
        let mut out_file = BufWriter::new(File::create(&out_path)?);
        bkt.sort_by_key(KeyValue::key);
        for (key, value_group) in &bkt.into_iter().chunk_by(KeyValue::key) {
            let iter = value_group.map(KeyValue::into_value);
            let out = (engine.reduce_fn)(key, Box::new(iter), serialized_args.clone())?;
            out_file.write_all(&out)?;
        }
        out_file.flush()?;
        written.push(out_path);
    }
    written.sort();
    Ok(written)
}

/// Map, shuffle and reduce in a single process.
pub fn run_job(job: &Job) -> Result<Vec<PathBuf>> {
    let engine = workload::named(&job.workload)?;
    anyhow::ensure!(job.n_reduce > 0, "need at least one reduce bucket");
    let serialized_args = workload::serialize_aux(&job.args)?;

    let buckets = perform_map(job, &engine, &serialized_args)?;
    let outputs = perform_reduce(job, &engine, &serialized_args, buckets)?;
    info!(workload = %job.workload, files = outputs.len(), "job finished");
    Ok(outputs)
}

/// Reads and parses every event file matching `pattern`.
pub fn load_events(pattern: &str) -> Result<(Vec<(String, EventRecord)>, Vec<RejectedLine>)> {
    let mut records = Vec::new();
    let mut rejected = Vec::new();
    for path in input_files(pattern)? {
        let raw = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let (mut file_records, mut file_rejected) = parse_lines(&path.to_string_lossy(), &raw);
        debug!(
            file = %path.display(),
            records = file_records.len(),
            rejected = file_rejected.len(),
            "parsed event file"
        );
        records.append(&mut file_records);
        rejected.append(&mut file_rejected);
    }
    Ok((records, rejected))
}

/// Writes `summaries`, `stats` and `errors` into `output_dir`.
pub fn write_report(
    report: &AggregationReport,
    include_key: bool,
    output_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let mut summaries = BufWriter::new(File::create(output_dir.join("summaries"))?);
    for (key, summary) in &report.summaries {
        if include_key {
            writeln!(summaries, "{key} {summary}")?;
        } else {
            writeln!(summaries, "{summary}")?;
        }
    }
    summaries.flush()?;

    fs::write(output_dir.join("stats"), format!("{}\n", report.stats()))?;

    let mut errors = BufWriter::new(File::create(output_dir.join("errors"))?);
    for error in &report.errors {
        writeln!(errors, "{}\t{}", error.key, error.error)?;
    }
    for rejected in &report.rejected {
        writeln!(
            errors,
            "{}:{}\t{}",
            rejected.source_name, rejected.line_no, rejected.error
        )?;
    }
    errors.flush()?;
    Ok(())
}

/// Loads, aggregates and writes one summarization run.
pub fn perform_summarize(job: &SummarizeJob) -> Result<AggregationReport> {
    let (records, rejected) = load_events(&job.input)?;
    info!(
        records = records.len(),
        rejected = rejected.len(),
        "loaded event records"
    );
    let mut report = aggregate(&job.context, records)?;
    report.rejected = rejected;
    write_report(&report, job.context.include_key, Path::new(&job.output))?;
    Ok(report)
}
