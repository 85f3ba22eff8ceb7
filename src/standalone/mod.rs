use clap::{Parser, Subcommand};

use crate::aggregate::AggregationContext;
use crate::summary::ErrorPolicy;

pub mod engine;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a named map/reduce workload over local files
    Submit {
        /// Glob spec for the input files
        #[arg(short, long)]
        input: String,

        /// Name of the workload
        #[arg(short, long)]
        workload: String,

        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Number of reduce buckets (output files)
        #[arg(short = 'n', long, default_value_t = 11)]
        n_reduce: u32,

        /// Auxiliary arguments to pass to the MapReduce application.
        #[clap(value_parser, last = true)]
        args: Vec<String>,
    },
    /// Summarize per-subject event records
    Summarize {
        /// Glob spec for the CSV input files
        #[arg(short, long)]
        input: String,

        /// Output directory for `summaries`, `stats` and `errors`
        #[arg(short, long)]
        output: String,

        /// JSON file with aggregation settings; flags below override it
        #[arg(short, long)]
        config: Option<String>,

        /// Number of hash partitions
        #[arg(short, long)]
        partitions: Option<u32>,

        /// Worker threads
        #[arg(short, long)]
        threads: Option<usize>,

        /// Drop bad records instead of the whole subject
        #[arg(long)]
        skip_bad_records: bool,

        /// Prefix each summary row with its subject key
        #[arg(long)]
        include_key: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Job {
    pub input: String,
    pub workload: String,
    pub output: String,
    pub n_reduce: u32,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SummarizeJob {
    pub input: String,
    pub output: String,
    pub context: AggregationContext,
}

/// Layers command-line overrides on top of a base context.
pub fn apply_overrides(
    mut ctx: AggregationContext,
    partitions: Option<u32>,
    threads: Option<usize>,
    skip_bad_records: bool,
    include_key: bool,
) -> AggregationContext {
    if let Some(partitions) = partitions {
        ctx.partitions = partitions;
    }
    if let Some(threads) = threads {
        ctx.threads = Some(threads);
    }
    if skip_bad_records {
        ctx.error_policy = ErrorPolicy::SkipRecord;
    }
    if include_key {
        ctx.include_key = true;
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summarize() {
        let args = Args::try_parse_from([
            "standalone",
            "summarize",
            "-i",
            "in/*.csv",
            "-o",
            "out",
            "--partitions",
            "4",
            "--skip-bad-records",
        ])
        .unwrap();
        let Commands::Summarize {
            input,
            partitions,
            skip_bad_records,
            include_key,
            config,
            ..
        } = args.command
        else {
            panic!("expected summarize");
        };
        assert_eq!(input, "in/*.csv");
        assert_eq!(partitions, Some(4));
        assert!(skip_bad_records);
        assert!(!include_key);
        assert!(config.is_none());
    }

    #[test]
    fn parses_submit_with_trailing_args() {
        let args = Args::try_parse_from([
            "standalone", "submit", "-i", "in/*", "-w", "filter", "-o", "out", "--", "--term", "x",
        ])
        .unwrap();
        let Commands::Submit { workload, n_reduce, args, .. } = args.command else {
            panic!("expected submit");
        };
        assert_eq!(workload, "filter");
        assert_eq!(n_reduce, 11);
        assert_eq!(args, ["--term", "x"]);
    }

    #[test]
    fn overrides_only_touch_given_flags() {
        let base = AggregationContext::new().with_partitions(3).with_threads(2);
        let ctx = apply_overrides(base.clone(), None, None, false, false);
        assert_eq!(ctx, base);

        let ctx = apply_overrides(base, Some(8), Some(1), true, true);
        assert_eq!(ctx.partitions, 8);
        assert_eq!(ctx.threads, Some(1));
        assert_eq!(ctx.error_policy, ErrorPolicy::SkipRecord);
        assert!(ctx.include_key);
    }
}
