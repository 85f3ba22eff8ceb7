use anyhow::Result;
use clap::Parser;
use evsum::aggregate::AggregationContext;
use evsum::standalone::engine::{perform_summarize, run_job};
use evsum::standalone::{apply_overrides, Args, Commands, Job, SummarizeJob};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    match args.command {
        Commands::Submit {
            input,
            workload,
            output,
            n_reduce,
            args,
        } => {
            let job = Job {
                input,
                workload,
                output,
                n_reduce,
                args,
            };
            for path in run_job(&job)? {
                info!("wrote {}", path.display());
            }
        }
        Commands::Summarize {
            input,
            output,
            config,
            partitions,
            threads,
            skip_bad_records,
            include_key,
        } => {
            let base = match config {
                Some(path) => AggregationContext::from_json_file(path)?,
                None => AggregationContext::default(),
            };
            let job = SummarizeJob {
                input,
                output,
                context: apply_overrides(base, partitions, threads, skip_bad_records, include_key),
            };
            let report = perform_summarize(&job)?;
            info!(
                subjects = report.summaries.len(),
                errors = report.errors.len() + report.rejected.len(),
                output = %job.output,
                "summaries written"
            );
        }
    }
    Ok(())
}
