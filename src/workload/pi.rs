//! Monte-Carlo estimate of pi.
//!
//! Every input line holds a number of samples to draw. The map side throws
//! that many points into the unit square and counts those landing inside
//! the quarter circle; the reducer turns the totals into `4 * hits / total`.

use crate::utils::string_from_bytes;
use crate::*;
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const KEY: &str = "pi";

#[derive(Parser, Debug)]
#[clap(no_binary_name = true)]
struct Args {
    /// Seed for the sampler. Without it every run draws fresh points.
    #[clap(short, long)]
    seed: Option<u64>,
}

fn sample(rng: &mut impl Rng, n: u64) -> u64 {
    let mut hits = 0;
    for _ in 0..n {
        let x: f64 = rng.gen();
        let y: f64 = rng.gen();
        if x * x + y * y <= 1.0 {
            hits += 1;
        }
    }
    hits
}

pub fn map(kv: KeyValue, aux: Bytes) -> MapOutput {
    let args: Args = workload::parse_aux(&aux)?;
    // mix in the file so separate inputs draw separate points
    let seed = args.seed.unwrap_or_else(rand::random) ^ u64::from(ihash(&kv.key));
    let mut rng = StdRng::seed_from_u64(seed);

    let text = string_from_bytes(kv.value)?;
    let mut hits = 0u64;
    let mut total = 0u64;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let n: u64 = line
            .parse()
            .with_context(|| format!("sample count `{line}`"))?;
        total = total
            .checked_add(n)
            .context("sample count overflows u64")?;
        hits += sample(&mut rng, n);
    }

    let out: Result<KeyValue> = Ok(KeyValue::new(KEY, format!("{hits} {total}")));
    Ok(Box::new(std::iter::once(out)))
}

pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let mut hits = 0u64;
    let mut total = 0u64;
    for value in values {
        let value = string_from_bytes(value)?;
        let (h, t) = value
            .split_once(' ')
            .with_context(|| format!("malformed partial count `{value}`"))?;
        hits = hits
            .checked_add(h.parse()?)
            .context("hit count overflows u64")?;
        total = total
            .checked_add(t.parse()?)
            .context("sample count overflows u64")?;
    }
    if total == 0 {
        bail!("no samples drawn");
    }
    let estimate = 4.0 * hits as f64 / total as f64;
    let key = string_from_bytes(key)?;
    Ok(Bytes::from(format!("{key} {estimate}\n")))
}
