//! Converts MapReduce application names to actual application code.
//!
//! # Example
//!
//! To get the word count application:
//! ```
//! # use anyhow::Result;
//! use evsum::workload;
//! # fn main() -> Result<()> {
//! let wc = workload::named("wc")?;
//! # Ok(())
//! # }
//! ```

use crate::Workload;
use anyhow::{bail, Result};
use bytes::Bytes;
use clap::Parser;

pub mod filter;
pub mod pi;
pub mod sum_by_key;
pub mod wc;

/// Names accepted by [`named`].
pub const NAMES: [&str; 4] = ["wc", "filter", "pi", "sum-by-key"];

/// Gets the [`Workload`] named `name`.
///
/// Returns [`None`] if no application with the given name was found.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "wc" => Some(Workload {
            map_fn: wc::map,
            reduce_fn: wc::reduce,
        }),
        "filter" | "grep" => Some(Workload {
            map_fn: filter::map,
            reduce_fn: filter::reduce,
        }),
        "pi" => Some(Workload {
            map_fn: pi::map,
            reduce_fn: pi::reduce,
        }),
        "sum-by-key" => Some(Workload {
            map_fn: sum_by_key::map,
            reduce_fn: sum_by_key::reduce,
        }),
        _ => None,
    }
}

/// Gets the [`Workload`] named `name`.
///
/// Returns an [`anyhow::Error`] if no application with the given name was found.
pub fn named(name: &str) -> Result<Workload> {
    match try_named(name) {
        Some(app) => Ok(app),
        None => bail!("No app named `{}` found (known: {}).", name, NAMES.join(", ")),
    }
}

/// Parses a workload's auxiliary arguments.
///
/// `aux` holds a JSON array of strings; an empty buffer means no arguments.
pub(crate) fn parse_aux<T: Parser>(aux: &Bytes) -> Result<T> {
    let args: Vec<String> = if aux.is_empty() {
        Vec::new()
    } else {
        serde_json::from_slice(aux)?
    };
    Ok(T::try_parse_from(args)?)
}

/// Serializes auxiliary arguments the way [`parse_aux`] expects them.
pub fn serialize_aux(args: &[String]) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(args)?))
}
