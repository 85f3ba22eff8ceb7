//! Word count.
//!
//! Words are maximal runs of alphabetic characters, lowercased. The map
//! side pre-aggregates counts per input file before emitting them.

use std::collections::HashMap;

use crate::utils::{string_from_bytes, u64_from_bytes};
use crate::*;
use anyhow::Result;
use bytes::Bytes;

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let text = string_from_bytes(kv.value)?;
    let mut counts: HashMap<String, u64> = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphabetic())
        .filter(|s| !s.is_empty())
    {
        *counts.entry(word.to_lowercase()).or_default() += 1;
    }

    let iter = counts
        .into_iter()
        .map(|(word, count)| -> Result<KeyValue> { Ok(KeyValue::new(word, count.to_string())) });
    Ok(Box::new(iter))
}

pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let mut count = 0u64;
    for value in values {
        count += u64_from_bytes(value)?;
    }
    let word = string_from_bytes(key)?;
    Ok(Bytes::from(format!("{word} {count}\n")))
}
