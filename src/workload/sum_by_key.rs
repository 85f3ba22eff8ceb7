//! Sums integer values per key, i.e. `reduceByKey(+)`.
//!
//! Input lines are `key value`; lines with extra fields are rejected.

use crate::utils::{i64_from_bytes, string_from_bytes};
use crate::*;
use anyhow::{anyhow, Result};
use bytes::Bytes;

fn parse_line(line: &str) -> Result<(String, i64)> {
    let mut fields = line.split_whitespace();
    let (Some(key), Some(value), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(anyhow!("expected `key value`, got `{line}`"));
    };
    Ok((key.to_string(), value.parse()?))
}

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let text = string_from_bytes(kv.value)?;
    let pairs = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect::<Result<Vec<_>>>()?;

    let iter = pairs
        .into_iter()
        .map(|(key, value)| -> Result<KeyValue> { Ok(KeyValue::new(key, value.to_string())) });
    Ok(Box::new(iter))
}

pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let mut sum = 0i64;
    for value in values {
        sum += i64_from_bytes(value)?;
    }
    let key = string_from_bytes(key)?;
    Ok(Bytes::from(format!("{key} {sum}\n")))
}
