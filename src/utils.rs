//! Conversions between [`Bytes`] and the text the workloads work with.
//!

use anyhow::Result;
use bytes::Bytes;

/// Read an entire [`Bytes`] slice into a [`String`].
///
/// Returns an error if the slice contains invalid UTF-8.
pub fn string_from_bytes(buf: Bytes) -> Result<String> {
    Ok(String::from_utf8(buf.as_ref().into())?)
}

/// Parse a decimal, possibly whitespace-padded, [`u64`] from a [`Bytes`] slice.
pub fn u64_from_bytes(buf: Bytes) -> Result<u64> {
    Ok(string_from_bytes(buf)?.trim().parse()?)
}

/// Parse a decimal [`i64`] from a [`Bytes`] slice.
pub fn i64_from_bytes(buf: Bytes) -> Result<i64> {
    Ok(string_from_bytes(buf)?.trim().parse()?)
}
