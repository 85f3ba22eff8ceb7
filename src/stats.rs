//! Column statistics over summary records.

use std::fmt;

use crate::summary::{Summary, SUMMARY_FIELDS};

/// Running mean and variance of every summary field.
///
/// Values are folded in one at a time (Welford's update) and partial
/// results from different partitions can be merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldStats {
    count: u64,
    mean: [f64; SUMMARY_FIELDS],
    // sum of squared deviations from the mean
    m2: [f64; SUMMARY_FIELDS],
}

impl FieldStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_summaries<'a, I>(summaries: I) -> Self
    where
        I: IntoIterator<Item = &'a Summary>,
    {
        let mut stats = Self::new();
        for summary in summaries {
            stats.push(summary);
        }
        stats
    }

    pub fn push(&mut self, summary: &Summary) {
        self.count += 1;
        let n = self.count as f64;
        for (i, value) in summary.fields().into_iter().enumerate() {
            let value = value as f64;
            let delta = value - self.mean[i];
            self.mean[i] += delta / n;
            self.m2[i] += delta * (value - self.mean[i]);
        }
    }

    pub fn merge(&mut self, other: &FieldStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;
        for i in 0..SUMMARY_FIELDS {
            let delta = other.mean[i] - self.mean[i];
            self.mean[i] += delta * n_b / n;
            self.m2[i] += other.m2[i] + delta * delta * n_a * n_b / n;
        }
        self.count += other.count;
    }

    /// Number of summaries folded in.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Per-field means; all zero when nothing was folded in.
    pub fn mean(&self) -> [f64; SUMMARY_FIELDS] {
        self.mean
    }

    /// Per-field sample variance (divisor `n - 1`); zero for fewer than two
    /// summaries.
    pub fn variance(&self) -> [f64; SUMMARY_FIELDS] {
        if self.count < 2 {
            return [0.0; SUMMARY_FIELDS];
        }
        let denom = (self.count - 1) as f64;
        self.m2.map(|m2| m2 / denom)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, row: &[f64]) -> fmt::Result {
    let mut first = true;
    for value in row {
        if !first {
            f.write_str(" ")?;
        }
        write!(f, "{value}")?;
        first = false;
    }
    Ok(())
}

impl fmt::Display for FieldStats {
    /// Two whitespace-delimited lines: the means, then the variances.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_row(f, &self.mean())?;
        writeln!(f)?;
        write_row(f, &self.variance())
    }
}
