//! Weighted quantile summaries.
//!
//! Each worker summarizes its shard per feature; summaries are exchanged and
//! merged in rank order so every worker ends up with the same cuts. A summary
//! is a sorted list of distinct values with the weight of the rows they stand
//! for; pruning keeps the cumulative weight at every retained value exact.

use crate::core::error::{GbtError, Result};
use crate::core::types::FeatureValue;

/// One distinct value of a summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryEntry {
    pub value: FeatureValue,
    pub weight: f64,
}

/// Bounded weighted summary of one feature's values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedSummary {
    entries: Vec<SummaryEntry>,
}

impl WeightedSummary {
    /// Summarize raw `(value, weight)` observations, keeping at most `limit`
    /// entries.
    pub fn from_values(mut values: Vec<(FeatureValue, f64)>, limit: usize) -> Self {
        values.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut entries: Vec<SummaryEntry> = Vec::new();
        for (value, weight) in values {
            match entries.last_mut() {
                Some(last) if last.value == value => last.weight += weight,
                _ => entries.push(SummaryEntry { value, weight }),
            }
        }
        let mut summary = WeightedSummary { entries };
        summary.prune(limit);
        summary
    }

    /// Merge summaries in the given order.
    pub fn merge(parts: &[WeightedSummary], limit: usize) -> Self {
        let values = parts
            .iter()
            .flat_map(|p| p.entries.iter().map(|e| (e.value, e.weight)))
            .collect();
        WeightedSummary::from_values(values, limit)
    }

    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Reduce to at most `limit` entries.
    ///
    /// The minimum and maximum are always kept. Interior entries are picked at
    /// evenly spaced cumulative ranks and absorb the weight of the dropped
    /// entries below them.
    pub fn prune(&mut self, limit: usize) {
        let n = self.entries.len();
        if n <= limit || limit < 2 {
            return;
        }
        let ranks = self.cumulative_ranks();
        let total = ranks[n - 1];

        let mut keep = vec![false; n];
        keep[0] = true;
        keep[n - 1] = true;
        let mut cursor = 0;
        for k in 1..limit - 1 {
            let target = total * k as f64 / (limit - 1) as f64;
            while cursor < n - 1 && ranks[cursor] < target {
                cursor += 1;
            }
            keep[cursor] = true;
        }

        let mut pruned = Vec::with_capacity(limit);
        let mut carried = 0.0;
        for (entry, kept) in self.entries.iter().zip(keep) {
            carried += entry.weight;
            if kept {
                pruned.push(SummaryEntry {
                    value: entry.value,
                    weight: carried,
                });
                carried = 0.0;
            }
        }
        self.entries = pruned;
    }

    /// Inclusive cumulative rank of every entry. Falls back to entry counts
    /// when every weight is zero.
    pub fn cumulative_ranks(&self) -> Vec<f64> {
        let use_counts = self.total_weight() <= 0.0;
        let mut acc = 0.0;
        self.entries
            .iter()
            .map(|e| {
                acc += if use_counts { 1.0 } else { e.weight };
                acc
            })
            .collect()
    }

    /// Append `[len, v0, w0, v1, w1, ...]` to `out` for exchange.
    pub fn write_flat(&self, out: &mut Vec<f64>) {
        out.push(self.entries.len() as f64);
        for e in &self.entries {
            out.push(e.value as f64);
            out.push(e.weight);
        }
    }

    /// Read one summary written by [`write_flat`](Self::write_flat),
    /// advancing `pos`.
    pub fn read_flat(data: &[f64], pos: &mut usize) -> Result<Self> {
        let len = *data
            .get(*pos)
            .ok_or_else(|| GbtError::internal("truncated quantile summary"))? as usize;
        *pos += 1;
        let end = *pos + 2 * len;
        let body = data
            .get(*pos..end)
            .ok_or_else(|| GbtError::internal("truncated quantile summary"))?;
        let entries = body
            .chunks_exact(2)
            .map(|pair| SummaryEntry {
                value: pair[0] as FeatureValue,
                weight: pair[1],
            })
            .collect();
        *pos = end;
        Ok(WeightedSummary { entries })
    }
}
