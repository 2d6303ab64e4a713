//! Sharding datasets across workers.
//!
//! Plain objectives shard by contiguous row ranges. Ranking objectives need
//! every row of a query group on one worker, so they repartition whole groups
//! and reject layouts that end up badly skewed.

use crate::core::error::{GbtError, Result};
use crate::dataset::dataset::Dataset;

/// Split rows into `num_workers` contiguous ranges of near-equal size.
///
/// The first `num_rows % num_workers` shards get one extra row. Shards may be
/// empty when there are fewer rows than workers.
pub fn shard_rows(dataset: &Dataset, num_workers: usize) -> Result<Vec<Dataset>> {
    if num_workers == 0 {
        return Err(GbtError::invalid_parameter(
            "num_workers",
            0,
            "must be at least 1",
        ));
    }
    let n = dataset.num_rows();
    let base = n / num_workers;
    let extra = n % num_workers;

    let mut shards = Vec::with_capacity(num_workers);
    let mut start = 0;
    for rank in 0..num_workers {
        let len = base + usize::from(rank < extra);
        let rows: Vec<usize> = (start..start + len).collect();
        shards.push(dataset.subset(&rows)?);
        start += len;
    }
    Ok(shards)
}

/// Assign whole query groups to workers.
///
/// Groups are placed largest first on the least-loaded worker (ties go to the
/// lowest rank); within a worker they keep their original order. Fails when
/// the largest shard exceeds `max_skew` times the mean shard size while there
/// were enough groups to balance.
pub fn repartition_by_group(
    dataset: &Dataset,
    num_workers: usize,
    max_skew: f64,
) -> Result<Vec<Dataset>> {
    if num_workers == 0 {
        return Err(GbtError::invalid_parameter(
            "num_workers",
            0,
            "must be at least 1",
        ));
    }
    let group_ptr = dataset.group_ptr().ok_or_else(|| {
        GbtError::dataset("qid", "repartitioning by group requires query groups")
    })?;
    let num_groups = group_ptr.len() - 1;

    let mut order: Vec<usize> = (0..num_groups).collect();
    order.sort_by_key(|&g| std::cmp::Reverse(group_ptr[g + 1] - group_ptr[g]));

    let mut loads = vec![0usize; num_workers];
    let mut assigned: Vec<Vec<usize>> = vec![Vec::new(); num_workers];
    for g in order {
        let rank = loads
            .iter()
            .enumerate()
            .min_by_key(|&(rank, &load)| (load, rank))
            .map_or(0, |(rank, _)| rank);
        loads[rank] += group_ptr[g + 1] - group_ptr[g];
        assigned[rank].push(g);
    }

    check_skew(&loads, num_groups, max_skew)?;

    assigned
        .into_iter()
        .map(|mut groups| {
            groups.sort_unstable();
            let rows: Vec<usize> = groups
                .iter()
                .flat_map(|&g| group_ptr[g]..group_ptr[g + 1])
                .collect();
            dataset.subset(&rows)
        })
        .collect()
}

fn check_skew(loads: &[usize], num_groups: usize, max_skew: f64) -> Result<()> {
    let total: usize = loads.iter().sum();
    if total == 0 || num_groups < loads.len() {
        return Ok(());
    }
    let mean = total as f64 / loads.len() as f64;
    let max = loads.iter().copied().max().unwrap_or(0) as f64;
    let skew = max / mean;
    log::debug!("Group repartition loads {:?}, skew {:.3}", loads, skew);
    if skew > max_skew {
        return Err(GbtError::dataset(
            "qid",
            format!(
                "shard sizes {:?} are too skewed after repartitioning by group: \
                 largest/mean = {:.2} exceeds max_shard_skew = {}",
                loads, skew, max_skew
            ),
        ));
    }
    Ok(())
}

/// Split a dataset by a 0/1 validation indicator column.
///
/// Returns `(train, validation)`; any value other than 0 or 1 is a data error.
pub fn split_by_indicator(dataset: &Dataset, indicator: &[f32]) -> Result<(Dataset, Dataset)> {
    if indicator.len() != dataset.num_rows() {
        return Err(GbtError::dataset(
            "validation_indicator",
            format!(
                "expected {} values, got {}",
                dataset.num_rows(),
                indicator.len()
            ),
        ));
    }
    let mut train_rows = Vec::new();
    let mut valid_rows = Vec::new();
    for (row, &flag) in indicator.iter().enumerate() {
        if flag == 0.0 {
            train_rows.push(row);
        } else if flag == 1.0 {
            valid_rows.push(row);
        } else {
            return Err(GbtError::dataset(
                "validation_indicator",
                format!("row {} has non-boolean value {}", row, flag),
            ));
        }
    }
    Ok((dataset.subset(&train_rows)?, dataset.subset(&valid_rows)?))
}
