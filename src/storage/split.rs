use serde::{Deserialize, Serialize};
use crate::core::{PrimaryKey, PrimaryKeySchema};
use super::cells::VersionedCells;

/// Contiguous key range `[lower_bound, upper_bound)` with a locality hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub lower_bound: PrimaryKey,
    pub upper_bound: PrimaryKey,
    pub location: String,
}

/// Cuts the key space of `cells` into ranges of roughly `target_bytes`.
///
/// Rows are walked in key order and a boundary is placed at the first row
/// that starts after the running size reached the target. The first split
/// starts at `INF_MIN`, the last ends at `INF_MAX`.
pub fn compute_splits(
    cells: &VersionedCells,
    schema: &[PrimaryKeySchema],
    target_bytes: u64,
    locations: &[String],
) -> Vec<Split> {
    let target = target_bytes.max(1);
    let mut boundaries: Vec<PrimaryKey> = Vec::new();
    let mut accumulated = 0u64;
    for (pk, size) in cells.row_sizes() {
        if accumulated >= target {
            boundaries.push(pk.clone());
            accumulated = 0;
        }
        accumulated += size;
    }

    let mut splits = Vec::with_capacity(boundaries.len() + 1);
    let mut lower = PrimaryKey::inf_min(schema);
    for boundary in boundaries {
        let location = location_at(locations, splits.len());
        splits.push(Split {
            lower_bound: lower,
            upper_bound: boundary.clone(),
            location,
        });
        lower = boundary;
    }
    let location = location_at(locations, splits.len());
    splits.push(Split {
        lower_bound: lower,
        upper_bound: PrimaryKey::inf_max(schema),
        location,
    });
    splits
}

fn location_at(locations: &[String], i: usize) -> String {
    if locations.is_empty() {
        return "local".to_string();
    }
    locations[i % locations.len()].clone()
}
