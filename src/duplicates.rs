use indexmap::IndexMap;

use crate::mask::SimilarityMask;
use crate::options::ClassifyOpts;
use crate::record::ComparisonRecord;

/// A comparison row together with its similarity mask. Keeping the two together means that
/// dropping a row always drops its mask, so no mask can refer to a row that no longer exists.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskedRecord {
    pub rec: ComparisonRecord,
    pub mask: SimilarityMask,
}

impl MaskedRecord {
    pub fn new(rec: ComparisonRecord, opts: &ClassifyOpts) -> Self {
        let mask = SimilarityMask::of(&rec, opts);
        MaskedRecord { rec, mask }
    }
}

/// The result of removing same-well duplicates from a group.
///
/// # Fields
///
/// * `kept` - The surviving rows, in their original order
/// * `removed` - The rows which were dropped for having lower read support
#[derive(Debug, Default)]
pub struct Reduction {
    pub kept: Vec<MaskedRecord>,
    pub removed: Vec<MaskedRecord>,
}

/// Removes redundant same-well matches from a group.
///
/// Qualifying rows whose two sequences come from the same well are grouped by well. Within each
/// well holding more than one such row, every row whose read support is strictly below the
/// well's maximum is dropped. Rows sharing the maximum are all kept, as are rows without a read
/// support value.
pub fn drop_same_well_duplicates(rows: Vec<MaskedRecord>) -> Reduction {
    let mut dropped = vec![false; rows.len()];

    {
        let mut by_well: IndexMap<&str, Vec<usize>> = IndexMap::new();
        for (pos, row) in rows.iter().enumerate() {
            if !(row.mask.qualifying() && row.mask.same_well) {
                continue;
            }
            // same_well guarantees the well id is present
            if let Some(well) = row.rec.first_well_id.as_deref() {
                by_well.entry(well).or_default().push(pos);
            }
        }

        for (well, positions) in by_well.iter().filter(|(_, p)| p.len() > 1) {
            let max_support = positions
                .iter()
                .filter_map(|&pos| rows[pos].rec.first_read_support)
                .reduce(f64::max);

            let Some(max_support) = max_support else {
                continue;
            };

            for &pos in positions.iter() {
                if rows[pos].rec.first_read_support.is_some_and(|v| v < max_support) {
                    debug!(
                        "dropping row {} from well {well} (read support below {max_support})",
                        rows[pos].rec.row + 1
                    );
                    dropped[pos] = true;
                }
            }
        }
    }

    let mut reduction = Reduction::default();
    for (row, drop) in rows.into_iter().zip(dropped) {
        if drop {
            reduction.removed.push(row);
        } else {
            reduction.kept.push(row);
        }
    }
    reduction
}
