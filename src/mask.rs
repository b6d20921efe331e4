use crate::options::{ClassifyOpts, QUALIFYING_IDENTITY_MIN};
use crate::record::ComparisonRecord;

/// Per-row booleans derived from the comparison scores and identifiers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SimilarityMask {
    pub high_identity: bool,
    pub high_global: bool,
    pub same_well: bool,
    pub same_donor: bool,
}

impl SimilarityMask {
    /// Computes the mask of a single row. A missing score never passes its threshold.
    pub fn of(rec: &ComparisonRecord, opts: &ClassifyOpts) -> Self {
        SimilarityMask {
            high_identity: rec.identity.is_some_and(|v| v >= QUALIFYING_IDENTITY_MIN),
            high_global: rec.global_score.is_some_and(|v| v > opts.global_threshold),
            same_well: rec.same_well(),
            same_donor: rec.same_donor(),
        }
    }

    /// A qualifying row passes both the identity and the global score thresholds.
    pub fn qualifying(&self) -> bool {
        self.high_identity && self.high_global
    }
}
