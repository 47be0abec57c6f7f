use serde::Serialize;

/// One row of the lap list, derived from the cumulative lap samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LapSplit {
    /// 1-based, chronological.
    pub lap_number: usize,
    pub split_ms: u64,
    pub cumulative_ms: u64,
}

/// Splits in chronological order. The first lap's split is measured from zero.
pub fn lap_splits(laps: &[u64]) -> Vec<LapSplit> {
    let mut previous = 0u64;
    laps.iter()
        .enumerate()
        .map(|(index, &cumulative_ms)| {
            let split = LapSplit {
                lap_number: index + 1,
                split_ms: cumulative_ms.saturating_sub(previous),
                cumulative_ms,
            };
            previous = cumulative_ms;
            split
        })
        .collect()
}

/// Newest lap first, the order lap lists are usually displayed in.
pub fn most_recent_first(splits: &[LapSplit]) -> Vec<LapSplit> {
    splits.iter().rev().copied().collect()
}
