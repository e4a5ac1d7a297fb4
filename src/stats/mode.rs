//! Mode of the k-mer counts observed for one read

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which value wins when several counts are equally frequent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Lowest tied count (default)
    #[default]
    Smallest,
    /// Highest tied count
    Largest,
    /// Tied count that appears first in the read
    FirstSeen,
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smallest" | "min" => Ok(TieBreak::Smallest),
            "largest" | "max" => Ok(TieBreak::Largest),
            "first-seen" | "first_seen" | "first" => Ok(TieBreak::FirstSeen),
            _ => Err(format!("Unknown tie-break: {}", s)),
        }
    }
}

/// Most frequent value of `counts`; None when there are no counts
pub fn mode(counts: &[u64], tie_break: TieBreak) -> Option<u64> {
    let (&first, rest) = counts.split_first()?;
    if rest.iter().all(|&c| c == first) {
        return Some(first);
    }

    // value -> (frequency, first position)
    let mut tally: HashMap<u64, (usize, usize)> = HashMap::new();
    for (pos, &count) in counts.iter().enumerate() {
        tally.entry(count).or_insert((0, pos)).0 += 1;
    }

    let best = tally.values().map(|&(freq, _)| freq).max()?;
    let tied = tally
        .iter()
        .filter(|&(_, &(freq, _))| freq == best)
        .map(|(&value, &(_, pos))| (value, pos));

    match tie_break {
        TieBreak::Smallest => tied.map(|(value, _)| value).min(),
        TieBreak::Largest => tied.map(|(value, _)| value).max(),
        TieBreak::FirstSeen => tied.min_by_key(|&(_, pos)| pos).map(|(value, _)| value),
    }
}

/// Per-read outcome of a pairwise query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMode {
    /// 0 when the read had no valid counts
    pub mode: u64,
    pub accepted: bool,
}

impl ReadMode {
    pub fn evaluate(counts: &[u64], mode_min: u64, tie_break: TieBreak) -> Self {
        match mode(counts, tie_break) {
            Some(mode) => ReadMode {
                mode,
                accepted: mode >= mode_min,
            },
            None => ReadMode {
                mode: 0,
                accepted: false,
            },
        }
    }
}
