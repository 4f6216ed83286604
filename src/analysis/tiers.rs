use std::cmp::Reverse;

use itertools::Itertools;
use serde::Serialize;

use crate::analysis::clustering::ClusterCounts;

/// Emphasis class derived from a recurrence count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Tier {
    A,
    B,
    C,
    /// Any count above the highest entry of the tier table.
    Repeated,
}

const TIER_TABLE: &[(usize, Tier)] = &[(2, Tier::A), (3, Tier::B), (4, Tier::C)];

impl Tier {
    /// `None` for counts that are not recurrences at all.
    pub fn for_count(count: usize) -> Option<Tier> {
        if count < 2 {
            return None;
        }
        let tier = TIER_TABLE
            .iter()
            .find(|(threshold, _)| *threshold == count)
            .map(|(_, tier)| *tier)
            .unwrap_or(Tier::Repeated);
        Some(tier)
    }

    pub fn letter(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::Repeated => "R",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyEntry {
    pub value: f64,
    pub count: usize,
    pub tier: Tier,
}

/// Entries with an equal count.
#[derive(Debug, Clone, PartialEq)]
pub struct CountGroup<'a> {
    pub count: usize,
    pub entries: Vec<&'a FrequencyEntry>,
}

/// Recurring values ordered by count descending, then value descending.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AnalysisResult {
    entries: Vec<FrequencyEntry>,
}

impl AnalysisResult {
    pub fn entries(&self) -> &[FrequencyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn groups(&self) -> Vec<CountGroup<'_>> {
        let grouped = self.entries.iter().group_by(|entry| entry.count);
        let groups = (&grouped)
            .into_iter()
            .map(|(count, group)| CountGroup {
                count,
                entries: group.collect(),
            })
            .collect();
        groups
    }
}

pub fn assign_tiers(counts: &ClusterCounts) -> AnalysisResult {
    let entries = counts
        .counts
        .iter()
        .sorted_by_key(|&(key, count)| (Reverse(*count), Reverse(*key)))
        .filter_map(|(key, &count)| {
            Tier::for_count(count).map(|tier| FrequencyEntry {
                value: key.value(),
                count,
                tier,
            })
        })
        .collect();
    AnalysisResult { entries }
}
