use crate::registry::{ParentRowIndex, RowRegistry};
use std::collections::BTreeMap;

/// Score totals per section, resolved through the registry's parent lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionTotals {
    totals: BTreeMap<ParentRowIndex, f64>,
    /// Sum of scores whose address has no registered parent.
    unassigned: f64,
}

impl SectionTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scores<'a, I>(registry: &RowRegistry, scores: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut totals = Self::new();
        totals.add_many(registry, scores);
        totals
    }

    pub fn add_many<'a, I>(&mut self, registry: &RowRegistry, scores: I)
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        for (address, score) in scores {
            match registry.parent_of(address) {
                Some(parent) => *self.totals.entry(parent).or_insert(0.0) += score,
                None => self.unassigned += score,
            }
        }
    }

    pub fn total_for(&self, parent: ParentRowIndex) -> f64 {
        self.totals.get(&parent).copied().unwrap_or(0.0)
    }

    pub fn unassigned(&self) -> f64 {
        self.unassigned
    }

    pub fn grand_total(&self) -> f64 {
        self.totals.values().sum::<f64>() + self.unassigned
    }

    /// Totals per parent, ascending by parent.
    pub fn iter(&self) -> impl Iterator<Item = (ParentRowIndex, f64)> + '_ {
        self.totals.iter().map(|(&p, &t)| (p, t))
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty() && self.unassigned == 0.0
    }
}
