// 🔎 Affiliation Selector
// Distinct affiliation universe + the user's chosen subset

use crate::dataset::TempleRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// How the selectable universe is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffiliationOrder {
    #[default]
    #[serde(alias = "alpha")]
    Alphabetical,
    #[serde(alias = "frequency")]
    ByFrequency,
}

impl AffiliationOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "alpha" | "alphabetical" => Some(AffiliationOrder::Alphabetical),
            "frequency" | "byfrequency" | "count" => Some(AffiliationOrder::ByFrequency),
            _ => None,
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            AffiliationOrder::Alphabetical => AffiliationOrder::ByFrequency,
            AffiliationOrder::ByFrequency => AffiliationOrder::Alphabetical,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AffiliationOrder::Alphabetical => "가나다순",
            AffiliationOrder::ByFrequency => "사찰 수순",
        }
    }
}

/// Distinct affiliations, in the requested order
///
/// `ByFrequency` sorts by descending record count, ties broken alphabetically.
pub fn affiliations(records: &[TempleRecord], order: AffiliationOrder) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.affiliation.as_str()).or_insert(0) += 1;
    }

    let mut universe: Vec<(&str, usize)> = counts.into_iter().collect();
    match order {
        AffiliationOrder::Alphabetical => universe.sort_by(|a, b| a.0.cmp(b.0)),
        AffiliationOrder::ByFrequency => {
            universe.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
        }
    }

    universe.into_iter().map(|(name, _)| name.to_string()).collect()
}

// ============================================================================
// SELECTION
// ============================================================================

/// Which affiliations are shown
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// The "select all" shortcut: every affiliation in the universe
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn none() -> Self {
        Selection::Only(BTreeSet::new())
    }

    pub fn only<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(items.into_iter().map(Into::into).collect())
    }

    /// Build a selection from the repeated `affiliations` query values.
    /// No values at all means all; otherwise the non-empty values are
    /// selected, so a lone empty value selects nothing.
    pub fn from_query<I, S>(values: Option<I>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match values {
            None => Selection::All,
            Some(values) => Selection::Only(
                values
                    .into_iter()
                    .map(|v| v.as_ref().trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect(),
            ),
        }
    }

    pub fn contains(&self, affiliation: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.contains(affiliation),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Only(set) if set.is_empty())
    }

    /// Concrete list of selected affiliations, in universe order
    pub fn resolve(&self, universe: &[String]) -> Vec<String> {
        universe
            .iter()
            .filter(|a| self.contains(a))
            .cloned()
            .collect()
    }

    /// Flip one affiliation on or off. Toggling from `All` materializes the
    /// universe first.
    pub fn toggle(&mut self, affiliation: &str, universe: &[String]) {
        if let Selection::All = self {
            *self = Selection::only(universe.iter().cloned());
        }
        if let Selection::Only(set) = self {
            if !set.remove(affiliation) {
                set.insert(affiliation.to_string());
            }
        }
    }

    /// Records passing the filter
    pub fn filter<'a>(&'a self, records: &'a [TempleRecord]) -> impl Iterator<Item = &'a TempleRecord> + 'a {
        records.iter().filter(move |r| self.contains(&r.affiliation))
    }
}
