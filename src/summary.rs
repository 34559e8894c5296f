// 📊 Summary Statistics
// Total / filtered counts and count-by-category tables (read-only)

use crate::dataset::{Dataset, TempleRecord};
use crate::selector::Selection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category → count, sorted by descending count then name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrequencyTable {
    pub entries: Vec<(String, usize)>,
}

impl FrequencyTable {
    pub fn count_by<F>(records: &[TempleRecord], key: F) -> Self
    where
        F: Fn(&TempleRecord) -> &str,
    {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in records {
            *counts.entry(key(record)).or_insert(0) += 1;
        }

        let mut entries: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        FrequencyTable { entries }
    }

    pub fn get(&self, category: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(k, _)| k == category)
            .map(|(_, v)| *v)
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, v)| v).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Every record in the dataset
    pub total: usize,
    /// Records whose affiliation is selected (with or without coordinates)
    pub filtered: usize,
    pub mappable: usize,
    pub unmappable: usize,
    /// Full dataset, independent of the selection
    pub by_affiliation: FrequencyTable,
    /// Full dataset, independent of the selection
    pub by_province: FrequencyTable,
}

impl Summary {
    pub fn compute(dataset: &Dataset, selection: &Selection) -> Self {
        let records = &dataset.records;

        Summary {
            total: records.len(),
            filtered: selection.filter(records).count(),
            mappable: dataset.mappable().count(),
            unmappable: dataset.unmappable,
            by_affiliation: FrequencyTable::count_by(records, |r| r.affiliation.as_str()),
            by_province: FrequencyTable::count_by(records, |r| r.province.as_str()),
        }
    }

    pub fn headline(&self) -> String {
        format!("총 사찰 수: {} | 선택된 사찰 수: {}", self.total, self.filtered)
    }
}
