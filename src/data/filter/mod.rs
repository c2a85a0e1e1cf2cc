//! Row filtering over a parsed sheet.
//!
//! A [`FilterEngine`] owns a set of named [`FilterConfig`]s and evaluates the
//! active ones as a conjunction over each row. Filters keep a frozen copy
//! of their initial configuration so they can be reset, and their runtime
//! state can be exported to and restored from JSON.

mod builder;
mod predicate;
mod types;

use std::collections::BTreeMap;

use log::{debug, warn};

pub use builder::{DEFAULT_SELECT_THRESHOLD, numeric_bins};
pub use predicate::{EMPTY_LABEL, coerce_bool, evaluate, select_key};
pub use types::{
    DateValues, FilterConfig, FilterOperator, FilterStateEntry, FilterUpdate, FilterValues,
    NumericRange, RangeMode, RangeValues, SearchValues, SelectOption,
};

use predicate::CompiledFilter;

use super::model::{ExcelData, Row};

// ---------------------------------------------------------------------------
// FilterEngine
// ---------------------------------------------------------------------------

/// Working filters keyed by id, alongside the configuration they started
/// from.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    filters: BTreeMap<String, FilterConfig>,
    initial: BTreeMap<String, FilterConfig>,
}

impl FilterEngine {
    /// Build an engine from `filters`. On duplicate ids the later one wins.
    pub fn new(filters: impl IntoIterator<Item = FilterConfig>) -> Self {
        let mut map = BTreeMap::new();
        for config in filters {
            if let Some(previous) = map.insert(config.id.clone(), config) {
                warn!("duplicate filter id '{}', keeping the later one", previous.id);
            }
        }
        FilterEngine {
            initial: map.clone(),
            filters: map,
        }
    }

    /// One inactive filter per column of `data`.
    pub fn for_data(data: &ExcelData) -> Self {
        Self::new(data.metadata.columns.iter().map(FilterConfig::for_column))
    }

    /// Rows passing every active filter, in their original order.
    pub fn apply_filters<'d>(&self, data: &'d ExcelData) -> Vec<&'d Row> {
        let compiled = self.compile();
        data.rows
            .iter()
            .filter(|row| compiled.iter().all(|f| f.accepts_row(row)))
            .collect()
    }

    /// Positions of the rows passing every active filter.
    pub fn filtered_indices(&self, rows: &[Row]) -> Vec<usize> {
        let compiled = self.compile();
        rows.iter()
            .enumerate()
            .filter(|(_, row)| compiled.iter().all(|f| f.accepts_row(row)))
            .map(|(i, _)| i)
            .collect()
    }

    fn compile(&self) -> Vec<CompiledFilter<'_>> {
        self.filters
            .values()
            .filter(|f| f.active)
            .map(CompiledFilter::new)
            .collect()
    }

    /// Merge `update` into the working filter. Returns `false` for an
    /// unknown id.
    pub fn update_filter(&mut self, id: &str, update: FilterUpdate) -> bool {
        match self.filters.get_mut(id) {
            Some(config) => {
                update.apply_to(config);
                true
            }
            None => {
                debug!("update for unknown filter '{id}' ignored");
                false
            }
        }
    }

    /// Restore one filter to its initial configuration.
    pub fn reset_filter(&mut self, id: &str) -> bool {
        match (self.filters.get_mut(id), self.initial.get(id)) {
            (Some(current), Some(initial)) => {
                *current = initial.clone();
                true
            }
            _ => {
                debug!("reset for unknown filter '{id}' ignored");
                false
            }
        }
    }

    pub fn reset_all_filters(&mut self) {
        self.filters = self.initial.clone();
    }

    /// Runtime state of every filter, ordered by id.
    pub fn export_filter_state(&self) -> Vec<FilterStateEntry> {
        self.filters
            .values()
            .map(|f| FilterStateEntry {
                id: f.id.clone(),
                active: f.active,
                operator: f.operator,
                values: f.values.clone(),
            })
            .collect()
    }

    /// Apply previously exported state. Entries for ids this engine does
    /// not know are skipped. Returns how many entries were applied.
    pub fn import_filter_state(&mut self, entries: &[FilterStateEntry]) -> usize {
        let mut applied = 0;
        for entry in entries {
            let Some(config) = self.filters.get_mut(&entry.id) else {
                debug!("filter state for unknown id '{}' skipped", entry.id);
                continue;
            };
            config.active = entry.active;
            config.operator = entry.operator;
            config.values = entry.values.clone();
            applied += 1;
        }
        applied
    }

    pub fn filter(&self, id: &str) -> Option<FilterConfig> {
        self.filters.get(id).cloned()
    }

    pub fn filters(&self) -> Vec<FilterConfig> {
        self.filters.values().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.filters.values().filter(|f| f.active).count()
    }
}
