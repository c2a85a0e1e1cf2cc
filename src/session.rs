use crate::config::IngestConfig;
use crate::data::filter::{
    FilterConfig, FilterEngine, FilterStateEntry, FilterUpdate, FilterValues, SelectOption,
    select_key,
};
use crate::data::model::{CellValue, ExcelData, Row};

// ---------------------------------------------------------------------------
// Exploration session
// ---------------------------------------------------------------------------

/// A parsed sheet plus its filters, independent of any rendering. The
/// visible row indices are recomputed after every filter change.
#[derive(Debug, Clone)]
pub struct Session {
    pub data: ExcelData,
    pub engine: FilterEngine,
    /// Indices of rows passing the current filters (cached).
    visible_indices: Vec<usize>,
}

impl Session {
    /// One inactive filter per column, everything visible.
    pub fn new(data: ExcelData, config: &IngestConfig) -> Self {
        let engine = FilterEngine::new(
            data.metadata
                .columns
                .iter()
                .map(|c| FilterConfig::for_column_with_threshold(c, config.select_threshold)),
        );
        Self::with_engine(data, engine)
    }

    pub fn with_engine(data: ExcelData, engine: FilterEngine) -> Self {
        let mut session = Session {
            data,
            engine,
            visible_indices: Vec::new(),
        };
        session.refilter();
        session
    }

    pub fn visible_indices(&self) -> &[usize] {
        &self.visible_indices
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.visible_indices.iter().map(|&i| &self.data.rows[i])
    }

    /// Recompute `visible_indices` after a filter change.
    pub fn refilter(&mut self) {
        self.visible_indices = self.engine.filtered_indices(&self.data.rows);
    }

    pub fn update_filter(&mut self, id: &str, update: FilterUpdate) -> bool {
        let changed = self.engine.update_filter(id, update);
        if changed {
            self.refilter();
        }
        changed
    }

    pub fn import_state(&mut self, entries: &[FilterStateEntry]) -> usize {
        let applied = self.engine.import_filter_state(entries);
        self.refilter();
        applied
    }

    pub fn reset(&mut self) {
        self.engine.reset_all_filters();
        self.refilter();
    }

    /// Toggle one option of a select filter and activate the filter.
    /// Returns `false` when `id` is not a select filter or has no such option.
    pub fn toggle_select_value(&mut self, id: &str, value: &CellValue) -> bool {
        let key = select_key(value);
        self.edit_options(id, |options| {
            let mut found = false;
            for option in options.iter_mut().filter(|o| select_key(&o.value) == key) {
                option.selected = !option.selected;
                found = true;
            }
            found
        })
    }

    /// Select every option of a select filter.
    pub fn select_all(&mut self, id: &str) -> bool {
        self.edit_options(id, |options| {
            options.iter_mut().for_each(|o| o.selected = true);
            true
        })
    }

    /// Deselect every option. An empty selection is pass-through, so this
    /// shows all rows again.
    pub fn select_none(&mut self, id: &str) -> bool {
        self.edit_options(id, |options| {
            options.iter_mut().for_each(|o| o.selected = false);
            true
        })
    }

    fn edit_options(
        &mut self,
        id: &str,
        edit: impl FnOnce(&mut Vec<SelectOption>) -> bool,
    ) -> bool {
        let Some(FilterConfig {
            values: FilterValues::Select(mut options),
            ..
        }) = self.engine.filter(id)
        else {
            return false;
        };
        if !edit(&mut options) {
            return false;
        }
        self.update_filter(
            id,
            FilterUpdate::default()
                .active(true)
                .values(FilterValues::Select(options)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::inference::{AnalysisOptions, analyze_columns};
    use crate::data::model::ExcelMetadata;

    fn session() -> Session {
        let headers = vec!["city".to_string(), "pop".to_string()];
        let rows: Vec<Row> = vec![
            vec!["Oslo".into(), 700.0.into()],
            vec!["Bergen".into(), 290.0.into()],
            vec!["Oslo".into(), 710.0.into()],
        ];
        let columns = analyze_columns(&headers, &rows, &AnalysisOptions::default());
        let data = ExcelData {
            metadata: ExcelMetadata {
                file_name: "cities.csv".into(),
                sheet_names: vec!["Sheet1".into()],
                active_sheet: "Sheet1".into(),
                total_rows: rows.len(),
                total_columns: 2,
                columns,
                file_size: 0,
            },
            headers,
            rows,
        };
        Session::new(data, &IngestConfig::default())
    }

    #[test]
    fn starts_with_everything_visible() {
        let s = session();
        assert_eq!(s.visible_indices(), &[0, 1, 2]);
        assert_eq!(s.engine.filters().len(), 2);
        assert_eq!(s.engine.active_count(), 0);
    }

    #[test]
    fn toggling_select_values_refilters() {
        let mut s = session();
        assert!(s.toggle_select_value("0-city", &"Bergen".into()));
        assert_eq!(s.visible_indices(), &[1]);

        assert!(s.toggle_select_value("0-city", &"Oslo".into()));
        assert_eq!(s.visible_indices(), &[0, 1, 2]);

        assert!(s.toggle_select_value("0-city", &"Bergen".into()));
        assert_eq!(
            s.visible_rows().map(|r| r[1].to_string()).collect::<Vec<_>>(),
            vec!["700", "710"]
        );

        assert!(!s.toggle_select_value("0-city", &"Paris".into()));
        assert!(!s.toggle_select_value("1-pop", &"700".into()));
    }

    #[test]
    fn select_none_and_reset_show_all() {
        let mut s = session();
        s.toggle_select_value("0-city", &"Bergen".into());
        assert!(s.select_none("0-city"));
        assert_eq!(s.visible_indices().len(), 3);

        s.toggle_select_value("0-city", &"Bergen".into());
        s.reset();
        assert_eq!(s.visible_indices().len(), 3);
        assert_eq!(s.engine.active_count(), 0);
    }
}
