use super::types::{
    DateValues, FilterConfig, FilterOperator, FilterValues, NumericRange, RangeMode, RangeValues,
    SearchValues, SelectOption,
};
use crate::data::model::{CellValue, ColumnInfo, ColumnStatistics, ColumnType};

/// Distinct-value count up to which text columns get a pick list.
pub const DEFAULT_SELECT_THRESHOLD: usize = 20;

impl FilterConfig {
    /// Starting filter for a column, inactive until the caller turns it on.
    pub fn for_column(column: &ColumnInfo) -> FilterConfig {
        Self::for_column_with_threshold(column, DEFAULT_SELECT_THRESHOLD)
    }

    /// Numbers get a continuous range over the observed bounds, dates a date
    /// window, booleans a tri-state toggle. Text columns with at most
    /// `select_threshold` distinct values get a pick list; everything else
    /// falls back to free-text search.
    pub fn for_column_with_threshold(column: &ColumnInfo, select_threshold: usize) -> FilterConfig {
        let (operator, values) = match column.column_type {
            ColumnType::Number => match numeric_bounds(column) {
                Some((min, max)) => (
                    FilterOperator::Between,
                    FilterValues::Range(RangeValues {
                        min,
                        max,
                        current_min: min,
                        current_max: max,
                        mode: RangeMode::Continuous,
                    }),
                ),
                None => search(),
            },
            ColumnType::Date => match date_bounds(column) {
                Some((earliest, latest)) => (
                    FilterOperator::Between,
                    FilterValues::Date(DateValues {
                        earliest,
                        latest,
                        current_start: earliest,
                        current_end: latest,
                    }),
                ),
                None => search(),
            },
            ColumnType::Boolean => (FilterOperator::Equals, FilterValues::Boolean(None)),
            ColumnType::String
                if column.unique_count > 0 && column.unique_count <= select_threshold =>
            {
                let options = column
                    .unique_values
                    .iter()
                    .map(|value| SelectOption {
                        value: value.clone(),
                        selected: false,
                        count: None,
                    })
                    .collect();
                (FilterOperator::Equals, FilterValues::Select(options))
            }
            ColumnType::String | ColumnType::Mixed => search(),
        };

        FilterConfig {
            id: format!("{}-{}", column.index, column.name),
            display_name: column.name.clone(),
            column: column.name.clone(),
            column_index: column.index,
            active: false,
            operator,
            values,
        }
    }
}

fn search() -> (FilterOperator, FilterValues) {
    (
        FilterOperator::Contains,
        FilterValues::Search(SearchValues::default()),
    )
}

fn numeric_bounds(column: &ColumnInfo) -> Option<(f64, f64)> {
    if let Some(ColumnStatistics::Numeric { min, max, .. }) = &column.statistics {
        return Some((*min, *max));
    }
    column
        .unique_values
        .iter()
        .filter_map(CellValue::as_number)
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
        })
}

fn date_bounds(column: &ColumnInfo) -> Option<(chrono::NaiveDateTime, chrono::NaiveDateTime)> {
    if let Some(ColumnStatistics::Date { min, max }) = &column.statistics {
        return Some((*min, *max));
    }
    let dates = column.unique_values.iter().filter_map(CellValue::as_date);
    let (lo, hi) = dates.fold((None, None), |(lo, hi), d| {
        (
            Some(lo.map_or(d, |l: chrono::NaiveDateTime| l.min(d))),
            Some(hi.map_or(d, |h: chrono::NaiveDateTime| h.max(d))),
        )
    });
    lo.zip(hi)
}

/// Split `[min, max]` into `count` equal-width bins. Every bin includes its
/// lower bound; only the last includes its upper bound, so each value
/// lands in exactly one bin.
pub fn numeric_bins(min: f64, max: f64, count: usize) -> Vec<NumericRange> {
    if count == 0 || !min.is_finite() || !max.is_finite() || min > max {
        return Vec::new();
    }
    if min == max {
        return vec![bin(0, min, max, true)];
    }
    let width = (max - min) / count as f64;
    (0..count)
        .map(|i| {
            let last = i + 1 == count;
            let lo = min + width * i as f64;
            let hi = if last { max } else { min + width * (i + 1) as f64 };
            bin(i, lo, hi, last)
        })
        .collect()
}

fn bin(i: usize, lo: f64, hi: f64, include_max: bool) -> NumericRange {
    NumericRange {
        id: format!("bin-{i}"),
        label: format!("{} to {}", CellValue::Number(lo), CellValue::Number(hi)),
        min: lo,
        max: hi,
        include_min: true,
        include_max,
    }
}
