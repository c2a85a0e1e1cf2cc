//! Column type inference and summary statistics.
//!
//! Every value is classified on its own (number, boolean, date, string);
//! a column keeps a type only if all of its non-blank values agree,
//! otherwise it is `mixed`. Blank cells (null or empty text) are counted
//! but never classified.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::model::{
    CellValue, ColumnInfo, ColumnStatistics, ColumnType, Row, cell_at, parse_date, parse_number,
};

/// Knobs for column analysis. This is the serializable part of the parse
/// options and is what gets posted to the worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisOptions {
    pub compute_statistics: bool,
    /// Distinct values tracked per column; `unique_count` saturates here.
    pub unique_values_tracking_cap: usize,
    /// Distinct values returned per column.
    pub unique_values_return_limit: usize,
    pub sample_size: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            compute_statistics: true,
            unique_values_tracking_cap: 1000,
            unique_values_return_limit: 100,
            sample_size: 5,
        }
    }
}

const BOOLEAN_TOKENS: &[&str] = &["true", "false", "yes", "no", "1", "0"];

pub fn is_boolean_token(s: &str) -> bool {
    let t = s.trim();
    BOOLEAN_TOKENS.iter().any(|tok| t.eq_ignore_ascii_case(tok))
}

/// Classify one value. `None` for blanks. Numbers win over boolean tokens,
/// so `"1"` and `"0"` are numbers.
pub fn classify_value(value: &CellValue) -> Option<ColumnType> {
    match value {
        v if v.is_blank() => None,
        CellValue::Number(_) => Some(ColumnType::Number),
        CellValue::Bool(_) => Some(ColumnType::Boolean),
        CellValue::Date(_) => Some(ColumnType::Date),
        CellValue::String(s) => Some(if parse_number(s).is_some() {
            ColumnType::Number
        } else if is_boolean_token(s) {
            ColumnType::Boolean
        } else if parse_date(s).is_some() {
            ColumnType::Date
        } else {
            ColumnType::String
        }),
        CellValue::Null => None,
    }
}

/// Shared classification of all values, `mixed` on disagreement, `string`
/// when there is nothing to classify.
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> ColumnType {
    let mut seen: Option<ColumnType> = None;
    for kind in values.into_iter().filter_map(classify_value) {
        match seen {
            None => seen = Some(kind),
            Some(prev) if prev != kind => return ColumnType::Mixed,
            Some(_) => {}
        }
    }
    seen.unwrap_or(ColumnType::String)
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Statistics for a column of the given type. Only `number` and `date`
/// columns have any; non-finite numbers are ignored.
pub fn calculate_statistics(values: &[CellValue], column_type: ColumnType) -> ColumnStatistics {
    match column_type {
        ColumnType::Number => {
            let numbers: Vec<f64> = values.iter().filter_map(CellValue::as_number).collect();
            numeric_statistics(&numbers)
        }
        ColumnType::Date => {
            let dates: Vec<NaiveDateTime> = values.iter().filter_map(CellValue::as_date).collect();
            date_statistics(&dates)
        }
        _ => ColumnStatistics::Empty {},
    }
}

pub fn numeric_statistics(values: &[f64]) -> ColumnStatistics {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return ColumnStatistics::Empty {};
    }

    let mode = mode_of(&finite);
    let average = finite.iter().sum::<f64>() / finite.len() as f64;

    finite.sort_by(f64::total_cmp);
    let n = finite.len();
    let median = if n % 2 == 0 {
        (finite[n / 2 - 1] + finite[n / 2]) / 2.0
    } else {
        finite[n / 2]
    };

    ColumnStatistics::Numeric {
        min: finite[0],
        max: finite[n - 1],
        average,
        median,
        mode,
    }
}

/// Most frequent value; ties go to the one seen first.
fn mode_of(values: &[f64]) -> f64 {
    // -0.0 and 0.0 count as the same value
    let key = |v: f64| if v == 0.0 { 0u64 } else { v.to_bits() };

    let mut counts: HashMap<u64, usize> = HashMap::new();
    for &v in values {
        *counts.entry(key(v)).or_default() += 1;
    }

    let mut best = values[0];
    let mut best_count = 0;
    for &v in values {
        let count = counts[&key(v)];
        if count > best_count {
            best = v;
            best_count = count;
        }
    }
    best
}

pub fn date_statistics(values: &[NaiveDateTime]) -> ColumnStatistics {
    match (values.iter().min(), values.iter().max()) {
        (Some(min), Some(max)) => ColumnStatistics::Date {
            min: *min,
            max: *max,
        },
        _ => ColumnStatistics::Empty {},
    }
}

// ---------------------------------------------------------------------------
// Incremental column profiling
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ColumnAccumulator {
    kind: Option<ColumnType>,
    mixed: bool,
    null_count: usize,
    unique: HashSet<CellValue>,
    unique_order: Vec<CellValue>,
    samples: Vec<CellValue>,
    numbers: Vec<f64>,
    dates: Vec<NaiveDateTime>,
}

impl ColumnAccumulator {
    fn observe(&mut self, value: &CellValue, options: &AnalysisOptions) {
        let Some(kind) = classify_value(value) else {
            self.null_count += 1;
            return;
        };

        match self.kind {
            None => self.kind = Some(kind),
            Some(prev) if prev != kind => self.mixed = true,
            Some(_) => {}
        }

        if self.unique.len() < options.unique_values_tracking_cap
            && self.unique.insert(value.clone())
        {
            self.unique_order.push(value.clone());
        }
        if self.samples.len() < options.sample_size {
            self.samples.push(value.clone());
        }

        if options.compute_statistics && !self.mixed {
            match kind {
                ColumnType::Number => self.numbers.extend(value.as_number()),
                ColumnType::Date => self.dates.extend(value.as_date()),
                _ => {}
            }
        }
    }

    fn column_type(&self) -> ColumnType {
        if self.mixed {
            ColumnType::Mixed
        } else {
            self.kind.unwrap_or(ColumnType::String)
        }
    }

    fn finish(mut self, name: String, index: usize, options: &AnalysisOptions) -> ColumnInfo {
        let column_type = self.column_type();
        let statistics = options.compute_statistics.then(|| match column_type {
            ColumnType::Number => numeric_statistics(&self.numbers),
            ColumnType::Date => date_statistics(&self.dates),
            _ => ColumnStatistics::Empty {},
        });

        let unique_count = self.unique.len();
        self.unique_order.truncate(options.unique_values_return_limit);

        ColumnInfo {
            name,
            index,
            column_type,
            unique_values: self.unique_order,
            unique_count,
            has_nulls: self.null_count > 0,
            null_count: self.null_count,
            sample_values: self.samples,
            statistics,
        }
    }
}

/// Column metadata built up one row at a time, so rows can be analyzed in
/// the same pass that chunks them.
#[derive(Debug)]
pub struct ColumnProfiler {
    options: AnalysisOptions,
    columns: Vec<ColumnAccumulator>,
}

impl ColumnProfiler {
    pub fn new(width: usize, options: AnalysisOptions) -> Self {
        ColumnProfiler {
            options,
            columns: (0..width).map(|_| ColumnAccumulator::default()).collect(),
        }
    }

    /// Cells past `width` are ignored; missing cells count as null.
    pub fn observe_row(&mut self, row: &[CellValue]) {
        for (index, column) in self.columns.iter_mut().enumerate() {
            column.observe(cell_at(row, index), &self.options);
        }
    }

    pub fn finish(self, headers: &[String]) -> Vec<ColumnInfo> {
        let options = self.options;
        self.columns
            .into_iter()
            .enumerate()
            .map(|(index, column)| {
                let name = headers.get(index).cloned().unwrap_or_default();
                column.finish(name, index, &options)
            })
            .collect()
    }
}

/// Profile every column of `rows` in one go.
pub fn analyze_columns(
    headers: &[String],
    rows: &[Row],
    options: &AnalysisOptions,
) -> Vec<ColumnInfo> {
    let mut profiler = ColumnProfiler::new(headers.len(), options.clone());
    for row in rows {
        profiler.observe_row(row);
    }
    profiler.finish(headers)
}
