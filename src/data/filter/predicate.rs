use std::borrow::Cow;
use std::collections::HashSet;

use super::types::{
    DateValues, FilterConfig, FilterOperator, FilterValues, RangeMode, RangeValues, SearchValues,
};
use crate::data::model::{CellValue, cell_at};

/// Display key shared by null, empty and placeholder cells in select filters.
pub const EMPTY_LABEL: &str = "(Empty)";

/// Key a cell is grouped under in a select filter.
pub fn select_key(cell: &CellValue) -> Cow<'_, str> {
    if cell.is_blank() {
        return Cow::Borrowed(EMPTY_LABEL);
    }
    let text = cell.as_text();
    if text.eq_ignore_ascii_case("null") || text.eq_ignore_ascii_case("undefined") {
        Cow::Borrowed(EMPTY_LABEL)
    } else {
        text
    }
}

/// Loose boolean reading used by the boolean filter.
pub fn coerce_bool(cell: &CellValue) -> Option<bool> {
    match cell {
        CellValue::Bool(b) => Some(*b),
        CellValue::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Whether `cell` passes `config`, ignoring the `active` flag.
pub fn evaluate(cell: &CellValue, config: &FilterConfig) -> bool {
    CompiledFilter::new(config).accepts(cell)
}

// ---------------------------------------------------------------------------
// Compiled form: lookups that would otherwise be rebuilt per row
// ---------------------------------------------------------------------------

enum Test<'a> {
    PassAll,
    Search {
        needle: Cow<'a, str>,
        values: &'a SearchValues,
    },
    Continuous(&'a RangeValues),
    Binned {
        values: &'a RangeValues,
        selected: HashSet<&'a str>,
    },
    Select(HashSet<Cow<'a, str>>),
    Date(&'a DateValues),
    Boolean(bool),
    Null,
}

pub(crate) struct CompiledFilter<'a> {
    column_index: usize,
    operator: FilterOperator,
    test: Test<'a>,
}

impl<'a> CompiledFilter<'a> {
    pub(crate) fn new(config: &'a FilterConfig) -> Self {
        let test = match &config.values {
            FilterValues::Search(values) if values.query.is_empty() => Test::PassAll,
            FilterValues::Search(values) => Test::Search {
                needle: if values.case_sensitive {
                    Cow::Borrowed(values.query.as_str())
                } else {
                    Cow::Owned(values.query.to_lowercase())
                },
                values,
            },
            FilterValues::Range(values) => match &values.mode {
                RangeMode::Continuous => Test::Continuous(values),
                RangeMode::Binned {
                    selected_range_ids, ..
                } if selected_range_ids.is_empty() => Test::PassAll,
                RangeMode::Binned {
                    selected_range_ids, ..
                } => Test::Binned {
                    values,
                    selected: selected_range_ids.iter().map(String::as_str).collect(),
                },
            },
            FilterValues::Select(options) => {
                let selected: HashSet<_> = options
                    .iter()
                    .filter(|o| o.selected)
                    .map(|o| select_key(&o.value))
                    .collect();
                if selected.is_empty() {
                    Test::PassAll
                } else {
                    Test::Select(selected)
                }
            }
            FilterValues::Date(values) => Test::Date(values),
            FilterValues::Boolean(Some(target)) => Test::Boolean(*target),
            FilterValues::Boolean(None) => Test::PassAll,
            FilterValues::Null(_) => Test::Null,
            FilterValues::Unsupported { .. } => Test::PassAll,
        };
        CompiledFilter {
            column_index: config.column_index,
            operator: config.operator,
            test,
        }
    }

    pub(crate) fn accepts_row(&self, row: &[CellValue]) -> bool {
        self.accepts(cell_at(row, self.column_index))
    }

    pub(crate) fn accepts(&self, cell: &CellValue) -> bool {
        use FilterOperator as Op;
        let op = self.operator;

        match &self.test {
            Test::PassAll => true,

            Test::Search { needle, values } => {
                if matches!(cell, CellValue::Null) {
                    return false;
                }
                let text = cell.as_text();
                let haystack = if values.case_sensitive {
                    text
                } else {
                    Cow::Owned(text.to_lowercase())
                };
                let hit = if values.exact_match {
                    haystack == *needle
                } else {
                    haystack.contains(&**needle)
                };
                match op {
                    Op::Contains | Op::Equals => hit,
                    Op::NotContains | Op::NotEquals => !hit,
                    _ => true,
                }
            }

            Test::Continuous(range) => {
                let Some(v) = cell.as_number().filter(|v| v.is_finite()) else {
                    return false;
                };
                in_bounds(op, v, range.current_min, range.current_max)
            }

            Test::Binned { values, selected } => {
                let RangeMode::Binned { ranges, .. } = &values.mode else {
                    return true;
                };
                let in_selected = cell
                    .as_number()
                    .filter(|v| v.is_finite())
                    .and_then(|v| ranges.iter().find(|r| r.contains(v)))
                    .is_some_and(|bin| selected.contains(bin.id.as_str()));
                if op == Op::NotEquals {
                    !in_selected
                } else {
                    in_selected
                }
            }

            Test::Select(selected) => {
                let member = selected.contains(&*select_key(cell));
                if op.is_negated() {
                    !member
                } else {
                    member
                }
            }

            Test::Date(range) => {
                let Some(d) = cell.as_date() else {
                    return false;
                };
                in_bounds(op, d, range.current_start, range.current_end)
            }

            Test::Boolean(target) => {
                let equal = coerce_bool(cell) == Some(*target);
                if op == Op::NotEquals {
                    !equal
                } else {
                    equal
                }
            }

            Test::Null => match op {
                Op::IsNull => cell.is_blank(),
                Op::IsNotNull => !cell.is_blank(),
                _ => true,
            },
        }
    }
}

fn in_bounds<T: PartialOrd>(op: FilterOperator, v: T, lo: T, hi: T) -> bool {
    match op {
        FilterOperator::Between => lo <= v && v <= hi,
        FilterOperator::NotBetween => !(lo <= v && v <= hi),
        FilterOperator::GreaterThan => v > lo,
        FilterOperator::LessThan => v < hi,
        _ => true,
    }
}
