use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::data::model::CellValue;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    Between,
    NotBetween,
    GreaterThan,
    LessThan,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    /// Operators that accept what the filter does *not* describe.
    pub fn is_negated(self) -> bool {
        matches!(self, FilterOperator::NotContains | FilterOperator::NotEquals)
    }
}

// ---------------------------------------------------------------------------
// Per-kind values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchValues {
    pub query: String,
    pub case_sensitive: bool,
    pub exact_match: bool,
}

/// A named sub-range of a binned numeric filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericRange {
    pub id: String,
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub include_min: bool,
    pub include_max: bool,
}

impl NumericRange {
    pub fn contains(&self, v: f64) -> bool {
        let above = if self.include_min { v >= self.min } else { v > self.min };
        let below = if self.include_max { v <= self.max } else { v < self.max };
        above && below
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RangeMode {
    Continuous,
    Binned {
        ranges: Vec<NumericRange>,
        #[serde(rename = "selectedRangeIds", default)]
        selected_range_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeValues {
    /// Bounds of the column's data.
    pub min: f64,
    pub max: f64,
    /// Bounds the user selected.
    pub current_min: f64,
    pub current_max: f64,
    #[serde(flatten)]
    pub mode: RangeMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: CellValue,
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateValues {
    pub earliest: NaiveDateTime,
    pub latest: NaiveDateTime,
    pub current_start: NaiveDateTime,
    pub current_end: NaiveDateTime,
}

/// Filter payload, discriminated by the filter `type`.
///
/// On the wire this is two sibling fields, `"type"` and `"values"`. Types
/// this build does not know are kept verbatim as `Unsupported` and accept
/// every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaggedValues", into = "TaggedValues")]
pub enum FilterValues {
    Search(SearchValues),
    Range(RangeValues),
    Select(Vec<SelectOption>),
    Date(DateValues),
    Boolean(Option<bool>),
    Null(bool),
    Unsupported { kind: String, values: JsonValue },
}

impl FilterValues {
    /// The `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            FilterValues::Search(_) => "search",
            FilterValues::Range(_) => "range",
            FilterValues::Select(_) => "select",
            FilterValues::Date(_) => "date",
            FilterValues::Boolean(_) => "boolean",
            FilterValues::Null(_) => "null",
            FilterValues::Unsupported { kind, .. } => kind,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TaggedValues {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    values: JsonValue,
}

impl TryFrom<TaggedValues> for FilterValues {
    type Error = serde_json::Error;

    fn try_from(tagged: TaggedValues) -> Result<Self, Self::Error> {
        let TaggedValues { kind, values } = tagged;
        Ok(match kind.as_str() {
            "search" => FilterValues::Search(serde_json::from_value(values)?),
            "range" => FilterValues::Range(serde_json::from_value(values)?),
            "select" => FilterValues::Select(serde_json::from_value(values)?),
            "date" => FilterValues::Date(serde_json::from_value(values)?),
            "boolean" => FilterValues::Boolean(serde_json::from_value(values)?),
            "null" => FilterValues::Null(serde_json::from_value(values).unwrap_or(true)),
            _ => FilterValues::Unsupported { kind, values },
        })
    }
}

impl From<FilterValues> for TaggedValues {
    fn from(values: FilterValues) -> Self {
        let kind = values.kind().to_string();
        let values = match values {
            FilterValues::Search(v) => serde_json::to_value(v),
            FilterValues::Range(v) => serde_json::to_value(v),
            FilterValues::Select(v) => serde_json::to_value(v),
            FilterValues::Date(v) => serde_json::to_value(v),
            FilterValues::Boolean(v) => serde_json::to_value(v),
            FilterValues::Null(v) => serde_json::to_value(v),
            FilterValues::Unsupported { values, .. } => Ok(values),
        };
        TaggedValues {
            kind,
            values: values.unwrap_or(JsonValue::Null),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter configuration
// ---------------------------------------------------------------------------

/// One named filter on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub id: String,
    pub display_name: String,
    pub column: String,
    pub column_index: usize,
    pub active: bool,
    pub operator: FilterOperator,
    #[serde(flatten)]
    pub values: FilterValues,
}

/// Partial update for [`FilterConfig`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterUpdate {
    pub display_name: Option<String>,
    pub column: Option<String>,
    pub column_index: Option<usize>,
    pub active: Option<bool>,
    pub operator: Option<FilterOperator>,
    pub values: Option<FilterValues>,
}

impl FilterUpdate {
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn operator(mut self, operator: FilterOperator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn values(mut self, values: FilterValues) -> Self {
        self.values = Some(values);
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub(crate) fn apply_to(self, config: &mut FilterConfig) {
        if let Some(name) = self.display_name {
            config.display_name = name;
        }
        if let Some(column) = self.column {
            config.column = column;
        }
        if let Some(index) = self.column_index {
            config.column_index = index;
        }
        if let Some(active) = self.active {
            config.active = active;
        }
        if let Some(operator) = self.operator {
            config.operator = operator;
        }
        if let Some(values) = self.values {
            config.values = values;
        }
    }
}

/// Persisted filter state: just enough to restore behaviour, no column
/// metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterStateEntry {
    pub id: String,
    pub active: bool,
    pub operator: FilterOperator,
    #[serde(flatten)]
    pub values: FilterValues,
}
