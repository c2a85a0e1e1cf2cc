use std::borrow::Cow;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// CellValue – a single cell in the data matrix
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value as produced by the decoders.
///
/// Serialized as plain JSON: `null`, `true`, `1.5`, `"2024-01-31"`, `"text"`.
/// Dates are written in their display form and JSON strings always read
/// back as `String`, so a saved select option keeps its key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "JsonCell")]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Date(NaiveDateTime),
    String(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCell {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl From<JsonCell> for CellValue {
    fn from(cell: JsonCell) -> Self {
        match cell {
            JsonCell::Null => CellValue::Null,
            JsonCell::Bool(b) => CellValue::Bool(b),
            JsonCell::Number(v) => CellValue::Number(v),
            JsonCell::String(s) => CellValue::String(s),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_unit(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Number(v) => serializer.serialize_f64(*v),
            CellValue::Date(_) => serializer.collect_str(self),
            CellValue::String(s) => serializer.serialize_str(s),
        }
    }
}

/// Shared `Null` handed out for cells past the end of a short row.
pub static NULL_CELL: CellValue = CellValue::Null;

// -- Manual Eq/Ord so we can put CellValue in ordered and hashed sets --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Number(_) => 2,
                Date(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Number(a), Number(b)) => a.total_cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Number(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Date(d) => d.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Number(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{v}")
                }
            }
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => {
                if d.time() == NaiveTime::MIN {
                    write!(f, "{}", d.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            CellValue::Null => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Number(v as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(d: NaiveDateTime) -> Self {
        CellValue::Date(d)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(CellValue::Null, Into::into)
    }
}

impl CellValue {
    /// Null or the empty string. These count as "no value" everywhere:
    /// null statistics, tail trimming and the null filter.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric interpretation: native numbers and numeric literals in text.
    /// Non-finite numbers are returned as-is; callers decide what to do.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            CellValue::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// Date interpretation: native dates and parseable date text.
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::String(s) => parse_date(s),
            _ => None,
        }
    }

    /// Text form used for search matching.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::String(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Literal parsing shared by inference and filtering
// ---------------------------------------------------------------------------

/// Parse a decimal literal (`12`, `-3.5`, `1e6`). Words such as `inf` or
/// `NaN` are text, not numbers.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let literal = t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !literal || !t.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    t.parse::<f64>().ok()
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d %b %Y", "%b %d, %Y", "%B %d, %Y",
];

/// Parse common date and date-time spellings. RFC 3339 timestamps are
/// normalized to UTC.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let t = s.trim();
    if t.len() < 6 || !t.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One row of cells. Rows may be shorter or longer than the header row.
pub type Row = Vec<CellValue>;

/// Ordered rows of heterogeneous cells.
pub type DataMatrix = Vec<Row>;

/// Cell at `index`, or `Null` when the row is too short.
pub fn cell_at(row: &[CellValue], index: usize) -> &CellValue {
    row.get(index).unwrap_or(&NULL_CELL)
}

// ---------------------------------------------------------------------------
// Column metadata
// ---------------------------------------------------------------------------

/// Semantic type inferred for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Date,
    Boolean,
    Mixed,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
            ColumnType::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// Summary statistics. Serializes to `{}` when there was nothing to measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnStatistics {
    Numeric {
        min: f64,
        max: f64,
        average: f64,
        median: f64,
        mode: f64,
    },
    Date {
        min: NaiveDateTime,
        max: NaiveDateTime,
    },
    Empty {},
}

impl ColumnStatistics {
    pub fn is_empty(&self) -> bool {
        matches!(self, ColumnStatistics::Empty {})
    }
}

/// Per-column inference result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    /// Position of this column's cell in every row.
    pub index: usize,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Distinct non-null values in first-seen order, capped.
    pub unique_values: Vec<CellValue>,
    /// Distinct count, saturating at the tracking cap.
    pub unique_count: usize,
    pub has_nulls: bool,
    pub null_count: usize,
    pub sample_values: Vec<CellValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<ColumnStatistics>,
}

// ---------------------------------------------------------------------------
// ExcelData – the immutable parse result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcelMetadata {
    pub file_name: String,
    pub sheet_names: Vec<String>,
    pub active_sheet: String,
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<ColumnInfo>,
    pub file_size: u64,
}

/// The full parsed sheet: headers, data rows and column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcelData {
    pub headers: Vec<String>,
    pub rows: DataMatrix,
    pub metadata: ExcelMetadata,
}

impl ExcelData {
    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column metadata by header name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.metadata.columns.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn numeric_literals_only() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("-3.5e2"), Some(-350.0));
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("1-2"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("."), None);
    }

    #[test]
    fn date_spellings() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_time(NaiveTime::MIN);
        assert_eq!(parse_date("2024-03-09"), Some(d));
        assert_eq!(parse_date("03/09/2024"), Some(d));
        assert_eq!(parse_date("2024-03-09T00:00:00Z"), Some(d));
        assert_eq!(parse_date("hello"), None);
        assert_eq!(parse_date("12"), None);
    }

    #[test]
    fn display_trims_integral_floats() {
        assert_eq!(CellValue::Number(10.0).to_string(), "10");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Null.to_string(), "");
    }

    #[test]
    fn ordering_is_total() {
        let set: BTreeSet<CellValue> = [
            CellValue::from("b"),
            CellValue::Number(f64::NAN),
            CellValue::Null,
            CellValue::Number(1.0),
            CellValue::from("b"),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 4);
        assert_eq!(set.iter().next(), Some(&CellValue::Null));
    }

    #[test]
    fn cell_json_shapes() {
        let row: Row = serde_json::from_str(r#"[null, true, 3, "x"]"#).unwrap();
        assert_eq!(
            row,
            vec![
                CellValue::Null,
                CellValue::Bool(true),
                CellValue::Number(3.0),
                CellValue::from("x")
            ]
        );
        let empty = serde_json::to_string(&ColumnStatistics::Empty {}).unwrap();
        assert_eq!(empty, "{}");
    }

    #[test]
    fn date_like_text_reads_back_as_text() {
        let text = CellValue::from("2024-01-01T08:30:00");
        let json = serde_json::to_string(&text).unwrap();
        let back: CellValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, text);

        let date = CellValue::Date(parse_date("2024-01-01 08:30:00").unwrap());
        assert_eq!(serde_json::to_string(&date).unwrap(), r#""2024-01-01 08:30:00""#);
    }

    #[test]
    fn short_rows_read_null() {
        let row = vec![CellValue::from("a")];
        assert_eq!(cell_at(&row, 3), &CellValue::Null);
    }
}
